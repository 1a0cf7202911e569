//! # Actor Render
//!
//! GPU resource packing and draw dispatch for skinned, deformable 2D actors.
//!
//! ## Features
//!
//! - **Buffer Packing**: many mesh parts laid out into a few vertex/index buffers
//! - **Instance Sharing**: every instance draws from one shared resource set
//! - **Deformation Overlays**: private position buffers only where vertices animate
//! - **Blend Batching**: redundant blend state changes are never sent
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use actor_render::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut renderer = ActorRenderer::new(RecordingBackend::new(), RenderConfig::default());
//!     let mut textures = RecordingBackend::new();
//!
//!     let data = ActorData {
//!         parts: vec![MeshPart::plain("body", vec![0.0; 12], vec![0, 1, 2]).with_texture(0)],
//!         textures_used: 1,
//!     };
//!     let hero = renderer.load_actor("assets/hero.nima", data, &mut textures)?;
//!     let mut instance = renderer.create_instance(&hero)?;
//!
//!     renderer.begin_frame();
//!     renderer.draw_instance(&mut instance)?;
//!     let stats = renderer.end_frame();
//!     println!("{} parts drawn", stats.parts_drawn);
//!
//!     renderer.release_instance(instance);
//!     renderer.release_actor(hero)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        foundation::math::Transform2D,
        render::{
            ActorData, ActorDefinition, ActorInstance, ActorRenderer, BlendMode, FrameStats, GraphicsBackend,
            MeshPart, PackingStrategy, PartBlend, PartPose, RecordingBackend, ReleaseError, RenderConfig, RenderError,
            RenderResult, TextureLoader,
        },
    };
}

//! Actor resources and per-frame drawing
//!
//! - [`mesh_part`]: part data and capability flags
//! - [`packer`]: vertex/index layout computed once per definition
//! - [`shared`]: the uploaded layout shared by all instances
//! - [`definition`]: the immutable actor template
//! - [`overlay`]: per-instance position buffers for deforming parts
//! - [`instance`]: one animated copy of an actor
//! - [`scheduler`]: draw ordering, blend grouping and dispatch

pub mod definition;
pub mod instance;
pub mod mesh_part;
pub mod overlay;
pub mod packer;
pub mod scheduler;
pub mod shared;
pub mod textures;

pub use definition::{ActorData, ActorDefinition, ReleaseError};
pub use instance::{ActorInstance, PartPose};
pub use mesh_part::{MeshPart, PartBlend, PartFlags, VertexLayout, DEFORM_COMPONENTS};
pub use overlay::InstanceOverlay;
pub use packer::{
    BufferPacker, IndexSlot, PackError, PackedIndexBuffer, PackedLayout, PackedVertexBuffer, PackingStrategy,
    PartGroup, PartRecord, VertexSlot, MAX_VERTICES_PER_BUFFER,
};
pub use scheduler::{dispatch, BlendRun, DrawPlan, DrawScheduler, DrawShape, SkipReason};
pub use shared::{GpuVertexBuffer, SharedResourceSet};
pub use textures::{actor_base_name, texture_paths};

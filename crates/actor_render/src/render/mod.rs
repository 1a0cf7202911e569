//! # Actor Rendering
//!
//! GPU resource packing, instance sharing and per-frame draw dispatch for
//! skinned, deformable 2D actors.
//!
//! ## Architecture
//!
//! - **Actor**: mesh parts, the buffer packer, shared resources, per-instance
//!   overlays and the draw scheduler
//! - **Blend**: redundant-change suppression for the pipeline blend state
//! - **Backend**: the graphics layer seam ([`GraphicsBackend`], [`TextureLoader`])
//! - **Renderer**: [`ActorRenderer`], the per-context frame driver
//!
//! ## Resource Model
//!
//! An [`ActorDefinition`] is loaded once and shared through `Arc`. Everything
//! immutable (static vertex blocks, index data, deforming base poses) lives in
//! its [`SharedResourceSet`]. An [`ActorInstance`] only allocates an
//! [`InstanceOverlay`] for parts whose vertex positions animate.

pub mod actor;
pub mod backend;
pub mod backends;
pub mod blend;
pub mod config;
pub mod renderer;

pub use actor::{
    ActorData, ActorDefinition, ActorInstance, BlendRun, BufferPacker, DrawScheduler, InstanceOverlay,
    MeshPart, PackError, PackedLayout, PackingStrategy, PartBlend, PartFlags, PartPose, PartRecord,
    ReleaseError, SharedResourceSet, VertexLayout, MAX_VERTICES_PER_BUFFER,
};
pub use backend::{
    BackendResult, BufferDescriptor, BufferHandle, BufferUsage, GraphicsBackend, IndexRange, TextureHandle,
    TextureLoader, TexturedDraw, VertexBinding,
};
pub use backends::RecordingBackend;
pub use blend::{BlendMode, BlendStateMachine};
pub use config::RenderConfig;
pub use renderer::{ActorRenderer, FrameStats};

/// Rendering errors
///
/// Load-time layout problems arrive wrapped as [`RenderError::Pack`]. Runtime
/// skips (invisible parts, missing textures) are never reported as errors.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Buffer packing or content validation failed while loading an actor
    ///
    /// The asset is malformed or exceeds a hard limit of the buffer layout.
    /// Loading is aborted and nothing is kept.
    #[error("Actor packing failed: {0}")]
    Pack(#[from] PackError),

    /// Resource creation or management failed
    ///
    /// Occurs when the graphics layer cannot allocate a buffer, typically due
    /// to memory exhaustion.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A texture named by the actor could not be loaded
    #[error("Texture load failed: {0}")]
    TextureLoadFailed(String),

    /// A part index did not name a part of the definition, or named a part
    /// without the requested capability
    #[error("Invalid part: {0}")]
    InvalidPart(String),

    /// The definition is still referenced by live instances
    #[error("Actor definition '{0}' is still in use")]
    DefinitionInUse(String),

    /// A deformation array did not match the part's vertex count
    #[error("Deformation size mismatch: expected {expected} floats, got {actual}")]
    DeformationSizeMismatch {
        /// Floats required (2 per vertex)
        expected: usize,
        /// Floats supplied
        actual: usize,
    },

    /// A draw was issued outside `begin_frame` / `end_frame`
    #[error("Draw issued outside a frame")]
    FrameNotStarted,

    /// Backend-specific error occurred
    ///
    /// Wraps graphics layer failures that are not allocation failures.
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

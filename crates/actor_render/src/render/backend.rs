//! Backend abstraction traits for actor rendering
//!
//! This module defines the traits the graphics layer must implement. The actor
//! renderer only needs buffer management, a blend state setter and two draw
//! primitives (textured, and textured with skinning).

use std::path::Path;

use super::actor::VertexLayout;
use super::blend::BlendMode;
use super::RenderError;
use crate::foundation::math::Transform2D;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Handle to a GPU buffer stored in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Handle to a texture stored in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex attributes (`f32`)
    Vertex,
    /// Triangle indices (`u16`)
    Index,
}

/// Buffer creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Debug label
    pub label: String,
    /// Binding usage
    pub usage: BufferUsage,
    /// Rewritten after creation (instance overlays)
    pub dynamic: bool,
}

impl BufferDescriptor {
    /// Static vertex buffer
    pub fn vertex(label: impl Into<String>) -> Self {
        Self { label: label.into(), usage: BufferUsage::Vertex, dynamic: false }
    }

    /// Static index buffer
    pub fn index(label: impl Into<String>) -> Self {
        Self { label: label.into(), usage: BufferUsage::Index, dynamic: false }
    }

    /// Vertex buffer rewritten every time its owner is marked dirty
    pub fn dynamic_vertex(label: impl Into<String>) -> Self {
        Self { label: label.into(), usage: BufferUsage::Vertex, dynamic: true }
    }
}

/// Vertex sources bound for one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexBinding {
    /// All attributes come from one shared buffer
    Static {
        /// Vertex buffer
        buffer: BufferHandle,
        /// Attribute layout of `buffer`
        layout: VertexLayout,
    },
    /// Positions come from an instance overlay, everything else from the base
    /// buffer of the deforming part
    Deformed {
        /// Instance-private positions (2 floats per vertex)
        positions: BufferHandle,
        /// Shared base pose (texcoords and bone data)
        base: BufferHandle,
        /// Attribute layout of `base`
        layout: VertexLayout,
    },
}

/// Range of an index buffer, in indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    /// First index
    pub first: u32,
    /// Number of indices
    pub count: u32,
}

/// Everything the textured draw primitive needs
#[derive(Debug, Clone, PartialEq)]
pub struct TexturedDraw {
    /// View transform of the frame
    pub view: Transform2D,
    /// World transform of the part
    pub world: Transform2D,
    /// Vertex sources
    pub vertices: VertexBinding,
    /// Index buffer
    pub index_buffer: BufferHandle,
    /// Indices to draw
    pub indices: IndexRange,
    /// Part opacity in `(0, 1]`
    pub opacity: f32,
    /// RGBA tint multiplied into the texture
    pub tint: [f32; 4],
    /// Texture to sample
    pub texture: TextureHandle,
}

/// Graphics layer used by the actor renderer
///
/// Implementations wrap a concrete API. All calls happen on the thread that
/// owns the graphics context.
pub trait GraphicsBackend {
    /// Create a buffer initialized with `contents`
    fn create_buffer(&mut self, desc: &BufferDescriptor, contents: &[u8]) -> BackendResult<BufferHandle>;

    /// Replace the contents of a buffer
    fn write_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) -> BackendResult<()>;

    /// Release a buffer. Unknown handles are ignored.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Change the pipeline blend state
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Draw a textured mesh
    fn draw_textured(&mut self, draw: &TexturedDraw) -> BackendResult<()>;

    /// Draw a textured skinned mesh with a flat `[a, b, c, d, tx, ty]` bone table
    fn draw_textured_skin(&mut self, draw: &TexturedDraw, bone_matrices: &[f32]) -> BackendResult<()>;
}

/// Image decoding and texture upload
pub trait TextureLoader {
    /// Load the texture stored at `path`
    fn load_texture(&mut self, path: &Path) -> BackendResult<TextureHandle>;
}

/// Create a vertex/index buffer from plain-old-data elements
pub fn create_buffer_from<B, T>(backend: &mut B, desc: &BufferDescriptor, data: &[T]) -> BackendResult<BufferHandle>
where
    B: GraphicsBackend + ?Sized,
    T: bytemuck::Pod,
{
    backend.create_buffer(desc, bytemuck::cast_slice(data))
}

/// Rewrite a buffer from plain-old-data elements
pub fn write_buffer_from<B, T>(backend: &mut B, buffer: BufferHandle, data: &[T]) -> BackendResult<()>
where
    B: GraphicsBackend + ?Sized,
    T: bytemuck::Pod,
{
    backend.write_buffer(buffer, bytemuck::cast_slice(data))
}

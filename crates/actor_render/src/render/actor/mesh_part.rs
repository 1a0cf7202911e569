//! Mesh parts
//!
//! A mesh part is one textured triangle list of an actor: its base-pose vertex
//! block, index list, texture index, draw-order key and capability flags.
//! Topology never changes after load.

use serde::{Deserialize, Serialize};

use crate::render::blend::BlendMode;

bitflags::bitflags! {
    /// Capabilities that decide how a part is packed and drawn
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PartFlags: u8 {
        /// Vertices carry bone indices and weights
        const SKINNED = 1 << 0;
        /// Vertex positions are rewritten by animation
        const DEFORMING = 1 << 1;
    }
}

/// Vertex attribute layout of a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// `[x, y, u, v]`
    Plain,
    /// `[x, y, u, v, b0, b1, b2, b3, w0, w1, w2, w3]`
    Skinned,
}

impl VertexLayout {
    /// Number of floats per vertex
    pub const fn stride(self) -> usize {
        match self {
            Self::Plain => 4,
            Self::Skinned => 12,
        }
    }

    /// Offset of the first bone index within a vertex, if any
    pub const fn bone_index_offset(self) -> Option<usize> {
        match self {
            Self::Plain => None,
            Self::Skinned => Some(4),
        }
    }
}

/// Floats per vertex in a deformation array (`[x, y]`)
pub const DEFORM_COMPONENTS: usize = 2;

/// Blend mode as authored on a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PartBlend {
    /// Regular alpha blending
    #[default]
    Normal,
    /// Additive blending
    Additive,
    /// Multiplicative blending
    Multiply,
    /// Screen blending
    Screen,
}

impl PartBlend {
    /// Pipeline blend mode used to draw a part with this authored mode
    pub const fn resolve(self) -> BlendMode {
        match self {
            Self::Normal => BlendMode::Transparent,
            Self::Additive => BlendMode::Additive,
            Self::Multiply => BlendMode::Multiply,
            Self::Screen => BlendMode::Screen,
        }
    }
}

/// One drawable part of an actor
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    name: String,
    layout: VertexLayout,
    vertices: Vec<f32>,
    triangles: Vec<u16>,
    texture_index: i32,
    draw_order: i32,
    blend: PartBlend,
    bone_count: usize,
    flags: PartFlags,
}

impl MeshPart {
    /// Create an unskinned part from `[x, y, u, v]` vertices
    pub fn plain(name: impl Into<String>, vertices: Vec<f32>, triangles: Vec<u16>) -> Self {
        Self {
            name: name.into(),
            layout: VertexLayout::Plain,
            vertices,
            triangles,
            texture_index: -1,
            draw_order: 0,
            blend: PartBlend::Normal,
            bone_count: 0,
            flags: PartFlags::empty(),
        }
    }

    /// Create a skinned part influenced by `bone_count` bones
    ///
    /// A bone count of zero yields a part that is stored with the skinned
    /// layout but drawn without a bone table.
    pub fn skinned(name: impl Into<String>, vertices: Vec<f32>, triangles: Vec<u16>, bone_count: usize) -> Self {
        let flags = if bone_count > 0 { PartFlags::SKINNED } else { PartFlags::empty() };
        Self {
            name: name.into(),
            layout: VertexLayout::Skinned,
            vertices,
            triangles,
            texture_index: -1,
            draw_order: 0,
            blend: PartBlend::Normal,
            bone_count,
            flags,
        }
    }

    /// Set the texture table index (`-1` for none)
    pub fn with_texture(mut self, texture_index: i32) -> Self {
        self.texture_index = texture_index;
        self
    }

    /// Set the authored draw-order key
    pub fn with_draw_order(mut self, draw_order: i32) -> Self {
        self.draw_order = draw_order;
        self
    }

    /// Set the authored blend mode
    pub fn with_blend(mut self, blend: PartBlend) -> Self {
        self.blend = blend;
        self
    }

    /// Mark the part's vertex positions as animated
    pub fn deforming(mut self) -> Self {
        self.flags |= PartFlags::DEFORMING;
        self
    }

    /// Part name, used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vertex attribute layout
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    /// Base-pose vertex data
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    /// Triangle list, relative to the part's own vertices
    pub fn triangles(&self) -> &[u16] {
        &self.triangles
    }

    /// Texture table index, `-1` when untextured
    pub fn texture_index(&self) -> i32 {
        self.texture_index
    }

    /// Authored draw-order key
    pub fn draw_order(&self) -> i32 {
        self.draw_order
    }

    /// Authored blend mode
    pub fn blend(&self) -> PartBlend {
        self.blend
    }

    /// Number of bones influencing this part
    pub fn bone_count(&self) -> usize {
        self.bone_count
    }

    /// Capability flags
    pub fn flags(&self) -> PartFlags {
        self.flags
    }

    /// Number of vertices (whole vertices only)
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.layout.stride()
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.triangles.len()
    }

    /// Drawn with a bone table
    pub fn is_skinned(&self) -> bool {
        self.flags.contains(PartFlags::SKINNED)
    }

    /// Vertex positions animate per instance
    pub fn is_deforming(&self) -> bool {
        self.flags.contains(PartFlags::DEFORMING)
    }

    /// Base-pose positions as `[x, y]` pairs, the seed of instance overlays
    pub fn base_positions(&self) -> Vec<f32> {
        let stride = self.layout.stride();
        let mut positions = Vec::with_capacity(self.vertex_count() * DEFORM_COMPONENTS);
        for vertex in self.vertices.chunks_exact(stride) {
            positions.extend_from_slice(&vertex[..DEFORM_COMPONENTS]);
        }
        positions
    }
}

//! # Buffer Packer
//!
//! Lays out the vertex and index data of an actor's mesh parts into as few GPU
//! buffers as possible. Packing runs once per actor definition; the resulting
//! [`PackedLayout`] is uploaded into a shared resource set that every instance
//! reuses.
//!
//! ## Strategies
//!
//! - **Packed contiguous**: parts are partitioned into plain-static,
//!   skinned-static and deforming groups. Static groups share one vertex block
//!   each, and all indices go into one shared index list. Indices of static
//!   parts are shifted by the part's first vertex. Deforming parts get their own
//!   vertex block, so their indices stay relative to vertex 0.
//! - **Per-part buffers**: every part owns its vertex block and index block.
//!
//! ## Limits
//!
//! Indices are `u16`, so a vertex block may address at most
//! [`MAX_VERTICES_PER_BUFFER`] vertices. Exceeding it is a load error.

use serde::{Deserialize, Serialize};

use super::mesh_part::{MeshPart, VertexLayout};
use crate::render::config::DEFAULT_MAX_BONES_PER_DRAW;

/// Largest number of vertices one vertex block can address with `u16` indices
pub const MAX_VERTICES_PER_BUFFER: usize = 65_536;

/// How parts are laid out into GPU buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PackingStrategy {
    /// One vertex and one index buffer per part
    PerPartBuffers,
    /// Static parts share contiguous blocks, deforming parts own their vertices
    #[default]
    PackedContiguousBuffers,
}

/// Packing group a part belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartGroup {
    /// Unskinned layout, positions never change
    PlainStatic,
    /// Skinned layout, positions never change
    SkinnedStatic,
    /// Positions rewritten per instance
    Deforming,
}

impl PartGroup {
    /// Group of `part`. The deform flag wins over the vertex layout.
    pub fn of(part: &MeshPart) -> Self {
        if part.is_deforming() {
            Self::Deforming
        } else {
            match part.layout() {
                VertexLayout::Plain => Self::PlainStatic,
                VertexLayout::Skinned => Self::SkinnedStatic,
            }
        }
    }
}

impl std::fmt::Display for PartGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlainStatic => write!(f, "plain static"),
            Self::SkinnedStatic => write!(f, "skinned static"),
            Self::Deforming => write!(f, "deforming"),
        }
    }
}

/// Vertex block a part was packed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSlot {
    /// Shared plain-static block
    Plain,
    /// Shared skinned-static block
    Skinned,
    /// Block owned by this part, index into [`PackedLayout::dedicated_vertices`]
    Dedicated(usize),
}

/// Index block a part was packed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexSlot {
    /// Shared index list
    Shared,
    /// Block owned by this part, index into [`PackedLayout::dedicated_indices`]
    Dedicated(usize),
}

/// Where one part's data ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRecord {
    /// Packing group
    pub group: PartGroup,
    /// Vertex block
    pub vertex_slot: VertexSlot,
    /// Index block
    pub index_slot: IndexSlot,
    /// First vertex of the part within its vertex block
    pub first_vertex: u32,
    /// Number of vertices
    pub vertex_count: u32,
    /// First index of the part within its index block
    pub index_offset: u32,
    /// Number of indices
    pub index_count: u32,
}

impl PartRecord {
    /// The part draws from a vertex block nobody else uses
    pub fn uses_own_vertex_buffer(&self) -> bool {
        matches!(self.vertex_slot, VertexSlot::Dedicated(_))
    }
}

/// Contiguous vertex block
#[derive(Debug, Clone, PartialEq)]
pub struct PackedVertexBuffer {
    layout: VertexLayout,
    data: Vec<f32>,
}

impl PackedVertexBuffer {
    fn new(layout: VertexLayout) -> Self {
        Self { layout, data: Vec::new() }
    }

    /// Attribute layout
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    /// Interleaved vertex data
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.layout.stride()
    }

    /// No vertices were packed
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Contiguous `u16` index block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedIndexBuffer {
    data: Vec<u16>,
}

impl PackedIndexBuffer {
    /// Index data
    pub fn data(&self) -> &[u16] {
        &self.data
    }

    /// Number of indices
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// No indices were packed
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// CPU-side result of packing, ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct PackedLayout {
    strategy: PackingStrategy,
    plain: PackedVertexBuffer,
    skinned: PackedVertexBuffer,
    indices: PackedIndexBuffer,
    dedicated_vertices: Vec<PackedVertexBuffer>,
    dedicated_indices: Vec<PackedIndexBuffer>,
    records: Vec<PartRecord>,
}

impl PackedLayout {
    /// Strategy used
    pub fn strategy(&self) -> PackingStrategy {
        self.strategy
    }

    /// Shared plain-static vertex block
    pub fn plain(&self) -> &PackedVertexBuffer {
        &self.plain
    }

    /// Shared skinned-static vertex block
    pub fn skinned(&self) -> &PackedVertexBuffer {
        &self.skinned
    }

    /// Shared index list
    pub fn indices(&self) -> &PackedIndexBuffer {
        &self.indices
    }

    /// Vertex blocks owned by single parts
    pub fn dedicated_vertices(&self) -> &[PackedVertexBuffer] {
        &self.dedicated_vertices
    }

    /// Index blocks owned by single parts
    pub fn dedicated_indices(&self) -> &[PackedIndexBuffer] {
        &self.dedicated_indices
    }

    /// One record per part, in part order
    pub fn records(&self) -> &[PartRecord] {
        &self.records
    }

    /// Index list a record points into
    pub fn index_block(&self, slot: IndexSlot) -> Option<&PackedIndexBuffer> {
        match slot {
            IndexSlot::Shared => Some(&self.indices),
            IndexSlot::Dedicated(i) => self.dedicated_indices.get(i),
        }
    }

    /// Vertex block a record points into
    pub fn vertex_block(&self, slot: VertexSlot) -> Option<&PackedVertexBuffer> {
        match slot {
            VertexSlot::Plain => Some(&self.plain),
            VertexSlot::Skinned => Some(&self.skinned),
            VertexSlot::Dedicated(i) => self.dedicated_vertices.get(i),
        }
    }
}

/// Packing and content validation errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PackError {
    /// A vertex block would address more vertices than `u16` indices can reach
    #[error("{group} vertex block would hold {vertices} vertices after part '{part}' (limit {})", MAX_VERTICES_PER_BUFFER)]
    VertexLimitExceeded {
        /// Group being packed
        group: PartGroup,
        /// Part that crossed the limit
        part: String,
        /// Vertex count the block would reach
        vertices: usize,
    },

    /// A deforming part has no vertices to deform
    #[error("Deforming part '{0}' has no vertices")]
    EmptyDeformingPart(String),

    /// A skinned part is influenced by more bones than a draw can carry
    #[error("Part '{part}' uses {bones} bones, the bone table holds {max}")]
    BoneTableOverflow {
        /// Part name
        part: String,
        /// Bones used by the part
        bones: usize,
        /// Bone table size
        max: usize,
    },

    /// Vertex data is not a whole number of vertices
    #[error("Part '{part}' has {len} floats, not a multiple of stride {stride}")]
    MisalignedVertexData {
        /// Part name
        part: String,
        /// Number of floats
        len: usize,
        /// Floats per vertex
        stride: usize,
    },

    /// Index list is not a whole number of triangles
    #[error("Part '{part}' has {indices} indices, not a multiple of 3")]
    IncompleteTriangle {
        /// Part name
        part: String,
        /// Number of indices
        indices: usize,
    },

    /// A triangle references a vertex the part does not have
    #[error("Part '{part}' index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Part name
        part: String,
        /// Offending index
        index: u16,
        /// Vertices in the part
        vertex_count: usize,
    },

    /// A weighted bone influence references a bone the part does not have
    #[error("Part '{part}' vertex {vertex} references bone {bone} of {bone_count}")]
    BoneIndexOutOfRange {
        /// Part name
        part: String,
        /// Vertex number within the part
        vertex: usize,
        /// Stored bone index
        bone: f32,
        /// Bones influencing the part
        bone_count: usize,
    },
}

/// Computes buffer layouts for actor definitions
#[derive(Debug, Clone, Copy)]
pub struct BufferPacker {
    strategy: PackingStrategy,
    max_bones: usize,
}

impl Default for BufferPacker {
    fn default() -> Self {
        Self::new(PackingStrategy::default())
    }
}

impl BufferPacker {
    /// Create a packer for `strategy` with the default bone table size
    pub fn new(strategy: PackingStrategy) -> Self {
        Self { strategy, max_bones: DEFAULT_MAX_BONES_PER_DRAW }
    }

    /// Set the bone table size skinned parts are validated against
    pub fn with_max_bones(mut self, max_bones: usize) -> Self {
        self.max_bones = max_bones;
        self
    }

    /// Validate `parts` and lay them out
    pub fn pack(&self, parts: &[MeshPart]) -> Result<PackedLayout, PackError> {
        for part in parts {
            self.validate(part)?;
        }

        let mut layout = PackedLayout {
            strategy: self.strategy,
            plain: PackedVertexBuffer::new(VertexLayout::Plain),
            skinned: PackedVertexBuffer::new(VertexLayout::Skinned),
            indices: PackedIndexBuffer::default(),
            dedicated_vertices: Vec::new(),
            dedicated_indices: Vec::new(),
            records: Vec::with_capacity(parts.len()),
        };

        for part in parts {
            let record = match self.strategy {
                PackingStrategy::PackedContiguousBuffers => pack_contiguous(&mut layout, part)?,
                PackingStrategy::PerPartBuffers => pack_per_part(&mut layout, part)?,
            };
            layout.records.push(record);
        }

        log::debug!(
            "Packed {} parts ({:?}): {} plain + {} skinned shared vertices, {} shared indices, {} dedicated vertex blocks",
            parts.len(),
            self.strategy,
            layout.plain.vertex_count(),
            layout.skinned.vertex_count(),
            layout.indices.len(),
            layout.dedicated_vertices.len()
        );
        Ok(layout)
    }

    fn validate(&self, part: &MeshPart) -> Result<(), PackError> {
        let stride = part.layout().stride();
        let len = part.vertices().len();
        if len % stride != 0 {
            return Err(PackError::MisalignedVertexData { part: part.name().to_string(), len, stride });
        }

        if part.index_count() % 3 != 0 {
            return Err(PackError::IncompleteTriangle { part: part.name().to_string(), indices: part.index_count() });
        }

        let vertex_count = part.vertex_count();
        if let Some(&index) = part.triangles().iter().find(|&&i| usize::from(i) >= vertex_count) {
            return Err(PackError::IndexOutOfRange { part: part.name().to_string(), index, vertex_count });
        }

        if part.is_deforming() && vertex_count == 0 {
            return Err(PackError::EmptyDeformingPart(part.name().to_string()));
        }

        if part.is_skinned() {
            if part.bone_count() > self.max_bones {
                return Err(PackError::BoneTableOverflow {
                    part: part.name().to_string(),
                    bones: part.bone_count(),
                    max: self.max_bones,
                });
            }
            validate_bone_indices(part)?;
        }

        if part.index_count() == 0 {
            log::warn!("Part '{}' has no triangles and will never be drawn", part.name());
        }
        Ok(())
    }
}

fn validate_bone_indices(part: &MeshPart) -> Result<(), PackError> {
    let Some(offset) = part.layout().bone_index_offset() else {
        return Ok(());
    };
    let bone_count = part.bone_count();
    let limit = bone_count as f32;

    for (vertex, data) in part.vertices().chunks_exact(part.layout().stride()).enumerate() {
        let bones = &data[offset..offset + 4];
        let weights = &data[offset + 4..offset + 8];
        for (&bone, &weight) in bones.iter().zip(weights) {
            if weight > 0.0 && !(bone >= 0.0 && bone < limit && bone.fract() == 0.0) {
                return Err(PackError::BoneIndexOutOfRange {
                    part: part.name().to_string(),
                    vertex,
                    bone,
                    bone_count,
                });
            }
        }
    }
    Ok(())
}

fn check_vertex_limit(group: PartGroup, part: &MeshPart, vertices: usize) -> Result<(), PackError> {
    if vertices > MAX_VERTICES_PER_BUFFER {
        return Err(PackError::VertexLimitExceeded { group, part: part.name().to_string(), vertices });
    }
    Ok(())
}

fn shift_indices(group: PartGroup, part: &MeshPart, first_vertex: usize, out: &mut Vec<u16>) -> Result<(), PackError> {
    out.reserve(part.index_count());
    for &index in part.triangles() {
        let shifted = u16::try_from(first_vertex + usize::from(index)).map_err(|_| PackError::VertexLimitExceeded {
            group,
            part: part.name().to_string(),
            vertices: first_vertex + part.vertex_count(),
        })?;
        out.push(shifted);
    }
    Ok(())
}

fn as_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn pack_contiguous(layout: &mut PackedLayout, part: &MeshPart) -> Result<PartRecord, PackError> {
    let group = PartGroup::of(part);
    let vertex_count = part.vertex_count();
    let index_offset = layout.indices.len();

    let (vertex_slot, first_vertex) = match group {
        PartGroup::Deforming => {
            check_vertex_limit(group, part, vertex_count)?;
            let mut block = PackedVertexBuffer::new(part.layout());
            block.data.extend_from_slice(part.vertices());
            layout.dedicated_vertices.push(block);
            layout.indices.data.extend_from_slice(part.triangles());
            (VertexSlot::Dedicated(layout.dedicated_vertices.len() - 1), 0)
        }
        PartGroup::PlainStatic | PartGroup::SkinnedStatic => {
            let (block, slot) = if group == PartGroup::PlainStatic {
                (&mut layout.plain, VertexSlot::Plain)
            } else {
                (&mut layout.skinned, VertexSlot::Skinned)
            };
            let first_vertex = block.vertex_count();
            check_vertex_limit(group, part, first_vertex + vertex_count)?;
            shift_indices(group, part, first_vertex, &mut layout.indices.data)?;
            block.data.extend_from_slice(part.vertices());
            (slot, first_vertex)
        }
    };

    Ok(PartRecord {
        group,
        vertex_slot,
        index_slot: IndexSlot::Shared,
        first_vertex: as_u32(first_vertex),
        vertex_count: as_u32(vertex_count),
        index_offset: as_u32(index_offset),
        index_count: as_u32(part.index_count()),
    })
}

fn pack_per_part(layout: &mut PackedLayout, part: &MeshPart) -> Result<PartRecord, PackError> {
    let group = PartGroup::of(part);
    check_vertex_limit(group, part, part.vertex_count())?;

    let mut vertices = PackedVertexBuffer::new(part.layout());
    vertices.data.extend_from_slice(part.vertices());
    layout.dedicated_vertices.push(vertices);

    layout.dedicated_indices.push(PackedIndexBuffer { data: part.triangles().to_vec() });

    Ok(PartRecord {
        group,
        vertex_slot: VertexSlot::Dedicated(layout.dedicated_vertices.len() - 1),
        index_slot: IndexSlot::Dedicated(layout.dedicated_indices.len() - 1),
        first_vertex: 0,
        vertex_count: as_u32(part.vertex_count()),
        index_offset: 0,
        index_count: as_u32(part.index_count()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_quad(name: &str) -> MeshPart {
        let vertices = vec![
            0.0, 0.0, 0.0, 0.0,
            1.0, 0.0, 1.0, 0.0,
            1.0, 1.0, 1.0, 1.0,
            0.0, 1.0, 0.0, 1.0,
        ];
        MeshPart::plain(name, vertices, vec![0, 1, 2, 0, 2, 3]).with_texture(0)
    }

    fn skinned_triangle(name: &str, bone_count: usize) -> MeshPart {
        let mut vertices = Vec::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            vertices.extend_from_slice(&[x, y, x, y, 0.0, 1.0, 0.0, 0.0, 0.75, 0.25, 0.0, 0.0]);
        }
        MeshPart::skinned(name, vertices, vec![0, 1, 2], bone_count).with_texture(0)
    }

    fn plain_grid(name: &str, vertex_count: usize) -> MeshPart {
        MeshPart::plain(name, vec![0.0; vertex_count * 4], vec![0, 1, 2])
    }

    #[test]
    fn test_contiguous_layout() {
        let parts = vec![
            plain_quad("a"),
            skinned_triangle("b", 2),
            plain_quad("c"),
            plain_quad("d").deforming(),
        ];
        let layout = BufferPacker::default().pack(&parts).expect("Should pack");

        assert_eq!(layout.plain().vertex_count(), 8);
        assert_eq!(layout.skinned().vertex_count(), 3);
        assert_eq!(layout.dedicated_vertices().len(), 1);
        assert!(layout.dedicated_indices().is_empty());

        let c = layout.records()[2];
        assert_eq!(c.vertex_slot, VertexSlot::Plain);
        assert_eq!(c.first_vertex, 4);
        assert_eq!(c.index_offset, 9);
        assert_eq!(&layout.indices().data()[9..15], &[4, 5, 6, 4, 6, 7]);

        // Deforming indices stay relative to the part's own block
        let d = layout.records()[3];
        assert!(d.uses_own_vertex_buffer());
        assert_eq!(d.group, PartGroup::Deforming);
        assert_eq!(d.first_vertex, 0);
        assert_eq!(&layout.indices().data()[15..21], &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_index_count_conservation_and_bounds() {
        let parts = vec![
            plain_quad("a"),
            skinned_triangle("b", 2),
            skinned_triangle("c", 2).deforming(),
            plain_quad("d"),
            MeshPart::plain("empty", vec![0.0; 8], vec![]),
        ];
        let expected: usize = parts.iter().map(MeshPart::index_count).sum();

        for strategy in [PackingStrategy::PackedContiguousBuffers, PackingStrategy::PerPartBuffers] {
            let layout = BufferPacker::new(strategy).pack(&parts).expect("Should pack");
            let total: usize = layout.records().iter().map(|r| r.index_count as usize).sum();
            assert_eq!(total, expected);

            for record in layout.records() {
                let indices = layout.index_block(record.index_slot).expect("Should resolve index block");
                let vertices = layout.vertex_block(record.vertex_slot).expect("Should resolve vertex block");
                let start = record.index_offset as usize;
                let end = start + record.index_count as usize;
                assert!(end <= indices.len());

                let lo = record.first_vertex as usize;
                let hi = lo + record.vertex_count as usize;
                assert!(hi <= vertices.vertex_count());
                for &index in &indices.data()[start..end] {
                    assert!((lo..hi).contains(&usize::from(index)));
                }
            }
        }
    }

    #[test]
    fn test_vertex_limit() {
        let packer = BufferPacker::default();
        let exact = vec![plain_grid("a", 60_000), plain_grid("b", 5_536)];
        let layout = packer.pack(&exact).expect("Should pack exactly 65,536 vertices");
        assert_eq!(layout.plain().vertex_count(), MAX_VERTICES_PER_BUFFER);
        assert_eq!(*layout.indices().data().last().expect("Should have indices"), 60_002);

        let over = vec![plain_grid("a", 60_000), plain_grid("b", 5_537)];
        match packer.pack(&over) {
            Err(PackError::VertexLimitExceeded { group, part, vertices }) => {
                assert_eq!(group, PartGroup::PlainStatic);
                assert_eq!(part, "b");
                assert_eq!(vertices, 65_537);
            }
            other => panic!("Expected vertex limit error, got {:?}", other),
        }
    }

    #[test]
    fn test_groups_have_separate_limits() {
        let parts = vec![plain_grid("a", 40_000), plain_grid("b", 40_000).deforming()];
        assert!(BufferPacker::default().pack(&parts).is_ok());
    }

    #[test]
    fn test_per_part_layout() {
        let parts = vec![plain_quad("a"), plain_quad("b"), skinned_triangle("c", 2).deforming()];
        let layout = BufferPacker::new(PackingStrategy::PerPartBuffers).pack(&parts).expect("Should pack");

        assert!(layout.plain().is_empty());
        assert!(layout.indices().is_empty());
        assert_eq!(layout.dedicated_vertices().len(), 3);
        assert_eq!(layout.dedicated_indices().len(), 3);
        for (i, record) in layout.records().iter().enumerate() {
            assert_eq!(record.vertex_slot, VertexSlot::Dedicated(i));
            assert_eq!(record.index_slot, IndexSlot::Dedicated(i));
            assert_eq!(record.index_offset, 0);
        }
        assert_eq!(layout.dedicated_indices()[1].data(), &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_validation_errors() {
        let packer = BufferPacker::default();

        let misaligned = MeshPart::plain("m", vec![0.0; 6], vec![]);
        assert!(matches!(packer.pack(&[misaligned]), Err(PackError::MisalignedVertexData { stride: 4, .. })));

        let incomplete = MeshPart::plain("i", vec![0.0; 12], vec![0, 1]);
        assert!(matches!(packer.pack(&[incomplete]), Err(PackError::IncompleteTriangle { indices: 2, .. })));

        let out_of_range = MeshPart::plain("o", vec![0.0; 12], vec![0, 1, 3]);
        assert!(matches!(packer.pack(&[out_of_range]), Err(PackError::IndexOutOfRange { index: 3, .. })));

        let empty = MeshPart::plain("e", vec![], vec![]).deforming();
        assert_eq!(packer.pack(&[empty]), Err(PackError::EmptyDeformingPart("e".to_string())));

        let too_many_bones = skinned_triangle("t", 83);
        assert!(matches!(packer.pack(&[too_many_bones]), Err(PackError::BoneTableOverflow { bones: 83, max: 82, .. })));
        assert!(packer.with_max_bones(100).pack(&[skinned_triangle("t", 83)]).is_ok());

        // Vertices reference bone 1 with weight 0.25
        let bad_bone = skinned_triangle("b", 1);
        assert!(matches!(packer.pack(&[bad_bone]), Err(PackError::BoneIndexOutOfRange { vertex: 0, bone_count: 1, .. })));
    }

    #[test]
    fn test_zero_part_definition() {
        let layout = BufferPacker::default().pack(&[]).expect("Should pack nothing");
        assert!(layout.records().is_empty());
        assert!(layout.plain().is_empty());
        assert!(layout.skinned().is_empty());
        assert!(layout.indices().is_empty());
    }
}

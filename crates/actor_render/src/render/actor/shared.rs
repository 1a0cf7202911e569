//! Shared GPU resources of an actor definition
//!
//! Uploads a [`PackedLayout`] once and hands out buffer handles plus packing
//! records to every instance. Nothing in here changes after upload.

use super::mesh_part::VertexLayout;
use super::packer::{IndexSlot, PackedLayout, PackingStrategy, PartRecord, VertexSlot};
use crate::render::backend::{create_buffer_from, BufferDescriptor, BufferHandle, GraphicsBackend};
use crate::render::RenderResult;

/// A vertex buffer together with its attribute layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuVertexBuffer {
    /// Backend handle
    pub handle: BufferHandle,
    /// Attribute layout
    pub layout: VertexLayout,
}

/// GPU buffers shared by all instances of one actor definition
#[derive(Debug)]
pub struct SharedResourceSet {
    label: String,
    strategy: PackingStrategy,
    plain: Option<GpuVertexBuffer>,
    skinned: Option<GpuVertexBuffer>,
    indices: Option<BufferHandle>,
    dedicated_vertices: Vec<GpuVertexBuffer>,
    dedicated_indices: Vec<Option<BufferHandle>>,
    records: Vec<PartRecord>,
}

impl SharedResourceSet {
    /// Upload every non-empty block of `layout`
    ///
    /// On failure, buffers created so far are destroyed before the error is
    /// returned.
    pub fn upload<B: GraphicsBackend + ?Sized>(layout: &PackedLayout, label: &str, backend: &mut B) -> RenderResult<Self> {
        let mut set = Self {
            label: label.to_string(),
            strategy: layout.strategy(),
            plain: None,
            skinned: None,
            indices: None,
            dedicated_vertices: Vec::with_capacity(layout.dedicated_vertices().len()),
            dedicated_indices: Vec::with_capacity(layout.dedicated_indices().len()),
            records: layout.records().to_vec(),
        };

        if let Err(e) = set.upload_blocks(layout, backend) {
            log::debug!("Upload of '{}' failed, releasing {} buffers", label, set.buffer_count());
            set.release(backend);
            return Err(e);
        }

        log::debug!("Uploaded '{}': {} shared buffers", label, set.buffer_count());
        Ok(set)
    }

    fn upload_blocks<B: GraphicsBackend + ?Sized>(&mut self, layout: &PackedLayout, backend: &mut B) -> RenderResult<()> {
        if !layout.plain().is_empty() {
            let desc = BufferDescriptor::vertex(format!("{}/plain", self.label));
            let handle = create_buffer_from(backend, &desc, layout.plain().data())?;
            self.plain = Some(GpuVertexBuffer { handle, layout: VertexLayout::Plain });
        }

        if !layout.skinned().is_empty() {
            let desc = BufferDescriptor::vertex(format!("{}/skinned", self.label));
            let handle = create_buffer_from(backend, &desc, layout.skinned().data())?;
            self.skinned = Some(GpuVertexBuffer { handle, layout: VertexLayout::Skinned });
        }

        if !layout.indices().is_empty() {
            let desc = BufferDescriptor::index(format!("{}/indices", self.label));
            self.indices = Some(create_buffer_from(backend, &desc, layout.indices().data())?);
        }

        for (i, block) in layout.dedicated_vertices().iter().enumerate() {
            let desc = BufferDescriptor::vertex(format!("{}/vertices{}", self.label, i));
            let handle = create_buffer_from(backend, &desc, block.data())?;
            self.dedicated_vertices.push(GpuVertexBuffer { handle, layout: block.layout() });
        }

        for (i, block) in layout.dedicated_indices().iter().enumerate() {
            let handle = if block.is_empty() {
                None
            } else {
                let desc = BufferDescriptor::index(format!("{}/indices{}", self.label, i));
                Some(create_buffer_from(backend, &desc, block.data())?)
            };
            self.dedicated_indices.push(handle);
        }
        Ok(())
    }

    /// Strategy the set was packed with
    pub fn strategy(&self) -> PackingStrategy {
        self.strategy
    }

    /// Packing record of a part
    pub fn record(&self, part: usize) -> Option<&PartRecord> {
        self.records.get(part)
    }

    /// Vertex buffer a part draws from (its base buffer if it deforms)
    pub fn vertex_buffer(&self, part: usize) -> Option<GpuVertexBuffer> {
        match self.records.get(part)?.vertex_slot {
            VertexSlot::Plain => self.plain,
            VertexSlot::Skinned => self.skinned,
            VertexSlot::Dedicated(i) => self.dedicated_vertices.get(i).copied(),
        }
    }

    /// Index buffer a part draws from, `None` for parts without triangles
    pub fn index_buffer(&self, part: usize) -> Option<BufferHandle> {
        match self.records.get(part)?.index_slot {
            IndexSlot::Shared => self.indices,
            IndexSlot::Dedicated(i) => self.dedicated_indices.get(i).copied().flatten(),
        }
    }

    /// Every buffer owned by the set
    pub fn buffer_handles(&self) -> Vec<BufferHandle> {
        self.plain
            .iter()
            .chain(self.skinned.iter())
            .map(|b| b.handle)
            .chain(self.indices)
            .chain(self.dedicated_vertices.iter().map(|b| b.handle))
            .chain(self.dedicated_indices.iter().flatten().copied())
            .collect()
    }

    /// Number of buffers owned by the set
    pub fn buffer_count(&self) -> usize {
        self.buffer_handles().len()
    }

    /// Destroy every buffer owned by the set
    pub fn release<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        for handle in self.buffer_handles() {
            backend.destroy_buffer(handle);
        }
        self.plain = None;
        self.skinned = None;
        self.indices = None;
        self.dedicated_vertices.clear();
        self.dedicated_indices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::actor::mesh_part::MeshPart;
    use crate::render::actor::packer::BufferPacker;
    use crate::render::backends::RecordingBackend;
    use crate::render::RenderError;

    fn parts() -> Vec<MeshPart> {
        let quad = vec![0.0; 16];
        vec![
            MeshPart::plain("a", quad.clone(), vec![0, 1, 2, 0, 2, 3]),
            MeshPart::plain("b", quad.clone(), vec![0, 1, 2]),
            MeshPart::plain("c", quad, vec![1, 2, 3]).deforming(),
        ]
    }

    #[test]
    fn test_upload_packed() {
        let mut backend = RecordingBackend::new();
        let layout = BufferPacker::default().pack(&parts()).expect("Should pack");
        let set = SharedResourceSet::upload(&layout, "hero", &mut backend).expect("Should upload");

        // plain block, index list, one deforming base block; no skinned block
        assert_eq!(set.buffer_count(), 3);
        assert_eq!(backend.buffer_count(), 3);

        let a = set.vertex_buffer(0).expect("Should have vertex buffer");
        assert_eq!(set.vertex_buffer(1), Some(a));
        assert_ne!(set.vertex_buffer(2).map(|b| b.handle), Some(a.handle));

        let indices = set.index_buffer(0).expect("Should have index buffer");
        assert_eq!(backend.index_data(indices), Some(vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 1, 2, 3]));
        assert_eq!(backend.vertex_data(a.handle).map(|v| v.len()), Some(32));
    }

    #[test]
    fn test_upload_failure_releases_partial_set() {
        let mut backend = RecordingBackend::new().with_buffer_limit(2);
        let layout = BufferPacker::default().pack(&parts()).expect("Should pack");

        let result = SharedResourceSet::upload(&layout, "hero", &mut backend);
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
        assert_eq!(backend.buffer_count(), 0);
    }

    #[test]
    fn test_release() {
        let mut backend = RecordingBackend::new();
        let layout = BufferPacker::new(PackingStrategy::PerPartBuffers).pack(&parts()).expect("Should pack");
        let mut set = SharedResourceSet::upload(&layout, "hero", &mut backend).expect("Should upload");
        assert_eq!(backend.buffer_count(), 6);

        set.release(&mut backend);
        assert_eq!(set.buffer_count(), 0);
        assert_eq!(backend.buffer_count(), 0);
    }
}

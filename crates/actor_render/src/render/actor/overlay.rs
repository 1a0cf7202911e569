//! Per-instance vertex overlays
//!
//! A deforming part cannot draw its positions from the shared base buffer, so
//! every instance owns a small position buffer for it. The animation engine
//! writes deformed positions into the CPU copy and marks it dirty; the renderer
//! uploads dirty overlays once per frame before drawing.

use super::mesh_part::{MeshPart, DEFORM_COMPONENTS};
use crate::render::backend::{create_buffer_from, write_buffer_from, BufferDescriptor, BufferHandle, GraphicsBackend};
use crate::render::{RenderError, RenderResult};

/// Private position buffer of one deforming part in one instance
#[derive(Debug)]
pub struct InstanceOverlay {
    part_index: usize,
    buffer: BufferHandle,
    deformed: Vec<f32>,
    dirty: bool,
    uploads: u64,
}

impl InstanceOverlay {
    /// Allocate an overlay seeded with the part's base-pose positions
    pub fn allocate<B: GraphicsBackend + ?Sized>(
        part_index: usize,
        part: &MeshPart,
        label: &str,
        backend: &mut B,
    ) -> RenderResult<Self> {
        let deformed = part.base_positions();
        let desc = BufferDescriptor::dynamic_vertex(format!("{}/{}/deform", label, part.name()));
        let buffer = create_buffer_from(backend, &desc, &deformed)?;

        log::debug!("Allocated overlay for part '{}' ({} vertices)", part.name(), part.vertex_count());
        Ok(Self { part_index, buffer, deformed, dirty: false, uploads: 0 })
    }

    /// Index of the part this overlay belongs to
    pub fn part_index(&self) -> usize {
        self.part_index
    }

    /// GPU buffer holding the current positions
    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    /// Number of vertices covered
    pub fn vertex_count(&self) -> usize {
        self.deformed.len() / DEFORM_COMPONENTS
    }

    /// CPU positions differ from the GPU copy
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the CPU copy for upload after an in-place edit
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Current `[x, y]` positions
    pub fn deformation(&self) -> &[f32] {
        &self.deformed
    }

    /// Mutable positions for in-place writes; call [`mark_dirty`](Self::mark_dirty) afterwards
    pub fn deformation_mut(&mut self) -> &mut [f32] {
        &mut self.deformed
    }

    /// Replace all positions and mark the overlay dirty
    pub fn write_deformation(&mut self, positions: &[f32]) -> RenderResult<()> {
        if positions.len() != self.deformed.len() {
            return Err(RenderError::DeformationSizeMismatch { expected: self.deformed.len(), actual: positions.len() });
        }
        self.deformed.copy_from_slice(positions);
        self.dirty = true;
        Ok(())
    }

    /// Upload the positions if dirty and clear the flag
    ///
    /// Returns whether an upload happened. On failure the overlay stays dirty.
    pub fn refresh<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) -> RenderResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        write_buffer_from(backend, self.buffer, &self.deformed)?;
        self.dirty = false;
        self.uploads += 1;
        Ok(true)
    }

    /// Number of uploads performed
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    /// Destroy the GPU buffer
    pub fn release<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::RecordingBackend;

    fn cape() -> MeshPart {
        let vertices = vec![
            0.0, 0.0, 0.0, 0.0,
            2.0, 0.0, 1.0, 0.0,
            0.0, 2.0, 0.0, 1.0,
        ];
        MeshPart::plain("cape", vertices, vec![0, 1, 2]).deforming()
    }

    #[test]
    fn test_seeded_with_base_pose() {
        let mut backend = RecordingBackend::new();
        let overlay = InstanceOverlay::allocate(3, &cape(), "hero", &mut backend).expect("Should allocate");

        assert_eq!(overlay.part_index(), 3);
        assert_eq!(overlay.vertex_count(), 3);
        assert!(!overlay.is_dirty());
        assert_eq!(backend.vertex_data(overlay.buffer()), Some(vec![0.0, 0.0, 2.0, 0.0, 0.0, 2.0]));
        assert!(backend.buffer_descriptor(overlay.buffer()).is_some_and(|d| d.dynamic));
    }

    #[test]
    fn test_refresh_iff_dirty() {
        let mut backend = RecordingBackend::new();
        let mut overlay = InstanceOverlay::allocate(0, &cape(), "hero", &mut backend).expect("Should allocate");

        assert!(!overlay.refresh(&mut backend).expect("Should refresh"));
        assert_eq!(backend.write_count(overlay.buffer()), 0);

        overlay.write_deformation(&[1.0, 1.0, 3.0, 1.0, 1.0, 3.0]).expect("Should write");
        assert!(overlay.is_dirty());
        assert!(overlay.refresh(&mut backend).expect("Should refresh"));
        assert!(!overlay.is_dirty());
        assert!(!overlay.refresh(&mut backend).expect("Should refresh"));
        assert_eq!(backend.write_count(overlay.buffer()), 1);
        assert_eq!(backend.vertex_data(overlay.buffer()), Some(vec![1.0, 1.0, 3.0, 1.0, 1.0, 3.0]));

        overlay.deformation_mut()[0] = 5.0;
        overlay.mark_dirty();
        assert!(overlay.refresh(&mut backend).expect("Should refresh"));
        assert_eq!(overlay.upload_count(), 2);
    }

    #[test]
    fn test_size_mismatch() {
        let mut backend = RecordingBackend::new();
        let mut overlay = InstanceOverlay::allocate(0, &cape(), "hero", &mut backend).expect("Should allocate");

        let result = overlay.write_deformation(&[1.0, 2.0]);
        assert!(matches!(result, Err(RenderError::DeformationSizeMismatch { expected: 6, actual: 2 })));
        assert!(!overlay.is_dirty());
    }

    #[test]
    fn test_failed_refresh_stays_dirty() {
        let mut backend = RecordingBackend::new();
        let mut overlay = InstanceOverlay::allocate(0, &cape(), "hero", &mut backend).expect("Should allocate");
        overlay.mark_dirty();

        backend.destroy_buffer(overlay.buffer());
        assert!(overlay.refresh(&mut backend).is_err());
        assert!(overlay.is_dirty());
    }
}

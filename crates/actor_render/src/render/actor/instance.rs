//! Actor instances
//!
//! An instance is one independently animated copy of an actor. It shares the
//! definition's buffers and owns only what differs per copy: part poses, bone
//! tables and overlays for deforming parts.

use std::sync::Arc;

use super::definition::ActorDefinition;
use super::mesh_part::MeshPart;
use super::overlay::InstanceOverlay;
use super::scheduler::DrawScheduler;
use crate::foundation::math::{pack_affine_table, Transform2D};
use crate::render::backend::{GraphicsBackend, VertexBinding};
use crate::render::{RenderError, RenderResult};

/// Per-frame state of one part, written by the animation engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartPose {
    /// Part-to-world transform
    pub world_transform: Transform2D,
    /// Opacity; parts at or below zero are not drawn
    pub opacity: f32,
    /// Current draw-order key
    pub draw_order: i32,
}

impl PartPose {
    /// Rest pose of a part: identity transform, fully opaque, authored order
    pub fn from_part(part: &MeshPart) -> Self {
        Self { world_transform: Transform2D::identity(), opacity: 1.0, draw_order: part.draw_order() }
    }
}

/// One animated copy of an actor
#[derive(Debug)]
pub struct ActorInstance {
    definition: Arc<ActorDefinition>,
    poses: Vec<PartPose>,
    bone_matrices: Vec<Vec<f32>>,
    overlays: Vec<Option<InstanceOverlay>>,
    scheduler: DrawScheduler,
}

impl ActorInstance {
    /// Create an instance, allocating overlays for deforming parts
    ///
    /// If an allocation fails, overlays created so far are released and the
    /// error is returned.
    pub fn new<B: GraphicsBackend + ?Sized>(definition: Arc<ActorDefinition>, backend: &mut B) -> RenderResult<Self> {
        let parts = definition.parts();
        let mut overlays: Vec<Option<InstanceOverlay>> = Vec::with_capacity(parts.len());

        for (index, part) in parts.iter().enumerate() {
            if !part.is_deforming() {
                overlays.push(None);
                continue;
            }
            match InstanceOverlay::allocate(index, part, definition.name(), backend) {
                Ok(overlay) => overlays.push(Some(overlay)),
                Err(e) => {
                    for overlay in overlays.into_iter().flatten() {
                        overlay.release(backend);
                    }
                    return Err(e);
                }
            }
        }

        let poses = parts.iter().map(PartPose::from_part).collect();
        let bone_matrices = parts
            .iter()
            .map(|part| {
                let mut table = Vec::new();
                if part.is_skinned() {
                    pack_affine_table(&vec![Transform2D::identity(); part.bone_count()], &mut table);
                }
                table
            })
            .collect();

        let mut instance = Self { definition, poses, bone_matrices, overlays, scheduler: DrawScheduler::new() };
        instance.sort_draw_order();
        Ok(instance)
    }

    /// Definition this instance draws
    pub fn definition(&self) -> &Arc<ActorDefinition> {
        &self.definition
    }

    /// All part poses, in part order
    pub fn poses(&self) -> &[PartPose] {
        &self.poses
    }

    /// Pose of one part
    pub fn pose(&self, part: usize) -> Option<&PartPose> {
        self.poses.get(part)
    }

    /// Mutable pose of one part
    pub fn pose_mut(&mut self, part: usize) -> Option<&mut PartPose> {
        self.poses.get_mut(part)
    }

    /// Replace the bone table of a skinned part
    pub fn set_bone_matrices(&mut self, part: usize, bones: &[Transform2D]) -> RenderResult<()> {
        let mesh = self.mesh(part)?;
        if !mesh.is_skinned() {
            return Err(RenderError::InvalidPart(format!("part '{}' is not skinned", mesh.name())));
        }
        if bones.len() != mesh.bone_count() {
            return Err(RenderError::InvalidPart(format!(
                "part '{}' has {} bones, got {} matrices",
                mesh.name(),
                mesh.bone_count(),
                bones.len()
            )));
        }
        pack_affine_table(bones, &mut self.bone_matrices[part]);
        Ok(())
    }

    /// Flat bone table of a part, empty for unskinned parts
    pub fn bone_matrices(&self, part: usize) -> &[f32] {
        self.bone_matrices.get(part).map(Vec::as_slice).unwrap_or_default()
    }

    /// Overlay of a deforming part
    pub fn overlay(&self, part: usize) -> Option<&InstanceOverlay> {
        self.overlays.get(part)?.as_ref()
    }

    /// Mutable overlay of a deforming part
    pub fn overlay_mut(&mut self, part: usize) -> Option<&mut InstanceOverlay> {
        self.overlays.get_mut(part)?.as_mut()
    }

    /// Number of overlays this instance owns
    pub fn overlay_count(&self) -> usize {
        self.overlays.iter().flatten().count()
    }

    /// Write deformed `[x, y]` positions for a deforming part
    pub fn write_deformation(&mut self, part: usize, positions: &[f32]) -> RenderResult<()> {
        let name = self.mesh(part)?.name().to_string();
        self.overlay_mut(part)
            .ok_or_else(|| RenderError::InvalidPart(format!("part '{}' does not deform", name)))?
            .write_deformation(positions)
    }

    /// Upload every dirty overlay, returning how many were uploaded
    pub fn refresh_overlays<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) -> RenderResult<usize> {
        let mut uploads = 0;
        for overlay in self.overlays.iter_mut().flatten() {
            if overlay.refresh(backend)? {
                uploads += 1;
            }
        }
        Ok(uploads)
    }

    /// Re-sort parts by their current draw-order keys
    pub fn sort_draw_order(&mut self) {
        let poses = &self.poses;
        self.scheduler.sort_by_key(poses.len(), |part| poses[part].draw_order);
    }

    /// Part indices in draw order, as of the last sort
    pub fn draw_order(&self) -> &[usize] {
        self.scheduler.order()
    }

    /// Draw-order scheduler of this instance
    pub fn scheduler(&self) -> &DrawScheduler {
        &self.scheduler
    }

    /// Vertex sources a part draws from
    ///
    /// Deforming parts take positions from their overlay and every other
    /// attribute from the shared base buffer.
    pub fn vertex_binding(&self, part: usize) -> Option<VertexBinding> {
        let shared = self.definition.resources().vertex_buffer(part)?;
        Some(match self.overlay(part) {
            Some(overlay) => VertexBinding::Deformed { positions: overlay.buffer(), base: shared.handle, layout: shared.layout },
            None => VertexBinding::Static { buffer: shared.handle, layout: shared.layout },
        })
    }

    /// Release the overlays this instance allocated
    ///
    /// Shared buffers stay with the definition.
    pub fn release<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        let count = self.overlay_count();
        for overlay in self.overlays.into_iter().flatten() {
            overlay.release(backend);
        }
        log::debug!("Released instance of '{}' ({} overlays)", self.definition.name(), count);
    }

    fn mesh(&self, part: usize) -> RenderResult<&MeshPart> {
        self.definition
            .part(part)
            .ok_or_else(|| RenderError::InvalidPart(format!("part {} of '{}'", part, self.definition.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::TextureHandle;
    use crate::render::backends::RecordingBackend;
    use crate::render::actor::PackingStrategy;
    use crate::render::config::RenderConfig;

    fn definition(backend: &mut RecordingBackend) -> Arc<ActorDefinition> {
        definition_packed_as(PackingStrategy::PackedContiguousBuffers, backend)
    }

    fn definition_packed_as(strategy: PackingStrategy, backend: &mut RecordingBackend) -> Arc<ActorDefinition> {
        let config = RenderConfig::new().with_packing_strategy(strategy);
        let parts = vec![
            MeshPart::plain("body", vec![0.0; 12], vec![0, 1, 2]).with_texture(0).with_draw_order(2),
            MeshPart::plain("cape", vec![1.0; 12], vec![0, 1, 2]).with_texture(0).deforming(),
            MeshPart::plain("head", vec![0.0; 12], vec![0, 1, 2]).with_texture(0).with_draw_order(1),
        ];
        ActorDefinition::with_textures("hero", parts, vec![TextureHandle(1)], &config, backend)
            .expect("Should build definition")
    }

    #[test]
    fn test_shared_buffers_and_private_overlays() {
        for strategy in [PackingStrategy::PackedContiguousBuffers, PackingStrategy::PerPartBuffers] {
            assert_instances_share_static_data(strategy);
        }
    }

    fn assert_instances_share_static_data(strategy: PackingStrategy) {
        let mut backend = RecordingBackend::new();
        let definition = definition_packed_as(strategy, &mut backend);
        let shared_buffers = backend.buffer_count();

        let mut first = ActorInstance::new(Arc::clone(&definition), &mut backend).expect("Should create instance");
        let second = ActorInstance::new(Arc::clone(&definition), &mut backend).expect("Should create instance");
        assert_eq!(backend.buffer_count(), shared_buffers + 2);

        // Static parts bind the very same buffer
        assert_eq!(first.vertex_binding(0), second.vertex_binding(0));
        assert_eq!(first.vertex_binding(0), Some(VertexBinding::Static {
            buffer: definition.resources().vertex_buffer(0).expect("Should have buffer").handle,
            layout: crate::render::VertexLayout::Plain,
        }));
        assert!(first.overlay(0).is_none());

        let a = first.overlay(1).expect("Should have overlay").buffer();
        let b = second.overlay(1).expect("Should have overlay").buffer();
        assert_ne!(a, b);

        // Deforming parts still share their base buffer
        let base = |instance: &ActorInstance| match instance.vertex_binding(1) {
            Some(VertexBinding::Deformed { base, .. }) => Some(base),
            _ => None,
        };
        assert!(base(&first).is_some());
        assert_eq!(base(&first), base(&second));

        first.write_deformation(1, &[2.0; 6]).expect("Should write");
        assert!(first.overlay(1).is_some_and(InstanceOverlay::is_dirty));
        assert!(second.overlay(1).is_some_and(|o| !o.is_dirty()));

        assert_eq!(first.refresh_overlays(&mut backend).expect("Should refresh"), 1);
        assert_eq!(first.refresh_overlays(&mut backend).expect("Should refresh"), 0);
        assert_eq!(backend.vertex_data(a), Some(vec![2.0; 6]));
        assert_eq!(backend.vertex_data(b), Some(vec![1.0; 6]));

        first.release(&mut backend);
        second.release(&mut backend);
        assert_eq!(backend.buffer_count(), shared_buffers);
    }

    #[test]
    fn test_draw_order_follows_poses() {
        let mut backend = RecordingBackend::new();
        let mut instance = ActorInstance::new(definition(&mut backend), &mut backend).expect("Should create instance");
        assert_eq!(instance.draw_order(), &[1, 2, 0]);

        instance.pose_mut(1).expect("Should have pose").draw_order = 5;
        assert_eq!(instance.draw_order(), &[1, 2, 0]);
        instance.sort_draw_order();
        assert_eq!(instance.draw_order(), &[2, 0, 1]);
    }

    #[test]
    fn test_invalid_part_access() {
        let mut backend = RecordingBackend::new();
        let mut instance = ActorInstance::new(definition(&mut backend), &mut backend).expect("Should create instance");

        assert!(matches!(instance.write_deformation(0, &[0.0; 6]), Err(RenderError::InvalidPart(_))));
        assert!(matches!(instance.write_deformation(9, &[0.0; 6]), Err(RenderError::InvalidPart(_))));
        assert!(matches!(
            instance.set_bone_matrices(0, &[Transform2D::identity()]),
            Err(RenderError::InvalidPart(_))
        ));
        assert!(instance.bone_matrices(0).is_empty());
    }

    #[test]
    fn test_allocation_failure_rolls_back() {
        let mut backend = RecordingBackend::new();
        let parts = vec![
            MeshPart::plain("a", vec![0.0; 12], vec![0, 1, 2]).deforming(),
            MeshPart::plain("b", vec![0.0; 12], vec![0, 1, 2]).deforming(),
        ];
        let definition = ActorDefinition::with_textures("hero", parts, Vec::new(), &RenderConfig::default(), &mut backend)
            .expect("Should build definition");
        let shared_buffers = backend.buffer_count();

        let mut limited = RecordingBackend::new().with_buffer_limit(1);
        let result = ActorInstance::new(Arc::clone(&definition), &mut limited);
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
        assert_eq!(limited.buffer_count(), 0);
        assert_eq!(backend.buffer_count(), shared_buffers);
    }
}

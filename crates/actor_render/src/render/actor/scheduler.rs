//! # Draw Scheduler
//!
//! Orders an instance's parts for drawing and turns them into draw calls.
//!
//! ## Per-frame flow
//!
//! 1. [`DrawScheduler::sort`] orders parts by their current draw-order key.
//!    The sort is stable, so equal keys keep authoring order.
//! 2. [`DrawScheduler::plan`] drops parts that cannot produce pixels and groups
//!    consecutive parts sharing a blend mode into [`BlendRun`]s.
//! 3. [`dispatch`] issues one blend request per run and one draw per part,
//!    picking the call shape from the part's skinned/deforming capabilities.

use super::definition::ActorDefinition;
use super::instance::{ActorInstance, PartPose};
use super::mesh_part::MeshPart;
use crate::foundation::math::Transform2D;
use crate::render::backend::{GraphicsBackend, IndexRange, TexturedDraw};
use crate::render::blend::{BlendMode, BlendStateMachine};
use crate::render::renderer::FrameStats;

/// Why a part produced no draw call this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Opacity at or below zero
    Invisible,
    /// Texture index is `-1` or not in the texture table
    NoTexture,
    /// Part has no triangles
    NoIndices,
}

/// Consecutive parts drawn with the same blend mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlendRun {
    /// Blend mode of every part in the run
    pub mode: BlendMode,
    /// Part indices in draw order
    pub parts: Vec<usize>,
}

/// Draw work of one instance for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawPlan {
    /// Runs in draw order
    pub runs: Vec<BlendRun>,
    /// Parts left out, in draw order
    pub skipped: Vec<(usize, SkipReason)>,
}

impl DrawPlan {
    /// Number of parts that will be drawn
    pub fn part_count(&self) -> usize {
        self.runs.iter().map(|run| run.parts.len()).sum()
    }
}

/// Call shape of a part, from its capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawShape {
    /// Shared vertices, no bones
    Textured,
    /// Shared vertices with a bone table
    TexturedSkin,
    /// Overlay positions, no bones
    TexturedDeformed,
    /// Overlay positions with a bone table
    TexturedDeformedSkin,
}

impl DrawShape {
    /// Shape used to draw `part`
    pub fn of(part: &MeshPart) -> Self {
        match (part.is_deforming(), part.is_skinned()) {
            (false, false) => Self::Textured,
            (false, true) => Self::TexturedSkin,
            (true, false) => Self::TexturedDeformed,
            (true, true) => Self::TexturedDeformedSkin,
        }
    }
}

/// Draw-order view of one instance's parts
#[derive(Debug, Clone, Default)]
pub struct DrawScheduler {
    order: Vec<usize>,
}

impl DrawScheduler {
    /// Create a scheduler with an empty order
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable ascending sort of part indices by `keys[part]`
    pub fn sort(&mut self, keys: &[i32]) {
        self.sort_by_key(keys.len(), |part| keys[part]);
    }

    /// Stable ascending sort of `0..count` by `key`
    pub fn sort_by_key<F: FnMut(usize) -> i32>(&mut self, count: usize, mut key: F) {
        self.order.clear();
        self.order.extend(0..count);
        self.order.sort_by_key(|&part| key(part));
    }

    /// Part indices in draw order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Select drawable parts and group them by blend mode
    pub fn plan(&self, definition: &ActorDefinition, poses: &[PartPose]) -> DrawPlan {
        let mut plan = DrawPlan::default();

        for &index in &self.order {
            let (Some(part), Some(pose)) = (definition.part(index), poses.get(index)) else {
                continue;
            };

            if let Some(reason) = skip_reason(definition, part, pose) {
                log::trace!("Skipping part '{}': {:?}", part.name(), reason);
                plan.skipped.push((index, reason));
                continue;
            }

            let mode = part.blend().resolve();
            match plan.runs.last_mut() {
                Some(run) if run.mode == mode => run.parts.push(index),
                _ => plan.runs.push(BlendRun { mode, parts: vec![index] }),
            }
        }
        plan
    }
}

fn skip_reason(definition: &ActorDefinition, part: &MeshPart, pose: &PartPose) -> Option<SkipReason> {
    if pose.opacity.is_nan() || pose.opacity <= 0.0 {
        Some(SkipReason::Invisible)
    } else if definition.texture(part.texture_index()).is_none() {
        Some(SkipReason::NoTexture)
    } else if part.index_count() == 0 {
        Some(SkipReason::NoIndices)
    } else {
        None
    }
}

/// Issue the blend requests and draw calls of a plan
///
/// A draw rejected by the backend is logged and counted; the remaining parts
/// are still drawn.
pub fn dispatch<B: GraphicsBackend + ?Sized>(
    plan: &DrawPlan,
    instance: &ActorInstance,
    view: &Transform2D,
    tint: [f32; 4],
    blend: &mut BlendStateMachine,
    backend: &mut B,
    stats: &mut FrameStats,
) {
    stats.parts_skipped += plan.skipped.len();

    for run in &plan.runs {
        if blend.set_blend_mode(run.mode, backend) {
            stats.blend_changes += 1;
        }
        for &index in &run.parts {
            match build_draw(instance, index, view, tint) {
                Some((draw, shape)) => {
                    let result = match shape {
                        DrawShape::Textured | DrawShape::TexturedDeformed => backend.draw_textured(&draw),
                        DrawShape::TexturedSkin | DrawShape::TexturedDeformedSkin => {
                            backend.draw_textured_skin(&draw, instance.bone_matrices(index))
                        }
                    };
                    match result {
                        Ok(()) => stats.parts_drawn += 1,
                        Err(e) => {
                            log::warn!("Draw of part {} ({:?}) failed: {}", index, shape, e);
                            stats.draw_calls_failed += 1;
                        }
                    }
                }
                None => {
                    log::trace!("Part {} has no bound buffers", index);
                    stats.parts_skipped += 1;
                }
            }
        }
    }
}

fn build_draw(instance: &ActorInstance, index: usize, view: &Transform2D, tint: [f32; 4]) -> Option<(TexturedDraw, DrawShape)> {
    let definition = instance.definition();
    let part = definition.part(index)?;
    let pose = instance.pose(index)?;
    let record = definition.resources().record(index)?;

    let draw = TexturedDraw {
        view: *view,
        world: pose.world_transform,
        vertices: instance.vertex_binding(index)?,
        index_buffer: definition.resources().index_buffer(index)?,
        indices: IndexRange { first: record.index_offset, count: record.index_count },
        opacity: pose.opacity,
        tint,
        texture: definition.texture(part.texture_index())?,
    };
    Some((draw, DrawShape::of(part)))
}

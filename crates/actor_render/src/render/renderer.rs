//! # Actor Renderer
//!
//! Frame driver for one graphics context. Owns the backend and the context's
//! blend state, loads actor definitions, creates instances and draws them.
//!
//! ## Frame Flow
//!
//! ```text
//! begin_frame()          emit the configured initial blend mode
//! draw_instance(..)      re-sort parts, upload dirty overlays, plan, dispatch
//! ...
//! end_frame()            return the frame's statistics
//! ```

use std::path::Path;
use std::sync::Arc;

use super::actor::scheduler::dispatch;
use super::actor::{ActorData, ActorDefinition, ActorInstance, ReleaseError};
use super::backend::{GraphicsBackend, TextureLoader};
use super::blend::BlendStateMachine;
use super::config::RenderConfig;
use super::{RenderError, RenderResult};
use crate::foundation::math::Transform2D;

/// Counters for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Instances passed to `draw_instance`
    pub instances_drawn: usize,
    /// Draw calls accepted by the backend
    pub parts_drawn: usize,
    /// Parts left out (invisible, untextured or without triangles)
    pub parts_skipped: usize,
    /// Blend state changes sent to the backend
    pub blend_changes: usize,
    /// Overlay buffers uploaded
    pub overlay_uploads: usize,
    /// Draw calls rejected by the backend
    pub draw_calls_failed: usize,
}

/// Draws actor instances through a graphics backend
pub struct ActorRenderer<B: GraphicsBackend> {
    backend: B,
    config: RenderConfig,
    blend: BlendStateMachine,
    view: Transform2D,
    frame_count: u64,
    frame_stats: FrameStats,
    frame_open: bool,
}

impl<B: GraphicsBackend> ActorRenderer<B> {
    /// Create a renderer over `backend`
    pub fn new(backend: B, config: RenderConfig) -> Self {
        log::info!(
            "Initializing actor renderer ({:?}, {} bones per draw)",
            config.packing_strategy,
            config.max_bones_per_draw
        );
        Self {
            backend,
            config,
            blend: BlendStateMachine::new(),
            view: Transform2D::identity(),
            frame_count: 0,
            frame_stats: FrameStats::default(),
            frame_open: false,
        }
    }

    /// Graphics backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable graphics backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Active configuration
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Blend state of this context
    pub fn blend_state(&self) -> &BlendStateMachine {
        &self.blend
    }

    /// Load an actor definition and its textures
    pub fn load_actor(
        &mut self,
        actor_path: impl AsRef<Path>,
        data: ActorData,
        textures: &mut dyn TextureLoader,
    ) -> RenderResult<Arc<ActorDefinition>> {
        ActorDefinition::load(actor_path, data, &self.config, textures, &mut self.backend)
    }

    /// Release an actor definition's shared buffers
    ///
    /// A refused release hands the definition back in the error.
    pub fn release_actor(&mut self, definition: Arc<ActorDefinition>) -> Result<(), ReleaseError> {
        definition.release(&mut self.backend)
    }

    /// Create an instance of a loaded actor
    pub fn create_instance(&mut self, definition: &Arc<ActorDefinition>) -> RenderResult<ActorInstance> {
        ActorInstance::new(Arc::clone(definition), &mut self.backend)
    }

    /// Release an instance's overlays
    pub fn release_instance(&mut self, instance: ActorInstance) {
        instance.release(&mut self.backend);
    }

    /// Set the view transform used by subsequent draws
    pub fn set_view(&mut self, view: Transform2D) {
        self.view = view;
    }

    /// Current view transform
    pub fn view(&self) -> &Transform2D {
        &self.view
    }

    /// Start a frame
    pub fn begin_frame(&mut self) {
        self.frame_count += 1;
        self.frame_stats = FrameStats::default();
        self.blend.begin_frame(self.config.initial_blend_mode, &mut self.backend);
        self.frame_stats.blend_changes += 1;
        self.frame_open = true;
        log::trace!("Begin frame {}", self.frame_count);
    }

    /// Draw one instance
    ///
    /// Must be called between [`begin_frame`](Self::begin_frame) and
    /// [`end_frame`](Self::end_frame). Overlay upload failures abort the draw
    /// and are returned. Individual draw call failures are counted in
    /// [`FrameStats::draw_calls_failed`].
    pub fn draw_instance(&mut self, instance: &mut ActorInstance) -> RenderResult<()> {
        if !self.frame_open {
            return Err(RenderError::FrameNotStarted);
        }
        instance.sort_draw_order();
        self.frame_stats.overlay_uploads += instance.refresh_overlays(&mut self.backend)?;

        let plan = instance.scheduler().plan(instance.definition(), instance.poses());
        dispatch(
            &plan,
            instance,
            &self.view,
            self.config.tint,
            &mut self.blend,
            &mut self.backend,
            &mut self.frame_stats,
        );
        self.frame_stats.instances_drawn += 1;
        Ok(())
    }

    /// Finish the frame and return its statistics
    pub fn end_frame(&mut self) -> FrameStats {
        self.frame_open = false;
        let stats = self.frame_stats;
        log::trace!(
            "End frame {}: {} drawn, {} skipped, {} blend changes, {} overlay uploads",
            self.frame_count,
            stats.parts_drawn,
            stats.parts_skipped,
            stats.blend_changes,
            stats.overlay_uploads
        );
        stats
    }

    /// Frames begun so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

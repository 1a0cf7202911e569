//! Blend state tracking
//!
//! Pipeline blend state changes are expensive, so the renderer tracks the
//! currently bound mode per graphics context and only forwards real changes
//! to the backend.

use serde::{Deserialize, Serialize};

use super::backend::GraphicsBackend;

/// Pipeline blend modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Blending disabled (fully opaque)
    #[default]
    Off,
    /// Standard alpha blending
    Transparent,
    /// Additive blending (for glowing effects)
    Additive,
    /// Multiplicative blending
    Multiply,
    /// Screen blending
    Screen,
}

/// Tracks the bound blend mode of one graphics context
///
/// Not shared between contexts; the [`ActorRenderer`](super::ActorRenderer)
/// owns exactly one.
#[derive(Debug, Default)]
pub struct BlendStateMachine {
    current: BlendMode,
    changes: u64,
}

impl BlendStateMachine {
    /// Create a state machine in the `Off` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a blend mode
    ///
    /// Returns `true` if the backend was asked to change state. Requests for the
    /// already bound mode are dropped.
    pub fn set_blend_mode<B: GraphicsBackend + ?Sized>(&mut self, mode: BlendMode, backend: &mut B) -> bool {
        if mode == self.current {
            return false;
        }
        log::trace!("Blend mode {:?} -> {:?}", self.current, mode);
        self.emit(mode, backend);
        true
    }

    /// Emit the frame's initial mode unconditionally
    ///
    /// The backend may have been touched by other renderers between frames,
    /// so the tracked value is not trusted across a frame boundary.
    pub fn begin_frame<B: GraphicsBackend + ?Sized>(&mut self, mode: BlendMode, backend: &mut B) {
        self.emit(mode, backend);
    }

    fn emit<B: GraphicsBackend + ?Sized>(&mut self, mode: BlendMode, backend: &mut B) {
        backend.set_blend_mode(mode);
        self.current = mode;
        self.changes += 1;
    }

    /// Currently bound mode
    pub fn current(&self) -> BlendMode {
        self.current
    }

    /// Total number of state changes sent to the backend
    pub fn change_count(&self) -> u64 {
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::recording::{RecordedCommand, RecordingBackend};

    #[test]
    fn test_redundant_requests_suppressed() {
        let mut backend = RecordingBackend::new();
        let mut blend = BlendStateMachine::new();

        let sequence = [
            BlendMode::Off,
            BlendMode::Off,
            BlendMode::Transparent,
            BlendMode::Transparent,
            BlendMode::Off,
        ];
        let emitted: Vec<bool> = sequence.iter().map(|&mode| blend.set_blend_mode(mode, &mut backend)).collect();

        assert_eq!(emitted, vec![false, false, true, false, true]);
        assert_eq!(blend.change_count(), 2);

        let calls: Vec<BlendMode> = backend
            .commands()
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::SetBlendMode(mode) => Some(*mode),
                _ => None,
            })
            .collect();
        assert_eq!(calls, vec![BlendMode::Transparent, BlendMode::Off]);
    }

    #[test]
    fn test_begin_frame_always_emits() {
        let mut backend = RecordingBackend::new();
        let mut blend = BlendStateMachine::new();

        blend.begin_frame(BlendMode::Off, &mut backend);
        blend.begin_frame(BlendMode::Off, &mut backend);

        assert_eq!(backend.blend_change_count(), 2);
        assert_eq!(blend.current(), BlendMode::Off);
        assert!(!blend.set_blend_mode(BlendMode::Off, &mut backend));
    }
}

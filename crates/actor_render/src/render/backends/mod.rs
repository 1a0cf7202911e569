//! Graphics backend implementations
//!
//! The actor renderer talks to the graphics layer only through
//! [`GraphicsBackend`](super::GraphicsBackend). API bindings live in the host
//! application; this crate ships a recording backend for headless use and tests.

pub mod recording;

pub use recording::{RecordedCommand, RecordingBackend};

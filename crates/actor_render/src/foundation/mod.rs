//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - 2D affine math
//! - Logging utilities

pub mod math;
pub mod logging;

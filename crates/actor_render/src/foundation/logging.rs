//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
///
/// Returns `false` if a global logger was already installed (for example by the
/// host application or a previous test), which is not treated as an error.
pub fn init() -> bool {
    env_logger::try_init().is_ok()
}

/// Initialize the logging system with an explicit filter string such as
/// `"actor_render=debug"`, ignoring `RUST_LOG`
pub fn init_with_filter(filter: &str) -> bool {
    env_logger::Builder::new()
        .parse_filters(filter)
        .try_init()
        .is_ok()
}

//! Logging utilities

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies.
pub fn init_with_level(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    // A second initialization (e.g. from tests) is harmless
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Initialize the logging system with `info` as the fallback level
pub fn init() {
    init_with_level("info");
}

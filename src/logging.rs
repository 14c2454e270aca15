//! Logger setup. `RUST_LOG` overrides the default `info` level.

use env_logger::{Builder, Env};

pub fn init() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_target(false)
        .init();
}

/// For tests: ignores an already-installed logger.
pub fn try_init() {
    let _ = Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

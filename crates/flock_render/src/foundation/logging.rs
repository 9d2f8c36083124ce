//! Logging utilities and structured logging support
//!
//! The renderer reports through the `log` facade only; applications pick the
//! sink. [`init`] installs `env_logger`, honouring `RUST_LOG`.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system with `env_logger`
///
/// Falls back to `info` when `RUST_LOG` is unset. Calling it twice is
/// harmless; the second call is ignored.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Initialize logging for tests, capturing output per test
pub fn init_for_tests() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

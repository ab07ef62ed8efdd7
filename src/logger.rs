//! Subscriber setup for binaries and tests linking lie-factors
//!
//! The library only emits `tracing` events:
//! - `error!` from the module errors' `log()` helpers (bad factor construction, missing
//!   variables, invalid block layouts)
//! - `warn!` when the Sim(3) logarithm falls back on a singular `V` solve
//! - `debug!` with the block sizes of every `ExpressionFactor::linearize`
//!
//! Nothing is printed until a subscriber is installed.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

/// Install the global subscriber at INFO.
///
/// See [`init_logger_with_level`].
pub fn init_logger() -> bool {
    init_logger_with_level(Level::INFO)
}

/// Install the global subscriber with `default_level`, overridable through `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already set, so it is safe to call from
/// every test.
///
/// # Example
/// ```no_run
/// use lie_factors::init_logger_with_level;
/// use tracing::Level;
///
/// // RUST_LOG=lie_factors=debug shows linearization sizes
/// init_logger_with_level(Level::WARN);
/// ```
pub fn init_logger_with_level(default_level: Level) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(SystemTime)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_test_writer()
        .try_init()
        .is_ok()
}

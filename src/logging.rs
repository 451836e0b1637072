//! # Logging
//!
//! The library only emits `tracing` events. Applications and tests that
//! want to see them can install a formatting subscriber with [`init`].

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber filtered by `filter`
/// (e.g. `"streamweave_windowing=debug"`).
///
/// `RUST_LOG` takes precedence when set. Returns false if a global
/// subscriber was already installed.
pub fn init(filter: &str) -> bool {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .try_init()
    .is_ok()
}

//! Logging setup
//!
//! The library itself only emits `tracing` events. Hosts that do not install
//! their own subscriber can call [`init_tracing`].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "hrc=info";

/// Install a fmt subscriber filtered by `RUST_LOG` (default `hrc=info`).
///
/// Returns `false` when a global subscriber was already installed, so it is
/// safe to call from every test.
pub fn init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}

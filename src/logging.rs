//! Tracing setup for hosts that do not install their own subscriber.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a fmt subscriber filtered by `RUST_LOG`, or by `default_filter`
/// when `RUST_LOG` is unset.
///
/// Returns false if a global subscriber was already installed.
///
/// # Example
/// ```ignore
/// offline_sync::logging::init_tracing("offline_sync=info");
/// ```
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

//! Tracing initialization.

use tracing_subscriber::{fmt, EnvFilter, prelude::*};
use tracing_subscriber::util::TryInitError;

const DEFAULT_FILTER: &str = "info,conference_mapper=info,tower_http=info,axum=info";

/// Install the global tracing subscriber.
///
/// Use RUST_LOG to configure, e.g.:
/// RUST_LOG=info,conference_mapper=debug
/// to see every lookup, insert and id redraw.
pub fn init() -> Result<(), TryInitError> {
    let fmt_layer = fmt::layer()
        .with_target(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}

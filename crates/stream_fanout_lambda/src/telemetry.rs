use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILTER_ENV: &str = "FANOUT_LOG";

/// Initialize JSON tracing with the `FANOUT_LOG` filter, defaulting to `info`.
///
/// Timestamps and targets are left out because CloudWatch records the
/// ingestion time for every line.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_target(false)
                .without_time(),
        )
        .init();
}

//! Tracing subscriber setup for the `kbqa` binary.

use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line events.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Install the global subscriber writing to stderr. `RUST_LOG` overrides the
/// default filter.
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

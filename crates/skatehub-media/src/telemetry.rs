use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `skatehub=debug`. `log_format`
/// of `json` switches to one JSON object per line; anything else is the
/// human-readable format. Fails if a subscriber is already installed.
pub fn init_telemetry(log_format: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "skatehub=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer()).try_init()?;
    }

    tracing::debug!(log_format, "Tracing initialized");
    Ok(())
}

use anyhow::{Result, bail};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::format::FmtSpan,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Formatting layer for `format`; span closes are logged so each phase and
/// the whole run report their own busy/idle time
fn format_layer(format: &str) -> Result<BoxedLayer> {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    match format {
        "json" => Ok(layer.json().boxed()),
        "pretty" => Ok(layer.pretty().boxed()),
        other => bail!("Unsupported log format: {}. Use 'json' or 'pretty'", other),
    }
}

/// Install the global subscriber
///
/// Logs go to stderr so the report on stdout stays clean. `RUST_LOG`
/// overrides the configured level when set.
pub fn setup_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(format_layer(&config.format)?)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_formats_build() {
        assert!(format_layer("json").is_ok());
        assert!(format_layer("pretty").is_ok());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = format_layer("plain").err().unwrap();
        assert!(err.to_string().contains("Unsupported log format: plain"));
    }
}

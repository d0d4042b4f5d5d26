//! Process-wide tracing setup

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Targets that log per connection and per frame
const REALTIME_TARGETS: [&str; 2] = ["huddle_hub", "huddle_api::impls"];

/// Install the global subscriber.
///
/// `json` suits log shippers, anything else prints the pretty format.
/// `RUST_LOG` replaces the configured levels when set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let directives = filter_directives(config)?;
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&directives))?;

    let writer = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.format == "json" {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(writer);
        registry.with(json_layer).try_init()?;
    } else {
        let pretty_layer = fmt::layer()
            .pretty()
            .with_target(true)
            .with_line_number(true)
            .with_file(false)
            .with_writer(writer);
        registry.with(pretty_layer).try_init()?;
    }

    Ok(())
}

/// The base level for every target, then `realtime_level` for the hub and
/// pump targets when one is configured
fn filter_directives(config: &LoggingConfig) -> anyhow::Result<String> {
    let mut directives = directive_level(&config.level)?;

    if let Some(level) = &config.realtime_level {
        let level = directive_level(level)?;
        for target in REALTIME_TARGETS {
            let _ = write!(directives, ",{target}={level}");
        }
    }

    Ok(directives)
}

fn directive_level(level: &str) -> anyhow::Result<String> {
    Ok(parse_log_level(level)?.as_str().to_lowercase())
}

fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}

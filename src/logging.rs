// ABOUTME: Logging setup - installs a tracing-subscriber fmt subscriber.
// ABOUTME: RUST_LOG overrides the configured level; output goes to stderr or nowhere.

use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Where formatted log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Stderr,
    /// Discard everything (tests, embedded use).
    Sink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub output: LogOutput,
}

impl LogConfig {
    pub fn new(level: LevelFilter, output: LogOutput) -> Self {
        Self { level, output }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LevelFilter::INFO, LogOutput::Stderr)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: LogConfig) -> Result<(), SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string().to_lowercase()));

    let writer = match config.output {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Sink => BoxMakeWriter::new(std::io::sink),
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LevelFilter::INFO);
        assert_eq!(config.output, LogOutput::Stderr);
    }

    #[test]
    fn test_debug_names_fields() {
        let rendered = format!("{:?}", LogConfig::new(LevelFilter::WARN, LogOutput::Sink));
        assert!(rendered.starts_with("LogConfig"));
        assert!(rendered.contains("WARN"));
        assert!(rendered.contains("output: Sink"));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig::new(LevelFilter::DEBUG, LogOutput::Sink);
        let _ = init(config);
        assert!(init(config).is_err());
    }
}

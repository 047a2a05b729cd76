//! Logging initialization.
//!
//! Two formats:
//! - `pretty`: default tracing pretty-print, written to a log file (the TUI
//!   owns the terminal, so pretty logs never hit stdout/stderr once the
//!   chat screen is active).
//! - `json`: structured JSON lines for log aggregators.

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber from config. Call once at
/// startup before any tracing events are emitted. `RUST_LOG` overrides
/// `cfg.level` when set.
pub fn init_logging(cfg: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let writer: Box<dyn Fn() -> Box<dyn std::io::Write + Send> + Send + Sync> =
        if let Some(path) = cfg.file.clone() {
            Box::new(move || {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .expect("failed to open log file");
                Box::new(file) as Box<dyn std::io::Write + Send>
            })
        } else {
            Box::new(|| Box::new(std::io::stderr()) as Box<dyn std::io::Write + Send>)
        };

    match cfg.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(writer)
                .compact()
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{LogFormat, LoggingConfig};

    #[test]
    fn default_logging_config_is_pretty() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert_eq!(cfg.level, "info");
    }

    #[test]
    fn deserializes_json_format() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"format":"json","level":"debug"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "debug");
    }
}

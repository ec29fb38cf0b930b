//! Tracing subscriber setup for the daemon.

use tracing_subscriber::EnvFilter;

use beacon_common::config::{AppConfig, LogFormat};

const TARGETS: [&str; 7] = [
    "beacon",
    "beacon_api",
    "beacon_engine",
    "beacon_monitors",
    "beacon_notifier",
    "beacon_common",
    "tower_http",
];

/// Filter directives for the configured log level. `tower_http` request
/// traces are kept at the same level.
pub fn default_directives(level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_workspace() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("beacon=debug,"));
        assert!(directives.contains("beacon_monitors=debug"));
        assert!(directives.ends_with("tower_http=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}

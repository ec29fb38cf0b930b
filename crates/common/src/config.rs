use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Smallest accepted poll interval, in seconds.
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

const VALID_LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Log output format for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Seconds between polls of each source (minimum 10)
    pub poll_interval_secs: u64,

    /// One of debug, info, warn, error
    pub log_level: String,

    pub log_format: LogFormat,

    /// Personal access token for the issue tracker
    pub github_token: String,

    /// API token for the community site
    pub community_token: String,

    /// Issue tracker API base (default: https://api.github.com)
    pub github_api_url: String,

    /// Issue tracker browser base used when rewriting API links
    pub github_web_url: String,

    /// Community site base (default: https://ld246.com)
    pub community_base_url: String,

    /// Directory holding the persisted JSON state files
    pub data_dir: PathBuf,

    /// Listen address of the local control API
    pub api_bind_addr: String,

    /// Optional webhook that receives every delivered notification
    pub notify_webhook_url: Option<String>,

    /// Upper bound on waiting for polling loops during shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            github_token: String::new(),
            community_token: String::new(),
            github_api_url: "https://api.github.com".to_string(),
            github_web_url: "https://github.com".to_string(),
            community_base_url: "https://ld246.com".to_string(),
            data_dir: default_data_dir(),
            api_bind_addr: "127.0.0.1:7878".to_string(),
            notify_webhook_url: None,
            shutdown_timeout_secs: 3,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Unset keys fall back
    /// to [`AppConfig::default`].
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{other}'"),
        };

        let config = Self {
            poll_interval_secs: lookup("POLL_INTERVAL_SECS")
                .unwrap_or_else(|| defaults.poll_interval_secs.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("POLL_INTERVAL_SECS must be a valid u64"))?,
            log_level: lookup("LOG_LEVEL")
                .map(|l| l.to_ascii_lowercase())
                .unwrap_or(defaults.log_level),
            log_format,
            github_token: lookup("GITHUB_TOKEN").unwrap_or_default(),
            community_token: lookup("COMMUNITY_TOKEN").unwrap_or_default(),
            github_api_url: lookup("GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            github_web_url: lookup("GITHUB_WEB_URL").unwrap_or(defaults.github_web_url),
            community_base_url: lookup("COMMUNITY_BASE_URL")
                .unwrap_or(defaults.community_base_url),
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            api_bind_addr: lookup("API_BIND_ADDR").unwrap_or(defaults.api_bind_addr),
            notify_webhook_url: lookup("NOTIFY_WEBHOOK_URL").filter(|u| !u.trim().is_empty()),
            shutdown_timeout_secs: lookup("SHUTDOWN_TIMEOUT_SECS")
                .unwrap_or_else(|| defaults.shutdown_timeout_secs.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SHUTDOWN_TIMEOUT_SECS must be a valid u64"))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value constraints. Called on load and on every replacement.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            anyhow::bail!(
                "poll interval must be at least {MIN_POLL_INTERVAL_SECS} seconds, got {}",
                self.poll_interval_secs
            );
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            anyhow::bail!("invalid log level: {}", self.log_level);
        }
        Ok(())
    }

    /// Apply a partial update, returning the resulting configuration.
    /// The receiver is left untouched so callers can swap wholesale.
    pub fn with_update(&self, update: &ConfigUpdate) -> anyhow::Result<Self> {
        let mut next = self.clone();
        if let Some(interval) = update.poll_interval_secs {
            next.poll_interval_secs = interval;
        }
        if let Some(token) = &update.github_token {
            next.github_token = token.trim().to_string();
        }
        if let Some(token) = &update.community_token {
            next.community_token = token.trim().to_string();
        }
        next.validate()?;
        Ok(next)
    }

    /// Copy safe to hand out over the control API.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.github_token = redact(&copy.github_token);
        copy.community_token = redact(&copy.community_token);
        copy
    }
}

/// Fields of [`AppConfig`] that may be replaced at runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    pub poll_interval_secs: Option<u64>,
    pub github_token: Option<String>,
    pub community_token: Option<String>,
}

fn redact(token: &str) -> String {
    if token.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}

/// `./data` when it already exists, otherwise `~/.beacon/data`.
fn default_data_dir() -> PathBuf {
    let local = PathBuf::from("data");
    if local.is_dir() {
        return local;
    }
    dirs::home_dir()
        .map(|home| home.join(".beacon").join("data"))
        .unwrap_or(local)
}

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_HANDOFF_PATH: &str = "data/backtest_results.json";
pub const DEFAULT_LOG_PATH: &str = "logs/backtester.log";

/// Configuration loaded from environment variables.
///
/// Passed explicitly into every component at construction; nothing reads the
/// environment after start-up.
#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub api_base_url: String,
    /// Upper bound for validate / backtest / metadata calls.
    pub request_timeout: Duration,

    // Keep-alive
    pub health_interval: Duration,
    pub health_timeout: Duration,

    // Local files
    pub handoff_path: PathBuf,
    pub log_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(120),
            health_interval: Duration::from_secs(50),
            health_timeout: Duration::from_secs(10),
            handoff_path: PathBuf::from(DEFAULT_HANDOFF_PATH),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_base_url: std::env::var("API_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            request_timeout: secs_var("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout),
            health_interval: secs_var("HEALTH_INTERVAL_SECS").unwrap_or(defaults.health_interval),
            health_timeout: secs_var("HEALTH_TIMEOUT_SECS").unwrap_or(defaults.health_timeout),
            handoff_path: std::env::var("HANDOFF_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.handoff_path),
            log_path: std::env::var("LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_path),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_handoff_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.handoff_path = path.into();
        self
    }

    /// Host part for the status bar: "localhost:8000".
    pub fn api_label(&self) -> &str {
        self.api_base_url
            .split("://")
            .nth(1)
            .unwrap_or(&self.api_base_url)
    }
}

fn secs_var(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
}

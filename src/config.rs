use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on the rate limit; also bounds the limiter's ring buffer.
pub const MAX_REQUESTS_PER_SECOND: u32 = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub rate_limit: RateLimitConfig,
    pub queue: QueueConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 50,
        }
    }
}

impl RateLimitConfig {
    /// Configured limit clamped to `MAX_REQUESTS_PER_SECOND`.
    pub fn effective_limit(&self) -> u32 {
        if self.requests_per_second > MAX_REQUESTS_PER_SECOND {
            log::warn!(
                "requests_per_second {} exceeds maximum {}, clamping",
                self.requests_per_second,
                MAX_REQUESTS_PER_SECOND
            );
        }
        self.requests_per_second.min(MAX_REQUESTS_PER_SECOND)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Period of the background drain tick, also the retry admission poll.
    pub tick_interval_ms: u64,
    /// A request tracked as in flight longer than this may be submitted again.
    pub stale_after_secs: u64,
    /// Warn when a request sat in the queue longer than this before dispatch.
    pub queue_wait_warning_secs: u64,
    /// Abandon a transport call after this long (None = trust the transport).
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5,
            stale_after_secs: 3600,
            queue_wait_warning_secs: 60,
            fetch_timeout_ms: None,
        }
    }
}

impl QueueConfig {
    /// How often the background drain runs. Never shorter than 1ms.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// How long a request may sit in "awaiting response" before it can be submitted again.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Queue wait above which a dispatch logs a warning.
    pub fn queue_wait_warning(&self) -> Duration {
        Duration::from_secs(self.queue_wait_warning_secs)
    }

    /// Upper bound for one transport call, if configured.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            rate_limit: RateLimitConfig::default(),
            queue: QueueConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

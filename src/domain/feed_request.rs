//! Feed request descriptor.
//!
//! A `FeedRequest` is the immutable definition of one fetch. It is built from
//! a plain `FeedRequestConfig` through `FeedRequest::new`, which validates the
//! config once; after that every field is read-only.

use super::{BackoffPolicy, FeedProperties, Priority};
use crate::error::{FeedpullError, Result};
use crate::id::generate_request_id;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Retry budget used when the config does not set one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Logical feed category, e.g. `match_detail` or `stage_fixtures`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedName(String);

impl FeedName {
    /// Wrap a feed category name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeedName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for FeedName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Everything needed to build a `FeedRequest`.
#[derive(Debug, Clone)]
pub struct FeedRequestConfig {
    pub name: FeedName,
    pub url: String,
    /// URL written to logs instead of `url` (hide credentials); defaults to `url`.
    pub url_for_logging: Option<String>,
    pub priority: Priority,
    pub max_retries: u32,
    /// Applied in order; a repeated key keeps the last value.
    pub headers: Vec<(String, String)>,
    pub properties: FeedProperties,
    pub backoff: BackoffPolicy,
    /// Set for requests that drive a recurring schedule.
    pub pull_interval: Option<Duration>,
}

impl Default for FeedRequestConfig {
    fn default() -> Self {
        Self {
            name: FeedName::new(""),
            url: String::new(),
            url_for_logging: None,
            priority: Priority::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            headers: Vec::new(),
            properties: FeedProperties::new(),
            backoff: BackoffPolicy::default(),
            pull_interval: None,
        }
    }
}

impl FeedRequestConfig {
    /// Config for `url` under feed `name`, with default priority, retries and backoff.
    pub fn new(name: impl Into<FeedName>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the dispatch priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set how many retries follow a failed first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the url written to logs in place of the real one.
    pub fn with_url_for_logging(mut self, url: impl Into<String>) -> Self {
        self.url_for_logging = Some(url.into());
        self
    }

    /// Add a request header. A later value for the same key wins.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Attach a typed caller property.
    pub fn with_property<T: std::any::Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Set the retry backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the interval used by recurring schedules and interval-based backoff.
    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = Some(interval);
        self
    }
}

/// Immutable description of one fetch.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    id: String,
    name: FeedName,
    url: String,
    url_for_logging: String,
    priority: Priority,
    max_retries: u32,
    created_at: DateTime<Utc>,
    headers: BTreeMap<String, String>,
    properties: FeedProperties,
    backoff: BackoffPolicy,
    pull_interval: Option<Duration>,
}

impl FeedRequest {
    /// Validate `config` and build the request, stamping id and creation time.
    pub fn new(config: FeedRequestConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(FeedpullError::InvalidRequest("url must not be empty".to_string()));
        }
        if config.name.as_str().trim().is_empty() {
            return Err(FeedpullError::InvalidRequest(format!(
                "feed name must not be empty (url='{}')",
                config.url_for_logging.as_deref().unwrap_or(&config.url)
            )));
        }
        if config.pull_interval == Some(Duration::ZERO) {
            return Err(FeedpullError::InvalidRequest(format!(
                "pull interval must be positive for feed '{}'",
                config.name
            )));
        }

        let mut headers = BTreeMap::new();
        for (key, value) in config.headers {
            if key.trim().is_empty() {
                return Err(FeedpullError::InvalidRequest(format!(
                    "header key must not be empty for feed '{}'",
                    config.name
                )));
            }
            headers.insert(key, value);
        }

        let url_for_logging = config.url_for_logging.unwrap_or_else(|| config.url.clone());

        Ok(Self {
            id: generate_request_id(config.name.as_str()),
            name: config.name,
            url: config.url,
            url_for_logging,
            priority: config.priority,
            max_retries: config.max_retries,
            created_at: Utc::now(),
            headers,
            properties: config.properties,
            backoff: config.backoff,
            pull_interval: config.pull_interval,
        })
    }

    /// Trace identifier, unique per request.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Feed category the request belongs to.
    pub fn name(&self) -> &FeedName {
        &self.name
    }

    /// The url to fetch.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The url to write to logs.
    pub fn url_for_logging(&self) -> &str {
        &self.url_for_logging
    }

    /// Dispatch priority.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// When the request was built.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Headers sent with every attempt.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Caller metadata carried through to the callbacks.
    pub fn properties(&self) -> &FeedProperties {
        &self.properties
    }

    /// Policy that computes the delay before each retry.
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Interval for recurring schedules, if set.
    pub fn pull_interval(&self) -> Option<Duration> {
        self.pull_interval
    }

    /// Short form for log lines.
    pub fn basic_info(&self) -> String {
        format!(
            "[id='{}', name='{}', priority={}, url='{}']",
            self.id, self.name, self.priority, self.url_for_logging
        )
    }
}

/// Dedup key used when the caller does not supply one: `{url}_{PRIORITY}`.
pub fn default_dedup_key(request: &FeedRequest) -> String {
    format!("{}_{}", request.url, request.priority)
}

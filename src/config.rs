use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::errors::{GenMediaError, Result};

const DEFAULT_BASE_URL: &str = "https://api.genmedia.dev";
const DEFAULT_QUEUE_BASE_URL: &str = "https://queue.genmedia.dev";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_RETRY_MAX_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MAX_POLL_TIME: Duration = Duration::from_secs(10 * 60);

/// Upper bound accepted for [`ConfigBuilder::max_retries`].
pub const MAX_RETRIES_LIMIT: u32 = 5;

/// Validated, immutable client configuration.
///
/// Built once through [`ConfigBuilder`]; every check happens in
/// [`ConfigBuilder::build`], so a `Config` that exists is always usable.
#[derive(Debug, Clone)]
pub struct Config {
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    retry_max_backoff: Duration,
    poll_interval: Duration,
    max_poll_time: Duration,
    base_url: String,
    headers: HeaderMap,
}

impl Config {
    /// Start a builder pointed at the job-set API.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Start a builder pointed at the queue API.
    pub fn queue_builder() -> ConfigBuilder {
        ConfigBuilder::with_base_url(DEFAULT_QUEUE_BASE_URL)
    }

    /// Per-request HTTP timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    pub fn retry_max_backoff(&self) -> Duration {
        self.retry_max_backoff
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wall-clock budget for a single poll loop.
    pub fn max_poll_time(&self) -> Duration {
        self.max_poll_time
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Extra headers sent with every API request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            retry_max_backoff: DEFAULT_RETRY_MAX_BACKOFF,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_time: DEFAULT_MAX_POLL_TIME,
            base_url: DEFAULT_BASE_URL.to_string(),
            headers: HeaderMap::new(),
        }
    }
}

/// Builder for [`Config`].
///
/// # Example
///
/// ```
/// use genmedia::Config;
/// use std::time::Duration;
///
/// let config = Config::builder()
///     .max_retries(5)
///     .poll_interval(Duration::from_millis(500))
///     .header("x-request-source", "batch-runner")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    retry_max_backoff: Duration,
    poll_interval: Duration,
    max_poll_time: Duration,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl ConfigBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    fn with_base_url(base_url: &str) -> Self {
        let defaults = Config::default();
        Self {
            timeout: defaults.timeout,
            max_retries: defaults.max_retries,
            retry_backoff: defaults.retry_backoff,
            retry_max_backoff: defaults.retry_max_backoff,
            poll_interval: defaults.poll_interval,
            max_poll_time: defaults.max_poll_time,
            base_url: base_url.to_string(),
            headers: Vec::new(),
        }
    }

    /// HTTP request timeout (defaults to 60 seconds).
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Retries for transient failures, 0 to 5 (defaults to 3).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Base delay of the exponential backoff (defaults to 1 second).
    pub fn retry_backoff(mut self, d: Duration) -> Self {
        self.retry_backoff = d;
        self
    }

    /// Cap applied to every backoff delay (defaults to 30 seconds).
    pub fn retry_max_backoff(mut self, d: Duration) -> Self {
        self.retry_max_backoff = d;
        self
    }

    /// Sleep between status queries (defaults to 2 seconds).
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    /// Give up polling after this long (defaults to 10 minutes).
    pub fn max_poll_time(mut self, d: Duration) -> Self {
        self.max_poll_time = d;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Add a header sent with every API request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// Returns [`GenMediaError::Config`] if a duration is zero, `max_retries`
    /// exceeds [`MAX_RETRIES_LIMIT`], the base URL is not http(s), or a header
    /// is malformed.
    pub fn build(self) -> Result<Config> {
        for (name, value) in [
            ("timeout", self.timeout),
            ("retry_backoff", self.retry_backoff),
            ("retry_max_backoff", self.retry_max_backoff),
            ("poll_interval", self.poll_interval),
            ("max_poll_time", self.max_poll_time),
        ] {
            if value.is_zero() {
                return Err(GenMediaError::Config(format!("{name} must be greater than zero")));
            }
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(GenMediaError::Config(format!(
                "max_retries must be between 0 and {MAX_RETRIES_LIMIT}, got {}",
                self.max_retries
            )));
        }

        let base_url = self.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(GenMediaError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| GenMediaError::Config(format!("invalid header name {name:?}")))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|_| GenMediaError::Config(format!("invalid value for header {name:?}")))?;
            headers.insert(header_name, header_value);
        }

        Ok(Config {
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_backoff: self.retry_backoff,
            retry_max_backoff: self.retry_max_backoff,
            poll_interval: self.poll_interval,
            max_poll_time: self.max_poll_time,
            base_url,
            headers,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://eodhistoricaldata.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Client configuration, passed explicitly to [`EodClient`](crate::EodClient).
///
/// # Environment Variables
///
/// | Setting | Primary Env Var | Fallback Env Var |
/// |---------|-----------------|------------------|
/// | API token | `EODFEED_API_TOKEN` | `EODHD_API_TOKEN` |
/// | Base URL | `EODFEED_BASE_URL` | - |
/// | Request timeout (seconds) | `EODFEED_TIMEOUT_SECS` | - |
/// | In-flight request bound | `EODFEED_MAX_IN_FLIGHT` | - |
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: String,
    /// Per-attempt request timeout.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Upper bound on concurrently outstanding requests in one batch.
    /// `None` dispatches every request of a batch at once.
    pub max_in_flight: Option<usize>,
    pub user_agent: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("max_in_flight", &self.max_in_flight)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            api_token: api_token.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            max_in_flight: None,
            user_agent: format!("eodfeed/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Build a configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = env::var("EODFEED_API_TOKEN")
            .or_else(|_| env::var("EODHD_API_TOKEN"))
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let mut config = Self::new(token);

        if let Ok(base_url) = env::var("EODFEED_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Ok(raw) = env::var("EODFEED_TIMEOUT_SECS") {
            let seconds = parse_env_number("EODFEED_TIMEOUT_SECS", &raw)?;
            config.request_timeout = Duration::from_secs(seconds as u64);
        }
        if let Ok(raw) = env::var("EODFEED_MAX_IN_FLIGHT") {
            let limit = parse_env_number("EODFEED_MAX_IN_FLIGHT", &raw)?;
            config.max_in_flight = Some(limit);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        Ok(())
    }

    pub(crate) fn request_timeout_ms(&self) -> u64 {
        u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

fn parse_env_number(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| ConfigError::InvalidEnv {
            name,
            value: raw.to_owned(),
        })
}

use thiserror::Error;

/// Configuration errors raised while building a [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api token is missing; set EODFEED_API_TOKEN or EODHD_API_TOKEN")]
    MissingToken,
    #[error("base url cannot be empty")]
    EmptyBaseUrl,
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

/// Error classification used for logging and caller dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    ExhaustedRetry,
    Upstream,
    Transport,
    Decode,
    DataIntegrity,
    InvalidRequest,
    Config,
}

/// Failure of a single fetch.
///
/// Every variant is fatal to the fetch that raised it. Inside a fan-out batch
/// the failure is contained to its originating spec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out on all {attempts} attempts")]
    ExhaustedRetries { url: String, attempts: u32 },

    #[error("upstream returned status {status} for {url}: {body}")]
    Upstream { status: u16, body: String, url: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("duplicate index key {key} in {context}")]
    DataIntegrity { key: String, context: String },

    #[error("row is missing field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' has invalid value '{value}'")]
    InvalidField { field: String, value: String },

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FetchError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        match self {
            Self::ExhaustedRetries { .. } => FetchErrorKind::ExhaustedRetry,
            Self::Upstream { .. } => FetchErrorKind::Upstream,
            Self::Transport { .. } => FetchErrorKind::Transport,
            Self::Decode { .. } | Self::MissingField { .. } | Self::InvalidField { .. } => {
                FetchErrorKind::Decode
            }
            Self::DataIntegrity { .. } => FetchErrorKind::DataIntegrity,
            Self::InvalidDate { .. } | Self::InvalidRequest(_) => FetchErrorKind::InvalidRequest,
            Self::Config(_) => FetchErrorKind::Config,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind() {
            FetchErrorKind::ExhaustedRetry => "fetch.exhausted_retries",
            FetchErrorKind::Upstream => "fetch.upstream",
            FetchErrorKind::Transport => "fetch.transport",
            FetchErrorKind::Decode => "fetch.decode",
            FetchErrorKind::DataIntegrity => "fetch.data_integrity",
            FetchErrorKind::InvalidRequest => "fetch.invalid_request",
            FetchErrorKind::Config => "fetch.config",
        }
    }

    /// Whether a later, independent call might succeed where this one failed.
    ///
    /// Nothing in this crate re-issues a failed fetch; the flag is for callers.
    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind(),
            FetchErrorKind::ExhaustedRetry | FetchErrorKind::Transport
        )
    }

    /// Upstream HTTP status for [`FetchError::Upstream`].
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

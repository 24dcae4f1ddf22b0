//! Request execution with bounded retries.
//!
//! A [`RequestExecutor`] owns the configuration and the transport connector.
//! Requests are issued through a [`Session`], which holds one transport for
//! its whole lifetime and releases it when dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::http_client::{
    Connector, HttpClient, HttpError, HttpErrorKind, HttpRequest, ReqwestConnector,
    SharedConnector,
};
use crate::request::{RequestParams, RequestSpec};
use crate::table::RawRow;

pub struct RequestExecutor {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    sessions: AtomicU64,
}

impl RequestExecutor {
    /// Executor over the production `reqwest` transport.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let connector = ReqwestConnector::new(config.user_agent.clone())
            .with_max_idle_per_host(config.max_in_flight);
        Self::with_connector(config, Arc::new(connector))
    }

    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            sessions: AtomicU64::new(0),
        })
    }

    /// Executor whose sessions all share `client`.
    pub fn with_http_client(
        config: ClientConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, FetchError> {
        Self::with_connector(config, Arc::new(SharedConnector::new(client)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn open_session(&self) -> Result<Session<'_>, FetchError> {
        let http = self
            .connector
            .connect()
            .map_err(|error| FetchError::Transport {
                url: self.config.base_url.clone(),
                message: error.to_string(),
            })?;
        let id = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(session = id, "session opened");

        Ok(Session {
            executor: self,
            http,
            id,
        })
    }
}

/// One scoped transport lifetime. Every request of a batch goes through the
/// same session.
pub struct Session<'a> {
    executor: &'a RequestExecutor,
    http: Arc<dyn HttpClient>,
    id: u64,
}

impl Session<'_> {
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Execute a typed request and decode its rows.
    ///
    /// An empty array is a valid result meaning "no data".
    pub async fn execute(&self, spec: &RequestSpec) -> Result<Vec<RawRow>, FetchError> {
        self.execute_rows(&spec.path(), &spec.params()).await
    }

    pub async fn execute_rows(
        &self,
        path: &str,
        params: &RequestParams,
    ) -> Result<Vec<RawRow>, FetchError> {
        let (url, value) = self.fetch_value(path, params).await?;
        let rows = decode_rows(value, &url)?;
        info!(session = self.id, rows = rows.len(), url = %url, "request succeeded");
        Ok(rows)
    }

    /// Execute and return the decoded JSON body as is.
    pub async fn execute_value(
        &self,
        path: &str,
        params: &RequestParams,
    ) -> Result<Value, FetchError> {
        let (url, value) = self.fetch_value(path, params).await?;
        info!(session = self.id, url = %url, "request succeeded");
        Ok(value)
    }

    /// Execute and deserialize the body into `T`.
    pub async fn execute_typed<T>(&self, path: &str, params: &RequestParams) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let (url, value) = self.fetch_value(path, params).await?;
        let decoded = serde_json::from_value(value).map_err(|error| FetchError::Decode {
            url: url.clone(),
            message: error.to_string(),
        })?;
        info!(session = self.id, url = %url, "request succeeded");
        Ok(decoded)
    }

    async fn fetch_value(
        &self,
        path: &str,
        params: &RequestParams,
    ) -> Result<(String, Value), FetchError> {
        let (url, body) = self.send(path, params).await?;
        let value = serde_json::from_str(&body).map_err(|error| FetchError::Decode {
            url: url.clone(),
            message: error.to_string(),
        })?;
        Ok((url, value))
    }

    /// GET with retries. Returns the redacted URL and the raw body of a 2xx
    /// response.
    async fn send(&self, path: &str, params: &RequestParams) -> Result<(String, String), FetchError> {
        let config = &self.executor.config;
        let policy = &config.retry;
        let request = HttpRequest::get(format!("{}{}", config.base_url, path))
            .with_query(params.to_wire(&config.api_token))
            .with_timeout_ms(config.request_timeout_ms());
        let url = request.display_url();
        let max_attempts = policy.attempts();

        for attempt in 1..=max_attempts {
            let error = match self.http.execute(request.clone()).await {
                Ok(response) => {
                    info!(
                        session = self.id,
                        attempt,
                        status = response.status,
                        url = %url,
                        "request initiated"
                    );
                    if !response.is_success() {
                        warn!(status = response.status, url = %url, "upstream returned error status");
                        return Err(FetchError::Upstream {
                            status: response.status,
                            body: response.body,
                            url,
                        });
                    }
                    return Ok((url, response.body));
                }
                Err(error) => error,
            };

            if !is_retryable(&error, policy.retry_on_connect) {
                info!(
                    session = self.id,
                    attempt,
                    max_attempts,
                    url = %url,
                    error = %error,
                    "request errored"
                );
                warn!(url = %url, error = %error, "request failed");
                return Err(transport_error(url, &error));
            }

            match error.kind() {
                HttpErrorKind::Timeout => info!(
                    session = self.id,
                    attempt,
                    max_attempts,
                    url = %url,
                    "request timed out"
                ),
                _ => info!(
                    session = self.id,
                    attempt,
                    max_attempts,
                    url = %url,
                    error = %error,
                    "connection failed"
                ),
            }

            if attempt == max_attempts {
                if error.is_timeout() {
                    break;
                }
                return Err(transport_error(url, &error));
            }

            let delay = policy.delay_after_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        warn!(attempts = max_attempts, url = %url, "retries exhausted");
        Err(FetchError::ExhaustedRetries {
            url,
            attempts: max_attempts,
        })
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!(session = self.id, "session closed");
    }
}

fn is_retryable(error: &HttpError, retry_on_connect: bool) -> bool {
    match error.kind() {
        HttpErrorKind::Timeout => true,
        HttpErrorKind::Connect => retry_on_connect,
        HttpErrorKind::Other => false,
    }
}

fn transport_error(url: String, error: &HttpError) -> FetchError {
    FetchError::Transport {
        url,
        message: error.message().to_owned(),
    }
}

fn decode_rows(value: Value, url: &str) -> Result<Vec<RawRow>, FetchError> {
    let Value::Array(items) = value else {
        return Err(FetchError::Decode {
            url: url.to_owned(),
            message: String::from("expected a JSON array of records"),
        });
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(FetchError::Decode {
                url: url.to_owned(),
                message: format!("expected a JSON object record, got {other}"),
            }),
        })
        .collect()
}

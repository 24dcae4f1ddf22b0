//! HTTP transport seam.
//!
//! The executor only talks to [`HttpClient`]. A [`Connector`] opens one
//! transport per batch so that all requests of a batch share a connection
//! pool that is released when the batch ends.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Query parameter never shown in logs or error messages.
pub const REDACTED_PARAM: &str = "api_token";

/// GET request envelope used by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            timeout_ms: 20_000,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// URL with its query string, minus the API token.
    pub fn display_url(&self) -> String {
        let rendered = self
            .query
            .iter()
            .filter(|(key, _)| key != REDACTED_PARAM)
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");

        if rendered.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{}", self.url, rendered)
        }
    }
}

/// HTTP response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    Timeout,
    Connect,
    Other,
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Connect,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Other,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, HttpErrorKind::Timeout)
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Transport contract used by the request executor.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

/// Opens the transport a batch of requests shares.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn HttpClient>, HttpError>;
}

/// Production transport backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(&request.url)
                .query(&request.query)
                .timeout(Duration::from_millis(request.timeout_ms))
                .send()
                .await
                .map_err(map_reqwest_error)?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(map_reqwest_error)?;

            Ok(HttpResponse { status, body })
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::timeout(format!("request timeout: {error}"))
    } else if error.is_connect() {
        HttpError::connect(format!("connection failed: {error}"))
    } else {
        HttpError::other(format!("request failed: {error}"))
    }
}

/// Builds a fresh `reqwest::Client`, and so a fresh connection pool, per session.
#[derive(Debug, Clone)]
pub struct ReqwestConnector {
    user_agent: String,
    max_idle_per_host: Option<usize>,
}

impl ReqwestConnector {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            max_idle_per_host: None,
        }
    }

    pub fn with_max_idle_per_host(mut self, max_idle_per_host: Option<usize>) -> Self {
        self.max_idle_per_host = max_idle_per_host;
        self
    }
}

impl Connector for ReqwestConnector {
    fn connect(&self) -> Result<Arc<dyn HttpClient>, HttpError> {
        let mut builder = reqwest::Client::builder().user_agent(&self.user_agent);
        if let Some(limit) = self.max_idle_per_host {
            builder = builder.pool_max_idle_per_host(limit);
        }
        let client = builder
            .build()
            .map_err(|error| HttpError::other(format!("failed to build http client: {error}")))?;

        Ok(Arc::new(ReqwestHttpClient::with_client(client)))
    }
}

/// Hands every session the same transport.
#[derive(Clone)]
pub struct SharedConnector {
    client: Arc<dyn HttpClient>,
}

impl SharedConnector {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

impl Connector for SharedConnector {
    fn connect(&self) -> Result<Arc<dyn HttpClient>, HttpError> {
        Ok(Arc::clone(&self.client))
    }
}

pub type ScriptedReply = Result<HttpResponse, HttpError>;

#[derive(Debug)]
struct Route {
    fragment: String,
    replies: VecDeque<ScriptedReply>,
}

/// Deterministic offline transport.
///
/// Requests are answered by the first route whose fragment occurs in the
/// request's display URL. A route plays its replies in order and repeats the
/// last one. Unmatched requests get the fallback reply (`200 []` by default).
#[derive(Debug)]
pub struct ScriptedHttpClient {
    routes: Mutex<Vec<Route>>,
    fallback: ScriptedReply,
    requests: Mutex<Vec<HttpRequest>>,
}

impl Default for ScriptedHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            fallback: Ok(HttpResponse::ok_json("[]")),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn with_route(self, fragment: impl Into<String>, reply: ScriptedReply) -> Self {
        self.with_sequence(fragment, vec![reply])
    }

    pub fn with_sequence(self, fragment: impl Into<String>, replies: Vec<ScriptedReply>) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Route {
                fragment: fragment.into(),
                replies: replies.into(),
            });
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn requests_matching(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| request.display_url().contains(fragment))
            .count()
    }

    fn reply_for(&self, request: &HttpRequest) -> ScriptedReply {
        let target = request.display_url();
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(route) = routes
            .iter_mut()
            .find(|route| target.contains(route.fragment.as_str()))
        else {
            return self.fallback.clone();
        };

        if route.replies.len() > 1 {
            route
                .replies
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        } else {
            route
                .replies
                .front()
                .cloned()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let reply = self.reply_for(&request);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Box::pin(async move { reply })
    }
}

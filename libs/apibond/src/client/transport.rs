//! Client-side transport capability.
//!
//! The call protocol in [`ApiClient`](crate::client::ApiClient) is transport
//! agnostic; anything that can carry (method, route, body) to a server and
//! bring a JSON payload back satisfies [`Transport`]. [`HttpTransport`] is
//! the reqwest-backed production implementation.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Instrument, Level};

use crate::contract::Method;

/// Structured failure surfaced by a transport.
///
/// When the failure is turned into a call diagnostic, the response body wins
/// over the response text, which wins over the raw error message.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    /// HTTP status, when the failure came from a completed exchange.
    pub status: Option<u16>,
    /// Parsed JSON response body, if the server sent one.
    pub response_body: Option<Value>,
    /// Raw response text, when the body was not parseable JSON.
    pub response_text: Option<String>,
    /// Raw error description (connection refused, timeout, ...).
    pub message: String,
}

impl TransportFailure {
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            status: None,
            response_body: None,
            response_text: None,
            message: message.into(),
        }
    }

    /// The most structured representation available of what went wrong.
    pub fn diagnostic(&self) -> Value {
        if let Some(body) = &self.response_body {
            return body.clone();
        }
        if let Some(text) = &self.response_text {
            return Value::String(text.clone());
        }
        Value::String(self.message.clone())
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Carries one request to the server and returns the response payload.
///
/// Timeouts and cancellation are entirely the transport's business; if a
/// transport never settles, the call never settles.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(
        &self,
        method: Method,
        route: &str,
        body: &Value,
    ) -> Result<Value, TransportFailure>;
}

/// HTTP transport over a shared `reqwest::Client`, rooted at a base URL.
///
/// Request data travels as query parameters for query-bodied verbs
/// (GET/DELETE) and as a JSON body otherwise, mirroring the server-side
/// decoding in [`crate::server`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    fn url_for(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }
}

/// Flatten a JSON object into query pairs; scalar strings stay raw, every
/// other value is carried as its JSON text.
fn query_pairs(body: &Value) -> Vec<(String, String)> {
    match body {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(
        &self,
        method: Method,
        route: &str,
        body: &Value,
    ) -> Result<Value, TransportFailure> {
        let url = self.url_for(route);
        let span = tracing::span!(
            Level::INFO, "api_call",
            http.method = %method,
            http.url = %url,
            http.status_code = tracing::field::Empty,
        );

        async {
            let reqwest_method = match method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Put => reqwest::Method::PUT,
                Method::Patch => reqwest::Method::PATCH,
                Method::Delete => reqwest::Method::DELETE,
            };

            let mut request = self.client.request(reqwest_method, &url);
            if method.carries_query_body() {
                request = request.query(&query_pairs(body));
            } else {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|err| TransportFailure::from_error(err.to_string()))?;

            let status = response.status();
            tracing::Span::current().record("http.status_code", status.as_u16());

            let text = response
                .text()
                .await
                .map_err(|err| TransportFailure::from_error(err.to_string()))?;
            let parsed: Option<Value> = serde_json::from_str(&text).ok();

            if !status.is_success() {
                let (response_body, response_text) = match parsed {
                    Some(body) => (Some(body), None),
                    None => (None, Some(text)),
                };
                return Err(TransportFailure {
                    status: Some(status.as_u16()),
                    response_body,
                    response_text,
                    message: format!("server responded with HTTP {status}"),
                });
            }

            // A 2xx payload that is not JSON is handed back verbatim;
            // response validation decides whether the contract tolerates it.
            Ok(match parsed {
                Some(body) => body,
                None if text.is_empty() => Value::Null,
                None => Value::String(text),
            })
        }
        .instrument(span)
        .await
    }
}

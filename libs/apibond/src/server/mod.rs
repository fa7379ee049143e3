//! Server factory: a mountable `axum::Router` derived from a [`Contract`]
//! and a [`HandlerMap`].
//!
//! Wiring defects (missing handler, duplicate route, uncompilable schema)
//! are caught at construction and abort startup. Per-request validation
//! failures are recoverable: they become a structured 422 response and the
//! handler is never invoked.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing;
use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::contract::{Contract, Endpoint, Method};
use crate::error::{ConfigError, SchemaSide};
use crate::validate::{SchemaValidator, ValidationErrorDetail};

const MSG_REQUEST_INVALID: &str = "Request does not conform to API specification";
const MSG_RESPONSE_INVALID: &str = "Response body does not conform to API specification";

/// Matches axum's own default extractor body limit.
const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The validated request handed to an [`ApiHandler`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Contract name of the endpoint that matched.
    pub endpoint: String,
    pub method: Method,
    pub route: String,
    /// The request body, already validated against the endpoint's schema.
    pub body: Value,
    /// Original request headers, untouched.
    pub headers: HeaderMap,
}

/// An endpoint's business logic. Receives a validated request and fully
/// owns the response: status code, body shape, everything.
#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn handle(&self, req: ApiRequest) -> Response;
}

struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> ApiHandler for HandlerFn<F>
where
    F: Fn(ApiRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn handle(&self, req: ApiRequest) -> Response {
        (self.0)(req).await
    }
}

/// Endpoint-name keyed handler registry.
#[derive(Default, Clone)]
pub struct HandlerMap {
    inner: HashMap<String, Arc<dyn ApiHandler>>,
}

impl HandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, name: impl Into<String>, handler: Arc<dyn ApiHandler>) -> Self {
        self.inner.insert(name.into(), handler);
        self
    }

    /// Register a plain async closure as a handler.
    pub fn insert_fn<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.insert(name, Arc::new(HandlerFn(f)))
    }

    fn get(&self, name: &str) -> Option<Arc<dyn ApiHandler>> {
        self.inner.get(name).cloned()
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(|s| s.as_str())
    }
}

/// Body of the 422 sent when an inbound request fails validation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub msg: String,
    pub method: Method,
    pub route: String,
    pub req_body: Value,
    pub err: Vec<ValidationErrorDetail>,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(self)).into_response()
    }
}

struct EndpointRuntime {
    name: String,
    endpoint: Endpoint,
    handler: Arc<dyn ApiHandler>,
    validator: Arc<dyn SchemaValidator>,
    validate_responses: bool,
    body_limit: usize,
}

/// Builds the router for one contract.
///
/// `build()` runs the eager checks and registers one route per endpoint via
/// an explicit method dispatch table. The returned router is plain axum and
/// can be mounted, layered or served like any other.
pub struct ServerBuilder {
    contract: Arc<Contract>,
    validator: Arc<dyn SchemaValidator>,
    handlers: HandlerMap,
    validate_responses: bool,
    body_limit: usize,
}

impl ServerBuilder {
    pub fn new(contract: Arc<Contract>, validator: Arc<dyn SchemaValidator>) -> Self {
        Self {
            contract,
            validator,
            handlers: HandlerMap::new(),
            validate_responses: false,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Replace the whole handler registry at once.
    pub fn handlers(mut self, handlers: HandlerMap) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn handler(mut self, name: impl Into<String>, handler: Arc<dyn ApiHandler>) -> Self {
        self.handlers = self.handlers.insert(name, handler);
        self
    }

    pub fn handler_fn<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handlers = self.handlers.insert_fn(name, f);
        self
    }

    /// Also validate 2xx JSON responses against the endpoint's response
    /// schema; nonconforming responses are replaced by a 500. Off by
    /// default: the server owns its responses, and the original contract
    /// only gates inbound data.
    pub fn validate_responses(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }

    /// Cap on how many bytes of a request (or, with response validation
    /// on, a response) body will be buffered. Oversized bodies are
    /// rejected like any other undecodable body. Defaults to 2 MiB.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn build(self) -> Result<Router, ConfigError> {
        let mut registered: HashSet<(Method, String)> = HashSet::new();
        let mut router = Router::new();

        for (name, endpoint) in self.contract.iter() {
            let handler = self
                .handlers
                .get(name)
                .ok_or_else(|| ConfigError::MissingHandler {
                    endpoint: name.to_string(),
                })?;

            self.validator
                .prepare(&endpoint.req_body)
                .map_err(|source| ConfigError::InvalidSchema {
                    endpoint: name.to_string(),
                    side: SchemaSide::Request,
                    source,
                })?;
            self.validator
                .prepare(&endpoint.res_body)
                .map_err(|source| ConfigError::InvalidSchema {
                    endpoint: name.to_string(),
                    side: SchemaSide::Response,
                    source,
                })?;

            if !registered.insert((endpoint.method, endpoint.route.clone())) {
                return Err(ConfigError::DuplicateRoute {
                    method: endpoint.method,
                    route: endpoint.route.clone(),
                });
            }

            let runtime = Arc::new(EndpointRuntime {
                name: name.to_string(),
                endpoint: endpoint.clone(),
                handler,
                validator: self.validator.clone(),
                validate_responses: self.validate_responses,
                body_limit: self.body_limit,
            });
            let service = move |req: Request| {
                let runtime = runtime.clone();
                async move { dispatch(runtime, req).await }
            };

            // Explicit dispatch table from the method enum to axum's
            // registration functions.
            let method_router = match endpoint.method {
                Method::Get => routing::get(service),
                Method::Post => routing::post(service),
                Method::Put => routing::put(service),
                Method::Patch => routing::patch(service),
                Method::Delete => routing::delete(service),
            };
            router = router.route(&endpoint.route, method_router);
        }

        for name in self.handlers.names() {
            if self.contract.get(name).is_none() {
                warn!(handler = name, "handler does not match any contract endpoint");
            }
        }

        Ok(router)
    }
}

async fn dispatch(runtime: Arc<EndpointRuntime>, req: Request) -> Response {
    let endpoint = &runtime.endpoint;
    let (parts, body) = req.into_parts();

    let req_body = match read_body(endpoint, parts.uri.query(), body, runtime.body_limit).await {
        Ok(value) => value,
        Err(detail) => {
            let err = vec![detail];
            warn!(
                endpoint = %runtime.name,
                err = ?err,
                "request body is not decodable"
            );
            return ErrorResponse {
                msg: MSG_REQUEST_INVALID.to_string(),
                method: endpoint.method,
                route: endpoint.route.clone(),
                req_body: Value::Null,
                err,
            }
            .into_response();
        }
    };

    let verdict = runtime.validator.check(&endpoint.req_body, &req_body);
    if !verdict.is_valid() {
        let err = verdict.into_errors();
        warn!(
            endpoint = %runtime.name,
            err = ?err,
            req_body = %req_body,
            "request does not conform to API specification"
        );
        return ErrorResponse {
            msg: MSG_REQUEST_INVALID.to_string(),
            method: endpoint.method,
            route: endpoint.route.clone(),
            req_body,
            err,
        }
        .into_response();
    }

    let api_request = ApiRequest {
        endpoint: runtime.name.clone(),
        method: endpoint.method,
        route: endpoint.route.clone(),
        body: req_body,
        headers: parts.headers,
    };
    let response = runtime.handler.handle(api_request).await;

    if runtime.validate_responses {
        return check_response(&runtime, response).await;
    }
    response
}

/// Decode the inbound payload: query pairs for query-bodied verbs, JSON
/// body otherwise. An absent body decodes to `{}`, matching what a
/// body-parsing middleware hands to handlers when nothing was sent.
async fn read_body(
    endpoint: &Endpoint,
    query: Option<&str>,
    body: Body,
    body_limit: usize,
) -> Result<Value, ValidationErrorDetail> {
    if endpoint.method.carries_query_body() {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query.unwrap_or("")).map_err(|err| {
                ValidationErrorDetail {
                    detail: format!("query string is not decodable: {err}"),
                    pointer: String::new(),
                }
            })?;
        let mut map = serde_json::Map::new();
        for (key, raw) in pairs {
            let value = coerce_query_value(&endpoint.req_body, &key, raw);
            map.insert(key, value);
        }
        return Ok(Value::Object(map));
    }

    let bytes = axum::body::to_bytes(body, body_limit)
        .await
        .map_err(|err| ValidationErrorDetail {
            detail: format!("failed to read request body: {err}"),
            pointer: String::new(),
        })?;
    if bytes.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_slice(&bytes).map_err(|err| ValidationErrorDetail {
        detail: format!("request body is not valid JSON: {err}"),
        pointer: String::new(),
    })
}

/// Query parameters arrive as strings; re-typing is schema-directed so the
/// gate sees what the client meant. A key whose request schema admits a
/// string keeps the raw text (a numeric-looking string id must stay a
/// string); everything else is retyped to a number, boolean or null when
/// the text parses as one.
fn coerce_query_value(req_schema: &Value, key: &str, raw: String) -> Value {
    if schema_admits_string(req_schema, key) {
        return Value::String(raw);
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) if !value.is_string() => value,
        _ => Value::String(raw),
    }
}

/// Whether the request schema declares the property at `key` as (possibly)
/// a string. Untyped or undeclared properties do not count: for those the
/// retyping heuristic applies.
fn schema_admits_string(req_schema: &Value, key: &str) -> bool {
    let Some(property) = req_schema.get("properties").and_then(|p| p.get(key)) else {
        return false;
    };
    match property.get("type") {
        Some(Value::String(ty)) => ty == "string",
        Some(Value::Array(types)) => types.iter().any(|ty| ty == "string"),
        _ => false,
    }
}

/// Opt-in outbound gate: buffer a 2xx JSON response and hold it to the
/// endpoint's response schema.
async fn check_response(runtime: &EndpointRuntime, response: Response) -> Response {
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, runtime.body_limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(endpoint = %runtime.name, error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let res_body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(_) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        }
    };

    let verdict = runtime.validator.check(&runtime.endpoint.res_body, &res_body);
    if !verdict.is_valid() {
        let err = verdict.into_errors();
        warn!(
            endpoint = %runtime.name,
            err = ?err,
            res_body = %res_body,
            "response does not conform to API specification"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "msg": MSG_RESPONSE_INVALID,
                "method": runtime.endpoint.method,
                "route": runtime.endpoint.route,
                "err": err,
            })),
        )
            .into_response();
    }

    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "nick": { "type": ["string", "null"] },
                "limit": { "type": "integer" },
                "free": {}
            }
        })
    }

    #[test]
    fn string_typed_keys_keep_their_raw_text() {
        assert_eq!(
            coerce_query_value(&schema(), "id", "1234".into()),
            json!("1234")
        );
        assert_eq!(
            coerce_query_value(&schema(), "nick", "null".into()),
            json!("null")
        );
    }

    #[test]
    fn non_string_keys_are_retyped_when_the_text_parses() {
        assert_eq!(
            coerce_query_value(&schema(), "limit", "10".into()),
            json!(10)
        );
        assert_eq!(
            coerce_query_value(&schema(), "limit", "ten".into()),
            json!("ten")
        );
        // Undeclared and untyped properties fall back to the heuristic.
        assert_eq!(
            coerce_query_value(&schema(), "free", "true".into()),
            json!(true)
        );
        assert_eq!(
            coerce_query_value(&schema(), "unknown", "7".into()),
            json!(7)
        );
    }
}

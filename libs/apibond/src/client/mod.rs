//! Client factory: one validated call surface per contract endpoint.
//!
//! Each call runs the same strictly ordered protocol: validate the outgoing
//! body, invoke the transport, validate the incoming body. Any failing step
//! short-circuits the rest, and every call settles exactly once, as a
//! `Result`.

pub mod transport;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::contract::{Contract, Method};
use crate::error::{ConfigError, SchemaSide};
use crate::validate::{SchemaValidator, ValidationErrorDetail};

pub use transport::{HttpTransport, Transport, TransportFailure};

const MSG_REQUEST_INVALID: &str = "Request body does not conform to API specification";
const MSG_CALL_FAILED: &str = "API call failed";
const MSG_RESPONSE_INVALID: &str =
    "API call succeeded, but response body did not conform to specification";

/// What went wrong, in the most structured form available: validation
/// diagnostics for schema failures, the transport's own payload otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FailureDetail {
    Validation(Vec<ValidationErrorDetail>),
    Transport(Value),
}

/// The full diagnostic payload of a failed call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFailure {
    pub msg: String,
    pub method: Method,
    pub route: String,
    pub req_body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res_body: Option<Value>,
    pub err: FailureDetail,
}

/// Per-call errors. Exactly one of these applies to any failed call.
#[derive(Debug, Error)]
pub enum CallError {
    /// The outgoing body failed validation; the transport was never invoked.
    #[error("Request body does not conform to API specification")]
    RequestValidation(CallFailure),

    /// The transport failed (network error, non-2xx response, ...).
    #[error("API call failed")]
    Transport(CallFailure),

    /// The transport succeeded but the payload does not honor the contract.
    /// Deliberate policy: a nonconforming response is a failure, full stop.
    #[error("API call succeeded, but response body did not conform to specification")]
    ResponseValidation(CallFailure),

    /// The endpoint name is not part of the contract. Always a caller bug.
    #[error("no endpoint named `{0}` in the contract")]
    UnknownEndpoint(String),
}

impl CallError {
    /// The diagnostic payload, when the error carries one.
    pub fn failure(&self) -> Option<&CallFailure> {
        match self {
            CallError::RequestValidation(f)
            | CallError::Transport(f)
            | CallError::ResponseValidation(f) => Some(f),
            CallError::UnknownEndpoint(_) => None,
        }
    }
}

/// Client bound to one [`Contract`]: every endpoint becomes a name-keyed,
/// schema-checked call.
///
/// Construction pre-compiles all endpoint schemas, so a schema defect aborts
/// startup instead of surfacing on the first call.
pub struct ApiClient {
    contract: Arc<Contract>,
    transport: Arc<dyn Transport>,
    validator: Arc<dyn SchemaValidator>,
}

impl ApiClient {
    pub fn new(
        contract: Arc<Contract>,
        transport: Arc<dyn Transport>,
        validator: Arc<dyn SchemaValidator>,
    ) -> Result<Self, ConfigError> {
        for (name, endpoint) in contract.iter() {
            validator
                .prepare(&endpoint.req_body)
                .map_err(|source| ConfigError::InvalidSchema {
                    endpoint: name.to_string(),
                    side: SchemaSide::Request,
                    source,
                })?;
            validator
                .prepare(&endpoint.res_body)
                .map_err(|source| ConfigError::InvalidSchema {
                    endpoint: name.to_string(),
                    side: SchemaSide::Response,
                    source,
                })?;
        }
        Ok(Self {
            contract,
            transport,
            validator,
        })
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Call the named endpoint: validate `req_body`, invoke the transport,
    /// validate the response. The transport invocation is the only
    /// suspension point; validation itself never suspends.
    pub async fn call(&self, name: &str, req_body: Value) -> Result<Value, CallError> {
        let endpoint = self
            .contract
            .get(name)
            .ok_or_else(|| CallError::UnknownEndpoint(name.to_string()))?;

        let verdict = self.validator.check(&endpoint.req_body, &req_body);
        if !verdict.is_valid() {
            return Err(CallError::RequestValidation(CallFailure {
                msg: MSG_REQUEST_INVALID.to_string(),
                method: endpoint.method,
                route: endpoint.route.clone(),
                req_body,
                res_body: None,
                err: FailureDetail::Validation(verdict.into_errors()),
            }));
        }

        let res_body = match self
            .transport
            .invoke(endpoint.method, &endpoint.route, &req_body)
            .await
        {
            Ok(res_body) => res_body,
            Err(failure) => {
                return Err(CallError::Transport(CallFailure {
                    msg: MSG_CALL_FAILED.to_string(),
                    method: endpoint.method,
                    route: endpoint.route.clone(),
                    req_body,
                    res_body: None,
                    err: FailureDetail::Transport(failure.diagnostic()),
                }))
            }
        };

        let verdict = self.validator.check(&endpoint.res_body, &res_body);
        if !verdict.is_valid() {
            return Err(CallError::ResponseValidation(CallFailure {
                msg: MSG_RESPONSE_INVALID.to_string(),
                method: endpoint.method,
                route: endpoint.route.clone(),
                req_body,
                res_body: Some(res_body),
                err: FailureDetail::Validation(verdict.into_errors()),
            }));
        }

        Ok(res_body)
    }
}

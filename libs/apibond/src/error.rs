use thiserror::Error;

use crate::contract::Method;

/// Which of an endpoint's two schemas an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSide {
    Request,
    Response,
}

impl std::fmt::Display for SchemaSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaSide::Request => f.write_str("request"),
            SchemaSide::Response => f.write_str("response"),
        }
    }
}

/// The schema capability could not turn a schema document into a predicate.
#[derive(Debug, Error)]
#[error("failed to compile schema: {0}")]
pub struct SchemaCompileError(pub String);

/// Construction-time wiring errors. Always fatal: a process must not start
/// with an incomplete or contradictory contract binding.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate endpoint `{name}` in contract")]
    DuplicateEndpoint { name: String },

    #[error("route for endpoint `{name}` must start with '/' (got `{route}`)")]
    InvalidRoute { name: String, route: String },

    #[error("API handler must be provided for endpoint `{endpoint}`")]
    MissingHandler { endpoint: String },

    #[error("duplicate route registration: {method} {route}")]
    DuplicateRoute { method: Method, route: String },

    #[error("invalid {side} schema for endpoint `{endpoint}`")]
    InvalidSchema {
        endpoint: String,
        side: SchemaSide,
        #[source]
        source: SchemaCompileError,
    },
}

//! # apibond — single-source API contract
//!
//! One declarative [`Contract`] (endpoint name → method, route, request
//! schema, response schema) from which a client and a server are both
//! mechanically derived, each enforcing the same validation rules:
//!
//! - the client validates outgoing requests, performs the call, and
//!   validates incoming responses;
//! - the server validates incoming requests before handing them to the
//!   registered handler, answering 422 with structured diagnostics when
//!   they do not conform.
//!
//! Because both sides run the same schemas through the same
//! [`SchemaValidator`], client expectations and server behavior cannot
//! drift apart.
//!
//! ```rust,ignore
//! let contract = Arc::new(
//!     Contract::builder()
//!         .endpoint("get_user", Endpoint::new(Method::Get, "/user", req, res))
//!         .build()?,
//! );
//! let validator = Arc::new(JsonSchemaValidator::new());
//!
//! // Server
//! let router = ServerBuilder::new(contract.clone(), validator.clone())
//!     .handler_fn("get_user", get_user)
//!     .build()?;
//!
//! // Client
//! let transport = Arc::new(HttpTransport::new("http://localhost:8087"));
//! let client = ApiClient::new(contract, transport, validator)?;
//! let user = client.call("get_user", json!({"id": 1})).await?;
//! ```

pub mod client;
pub mod contract;
pub mod error;
pub mod server;
pub mod validate;

pub use client::{
    ApiClient, CallError, CallFailure, FailureDetail, HttpTransport, Transport, TransportFailure,
};
pub use contract::{Contract, ContractBuilder, Endpoint, Method};
pub use error::{ConfigError, SchemaCompileError, SchemaSide};
pub use server::{ApiHandler, ApiRequest, ErrorResponse, HandlerMap, ServerBuilder};
pub use validate::{JsonSchemaValidator, SchemaValidator, ValidationErrorDetail, Verdict};

//! Demo users API: one contract, one server, one client.
//!
//! Everything here derives from [`contract::users_contract`]; the router
//! and the client never restate a route, method or schema.

use std::sync::Arc;

use axum::Router;

use apibond::{ApiClient, ConfigError, HttpTransport, JsonSchemaValidator, ServerBuilder};

pub mod contract;
pub mod dto;
pub mod handlers;
pub mod service;

pub use contract::users_contract;
pub use service::UserStore;

/// Build the mountable users router over the given store.
pub fn router(store: Arc<UserStore>) -> Result<Router, ConfigError> {
    let contract = Arc::new(users_contract()?);
    let validator = Arc::new(JsonSchemaValidator::new());
    ServerBuilder::new(contract, validator)
        .handlers(handlers::handlers(store))
        .build()
}

/// Build a contract-checked client for a server mounted at `base_url`.
pub fn client(base_url: impl Into<String>) -> Result<ApiClient, ConfigError> {
    let contract = Arc::new(users_contract()?);
    let transport = Arc::new(HttpTransport::new(base_url));
    let validator = Arc::new(JsonSchemaValidator::new());
    ApiClient::new(contract, transport, validator)
}

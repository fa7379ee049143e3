//! Handlers for the users contract.
//!
//! Bodies arrive already validated against the contract schemas; handlers
//! deserialize into DTOs, run the domain logic and fully own the response.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

use apibond::{ApiRequest, HandlerMap};

use crate::dto::{CreateUserReq, GetUserReq, ListUsersQuery, UserDto, UserListDto};
use crate::service::{DomainError, UserStore};

const DEFAULT_LIMIT: usize = 50;

/// Wire every contract endpoint to its handler.
pub fn handlers(store: Arc<UserStore>) -> HandlerMap {
    let get_store = store.clone();
    let list_store = store.clone();
    let create_store = store;

    HandlerMap::new()
        .insert_fn("get_user", move |req| {
            let store = get_store.clone();
            async move { get_user(store, req).await }
        })
        .insert_fn("list_users", move |req| {
            let store = list_store.clone();
            async move { list_users(store, req).await }
        })
        .insert_fn("create_user", move |req| {
            let store = create_store.clone();
            async move { create_user(store, req).await }
        })
}

async fn get_user(store: Arc<UserStore>, req: ApiRequest) -> Response {
    let body: GetUserReq = match serde_json::from_value(req.body) {
        Ok(body) => body,
        Err(err) => return malformed(err),
    };
    info!("Getting user with id: {}", body.id);

    match store.get(body.id) {
        Ok(user) => Json(UserDto::from(user)).into_response(),
        Err(e) => {
            error!("Failed to get user {}: {}", body.id, e);
            domain_error(&e)
        }
    }
}

async fn list_users(store: Arc<UserStore>, req: ApiRequest) -> Response {
    let query: ListUsersQuery = match serde_json::from_value(req.body) {
        Ok(query) => query,
        Err(err) => return malformed(err),
    };
    info!("Listing users with query: {:?}", query);

    let limit = query.limit.map(|l| l as usize).unwrap_or(DEFAULT_LIMIT);
    let offset = query.offset.map(|o| o as usize).unwrap_or(0);
    let (users, total) = store.list(limit, offset);
    Json(UserListDto {
        users: users.into_iter().map(UserDto::from).collect(),
        total,
    })
    .into_response()
}

async fn create_user(store: Arc<UserStore>, req: ApiRequest) -> Response {
    let body: CreateUserReq = match serde_json::from_value(req.body) {
        Ok(body) => body,
        Err(err) => return malformed(err),
    };
    info!("Creating user: {:?}", body);

    match store.create(body.email, body.display_name) {
        Ok(user) => (StatusCode::CREATED, Json(UserDto::from(user))).into_response(),
        Err(e) => {
            error!("Failed to create user: {}", e);
            domain_error(&e)
        }
    }
}

/// The schema admits the shape but the DTO does not (e.g. a string id that
/// is not a UUID). Handler-owned, so a plain 400.
fn malformed(err: serde_json::Error) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"msg": format!("malformed request body: {err}")})),
    )
        .into_response()
}

fn domain_error(error: &DomainError) -> Response {
    let status = match error {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::EmailAlreadyExists { .. } => StatusCode::CONFLICT,
    };
    (status, Json(json!({"msg": error.to_string()}))).into_response()
}

//! End-to-end tests: the generated client talking to the generated server,
//! both derived from the same contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use apibond::{
    ApiClient, CallError, JsonSchemaValidator, Method, Transport, TransportFailure,
};
use users_api::{users_contract, UserStore};

/// Transport that drives the axum router in-process, one `oneshot` per
/// call. Lets the client and server halves of the contract meet without a
/// network.
struct RouterTransport {
    router: Router,
    calls: AtomicUsize,
}

impl RouterTransport {
    fn new(router: Router) -> Arc<Self> {
        Arc::new(Self {
            router,
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RouterTransport {
    async fn invoke(
        &self,
        method: Method,
        route: &str,
        body: &Value,
    ) -> Result<Value, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let request = match method {
            Method::Get | Method::Delete => {
                let pairs: Vec<(String, String)> = match body {
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
                };
                let query = serde_urlencoded::to_string(&pairs)
                    .map_err(|err| TransportFailure::from_error(err.to_string()))?;
                let uri = if query.is_empty() {
                    route.to_string()
                } else {
                    format!("{route}?{query}")
                };
                Request::builder()
                    .method(method.as_str().to_uppercase().as_str())
                    .uri(uri)
                    .body(Body::empty())
            }
            _ => Request::builder()
                .method(method.as_str().to_uppercase().as_str())
                .uri(route)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
        }
        .map_err(|err| TransportFailure::from_error(err.to_string()))?;

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|err| TransportFailure::from_error(err.to_string()))?;

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|err| TransportFailure::from_error(err.to_string()))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
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

        Ok(match parsed {
            Some(body) => body,
            None if text.is_empty() => Value::Null,
            None => Value::String(text),
        })
    }
}

fn wired_client() -> (ApiClient, Arc<RouterTransport>) {
    let store = Arc::new(UserStore::new());
    let router = users_api::router(store).expect("router construction");
    let transport = RouterTransport::new(router);
    let contract = Arc::new(users_contract().unwrap());
    let client = ApiClient::new(
        contract,
        transport.clone(),
        Arc::new(JsonSchemaValidator::new()),
    )
    .expect("client construction");
    (client, transport)
}

#[tokio::test]
async fn create_get_list_through_the_contract() {
    let (client, _transport) = wired_client();

    let created = client
        .call(
            "create_user",
            json!({"email": "alice@example.com", "display_name": "Alice"}),
        )
        .await
        .expect("create_user");
    assert_eq!(created["email"], json!("alice@example.com"));
    let id = created["id"].as_str().unwrap().to_string();

    let fetched = client
        .call("get_user", json!({"id": id}))
        .await
        .expect("get_user");
    assert_eq!(fetched, created);

    let listed = client
        .call("list_users", json!({"limit": 10, "offset": 0}))
        .await
        .expect("list_users");
    assert_eq!(listed["total"], json!(1));
    assert_eq!(listed["users"][0], created);
}

#[tokio::test]
async fn invalid_request_never_reaches_the_server() {
    let (client, transport) = wired_client();

    let err = client
        .call("create_user", json!({"email": "alice@example.com"}))
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::RequestValidation(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn client_and_server_agree_on_what_is_invalid() {
    let bad_payload = json!({"email": 7, "display_name": "Alice"});

    // Client-side verdict.
    let (client, _transport) = wired_client();
    let err = client.call("create_user", bad_payload.clone()).await.unwrap_err();
    assert!(matches!(err, CallError::RequestValidation(_)));

    // Server-side verdict for the same payload, same contract.
    let store = Arc::new(UserStore::new());
    let router = users_api::router(store).unwrap();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users")
                .header("content-type", "application/json")
                .body(Body::from(bad_payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn domain_conflict_surfaces_as_a_transport_failure() {
    let (client, _transport) = wired_client();
    let payload = json!({"email": "alice@example.com", "display_name": "Alice"});

    client.call("create_user", payload.clone()).await.unwrap();
    let err = client.call("create_user", payload).await.unwrap_err();

    let failure = match &err {
        CallError::Transport(failure) => failure,
        other => panic!("expected transport failure, got {other:?}"),
    };
    assert_eq!(failure.msg, "API call failed");
    let serialized = serde_json::to_value(failure).unwrap();
    assert!(serialized["err"]["msg"]
        .as_str()
        .unwrap()
        .contains("already exists"));
}

#[tokio::test]
async fn unknown_user_id_is_a_transport_failure_not_a_contract_violation() {
    let (client, _transport) = wired_client();

    let err = client
        .call(
            "get_user",
            json!({"id": "00000000-0000-0000-0000-000000000000"}),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Transport(_)));
}

#[tokio::test]
async fn schema_conforming_but_undeserializable_id_is_handler_owned() {
    // "zzz" passes the string schema, so both gates let it through; the
    // handler answers 400 because it is not a UUID.
    let (client, transport) = wired_client();

    let err = client.call("get_user", json!({"id": "zzz"})).await.unwrap_err();
    assert!(matches!(err, CallError::Transport(_)));
    assert_eq!(transport.call_count(), 1);
}

//! The users contract: the single description both the client and the
//! server are derived from.

use apibond::{ConfigError, Contract, Endpoint, Method};
use serde_json::{json, Value};

fn user_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "email": { "type": "string", "minLength": 3 },
            "display_name": { "type": "string", "minLength": 1 },
            "created_at": { "type": "string" }
        },
        "required": ["id", "email", "display_name", "created_at"]
    })
}

/// Build the users contract. Fails only on a malformed declaration, which
/// is a programming error caught at startup.
pub fn users_contract() -> Result<Contract, ConfigError> {
    Contract::builder()
        .endpoint(
            "get_user",
            Endpoint::new(
                Method::Get,
                "/user",
                json!({
                    "type": "object",
                    "properties": { "id": { "type": "string", "minLength": 1 } },
                    "required": ["id"]
                }),
                user_schema(),
            ),
        )
        .endpoint(
            "list_users",
            Endpoint::new(
                Method::Get,
                "/users",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": { "type": "integer", "minimum": 0 },
                        "offset": { "type": "integer", "minimum": 0 }
                    }
                }),
                json!({
                    "type": "object",
                    "properties": {
                        "users": { "type": "array", "items": user_schema() },
                        "total": { "type": "integer" }
                    },
                    "required": ["users", "total"]
                }),
            ),
        )
        .endpoint(
            "create_user",
            Endpoint::new(
                Method::Post,
                "/users",
                json!({
                    "type": "object",
                    "properties": {
                        "email": { "type": "string", "minLength": 3 },
                        "display_name": { "type": "string", "minLength": 1 }
                    },
                    "required": ["email", "display_name"]
                }),
                user_schema(),
            ),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_builds_and_declares_three_endpoints() {
        let contract = users_contract().unwrap();
        assert_eq!(contract.len(), 3);
        assert_eq!(contract.get("create_user").unwrap().method, Method::Post);
    }
}

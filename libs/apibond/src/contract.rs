use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// HTTP verbs an endpoint may declare.
///
/// A closed enum instead of a free-form string: an unsupported method is
/// unrepresentable, so route registration can never hit an unknown verb at
/// request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Patch => "patch",
            Method::Delete => "delete",
        }
    }

    /// Whether request data travels in the query string rather than a body.
    pub(crate) fn carries_query_body(&self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared API endpoint: verb, route and the request/response body
/// schemas it is bound to.
///
/// The schema documents are opaque to this crate; they are handed as-is to
/// the configured [`SchemaValidator`](crate::validate::SchemaValidator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: Method,
    pub route: String,
    pub req_body: Value,
    pub res_body: Value,
}

impl Endpoint {
    /// All four fields are required; there is no partial construction.
    pub fn new(
        method: Method,
        route: impl Into<String>,
        req_body: Value,
        res_body: Value,
    ) -> Self {
        Self {
            method,
            route: route.into(),
            req_body,
            res_body,
        }
    }
}

/// The shared, static description of an API: an ordered set of uniquely
/// named [`Endpoint`]s.
///
/// Built once at startup and shared (via `Arc`) between the client and
/// server factories; immutable afterwards.
#[derive(Debug, Clone)]
pub struct Contract {
    endpoints: Vec<(String, Endpoint)>,
}

impl Contract {
    pub fn builder() -> ContractBuilder {
        ContractBuilder {
            endpoints: Vec::new(),
        }
    }

    /// Look up an endpoint by its contract name.
    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    /// Iterate endpoints in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Endpoint)> {
        self.endpoints.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Builder for [`Contract`]; duplicate names and malformed routes are
/// rejected at `build()` time, before any factory sees the contract.
#[derive(Debug)]
pub struct ContractBuilder {
    endpoints: Vec<(String, Endpoint)>,
}

impl ContractBuilder {
    pub fn endpoint(mut self, name: impl Into<String>, endpoint: Endpoint) -> Self {
        self.endpoints.push((name.into(), endpoint));
        self
    }

    pub fn build(self) -> Result<Contract, ConfigError> {
        for (i, (name, endpoint)) in self.endpoints.iter().enumerate() {
            if !endpoint.route.starts_with('/') {
                return Err(ConfigError::InvalidRoute {
                    name: name.clone(),
                    route: endpoint.route.clone(),
                });
            }
            if self.endpoints[..i].iter().any(|(n, _)| n == name) {
                return Err(ConfigError::DuplicateEndpoint { name: name.clone() });
            }
        }
        Ok(Contract {
            endpoints: self.endpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({"type": "object"})
    }

    #[test]
    fn build_preserves_declaration_order() {
        let contract = Contract::builder()
            .endpoint(
                "get_user",
                Endpoint::new(Method::Get, "/user", schema(), schema()),
            )
            .endpoint(
                "create_user",
                Endpoint::new(Method::Post, "/users", schema(), schema()),
            )
            .build()
            .unwrap();

        let names: Vec<&str> = contract.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["get_user", "create_user"]);
        assert_eq!(contract.get("get_user").unwrap().method, Method::Get);
        assert!(contract.get("delete_user").is_none());
    }

    #[test]
    fn duplicate_endpoint_name_is_rejected() {
        let err = Contract::builder()
            .endpoint(
                "get_user",
                Endpoint::new(Method::Get, "/user", schema(), schema()),
            )
            .endpoint(
                "get_user",
                Endpoint::new(Method::Post, "/user2", schema(), schema()),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigError::DuplicateEndpoint { name } if name == "get_user"));
    }

    #[test]
    fn route_must_be_rooted() {
        let err = Contract::builder()
            .endpoint(
                "get_user",
                Endpoint::new(Method::Get, "user", schema(), schema()),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidRoute { .. }));
    }

    #[test]
    fn method_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Method::Get).unwrap(), json!("get"));
        assert_eq!(Method::Patch.to_string(), "patch");
    }
}

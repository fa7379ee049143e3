//! The validation gate: compile a schema document into a predicate and test
//! a value against it.
//!
//! The gate is deliberately dumb. It interprets nothing itself; the compiled
//! predicate is authoritative for optional fields, nested shapes, type
//! constraints and everything else the schema dialect supports. Both the
//! client and the server factories run every payload through the same gate,
//! which is what keeps the two sides of the wire in agreement.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::SchemaCompileError;

/// One structured diagnostic from a failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Human-readable description of the violation.
    pub detail: String,
    /// JSON Pointer to the offending location (e.g. "/user/email").
    pub pointer: String,
}

/// Outcome of testing one value against one schema. Never partially valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(Vec<ValidationErrorDetail>),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn into_errors(self) -> Vec<ValidationErrorDetail> {
        match self {
            Verdict::Valid => Vec::new(),
            Verdict::Invalid(errors) => errors,
        }
    }
}

/// The schema capability behind the gate.
///
/// Two operations: `prepare` compiles a schema document (factories call it
/// eagerly so a broken schema aborts startup instead of the first request),
/// and `check` tests a value. `check` must be a pure function of
/// (schema, value): no side effects, no mutation, same verdict on repeat
/// calls. A schema that fails to compile at `check` time yields an
/// `Invalid` verdict carrying the compile diagnostic.
pub trait SchemaValidator: Send + Sync {
    fn prepare(&self, schema: &Value) -> Result<(), SchemaCompileError>;
    fn check(&self, schema: &Value, value: &Value) -> Verdict;
}

/// JSON Schema implementation of [`SchemaValidator`], with a cache of
/// compiled validators keyed by a digest of the schema document.
///
/// Recompiling per call would be equally correct; the cache only changes
/// cost, not verdicts.
pub struct JsonSchemaValidator {
    compiled: RwLock<HashMap<String, Arc<jsonschema::Validator>>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(schema: &Value) -> String {
        let bytes = serde_json::to_vec(schema).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    fn compiled_for(
        &self,
        schema: &Value,
    ) -> Result<Arc<jsonschema::Validator>, SchemaCompileError> {
        let key = Self::cache_key(schema);
        if let Some(validator) = self.compiled.read().get(&key) {
            return Ok(validator.clone());
        }

        let validator = jsonschema::validator_for(schema)
            .map_err(|err| SchemaCompileError(err.to_string()))?;
        let validator = Arc::new(validator);
        self.compiled.write().insert(key, validator.clone());
        Ok(validator)
    }
}

impl Default for JsonSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn prepare(&self, schema: &Value) -> Result<(), SchemaCompileError> {
        self.compiled_for(schema).map(|_| ())
    }

    fn check(&self, schema: &Value, value: &Value) -> Verdict {
        let validator = match self.compiled_for(schema) {
            Ok(validator) => validator,
            Err(err) => {
                return Verdict::Invalid(vec![ValidationErrorDetail {
                    detail: err.to_string(),
                    pointer: String::new(),
                }])
            }
        };

        let errors: Vec<ValidationErrorDetail> = validator
            .iter_errors(value)
            .map(|err| ValidationErrorDetail {
                pointer: err.instance_path().to_string(),
                detail: err.to_string(),
            })
            .collect();

        if errors.is_empty() {
            Verdict::Valid
        } else {
            Verdict::Invalid(errors)
        }
    }
}

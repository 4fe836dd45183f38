//! Canonical flattening of raw payloads.
//!
//! Each top-level field of a document collapses to a single scalar:
//! arrays join their elements' text form with commas, nested objects become
//! their compact JSON text, and all-digit strings under numeric-hinted
//! field names are reinterpreted as integers. The projection is
//! intentionally lossy; nothing here round-trips back to the original
//! structure.

use serde_json::{Map, Value};
use shapesense_config::TransformConfig;

use crate::errors::{EngineError, EngineResult};

/// Flattens one raw payload into a canonical scalar map.
#[derive(Debug, Clone, Default)]
pub struct CanonicalTransformer {
    cfg: TransformConfig,
}

impl CanonicalTransformer {
    pub fn new(cfg: TransformConfig) -> Self {
        Self { cfg }
    }

    /// Flatten a document. Each top-level field is handled independently;
    /// a non-object payload cannot be interpreted as a record and is
    /// reported malformed.
    pub fn transform(&self, payload: &Value) -> EngineResult<Map<String, Value>> {
        let Value::Object(obj) = payload else {
            return Err(EngineError::malformed(format!(
                "expected an object payload, got {}",
                shapesense_core::TypeTag::of(payload).as_str()
            )));
        };

        let mut out = Map::with_capacity(obj.len());
        for (name, value) in obj {
            let flat = match value {
                Value::Array(items) => Value::String(join_elements(items)),
                Value::Object(_) => Value::String(value.to_string()),
                scalar => scalar.clone(),
            };
            out.insert(name.clone(), self.maybe_reinterpret(name, flat));
        }
        Ok(out)
    }

    /// Reinterpret an all-ASCII-digit string as an integer when the field
    /// name carries one of the numeric hints. Runs after array/object
    /// flattening, so `["42"]` under such a name also becomes `42`. Digit
    /// strings that overflow `i64` are left as strings.
    fn maybe_reinterpret(&self, name: &str, value: Value) -> Value {
        let Value::String(text) = &value else {
            return value;
        };
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return value;
        }

        let lowered = name.to_lowercase();
        let hinted = self
            .cfg
            .numeric_hints
            .iter()
            .any(|hint| lowered.contains(hint.as_str()));
        if !hinted {
            return value;
        }

        match text.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => value,
        }
    }
}

/// Render array elements to text and join with commas. Strings go in
/// verbatim; every other element uses its compact JSON text, so objects
/// keep their structure as a quoted blob and `null` renders as `null`.
fn join_elements(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

//! JSON payload helpers.
//!
//! [`JsonObject`] builds write payloads as a real map and serializes once.
//! The `make_json_*` / [`combine_json`] / [`get_json_value`] functions are
//! string-in, string-out shims for hosts that pass payloads around as text.

use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{DatabaseError, Result};

/// Placeholder the backend replaces with its own clock at write time.
pub fn server_timestamp() -> String {
    r#"{".sv":"timestamp"}"#.to_string()
}

/// Key/value payload for writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonObject {
    fields: Map<String, Value>,
}

impl JsonObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object. Other JSON values are rejected.
    pub fn parse(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => Ok(Self { fields }),
            Ok(other) => Err(DatabaseError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            ))),
            Err(e) => Err(DatabaseError::InvalidPayload(e.to_string())),
        }
    }

    pub fn with_string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_value(key, Value::String(value.into()))
    }

    pub fn with_int(self, key: impl Into<String>, value: i64) -> Self {
        self.with_value(key, Value::from(value))
    }

    /// Non-finite floats have no JSON form and are stored as `null`.
    pub fn with_float(self, key: impl Into<String>, value: f64) -> Self {
        self.with_value(key, Value::from(value))
    }

    pub fn with_bool(self, key: impl Into<String>, value: bool) -> Self {
        self.with_value(key, Value::Bool(value))
    }

    /// Nested payload, e.g. another object or the server timestamp marker.
    pub fn with_raw(self, key: impl Into<String>, json: &str) -> Result<Self> {
        let value = serde_json::from_str::<Value>(json)
            .map_err(|e| DatabaseError::InvalidPayload(e.to_string()))?;
        Ok(self.with_value(key, value))
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Copy every field of `other` in; later keys overwrite earlier ones.
    pub fn merge(&mut self, other: JsonObject) {
        self.fields.extend(other.fields);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn to_json_string(&self) -> String {
        // A map of `Value`s always serializes.
        serde_json::to_string(&self.fields).unwrap_or_else(|_| "{}".to_string())
    }
}

impl fmt::Display for JsonObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

impl From<JsonObject> for Value {
    fn from(object: JsonObject) -> Self {
        object.into_value()
    }
}

pub fn make_json_string(key: &str, value: &str) -> String {
    JsonObject::new().with_string(key, value).to_json_string()
}

pub fn make_json_int(key: &str, value: i64) -> String {
    JsonObject::new().with_int(key, value).to_json_string()
}

pub fn make_json_float(key: &str, value: f64) -> String {
    JsonObject::new().with_float(key, value).to_json_string()
}

pub fn make_json_bool(key: &str, value: bool) -> String {
    JsonObject::new().with_bool(key, value).to_json_string()
}

/// Merge JSON object fragments into one object.
///
/// Fragments are parsed, so nested values survive intact. A fragment that is
/// not a JSON object is skipped.
pub fn combine_json<S: AsRef<str>>(fragments: &[S]) -> String {
    let mut combined = JsonObject::new();
    for (index, fragment) in fragments.iter().enumerate() {
        match JsonObject::parse(fragment.as_ref()) {
            Ok(object) => combined.merge(object),
            Err(e) => warn!(index, error = %e, "Skipping JSON fragment"),
        }
    }
    combined.to_json_string()
}

/// Value of a top-level field as text.
///
/// Strings come back unquoted, numbers and booleans in their JSON spelling,
/// objects and arrays re-serialized. `None` when the input is not an object
/// or the key is absent.
pub fn get_json_value(json: &str, key: &str) -> Option<String> {
    let object = JsonObject::parse(json).ok()?;
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

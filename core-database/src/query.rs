//! Ordered and filtered reads.

use serde_json::Value;

/// Query parameters for a filtered GET.
///
/// Each filter is independent; unset filters are omitted. Filter values are
/// JSON-encoded, so strings go out quoted and numbers bare, which is what the
/// backend expects when comparing against stored values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    order_by: Option<String>,
    limit_to_first: Option<u32>,
    limit_to_last: Option<u32>,
    start_at: Option<Value>,
    end_at: Option<Value>,
    equal_to: Option<Value>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Order by a child key, or by `$key`, `$value` or `$priority`.
    pub fn order_by(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.order_by = (!key.is_empty()).then_some(key);
        self
    }

    pub fn limit_to_first(mut self, limit: u32) -> Self {
        self.limit_to_first = Some(limit);
        self
    }

    pub fn limit_to_last(mut self, limit: u32) -> Self {
        self.limit_to_last = Some(limit);
        self
    }

    pub fn start_at(mut self, value: impl Into<Value>) -> Self {
        self.start_at = Some(value.into());
        self
    }

    pub fn end_at(mut self, value: impl Into<Value>) -> Self {
        self.end_at = Some(value.into());
        self
    }

    pub fn equal_to(mut self, value: impl Into<Value>) -> Self {
        self.equal_to = Some(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params().is_empty()
    }

    /// Parameters in wire order, values not yet percent-encoded.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(key) = &self.order_by {
            params.push(("orderBy", Value::from(key.as_str()).to_string()));
        }
        if let Some(limit) = self.limit_to_first {
            params.push(("limitToFirst", limit.to_string()));
        }
        if let Some(limit) = self.limit_to_last {
            params.push(("limitToLast", limit.to_string()));
        }
        for (name, value) in [
            ("startAt", &self.start_at),
            ("endAt", &self.end_at),
            ("equalTo", &self.equal_to),
        ] {
            if let Some(value) = value {
                params.push((name, value.to_string()));
            }
        }
        params
    }
}

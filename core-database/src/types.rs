use serde::{Deserialize, Serialize};

use crate::query::Query;

pub use core_auth::NETWORK_ERROR;

/// Outcome of one database operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseResult {
    pub success: bool,
    /// Path the operation addressed; for a push, the path of the new child
    pub path: String,
    /// Raw response body, or the failure text
    pub payload: String,
    pub error_message: String,
}

impl DatabaseResult {
    pub fn succeeded(path: impl Into<String>, body: String) -> Self {
        Self {
            success: true,
            path: path.into(),
            payload: body,
            error_message: String::new(),
        }
    }

    pub fn failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            path: path.into(),
            payload: message.clone(),
            error_message: message,
        }
    }

    /// Non-2xx response. An empty body is replaced by the status line.
    pub fn rejected(path: impl Into<String>, status: u16, body: String) -> Self {
        if body.trim().is_empty() {
            Self::failed(path, format!("HTTP {}", status))
        } else {
            Self::failed(path, body)
        }
    }

    pub fn network_error(path: impl Into<String>) -> Self {
        Self::failed(path, NETWORK_ERROR)
    }
}

/// One database operation with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseOperation {
    /// PUT: replace the subtree
    Set { path: String, json: String },
    /// PATCH: shallow-merge children
    Update { path: String, json: String },
    /// POST: append under a server-generated key
    Push { path: String, json: String },
    Delete { path: String },
    Get { path: String },
    Query { path: String, query: Query },
    /// PUT, last writer wins
    Transaction { path: String, json: String },
}

impl DatabaseOperation {
    pub fn path(&self) -> &str {
        match self {
            DatabaseOperation::Set { path, .. }
            | DatabaseOperation::Update { path, .. }
            | DatabaseOperation::Push { path, .. }
            | DatabaseOperation::Delete { path }
            | DatabaseOperation::Get { path }
            | DatabaseOperation::Query { path, .. }
            | DatabaseOperation::Transaction { path, .. } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DatabaseOperation::Set { .. } => "setValue",
            DatabaseOperation::Update { .. } => "updateValue",
            DatabaseOperation::Push { .. } => "pushValue",
            DatabaseOperation::Delete { .. } => "deleteValue",
            DatabaseOperation::Get { .. } => "getValue",
            DatabaseOperation::Query { .. } => "queryValues",
            DatabaseOperation::Transaction { .. } => "runTransaction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_envelopes() {
        let network = DatabaseResult::network_error("/scores");
        assert!(!network.success);
        assert_eq!(network.path, "/scores");
        assert_eq!(network.error_message, NETWORK_ERROR);

        let denied = DatabaseResult::rejected("/scores", 401, r#"{"error":"Permission denied"}"#.to_string());
        assert_eq!(denied.payload, r#"{"error":"Permission denied"}"#);

        let empty = DatabaseResult::rejected("/scores", 500, String::new());
        assert_eq!(empty.error_message, "HTTP 500");
    }

    #[test]
    fn test_operation_path() {
        let op = DatabaseOperation::Query {
            path: "leaderboard".to_string(),
            query: Query::new().limit_to_first(3),
        };
        assert_eq!(op.path(), "leaderboard");
        assert_eq!(op.name(), "queryValues");
    }
}

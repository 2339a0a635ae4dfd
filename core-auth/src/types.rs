use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credentials::Credentials;

/// Message reported when a request never produced a response.
pub const NETWORK_ERROR: &str = "Network error";

/// Outcome of one auth operation.
///
/// On failure `payload` and `error_message` both carry the backend's raw
/// body (or the network sentinel), so neither is ever empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub success: bool,
    pub operation: String,
    /// Raw response body
    pub payload: String,
    pub error_message: String,
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    /// ID token after the operation
    pub auth_token: String,
    pub email_verified: bool,
}

impl AuthResult {
    /// Success envelope built from the response body.
    ///
    /// Profile fields come from the body (the first `users` entry for a
    /// lookup) and fall back to the cached session for anything missing.
    pub fn succeeded(operation: &str, body: String, session: &Credentials) -> Self {
        let parsed = serde_json::from_str::<Value>(&body).ok();
        let record = parsed.as_ref().map(|value| {
            value
                .get("users")
                .and_then(|users| users.get(0))
                .unwrap_or(value)
        });
        let field = |keys: &[&str]| -> Option<String> {
            let record = record?;
            keys.iter()
                .find_map(|key| record.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        };

        Self {
            success: true,
            operation: operation.to_string(),
            user_id: field(&["localId", "user_id"]).unwrap_or_else(|| session.user_id.clone()),
            email: field(&["email"]).unwrap_or_else(|| session.email.clone()),
            display_name: field(&["displayName"]).unwrap_or_default(),
            auth_token: field(&["idToken", "id_token"])
                .unwrap_or_else(|| session.id_token.clone()),
            email_verified: record
                .and_then(|r| r.get("emailVerified"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            payload: body,
            error_message: String::new(),
        }
    }

    /// Failure envelope carrying `message` as both payload and error.
    pub fn failed(operation: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            operation: operation.to_string(),
            payload: message.clone(),
            error_message: message,
            ..Self::default()
        }
    }

    /// Failure envelope for a non-2xx response.
    pub fn rejected(operation: &str, status: u16, body: String) -> Self {
        if body.trim().is_empty() {
            Self::failed(operation, format!("HTTP {}", status))
        } else {
            Self::failed(operation, body)
        }
    }

    pub fn network_error(operation: &str) -> Self {
        Self::failed(operation, NETWORK_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_reads_body_fields() {
        let result = AuthResult::succeeded(
            "signIn",
            r#"{"localId":"uid","email":"a@b.c","displayName":"Ada","idToken":"tok"}"#.to_string(),
            &Credentials::default(),
        );

        assert!(result.success);
        assert_eq!(result.user_id, "uid");
        assert_eq!(result.email, "a@b.c");
        assert_eq!(result.display_name, "Ada");
        assert_eq!(result.auth_token, "tok");
        assert!(result.error_message.is_empty());
    }

    #[test]
    fn test_lookup_reads_first_user() {
        let result = AuthResult::succeeded(
            "getUser",
            r#"{"kind":"x","users":[{"localId":"uid","email":"a@b.c","emailVerified":true}]}"#
                .to_string(),
            &Credentials::default(),
        );

        assert_eq!(result.user_id, "uid");
        assert!(result.email_verified);
    }

    #[test]
    fn test_success_falls_back_to_session() {
        let session = Credentials {
            id_token: "cached-tok".to_string(),
            user_id: "cached-uid".to_string(),
            email: "cached@b.c".to_string(),
            ..Credentials::default()
        };
        let result = AuthResult::succeeded("sendPasswordReset", "{}".to_string(), &session);

        assert_eq!(result.user_id, "cached-uid");
        assert_eq!(result.email, "cached@b.c");
        assert_eq!(result.auth_token, "cached-tok");
    }

    #[test]
    fn test_failures_are_never_empty() {
        let network = AuthResult::network_error("signIn");
        assert!(!network.success);
        assert_eq!(network.error_message, NETWORK_ERROR);
        assert_eq!(network.payload, NETWORK_ERROR);

        let rejected = AuthResult::rejected("signIn", 400, r#"{"error":{"message":"EMAIL_NOT_FOUND"}}"#.to_string());
        assert_eq!(rejected.error_message, r#"{"error":{"message":"EMAIL_NOT_FOUND"}}"#);

        let empty = AuthResult::rejected("signIn", 503, "  ".to_string());
        assert_eq!(empty.error_message, "HTTP 503");
        assert_eq!(empty.payload, "HTTP 503");
    }
}

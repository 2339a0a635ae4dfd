//! Credential cache.
//!
//! Holds the session produced by auth responses and consumed by every
//! authorized call. Writers replace fields under a write lock and readers take
//! a full copy, so a reader never observes half of an update.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Current session credentials. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub id_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
    /// When the ID token stops being accepted, if the backend said so
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn is_signed_in(&self) -> bool {
        !self.id_token.is_empty()
    }

    /// True when the ID token expires within `buffer` of `now`.
    ///
    /// Tokens with unknown lifetime never count as expiring.
    pub fn expires_within(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        let buffer = chrono::Duration::from_std(buffer).unwrap_or(chrono::Duration::zero());
        now.checked_add_signed(buffer)
            .map_or(true, |deadline| deadline >= expires_at)
    }
}

/// Fields found in one auth response body.
///
/// Every field is optional: absent keys leave the cached value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    /// Token lifetime in seconds
    pub expires_in: Option<i64>,
}

impl CredentialUpdate {
    /// Extract credential fields from a response body.
    ///
    /// Accepts the identity toolkit spelling (`idToken`, `localId`,
    /// `expiresIn`) and the token endpoint spelling (`id_token`, `user_id`,
    /// `expires_in`). Malformed JSON yields an empty update.
    pub fn from_response(body: &str) -> Self {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
            return Self::default();
        };

        let string_field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        };

        let expires_in = ["expiresIn", "expires_in"].iter().find_map(|key| {
            match map.get(*key)? {
                Value::String(s) => s.trim().parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            }
        });

        Self {
            id_token: string_field(&["idToken", "id_token"]),
            refresh_token: string_field(&["refreshToken", "refresh_token"]),
            user_id: string_field(&["localId", "user_id"]),
            email: string_field(&["email"]),
            expires_in,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id_token.is_none()
            && self.refresh_token.is_none()
            && self.user_id.is_none()
            && self.email.is_none()
            && self.expires_in.is_none()
    }
}

/// Shared credential store.
#[derive(Debug, Default)]
pub struct CredentialCache {
    inner: RwLock<Credentials>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(credentials),
        }
    }

    // Every write replaces whole fields, so a poisoned lock still holds a
    // coherent value.
    fn read(&self) -> RwLockReadGuard<'_, Credentials> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Credentials> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the whole credential set.
    pub fn snapshot(&self) -> Credentials {
        self.read().clone()
    }

    /// Overwrite the fields present in `update`.
    ///
    /// A new ID token without a lifetime resets `expires_at` to unknown so a
    /// stale expiry never sticks to a fresh token.
    pub fn apply(&self, update: &CredentialUpdate, now: DateTime<Utc>) {
        let mut credentials = self.write();

        if let Some(id_token) = &update.id_token {
            credentials.id_token = id_token.clone();
            credentials.expires_at = None;
        }
        if let Some(refresh_token) = &update.refresh_token {
            credentials.refresh_token = refresh_token.clone();
        }
        if let Some(user_id) = &update.user_id {
            credentials.user_id = user_id.clone();
        }
        if let Some(email) = &update.email {
            credentials.email = email.clone();
        }
        if let Some(seconds) = update.expires_in {
            credentials.expires_at = chrono::Duration::try_seconds(seconds)
                .and_then(|lifetime| now.checked_add_signed(lifetime));
        }
    }

    pub fn clear(&self) {
        *self.write() = Credentials::default();
    }

    pub fn id_token(&self) -> String {
        self.read().id_token.clone()
    }

    pub fn refresh_token(&self) -> String {
        self.read().refresh_token.clone()
    }

    pub fn user_id(&self) -> String {
        self.read().user_id.clone()
    }

    pub fn email(&self) -> String {
        self.read().email.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.read().is_signed_in()
    }

    /// A refresh is due and possible.
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        let credentials = self.read();
        !credentials.refresh_token.is_empty() && credentials.expires_within(now, buffer)
    }
}

/// Supplies the ID token attached to authorized calls.
///
/// Read at request time, never captured earlier, so a refresh that lands
/// before a call is built is picked up by that call.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current ID token; empty when signed out.
    async fn id_token(&self) -> String;
}

#[async_trait]
impl TokenSource for CredentialCache {
    async fn id_token(&self) -> String {
        CredentialCache::id_token(self)
    }
}

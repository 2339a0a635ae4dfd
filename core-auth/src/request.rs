//! Auth operation payloads.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::endpoints::AuthEndpoint;

/// One identity operation with its caller-supplied inputs.
///
/// Tokens are not part of the request: they are read from the credential
/// cache when the request is sent.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthRequest {
    SignUp { email: String, password: String },
    SignIn { email: String, password: String },
    SignInAnonymously,
    /// `None` uses the cached refresh token.
    RefreshToken { refresh_token: Option<String> },
    SendPasswordReset { email: String },
    UpdateEmail { email: String },
    UpdatePassword { password: String },
    UpdateProfile {
        display_name: String,
        photo_url: String,
    },
    SendEmailVerification,
    DeleteAccount,
    GetUser,
    SignInWithGoogle,
}

impl AuthRequest {
    /// Operation name carried in results and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            AuthRequest::SignUp { .. } => "signUp",
            AuthRequest::SignIn { .. } => "signIn",
            AuthRequest::SignInAnonymously => "signInAnonymously",
            AuthRequest::RefreshToken { .. } => "refreshToken",
            AuthRequest::SendPasswordReset { .. } => "sendPasswordReset",
            AuthRequest::UpdateEmail { .. } => "updateEmail",
            AuthRequest::UpdatePassword { .. } => "updatePassword",
            AuthRequest::UpdateProfile { .. } => "updateProfile",
            AuthRequest::SendEmailVerification => "sendEmailVerification",
            AuthRequest::DeleteAccount => "deleteAccount",
            AuthRequest::GetUser => "getUser",
            AuthRequest::SignInWithGoogle => "signInWithGoogle",
        }
    }

    /// Endpoint the request posts to. `None` for operations the REST
    /// transport cannot perform.
    pub fn endpoint(&self) -> Option<AuthEndpoint> {
        let endpoint = match self {
            AuthRequest::SignUp { .. } | AuthRequest::SignInAnonymously => AuthEndpoint::SignUp,
            AuthRequest::SignIn { .. } => AuthEndpoint::SignInWithPassword,
            AuthRequest::RefreshToken { .. } => AuthEndpoint::RefreshToken,
            AuthRequest::SendPasswordReset { .. } => AuthEndpoint::PasswordReset,
            AuthRequest::UpdateEmail { .. }
            | AuthRequest::UpdatePassword { .. }
            | AuthRequest::UpdateProfile { .. } => AuthEndpoint::Update,
            AuthRequest::SendEmailVerification => AuthEndpoint::EmailVerification,
            AuthRequest::DeleteAccount => AuthEndpoint::Delete,
            AuthRequest::GetUser => AuthEndpoint::Lookup,
            AuthRequest::SignInWithGoogle => return None,
        };
        Some(endpoint)
    }

    /// Whether a successful response overwrites the credential cache.
    pub fn caches_tokens(&self) -> bool {
        !matches!(
            self,
            AuthRequest::SendPasswordReset { .. }
                | AuthRequest::SendEmailVerification
                | AuthRequest::DeleteAccount
                | AuthRequest::GetUser
                | AuthRequest::SignInWithGoogle
        )
    }

    /// Whether the payload carries the current ID token.
    pub fn requires_id_token(&self) -> bool {
        matches!(
            self,
            AuthRequest::UpdateEmail { .. }
                | AuthRequest::UpdatePassword { .. }
                | AuthRequest::UpdateProfile { .. }
                | AuthRequest::SendEmailVerification
                | AuthRequest::DeleteAccount
                | AuthRequest::GetUser
        )
    }

    /// JSON body for the request.
    pub fn payload(&self, id_token: &str, cached_refresh_token: &str) -> Value {
        match self {
            AuthRequest::SignUp { email, password } | AuthRequest::SignIn { email, password } => {
                json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                })
            }
            AuthRequest::SignInAnonymously => json!({ "returnSecureToken": true }),
            AuthRequest::RefreshToken { refresh_token } => json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token.as_deref().unwrap_or(cached_refresh_token),
            }),
            AuthRequest::SendPasswordReset { email } => json!({
                "requestType": "PASSWORD_RESET",
                "email": email,
            }),
            AuthRequest::UpdateEmail { email } => json!({
                "idToken": id_token,
                "email": email,
                "returnSecureToken": true,
            }),
            AuthRequest::UpdatePassword { password } => json!({
                "idToken": id_token,
                "password": password,
                "returnSecureToken": true,
            }),
            AuthRequest::UpdateProfile {
                display_name,
                photo_url,
            } => {
                let mut body = Map::new();
                body.insert("idToken".to_string(), Value::from(id_token));
                if !display_name.is_empty() {
                    body.insert("displayName".to_string(), Value::from(display_name.as_str()));
                }
                if !photo_url.is_empty() {
                    body.insert("photoUrl".to_string(), Value::from(photo_url.as_str()));
                }
                body.insert("returnSecureToken".to_string(), Value::Bool(true));
                Value::Object(body)
            }
            AuthRequest::SendEmailVerification => json!({
                "requestType": "VERIFY_EMAIL",
                "idToken": id_token,
            }),
            AuthRequest::DeleteAccount | AuthRequest::GetUser => json!({ "idToken": id_token }),
            AuthRequest::SignInWithGoogle => Value::Object(Map::new()),
        }
    }
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthRequest::SignUp { email, .. } | AuthRequest::SignIn { email, .. } => f
                .debug_struct(self.name())
                .field("email", email)
                .field("password", &"[REDACTED]")
                .finish(),
            AuthRequest::UpdatePassword { .. } => f
                .debug_struct(self.name())
                .field("password", &"[REDACTED]")
                .finish(),
            AuthRequest::RefreshToken { refresh_token } => f
                .debug_struct(self.name())
                .field("explicit_token", &refresh_token.is_some())
                .finish(),
            AuthRequest::SendPasswordReset { email } | AuthRequest::UpdateEmail { email } => f
                .debug_struct(self.name())
                .field("email", email)
                .finish(),
            AuthRequest::UpdateProfile {
                display_name,
                photo_url,
            } => f
                .debug_struct(self.name())
                .field("display_name", display_name)
                .field("photo_url", photo_url)
                .finish(),
            _ => f.write_str(self.name()),
        }
    }
}

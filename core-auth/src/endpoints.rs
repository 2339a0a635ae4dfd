//! Identity endpoint table.

use url::Url;

use crate::error::{AuthError, Result};

pub const IDENTITY_TOOLKIT_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
pub const SECURE_TOKEN_BASE: &str = "https://securetoken.googleapis.com/v1";

/// The fixed identity endpoints. Every auth operation posts to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEndpoint {
    SignUp,
    SignInWithPassword,
    RefreshToken,
    PasswordReset,
    Update,
    Delete,
    Lookup,
    EmailVerification,
}

impl AuthEndpoint {
    pub const ALL: [AuthEndpoint; 8] = [
        AuthEndpoint::SignUp,
        AuthEndpoint::SignInWithPassword,
        AuthEndpoint::RefreshToken,
        AuthEndpoint::PasswordReset,
        AuthEndpoint::Update,
        AuthEndpoint::Delete,
        AuthEndpoint::Lookup,
        AuthEndpoint::EmailVerification,
    ];

    /// Path below the service base.
    fn path(&self) -> &'static str {
        match self {
            AuthEndpoint::SignUp => "accounts:signUp",
            AuthEndpoint::SignInWithPassword => "accounts:signInWithPassword",
            AuthEndpoint::RefreshToken => "token",
            // Reset mail and verification mail share the out-of-band code endpoint.
            AuthEndpoint::PasswordReset | AuthEndpoint::EmailVerification => {
                "accounts:sendOobCode"
            }
            AuthEndpoint::Update => "accounts:update",
            AuthEndpoint::Delete => "accounts:delete",
            AuthEndpoint::Lookup => "accounts:lookup",
        }
    }
}

/// Endpoint URLs resolved against the configured service bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    identity_base: String,
    token_base: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self::new(IDENTITY_TOOLKIT_BASE, SECURE_TOKEN_BASE)
    }
}

impl AuthEndpoints {
    pub fn new(identity_base: impl Into<String>, token_base: impl Into<String>) -> Self {
        Self {
            identity_base: identity_base.into().trim_end_matches('/').to_string(),
            token_base: token_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL without the API key.
    pub fn url(&self, endpoint: AuthEndpoint) -> String {
        let base = match endpoint {
            AuthEndpoint::RefreshToken => &self.token_base,
            _ => &self.identity_base,
        };
        format!("{}/{}", base, endpoint.path())
    }

    /// URL with the API key as the `key` query parameter.
    pub fn url_with_key(&self, endpoint: AuthEndpoint, api_key: &str) -> Result<Url> {
        Url::parse_with_params(&self.url(endpoint), &[("key", api_key)])
            .map_err(|e| AuthError::InvalidEndpoint(format!("{}: {}", self.url(endpoint), e)))
    }
}

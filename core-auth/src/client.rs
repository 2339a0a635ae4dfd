//! # Auth REST Client
//!
//! Sends identity operations to the fixed endpoint table and keeps the
//! credential cache in step with the responses.
//!
//! ## Overview
//!
//! Every operation is a JSON `POST` with the API key as the `key` query
//! parameter. The client never retries and never raises: each call resolves
//! into an [`AuthResult`].
//!
//! - 2xx: the body is returned; caching operations overwrite the cache with
//!   whatever credential fields the body contains.
//! - other statuses: failure with the raw body as the message.
//! - no response: failure with the `"Network error"` sentinel.
//!
//! ## Token freshness
//!
//! Operations that carry the ID token read it through
//! [`AuthRestClient::fresh_id_token`], which refreshes first when the cached
//! token is about to expire. Database clients use the same path through the
//! [`TokenSource`] impl.
//!
//! ```no_run
//! use std::sync::Arc;
//! use bridge_traits::{HttpClient, SystemClock};
//! use core_auth::AuthRestClient;
//!
//! # async fn demo(http: Arc<dyn HttpClient>) -> Result<(), Box<dyn std::error::Error>> {
//! let client = AuthRestClient::new(http, "AIza...", Arc::new(SystemClock))?;
//! let result = client.sign_in("player@example.com", "secret").await;
//! if result.success {
//!     println!("signed in as {}", result.user_id);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{Clock, HttpClient, HttpMethod, HttpRequest};
use core_runtime::config::{FirebaseConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TOKEN_REFRESH_BUFFER};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::credentials::{CredentialCache, CredentialUpdate, Credentials, TokenSource};
use crate::endpoints::{AuthEndpoint, AuthEndpoints};
use crate::error::{AuthError, Result};
use crate::request::AuthRequest;
use crate::types::AuthResult;

pub const GOOGLE_UNSUPPORTED: &str = "Google Sign-In is not supported by the REST transport";

pub struct AuthRestClient {
    http: Arc<dyn HttpClient>,
    endpoints: AuthEndpoints,
    api_key: String,
    credentials: Arc<CredentialCache>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    request_timeout: Duration,
    refresh_buffer: Duration,
    verbose_http: bool,
    /// Serializes refreshes so concurrent callers share one round trip
    refresh_lock: Mutex<()>,
}

impl AuthRestClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AuthError::MissingApiKey);
        }

        Ok(Self {
            http,
            endpoints: AuthEndpoints::default(),
            api_key,
            credentials: Arc::new(CredentialCache::new()),
            clock,
            event_bus: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_buffer: DEFAULT_TOKEN_REFRESH_BUFFER,
            verbose_http: false,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Build a client from validated settings.
    pub fn from_config(config: &FirebaseConfig, event_bus: EventBus) -> Result<Self> {
        Ok(Self::new(
            Arc::clone(&config.http_client),
            config.api_key.clone(),
            Arc::clone(&config.clock),
        )?
        .with_endpoints(AuthEndpoints::new(
            config.identity_base_url.clone(),
            config.token_base_url.clone(),
        ))
        .with_event_bus(event_bus)
        .with_request_timeout(config.request_timeout)
        .with_refresh_buffer(config.token_refresh_buffer)
        .with_verbose_http(config.verbose_http))
    }

    pub fn with_endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Share an existing cache instead of the client's own.
    pub fn with_credentials(mut self, credentials: Arc<CredentialCache>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    /// Log request and response bodies at `trace`.
    pub fn with_verbose_http(mut self, enabled: bool) -> Self {
        self.verbose_http = enabled;
        self
    }

    pub fn credentials(&self) -> Arc<CredentialCache> {
        Arc::clone(&self.credentials)
    }

    /// Run one auth operation to completion.
    #[instrument(skip(self, request), fields(operation = request.name()))]
    pub async fn execute(&self, request: AuthRequest) -> AuthResult {
        let Some(endpoint) = request.endpoint() else {
            warn!("Operation has no REST endpoint");
            let result = AuthResult::failed(request.name(), GOOGLE_UNSUPPORTED);
            self.emit_failure(&result);
            return result;
        };

        let id_token = if request.requires_id_token() {
            self.fresh_id_token().await
        } else {
            String::new()
        };
        let refresh_token = self.credentials.refresh_token();

        self.perform(&request, endpoint, &id_token, &refresh_token)
            .await
    }

    /// Single round trip; never refreshes, so the refresh path can reuse it.
    async fn perform(
        &self,
        request: &AuthRequest,
        endpoint: AuthEndpoint,
        id_token: &str,
        refresh_token: &str,
    ) -> AuthResult {
        let operation = request.name();

        let url = match self.endpoints.url_with_key(endpoint, &self.api_key) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot build endpoint URL");
                let result = AuthResult::failed(operation, e.to_string());
                self.emit_failure(&result);
                return result;
            }
        };

        let payload = request.payload(id_token, refresh_token);
        if self.verbose_http {
            trace!(body = %redacted_payload(&payload), "Auth request body");
        }
        let http_request = match HttpRequest::new(HttpMethod::Post, url.as_str()).json(&payload) {
            Ok(http_request) => http_request.timeout(self.request_timeout),
            Err(e) => {
                let result = AuthResult::failed(operation, AuthError::Payload(e.to_string()).to_string());
                self.emit_failure(&result);
                return result;
            }
        };

        debug!(endpoint = ?endpoint, "Sending auth request");
        let response = match self.http.execute(http_request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Auth request got no response");
                let result = AuthResult::network_error(operation);
                self.emit_failure(&result);
                return result;
            }
        };

        let status = response.status;
        let body = response.text_lossy();
        if self.verbose_http {
            trace!(status, body_len = body.len(), "Auth response received");
        }

        if !response.is_success() {
            warn!(status, "Auth request rejected");
            let result = AuthResult::rejected(operation, status, body);
            self.emit_failure(&result);
            return result;
        }

        if request.caches_tokens() {
            let update = CredentialUpdate::from_response(&body);
            self.credentials.apply(&update, self.clock.now());
            self.emit_session_change(request, &update);
        }

        if matches!(request, AuthRequest::DeleteAccount) {
            info!("Account deleted, clearing session");
            self.credentials.clear();
            self.emit(AuthEvent::SignedOut);
        }

        debug!(status, "Auth request succeeded");
        AuthResult::succeeded(operation, body, &self.credentials.snapshot())
    }

    /// Current ID token, refreshed first when it is close to expiry.
    ///
    /// A failed refresh is logged and the current token is returned anyway;
    /// the backend decides whether it is still good.
    pub async fn fresh_id_token(&self) -> String {
        let buffer = self.refresh_buffer;
        if !self.credentials.needs_refresh(self.clock.now(), buffer) {
            return self.credentials.id_token();
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if !self.credentials.needs_refresh(self.clock.now(), buffer) {
            debug!("Token already refreshed by a concurrent caller");
            return self.credentials.id_token();
        }

        info!("ID token expiring soon, refreshing");
        let refresh = AuthRequest::RefreshToken { refresh_token: None };
        let refresh_token = self.credentials.refresh_token();
        let result = self
            .perform(&refresh, AuthEndpoint::RefreshToken, "", &refresh_token)
            .await;
        if !result.success {
            warn!("Token refresh failed, using current token");
        }

        self.credentials.id_token()
    }

    fn emit_session_change(&self, request: &AuthRequest, update: &CredentialUpdate) {
        if update.id_token.is_none() {
            return;
        }
        let snapshot = self.credentials.snapshot();
        match request {
            AuthRequest::SignUp { .. } | AuthRequest::SignIn { .. } | AuthRequest::SignInAnonymously => {
                info!(user_id = %snapshot.user_id, "Signed in");
                self.emit(AuthEvent::SignedIn {
                    user_id: snapshot.user_id,
                });
            }
            _ => {
                debug!("ID token replaced");
                self.emit(AuthEvent::TokenRefreshed {
                    user_id: snapshot.user_id,
                    expires_at: snapshot.expires_at.map(|at| at.timestamp()),
                });
            }
        }
    }

    fn emit_failure(&self, result: &AuthResult) {
        self.emit(AuthEvent::AuthFailed {
            operation: result.operation.clone(),
            message: result.error_message.clone(),
        });
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine.
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult {
        self.execute(AuthRequest::SignUp {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult {
        self.execute(AuthRequest::SignIn {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    pub async fn sign_in_anonymously(&self) -> AuthResult {
        self.execute(AuthRequest::SignInAnonymously).await
    }

    pub async fn sign_in_with_google(&self) -> AuthResult {
        self.execute(AuthRequest::SignInWithGoogle).await
    }

    /// Exchange a refresh token for a new ID token. Empty uses the cached one.
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult {
        let refresh_token = (!refresh_token.is_empty()).then(|| refresh_token.to_string());
        self.execute(AuthRequest::RefreshToken { refresh_token })
            .await
    }

    pub async fn send_password_reset(&self, email: &str) -> AuthResult {
        self.execute(AuthRequest::SendPasswordReset {
            email: email.to_string(),
        })
        .await
    }

    pub async fn update_email(&self, email: &str) -> AuthResult {
        self.execute(AuthRequest::UpdateEmail {
            email: email.to_string(),
        })
        .await
    }

    pub async fn update_password(&self, password: &str) -> AuthResult {
        self.execute(AuthRequest::UpdatePassword {
            password: password.to_string(),
        })
        .await
    }

    pub async fn update_profile(&self, display_name: &str, photo_url: &str) -> AuthResult {
        self.execute(AuthRequest::UpdateProfile {
            display_name: display_name.to_string(),
            photo_url: photo_url.to_string(),
        })
        .await
    }

    pub async fn send_email_verification(&self) -> AuthResult {
        self.execute(AuthRequest::SendEmailVerification).await
    }

    pub async fn delete_account(&self) -> AuthResult {
        self.execute(AuthRequest::DeleteAccount).await
    }

    pub async fn get_user(&self) -> AuthResult {
        self.execute(AuthRequest::GetUser).await
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub fn sign_out(&self) {
        info!("Signing out");
        self.credentials.clear();
        self.emit(AuthEvent::SignedOut);
    }

    /// Drop cached credentials without announcing a sign-out.
    pub fn clear_tokens(&self) {
        self.credentials.clear();
    }

    pub fn is_signed_in(&self) -> bool {
        self.credentials.is_signed_in()
    }

    pub fn session(&self) -> Credentials {
        self.credentials.snapshot()
    }

    pub fn id_token(&self) -> String {
        self.credentials.id_token()
    }

    pub fn refresh_token_value(&self) -> String {
        self.credentials.refresh_token()
    }

    pub fn user_id(&self) -> String {
        self.credentials.user_id()
    }

    pub fn email(&self) -> String {
        self.credentials.email()
    }
}

#[async_trait]
impl TokenSource for AuthRestClient {
    async fn id_token(&self) -> String {
        self.fresh_id_token().await
    }
}

fn redacted_payload(payload: &serde_json::Value) -> String {
    let Some(map) = payload.as_object() else {
        return payload.to_string();
    };
    let masked: serde_json::Map<_, _> = map
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                serde_json::Value::String(s) => core_runtime::logging::redact_if_sensitive(key, s),
                other => other.to_string(),
            };
            (key.clone(), serde_json::Value::String(rendered))
        })
        .collect();
    serde_json::Value::Object(masked).to_string()
}

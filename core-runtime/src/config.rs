//! # Configuration
//!
//! [`FirebaseConfig`] carries everything the core needs at initialization:
//! project credentials, the resolved database URL, explicit timeouts and the
//! host capabilities (HTTP client, dispatcher, clock). It is built once and
//! never reloaded.
//!
//! ```ignore
//! use core_runtime::config::{DatabaseRegion, FirebaseConfig};
//!
//! let config = FirebaseConfig::builder()
//!     .api_key("AIza...")
//!     .project_id("my-game")
//!     .database_region(DatabaseRegion::EuropeWest)
//!     .build()?;
//!
//! assert_eq!(
//!     config.full_database_url(),
//!     "https://my-game-europe-west1.firebaseio.com"
//! );
//! # Ok::<(), core_runtime::Error>(())
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{CallbackDispatcher, Clock, HttpClient, ImmediateDispatcher, SystemClock};
use serde::{Deserialize, Serialize};

use crate::descriptor::ServicesDescriptor;
use crate::error::{Error, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_TRUSTED_TIME_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_TIME_SERVICE_URL: &str = "https://worldtimeapi.org/api/timezone/Etc/UTC";
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;
pub const DEFAULT_TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";

/// Which transport executes operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportKind {
    /// REST endpoints over the injected `HttpClient`; available everywhere.
    #[default]
    Rest,
    /// Host-provided native SDK bridge.
    Native,
}

/// Realtime Database instance location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DatabaseRegion {
    #[default]
    UsCentral,
    EuropeWest,
    AsiaSoutheast,
}

impl DatabaseRegion {
    /// Suffix appended to the project id in the default database host name.
    pub fn host_suffix(&self) -> &'static str {
        match self {
            DatabaseRegion::UsCentral => "",
            DatabaseRegion::EuropeWest => "-europe-west1",
            DatabaseRegion::AsiaSoutheast => "-asia-southeast1",
        }
    }
}

/// Sign-in providers a project has switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuthProvider {
    Email,
    Google,
    Facebook,
    Anonymous,
    Phone,
}

/// Derive the database base URL.
///
/// An explicit URL wins; otherwise `https://{project}{region}.firebaseio.com`.
/// Trailing slashes are trimmed so paths can be appended directly.
pub fn resolve_database_url(
    explicit: Option<&str>,
    project_id: &str,
    region: DatabaseRegion,
) -> String {
    match explicit.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => url.trim_end_matches('/').to_string(),
        None if project_id.is_empty() => String::new(),
        None => format!(
            "https://{}{}.firebaseio.com",
            project_id,
            region.host_suffix()
        ),
    }
}

/// Validated core configuration.
#[derive(Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    pub app_id: Option<String>,
    /// Resolved database base URL without trailing slash
    pub database_url: String,
    pub database_region: DatabaseRegion,
    pub enable_authentication: bool,
    pub enabled_providers: BTreeSet<AuthProvider>,
    pub enable_database: bool,
    pub transport: TransportKind,
    /// Applied to every auth and database request
    pub request_timeout: Duration,
    pub trusted_time_timeout: Duration,
    pub time_service_url: String,
    /// Upper bound on operations executing at the same time
    pub max_in_flight: usize,
    /// Tokens expiring within this window are refreshed before use
    pub token_refresh_buffer: Duration,
    /// Period of REST value-listener polling
    pub poll_interval: Duration,
    /// Trace request and response bodies
    pub verbose_http: bool,
    pub identity_base_url: String,
    pub token_base_url: String,
    pub http_client: Arc<dyn HttpClient>,
    pub dispatcher: Arc<dyn CallbackDispatcher>,
    pub clock: Arc<dyn Clock>,
}

impl FirebaseConfig {
    /// Creates a new builder for constructing a `FirebaseConfig`.
    pub fn builder() -> FirebaseConfigBuilder {
        FirebaseConfigBuilder::default()
    }

    pub fn full_database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_authentication_configured(&self) -> bool {
        self.enable_authentication && !self.api_key.is_empty() && !self.enabled_providers.is_empty()
    }

    pub fn is_database_configured(&self) -> bool {
        self.enable_database && !self.database_url.is_empty()
    }

    pub fn is_provider_enabled(&self, provider: AuthProvider) -> bool {
        self.enabled_providers.contains(&provider)
    }

    /// Validates the configuration and returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("API key is required".to_string()));
        }

        if self.project_id.trim().is_empty() {
            return Err(Error::Config("Project ID is required".to_string()));
        }

        if self.enable_authentication && self.enabled_providers.is_empty() {
            return Err(Error::Config(
                "At least one authentication provider must be enabled".to_string(),
            ));
        }

        if self.enable_database {
            if self.database_url.is_empty() {
                return Err(Error::Config(
                    "Database URL is required when Realtime Database is enabled".to_string(),
                ));
            }
            if !self.database_url.starts_with("https://") && !self.database_url.starts_with("http://")
            {
                return Err(Error::Config(format!(
                    "Database URL must be an http(s) URL, got '{}'",
                    self.database_url
                )));
            }
        }

        for (name, value) in [
            ("Request timeout", self.request_timeout),
            ("Trusted time timeout", self.trusted_time_timeout),
            ("Poll interval", self.poll_interval),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.max_in_flight == 0 {
            return Err(Error::Config(
                "Max in-flight operations must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("app_id", &self.app_id)
            .field("database_url", &self.database_url)
            .field("database_region", &self.database_region)
            .field("enable_authentication", &self.enable_authentication)
            .field("enabled_providers", &self.enabled_providers)
            .field("enable_database", &self.enable_database)
            .field("transport", &self.transport)
            .field("request_timeout", &self.request_timeout)
            .field("trusted_time_timeout", &self.trusted_time_timeout)
            .field("time_service_url", &self.time_service_url)
            .field("max_in_flight", &self.max_in_flight)
            .field("token_refresh_buffer", &self.token_refresh_buffer)
            .field("poll_interval", &self.poll_interval)
            .field("verbose_http", &self.verbose_http)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "An HttpClient implementation is required for REST calls. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Engine/mobile hosts: inject the platform HTTP adapter."
            .to_string(),
    })
}

/// Builder for [`FirebaseConfig`].
pub struct FirebaseConfigBuilder {
    api_key: Option<String>,
    project_id: Option<String>,
    app_id: Option<String>,
    database_url: Option<String>,
    database_region: DatabaseRegion,
    enable_authentication: bool,
    enabled_providers: BTreeSet<AuthProvider>,
    enable_database: bool,
    transport: TransportKind,
    request_timeout: Duration,
    trusted_time_timeout: Duration,
    time_service_url: String,
    max_in_flight: usize,
    token_refresh_buffer: Duration,
    poll_interval: Duration,
    verbose_http: bool,
    identity_base_url: String,
    token_base_url: String,
    http_client: Option<Arc<dyn HttpClient>>,
    dispatcher: Option<Arc<dyn CallbackDispatcher>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for FirebaseConfigBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: None,
            app_id: None,
            database_url: None,
            database_region: DatabaseRegion::default(),
            enable_authentication: true,
            enabled_providers: [AuthProvider::Email, AuthProvider::Anonymous]
                .into_iter()
                .collect(),
            enable_database: true,
            transport: TransportKind::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            trusted_time_timeout: DEFAULT_TRUSTED_TIME_TIMEOUT,
            time_service_url: DEFAULT_TIME_SERVICE_URL.to_string(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            token_refresh_buffer: DEFAULT_TOKEN_REFRESH_BUFFER,
            poll_interval: DEFAULT_POLL_INTERVAL,
            verbose_http: false,
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            token_base_url: DEFAULT_TOKEN_BASE_URL.to_string(),
            http_client: None,
            dispatcher: None,
            clock: None,
        }
    }
}

impl FirebaseConfigBuilder {
    /// Seed a builder from a parsed vendor descriptor.
    pub fn from_descriptor(descriptor: &ServicesDescriptor) -> Self {
        let mut builder = Self::default().project_id(descriptor.project_id());
        if let Some(api_key) = descriptor.api_key() {
            builder = builder.api_key(api_key);
        }
        if let Some(app_id) = descriptor.app_id() {
            builder = builder.app_id(app_id);
        }
        if let Some(url) = descriptor.database_url() {
            builder = builder.database_url(url);
        }
        builder
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Explicit database URL. Takes precedence over region derivation.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn database_region(mut self, region: DatabaseRegion) -> Self {
        self.database_region = region;
        self
    }

    pub fn enable_authentication(mut self, enabled: bool) -> Self {
        self.enable_authentication = enabled;
        self
    }

    pub fn enable_provider(mut self, provider: AuthProvider) -> Self {
        self.enabled_providers.insert(provider);
        self
    }

    /// Replace the provider set.
    pub fn enabled_providers(mut self, providers: impl IntoIterator<Item = AuthProvider>) -> Self {
        self.enabled_providers = providers.into_iter().collect();
        self
    }

    pub fn enable_database(mut self, enabled: bool) -> Self {
        self.enable_database = enabled;
        self
    }

    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn trusted_time_timeout(mut self, timeout: Duration) -> Self {
        self.trusted_time_timeout = timeout;
        self
    }

    pub fn time_service_url(mut self, url: impl Into<String>) -> Self {
        self.time_service_url = url.into();
        self
    }

    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = limit;
        self
    }

    pub fn token_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.token_refresh_buffer = buffer;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn verbose_http(mut self, enabled: bool) -> Self {
        self.verbose_http = enabled;
        self
    }

    /// Override the identity toolkit base, e.g. for the auth emulator.
    pub fn identity_base_url(mut self, url: impl Into<String>) -> Self {
        self.identity_base_url = url.into();
        self
    }

    pub fn token_base_url(mut self, url: impl Into<String>) -> Self {
        self.token_base_url = url.into();
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn CallbackDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds and validates the final `FirebaseConfig`.
    ///
    /// # Errors
    ///
    /// - `Error::Config` for missing or invalid settings
    /// - `Error::CapabilityMissing` when no `HttpClient` was injected and no
    ///   default is compiled in
    pub fn build(self) -> Result<FirebaseConfig> {
        let api_key = self.api_key.ok_or_else(|| {
            Error::Config("API key is required. Use .api_key() to set it.".to_string())
        })?;

        let project_id = self.project_id.ok_or_else(|| {
            Error::Config("Project ID is required. Use .project_id() to set it.".to_string())
        })?;

        let database_url = if self.enable_database {
            resolve_database_url(
                self.database_url.as_deref(),
                &project_id,
                self.database_region,
            )
        } else {
            String::new()
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(self.request_timeout)?,
        };

        let config = FirebaseConfig {
            api_key,
            project_id,
            app_id: self.app_id,
            database_url,
            database_region: self.database_region,
            enable_authentication: self.enable_authentication,
            enabled_providers: self.enabled_providers,
            enable_database: self.enable_database,
            transport: self.transport,
            request_timeout: self.request_timeout,
            trusted_time_timeout: self.trusted_time_timeout,
            time_service_url: self.time_service_url,
            max_in_flight: self.max_in_flight,
            token_refresh_buffer: self.token_refresh_buffer,
            poll_interval: self.poll_interval,
            verbose_http: self.verbose_http,
            identity_base_url: self.identity_base_url.trim_end_matches('/').to_string(),
            token_base_url: self.token_base_url.trim_end_matches('/').to_string(),
            http_client,
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Arc::new(ImmediateDispatcher)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}

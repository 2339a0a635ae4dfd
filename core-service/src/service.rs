//! # Firebase Service
//!
//! [`FirebaseService`] is the constructed context that owns the credential
//! cache, the transport backend and the value listeners. Hosts build one per
//! app from a [`FirebaseConfig`] and keep it for the app's lifetime.
//!
//! ## Callback style
//!
//! `submit_*` methods return an [`OperationId`] at once and hand the result
//! to the continuation through the configured [`CallbackDispatcher`], so the
//! continuation runs on whatever context the host chose (inline, or a queue
//! drained on the main thread). Every submission completes exactly once,
//! even when the network is down or the service has shut down.
//!
//! ## Async style
//!
//! [`FirebaseService::auth`], [`FirebaseService::database`] and
//! [`FirebaseService::trusted_time`] resolve the same results for callers
//! that are already inside async code. No dispatcher is involved.
//!
//! [`CallbackDispatcher`]: bridge_traits::CallbackDispatcher

use std::sync::Arc;

use bridge_traits::CallbackDispatcher;
use core_auth::{AuthRequest, AuthRestClient, AuthResult, Credentials, TokenSource};
use core_database::{
    DatabaseOperation, DatabaseRestClient, DatabaseResult, PushIdGenerator, RestValueWatcher,
    ValueListenerRegistry,
};
use core_runtime::config::{AuthProvider, FirebaseConfig, TransportKind};
use core_runtime::events::{CoreEvent, EventBus};
use core_time::{TrustedTime, TrustedTimeResolver};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backend::{Backend, RestBackend, DATABASE_NOT_CONFIGURED};
use crate::correlation::{OperationId, OperationIdGenerator};
use crate::error::{CoreError, Result};
use crate::native::{
    NativeAuthCompletion, NativeBackend, NativeBridge, NativeDatabaseCompletion,
    NativeValueChanged, SHUT_DOWN,
};

pub const AUTHENTICATION_DISABLED: &str = "Authentication is not enabled";

/// Shared handle to the Firebase core. Cloning is cheap.
#[derive(Clone)]
pub struct FirebaseService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: FirebaseConfig,
    runtime: Handle,
    backend: Arc<dyn Backend>,
    native: Option<Arc<NativeBackend>>,
    auth: Arc<AuthRestClient>,
    time: TrustedTimeResolver,
    push_ids: PushIdGenerator,
    permits: Arc<Semaphore>,
    auth_ids: OperationIdGenerator,
    database_ids: OperationIdGenerator,
    time_ids: OperationIdGenerator,
    event_bus: EventBus,
    shutdown: CancellationToken,
}

impl FirebaseService {
    /// Build the service for the REST transport.
    ///
    /// Must be called from within a tokio runtime; its handle drives every
    /// operation the service starts.
    ///
    /// # Errors
    ///
    /// - `InitializationFailed` when no tokio runtime is available
    /// - `CapabilityMissing` when the config selects the native transport
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Build the service with a host native bridge. The bridge is used when
    /// the config selects [`TransportKind::Native`].
    pub fn with_native_bridge(config: FirebaseConfig, bridge: Arc<dyn NativeBridge>) -> Result<Self> {
        Self::build(config, Some(bridge))
    }

    fn build(config: FirebaseConfig, bridge: Option<Arc<dyn NativeBridge>>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            CoreError::InitializationFailed(format!("No tokio runtime available: {}", e))
        })?;

        let event_bus = EventBus::default();
        let auth = Arc::new(AuthRestClient::from_config(&config, event_bus.clone())?);
        let listeners = Arc::new(ValueListenerRegistry::new(Arc::clone(&config.dispatcher)));

        let permits = Arc::new(Semaphore::new(config.max_in_flight));
        let (backend, native): (Arc<dyn Backend>, Option<Arc<NativeBackend>>) =
            match (config.transport, bridge) {
                (TransportKind::Native, Some(bridge)) => {
                    let native = Arc::new(NativeBackend::new(
                        bridge,
                        auth.credentials(),
                        listeners,
                        Arc::clone(&config.clock),
                        event_bus.clone(),
                        config.request_timeout,
                    ));
                    (native.clone(), Some(native))
                }
                (TransportKind::Native, None) => {
                    return Err(CoreError::CapabilityMissing {
                        capability: "NativeBridge".to_string(),
                        message: "The native transport needs a host NativeBridge. \
                                  Use FirebaseService::with_native_bridge or select the REST transport."
                            .to_string(),
                    });
                }
                (TransportKind::Rest, bridge) => {
                    if bridge.is_some() {
                        warn!("Native bridge supplied but REST transport selected; bridge unused");
                    }
                    let rest = Self::rest_backend(
                        &config,
                        &auth,
                        listeners,
                        &event_bus,
                        &permits,
                        &runtime,
                    )?;
                    (Arc::new(rest), None)
                }
            };

        let time = TrustedTimeResolver::from_config(&config);
        let push_ids = PushIdGenerator::new(Arc::clone(&config.clock));

        info!(
            project_id = %config.project_id,
            transport = ?config.transport,
            database = config.is_database_configured(),
            max_in_flight = config.max_in_flight,
            "Firebase service initialized"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                runtime,
                backend,
                native,
                auth,
                time,
                push_ids,
                permits,
                auth_ids: OperationIdGenerator::new("AUTH"),
                database_ids: OperationIdGenerator::new("DB"),
                time_ids: OperationIdGenerator::new("TIME"),
                event_bus,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    fn rest_backend(
        config: &FirebaseConfig,
        auth: &Arc<AuthRestClient>,
        listeners: Arc<ValueListenerRegistry>,
        event_bus: &EventBus,
        permits: &Arc<Semaphore>,
        runtime: &Handle,
    ) -> Result<RestBackend> {
        if !config.is_database_configured() {
            return Ok(RestBackend::new(Arc::clone(auth), None, None));
        }

        let tokens: Arc<dyn TokenSource> = auth.clone();
        let database = Arc::new(DatabaseRestClient::from_config(
            config,
            tokens,
            event_bus.clone(),
        )?);
        let watcher = RestValueWatcher::new(
            Arc::clone(&database),
            listeners,
            config.poll_interval,
            runtime.clone(),
        )
        .with_event_bus(event_bus.clone())
        .with_permits(Arc::clone(permits));

        Ok(RestBackend::new(Arc::clone(auth), Some(database), Some(watcher)))
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Start an auth operation; `on_complete` receives the result through
    /// the dispatcher.
    pub fn submit_auth<F>(&self, request: AuthRequest, on_complete: F) -> OperationId
    where
        F: FnOnce(AuthResult) + Send + 'static,
    {
        let id = self.inner.auth_ids.next();
        let inner = Arc::clone(&self.inner);
        let operation_id = id.clone();
        self.inner.runtime.spawn(async move {
            let result = inner.run_auth(operation_id, request).await;
            inner.deliver(move || on_complete(result));
        });
        id
    }

    /// Start a database operation; `on_complete` receives the result through
    /// the dispatcher.
    pub fn submit_database<F>(&self, operation: DatabaseOperation, on_complete: F) -> OperationId
    where
        F: FnOnce(DatabaseResult) + Send + 'static,
    {
        let id = self.inner.database_ids.next();
        let inner = Arc::clone(&self.inner);
        let operation_id = id.clone();
        self.inner.runtime.spawn(async move {
            let result = inner.run_database(operation_id, operation).await;
            inner.deliver(move || on_complete(result));
        });
        id
    }

    /// Fetch trusted time; `on_complete` always receives a timestamp.
    pub fn resolve_trusted_time<F>(&self, on_complete: F) -> OperationId
    where
        F: FnOnce(TrustedTime) + Send + 'static,
    {
        let id = self.inner.time_ids.next();
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let result = inner.run_trusted_time().await;
            inner.deliver(move || on_complete(result));
        });
        id
    }

    pub async fn auth(&self, request: AuthRequest) -> AuthResult {
        let id = self.inner.auth_ids.next();
        self.inner.run_auth(id, request).await
    }

    pub async fn database(&self, operation: DatabaseOperation) -> DatabaseResult {
        let id = self.inner.database_ids.next();
        self.inner.run_database(id, operation).await
    }

    pub async fn trusted_time(&self) -> TrustedTime {
        self.inner.run_trusted_time().await
    }

    // ------------------------------------------------------------------
    // Value listeners
    // ------------------------------------------------------------------

    /// Watch `path`, replacing any listener already registered there.
    pub fn subscribe_value<F>(&self, path: &str, on_change: F) -> Result<()>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        if self.is_shut_down() {
            return Err(CoreError::ShutDown);
        }
        if !self.inner.config.is_database_configured() {
            return Err(CoreError::CapabilityMissing {
                capability: "Database".to_string(),
                message: DATABASE_NOT_CONFIGURED.to_string(),
            });
        }
        self.inner.backend.watch(path, Arc::new(on_change))
    }

    pub fn unsubscribe_value(&self, path: &str) -> bool {
        self.inner.backend.unwatch(path)
    }

    // ------------------------------------------------------------------
    // Native bridge inbound events
    // ------------------------------------------------------------------

    pub fn on_native_auth_completed(&self, completion: NativeAuthCompletion) -> bool {
        match &self.inner.native {
            Some(native) => native.on_auth_completed(completion),
            None => {
                warn!(operation_id = %completion.operation_id, "Native auth completion without native transport");
                false
            }
        }
    }

    pub fn on_native_database_completed(&self, completion: NativeDatabaseCompletion) -> bool {
        match &self.inner.native {
            Some(native) => native.on_database_completed(completion),
            None => {
                warn!(operation_id = %completion.operation_id, "Native database completion without native transport");
                false
            }
        }
    }

    pub fn on_native_value_changed(&self, change: NativeValueChanged) -> bool {
        match &self.inner.native {
            Some(native) => native.on_value_changed(change),
            None => {
                warn!(path = %change.path, "Native value change without native transport");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub fn sign_out(&self) {
        self.inner.backend.sign_out();
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.auth.is_signed_in()
    }

    pub fn session(&self) -> Credentials {
        self.inner.auth.session()
    }

    pub fn id_token(&self) -> String {
        self.inner.auth.id_token()
    }

    pub fn user_id(&self) -> String {
        self.inner.auth.user_id()
    }

    pub fn email(&self) -> String {
        self.inner.auth.email()
    }

    /// Client-side push key, sortable by creation time.
    pub fn generate_push_id(&self) -> String {
        self.inner.push_ids.generate()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn events(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> TransportKind {
        self.inner.backend.kind()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stop listeners, fail pending native operations and refuse new work.
    /// Requests already on the wire run to completion.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.permits.close();
        self.inner.backend.shutdown();
        info!("Firebase service shut down");
    }
}

impl ServiceInner {
    fn deliver(&self, continuation: impl FnOnce() + Send + 'static) {
        self.config.dispatcher.dispatch(Box::new(continuation));
    }

    async fn permit(&self) -> Option<SemaphorePermit<'_>> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        tokio::select! {
            permit = self.permits.acquire() => permit.ok(),
            _ = self.shutdown.cancelled() => None,
        }
    }

    /// Reason `request` may not run under the current settings.
    fn auth_refusal(&self, request: &AuthRequest) -> Option<String> {
        if !self.config.enable_authentication {
            return Some(AUTHENTICATION_DISABLED.to_string());
        }
        let provider = match request {
            AuthRequest::SignUp { .. } | AuthRequest::SignIn { .. } => AuthProvider::Email,
            AuthRequest::SignInAnonymously => AuthProvider::Anonymous,
            AuthRequest::SignInWithGoogle => AuthProvider::Google,
            _ => return None,
        };
        (!self.config.is_provider_enabled(provider))
            .then(|| format!("{:?} sign-in is not enabled", provider))
    }

    #[instrument(skip(self, request), fields(operation = request.name()))]
    async fn run_auth(&self, id: OperationId, request: AuthRequest) -> AuthResult {
        let operation = request.name();
        if let Some(reason) = self.auth_refusal(&request) {
            warn!(operation_id = %id, reason = %reason, "Auth operation refused");
            return AuthResult::failed(operation, reason);
        }
        let Some(_permit) = self.permit().await else {
            return AuthResult::failed(operation, SHUT_DOWN);
        };
        debug!(operation_id = %id, "Running auth operation");
        self.backend.auth(id, request).await
    }

    #[instrument(skip(self, operation), fields(operation = operation.name(), path = operation.path()))]
    async fn run_database(&self, id: OperationId, operation: DatabaseOperation) -> DatabaseResult {
        if !self.config.is_database_configured() {
            return DatabaseResult::failed(operation.path(), DATABASE_NOT_CONFIGURED);
        }
        let Some(_permit) = self.permit().await else {
            return DatabaseResult::failed(operation.path(), SHUT_DOWN);
        };
        debug!(operation_id = %id, "Running database operation");
        self.backend.database(id, operation).await
    }

    async fn run_trusted_time(&self) -> TrustedTime {
        match self.permit().await {
            Some(_permit) => self.time.resolve().await,
            None => TrustedTime::fallback(self.config.clock.now().timestamp_millis()),
        }
    }
}

impl std::fmt::Debug for FirebaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseService")
            .field("project_id", &self.inner.config.project_id)
            .field("transport", &self.inner.backend.kind())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

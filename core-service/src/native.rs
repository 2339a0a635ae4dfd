//! Native SDK transport.
//!
//! The host forwards operations to its platform SDK through [`NativeBridge`]
//! and reports completions back through [`NativeBackend::on_auth_completed`]
//! and friends. Every submission carries its [`OperationId`] and every
//! completion echoes it, so a completion resolves exactly the caller that
//! issued the operation and no other.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{BridgeError, Clock};
use core_auth::{AuthRequest, AuthResult, CredentialCache, CredentialUpdate};
use core_database::{DatabaseOperation, DatabaseResult, ValueCallback, ValueListenerRegistry};
use core_runtime::config::TransportKind;
use core_runtime::events::{AuthEvent, CoreEvent, DatabaseEvent, EventBus};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::correlation::{OperationId, PendingOperations};
use crate::error::Result;

pub const OPERATION_TIMED_OUT: &str = "Operation timed out";
pub const OPERATION_CANCELLED: &str = "Operation was cancelled";
pub const SHUT_DOWN: &str = "Service is shut down";

/// Outbound calls into the host's platform SDK.
///
/// Calls only submit work; results arrive later as completion events. An
/// `Err` means the host could not accept the submission at all.
pub trait NativeBridge: Send + Sync {
    fn submit_auth(
        &self,
        operation_id: &OperationId,
        request: &AuthRequest,
    ) -> std::result::Result<(), BridgeError>;

    fn submit_database(
        &self,
        operation_id: &OperationId,
        operation: &DatabaseOperation,
    ) -> std::result::Result<(), BridgeError>;

    fn watch_value(&self, path: &str) -> std::result::Result<(), BridgeError>;

    fn unwatch_value(&self, path: &str) -> std::result::Result<(), BridgeError>;

    fn sign_out(&self) -> std::result::Result<(), BridgeError>;
}

/// Auth completion reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeAuthCompletion {
    pub operation_id: OperationId,
    pub success: bool,
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    /// Error text on failure; an informational note on success
    pub message: String,
    pub auth_token: String,
}

/// Database completion reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeDatabaseCompletion {
    pub operation_id: OperationId,
    pub success: bool,
    pub path: String,
    pub data: String,
    pub error_message: String,
}

/// Value change pushed by the host for a watched path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeValueChanged {
    pub path: String,
    pub data: String,
}

impl NativeAuthCompletion {
    fn into_result(self) -> AuthResult {
        if !self.success {
            let message = if self.message.is_empty() {
                "Native operation failed".to_string()
            } else {
                self.message
            };
            return AuthResult::failed("", message);
        }
        AuthResult {
            success: true,
            payload: self.message,
            user_id: self.user_id,
            email: self.email,
            display_name: self.display_name,
            auth_token: self.auth_token,
            ..AuthResult::default()
        }
    }
}

impl NativeDatabaseCompletion {
    fn into_result(self) -> DatabaseResult {
        if self.success {
            DatabaseResult::succeeded(self.path, self.data)
        } else if self.error_message.is_empty() {
            DatabaseResult::failed(self.path, "Native operation failed")
        } else {
            DatabaseResult::failed(self.path, self.error_message)
        }
    }
}

pub struct NativeBackend {
    bridge: Arc<dyn NativeBridge>,
    credentials: Arc<CredentialCache>,
    listeners: Arc<ValueListenerRegistry>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    timeout: Duration,
    pending_auth: PendingOperations<AuthResult>,
    pending_database: PendingOperations<DatabaseResult>,
}

impl NativeBackend {
    pub fn new(
        bridge: Arc<dyn NativeBridge>,
        credentials: Arc<CredentialCache>,
        listeners: Arc<ValueListenerRegistry>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        timeout: Duration,
    ) -> Self {
        Self {
            bridge,
            credentials,
            listeners,
            clock,
            event_bus,
            timeout,
            pending_auth: PendingOperations::new(),
            pending_database: PendingOperations::new(),
        }
    }

    /// Route an auth completion to its caller. False if nobody waits on it.
    pub fn on_auth_completed(&self, completion: NativeAuthCompletion) -> bool {
        let id = completion.operation_id.clone();
        self.pending_auth.resolve(&id, completion.into_result())
    }

    /// Route a database completion to its caller. False if nobody waits on it.
    pub fn on_database_completed(&self, completion: NativeDatabaseCompletion) -> bool {
        let id = completion.operation_id.clone();
        self.pending_database.resolve(&id, completion.into_result())
    }

    pub fn on_value_changed(&self, change: NativeValueChanged) -> bool {
        let delivered = self.listeners.notify(&change.path, &change.data);
        if delivered {
            let _ = self
                .event_bus
                .emit(CoreEvent::Database(DatabaseEvent::ValueChanged {
                    path: change.path,
                    data: change.data,
                }));
        } else {
            debug!(path = %change.path, "Value change for unwatched path dropped");
        }
        delivered
    }

    pub fn pending_count(&self) -> usize {
        self.pending_auth.len() + self.pending_database.len()
    }

    async fn wait<T>(
        &self,
        id: &OperationId,
        rx: oneshot::Receiver<T>,
        pending: &PendingOperations<T>,
    ) -> std::result::Result<T, &'static str> {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(OPERATION_CANCELLED),
            Err(_) => {
                pending.cancel(id);
                warn!(operation_id = %id, "Native operation timed out");
                Err(OPERATION_TIMED_OUT)
            }
        }
    }

    fn record_session(&self, request: &AuthRequest, result: &AuthResult) {
        match request {
            AuthRequest::DeleteAccount => {
                self.credentials.clear();
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut));
            }
            _ if request.caches_tokens() || matches!(request, AuthRequest::SignInWithGoogle) => {
                let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
                let update = CredentialUpdate {
                    id_token: non_empty(&result.auth_token),
                    user_id: non_empty(&result.user_id),
                    email: non_empty(&result.email),
                    ..CredentialUpdate::default()
                };
                // The native SDK owns token lifetimes; no expiry is tracked here.
                self.credentials.apply(&update, self.clock.now());
                if !result.user_id.is_empty() {
                    let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
                        user_id: result.user_id.clone(),
                    }));
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Backend for NativeBackend {
    fn kind(&self) -> TransportKind {
        TransportKind::Native
    }

    async fn auth(&self, id: OperationId, request: AuthRequest) -> AuthResult {
        let operation = request.name();
        let rx = match self.pending_auth.register(id.clone()) {
            Ok(rx) => rx,
            Err(e) => return AuthResult::failed(operation, e.to_string()),
        };

        debug!(operation_id = %id, operation, "Submitting native auth operation");
        if let Err(e) = self.bridge.submit_auth(&id, &request) {
            self.pending_auth.cancel(&id);
            warn!(operation_id = %id, error = %e, "Native bridge rejected auth operation");
            return AuthResult::failed(operation, e.to_string());
        }

        match self.wait(&id, rx, &self.pending_auth).await {
            Ok(mut result) => {
                result.operation = operation.to_string();
                if result.success {
                    self.record_session(&request, &result);
                }
                result
            }
            Err(message) => AuthResult::failed(operation, message),
        }
    }

    async fn database(&self, id: OperationId, operation: DatabaseOperation) -> DatabaseResult {
        let rx = match self.pending_database.register(id.clone()) {
            Ok(rx) => rx,
            Err(e) => return DatabaseResult::failed(operation.path(), e.to_string()),
        };

        debug!(operation_id = %id, operation = operation.name(), "Submitting native database operation");
        if let Err(e) = self.bridge.submit_database(&id, &operation) {
            self.pending_database.cancel(&id);
            warn!(operation_id = %id, error = %e, "Native bridge rejected database operation");
            return DatabaseResult::failed(operation.path(), e.to_string());
        }

        match self.wait(&id, rx, &self.pending_database).await {
            Ok(mut result) => {
                if result.path.is_empty() {
                    result.path = operation.path().to_string();
                }
                result
            }
            Err(message) => DatabaseResult::failed(operation.path(), message),
        }
    }

    fn watch(&self, path: &str, callback: ValueCallback) -> Result<()> {
        self.listeners.register(path, callback);
        if let Err(e) = self.bridge.watch_value(path) {
            self.listeners.remove(path);
            return Err(e.into());
        }
        info!(path, "Watching value through native bridge");
        Ok(())
    }

    fn unwatch(&self, path: &str) -> bool {
        let removed = self.listeners.remove(path);
        if removed {
            if let Err(e) = self.bridge.unwatch_value(path) {
                warn!(path, error = %e, "Native bridge failed to stop watching");
            }
        }
        removed
    }

    fn sign_out(&self) {
        if let Err(e) = self.bridge.sign_out() {
            warn!(error = %e, "Native sign-out failed");
        }
        self.credentials.clear();
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut));
    }

    fn shutdown(&self) {
        let auth = self
            .pending_auth
            .fail_all(|_| AuthResult::failed("", SHUT_DOWN));
        let database = self
            .pending_database
            .fail_all(|_| DatabaseResult::failed("", SHUT_DOWN));
        if auth + database > 0 {
            info!(auth, database, "Failed pending native operations on shutdown");
        }
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{ImmediateDispatcher, SystemClock};
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        NativeBridge {}

        impl NativeBridge for NativeBridge {
            fn submit_auth(&self, operation_id: &OperationId, request: &AuthRequest) -> std::result::Result<(), BridgeError>;
            fn submit_database(&self, operation_id: &OperationId, operation: &DatabaseOperation) -> std::result::Result<(), BridgeError>;
            fn watch_value(&self, path: &str) -> std::result::Result<(), BridgeError>;
            fn unwatch_value(&self, path: &str) -> std::result::Result<(), BridgeError>;
            fn sign_out(&self) -> std::result::Result<(), BridgeError>;
        }
    }

    fn backend(bridge: MockNativeBridge, timeout: Duration) -> Arc<NativeBackend> {
        Arc::new(NativeBackend::new(
            Arc::new(bridge),
            Arc::new(CredentialCache::new()),
            Arc::new(ValueListenerRegistry::new(Arc::new(ImmediateDispatcher))),
            Arc::new(SystemClock),
            EventBus::new(16),
            timeout,
        ))
    }

    async fn wait_for_pending(backend: &NativeBackend, count: usize) {
        while backend.pending_count() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_completion_resolves_only_its_caller() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_submit_database().times(2).returning(|_, _| Ok(()));
        let backend = backend(bridge, Duration::from_secs(30));

        let first = tokio::spawn({
            let backend = backend.clone();
            async move {
                backend
                    .database(
                        OperationId::from("DB_1"),
                        DatabaseOperation::Get { path: "a".to_string() },
                    )
                    .await
            }
        });
        wait_for_pending(&backend, 1).await;
        let second = tokio::spawn({
            let backend = backend.clone();
            async move {
                backend
                    .database(
                        OperationId::from("DB_2"),
                        DatabaseOperation::Get { path: "b".to_string() },
                    )
                    .await
            }
        });
        wait_for_pending(&backend, 2).await;

        assert!(backend.on_database_completed(NativeDatabaseCompletion {
            operation_id: OperationId::from("DB_2"),
            success: true,
            path: "b".to_string(),
            data: "\"B\"".to_string(),
            error_message: String::new(),
        }));

        let second = second.await.unwrap();
        assert_eq!(second.path, "b");
        assert_eq!(second.payload, "\"B\"");
        assert_eq!(backend.pending_count(), 1);
        assert!(!first.is_finished());

        assert!(backend.on_database_completed(NativeDatabaseCompletion {
            operation_id: OperationId::from("DB_1"),
            success: true,
            path: "a".to_string(),
            data: "\"A\"".to_string(),
            error_message: String::new(),
        }));
        assert_eq!(first.await.unwrap().payload, "\"A\"");
    }

    #[tokio::test]
    async fn test_unknown_completion_is_dropped() {
        let backend = backend(MockNativeBridge::new(), Duration::from_secs(1));
        assert!(!backend.on_auth_completed(NativeAuthCompletion {
            operation_id: OperationId::from("AUTH_99"),
            success: true,
            ..NativeAuthCompletion::default()
        }));
    }

    #[tokio::test]
    async fn test_rejected_submission_fails_immediately() {
        let mut bridge = MockNativeBridge::new();
        bridge
            .expect_submit_auth()
            .returning(|_, _| Err(BridgeError::NotAvailable("no JNI env".to_string())));
        let backend = backend(bridge, Duration::from_secs(30));

        let result = backend
            .auth(OperationId::from("AUTH_1"), AuthRequest::SignInAnonymously)
            .await;

        assert!(!result.success);
        assert_eq!(result.operation, "signInAnonymously");
        assert!(result.error_message.contains("no JNI env"));
        assert_eq!(backend.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_operation_times_out() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_submit_database().returning(|_, _| Ok(()));
        let backend = backend(bridge, Duration::from_secs(15));

        let result = backend
            .database(
                OperationId::from("DB_1"),
                DatabaseOperation::Delete { path: "x".to_string() },
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.error_message, OPERATION_TIMED_OUT);
        assert_eq!(result.path, "x");
        assert_eq!(backend.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_sign_in_updates_session() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_submit_auth().returning(|_, _| Ok(()));
        let backend = backend(bridge, Duration::from_secs(30));

        let task = tokio::spawn({
            let backend = backend.clone();
            async move {
                backend
                    .auth(
                        OperationId::from("AUTH_1"),
                        AuthRequest::SignIn {
                            email: "a@b.c".to_string(),
                            password: "pw".to_string(),
                        },
                    )
                    .await
            }
        });
        wait_for_pending(&backend, 1).await;
        backend.on_auth_completed(NativeAuthCompletion {
            operation_id: OperationId::from("AUTH_1"),
            success: true,
            user_id: "uid".to_string(),
            email: "a@b.c".to_string(),
            auth_token: "tok".to_string(),
            ..NativeAuthCompletion::default()
        });

        let result = task.await.unwrap();
        assert!(result.success);
        assert_eq!(result.operation, "signIn");
        assert_eq!(backend.credentials.user_id(), "uid");
        assert_eq!(backend.credentials.id_token(), "tok");
    }

    #[tokio::test]
    async fn test_shutdown_fails_pending() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_submit_auth().returning(|_, _| Ok(()));
        let backend = backend(bridge, Duration::from_secs(30));

        let task = tokio::spawn({
            let backend = backend.clone();
            async move {
                backend
                    .auth(OperationId::from("AUTH_7"), AuthRequest::GetUser)
                    .await
            }
        });
        wait_for_pending(&backend, 1).await;
        backend.shutdown();

        let result = task.await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_message, SHUT_DOWN);
        assert_eq!(result.operation, "getUser");
    }

    #[tokio::test]
    async fn test_value_changes_reach_listener() {
        let mut bridge = MockNativeBridge::new();
        bridge
            .expect_watch_value()
            .withf(|path: &str| path == "rooms/1")
            .times(1)
            .returning(|_| Ok(()));
        bridge
            .expect_unwatch_value()
            .withf(|path: &str| path == "rooms/1")
            .times(1)
            .returning(|_| Ok(()));
        let backend = backend(bridge, Duration::from_secs(30));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        backend
            .watch(
                "rooms/1",
                Arc::new(move |path: &str, data: &str| {
                    sink.lock().unwrap().push(format!("{}={}", path, data));
                }),
            )
            .unwrap();

        assert!(backend.on_value_changed(NativeValueChanged {
            path: "/rooms/1".to_string(),
            data: "{}".to_string(),
        }));
        assert!(backend.unwatch("rooms/1"));
        assert!(!backend.on_value_changed(NativeValueChanged {
            path: "rooms/1".to_string(),
            data: "[]".to_string(),
        }));

        assert_eq!(*seen.lock().unwrap(), vec!["rooms/1={}".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_watch_leaves_no_listener() {
        let mut bridge = MockNativeBridge::new();
        bridge
            .expect_watch_value()
            .returning(|_| Err(BridgeError::OperationFailed("denied".to_string())));
        let backend = backend(bridge, Duration::from_secs(30));

        assert!(backend.watch("a", Arc::new(|_: &str, _: &str| {})).is_err());
        assert!(!backend.listeners.contains("a"));
    }
}

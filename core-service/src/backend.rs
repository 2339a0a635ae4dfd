//! Transport capability interface.
//!
//! The service issues every operation through a [`Backend`] and never needs
//! to know whether REST or the host's native SDK carried it.

use std::sync::Arc;

use async_trait::async_trait;
use core_auth::{AuthRequest, AuthRestClient, AuthResult};
use core_database::{DatabaseOperation, DatabaseRestClient, DatabaseResult, RestValueWatcher, ValueCallback};
use core_runtime::config::TransportKind;
use tracing::debug;

use crate::correlation::OperationId;
use crate::error::{CoreError, Result};

pub const DATABASE_NOT_CONFIGURED: &str = "Realtime Database is not configured";

#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Run `request` to completion. `id` identifies it to transports that
    /// correlate completions out of band.
    async fn auth(&self, id: OperationId, request: AuthRequest) -> AuthResult;

    async fn database(&self, id: OperationId, operation: DatabaseOperation) -> DatabaseResult;

    /// Start delivering value changes for `path`, replacing any listener
    /// already registered there.
    fn watch(&self, path: &str, callback: ValueCallback) -> Result<()>;

    fn unwatch(&self, path: &str) -> bool;

    fn sign_out(&self);

    /// Stop listeners and fail anything still waiting.
    fn shutdown(&self);
}

/// REST transport.
pub struct RestBackend {
    auth: Arc<AuthRestClient>,
    database: Option<Arc<DatabaseRestClient>>,
    watcher: Option<RestValueWatcher>,
}

impl RestBackend {
    pub fn new(
        auth: Arc<AuthRestClient>,
        database: Option<Arc<DatabaseRestClient>>,
        watcher: Option<RestValueWatcher>,
    ) -> Self {
        Self {
            auth,
            database,
            watcher,
        }
    }
}

#[async_trait]
impl Backend for RestBackend {
    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }

    // The awaiting future is the correlation; no id table is involved.
    async fn auth(&self, _id: OperationId, request: AuthRequest) -> AuthResult {
        self.auth.execute(request).await
    }

    async fn database(&self, _id: OperationId, operation: DatabaseOperation) -> DatabaseResult {
        match &self.database {
            Some(client) => client.execute(operation).await,
            None => DatabaseResult::failed(operation.path(), DATABASE_NOT_CONFIGURED),
        }
    }

    fn watch(&self, path: &str, callback: ValueCallback) -> Result<()> {
        let watcher = self.watcher.as_ref().ok_or_else(|| CoreError::CapabilityMissing {
            capability: "Database".to_string(),
            message: DATABASE_NOT_CONFIGURED.to_string(),
        })?;
        // The poller stops itself when its listener is removed.
        let _task = watcher.watch(path, callback);
        Ok(())
    }

    fn unwatch(&self, path: &str) -> bool {
        self.watcher
            .as_ref()
            .is_some_and(|watcher| watcher.unwatch(path))
    }

    fn sign_out(&self) {
        self.auth.sign_out();
    }

    fn shutdown(&self) {
        debug!("Stopping REST value pollers");
        if let Some(watcher) = &self.watcher {
            watcher.shutdown();
        }
    }
}

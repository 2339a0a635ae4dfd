use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Database error: {0}")]
    Database(#[from] core_database::DatabaseError),

    #[error("Operation {0} is already pending")]
    DuplicateOperation(String),

    #[error("Native bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Service is shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, CoreError>;

//! Firebase service façade.
//!
//! This crate composes the auth, database and trusted-time clients into one
//! [`FirebaseService`] context and routes every operation through a
//! [`Backend`]: the REST transport over the injected `HttpClient`, or a
//! host-provided [`NativeBridge`] that reports completions by operation id.
//!
//! Desktop hosts usually enable the `desktop-shims` feature, which supplies a
//! reqwest-backed `HttpClient` and a main-thread [`QueueDispatcher`].
//!
//! ```ignore
//! use core_auth::AuthRequest;
//! use core_runtime::FirebaseConfig;
//! use core_service::FirebaseService;
//!
//! let config = FirebaseConfig::builder()
//!     .api_key("AIza...")
//!     .project_id("my-game")
//!     .build()?;
//! let service = FirebaseService::new(config)?;
//!
//! service.submit_auth(AuthRequest::SignInAnonymously, |result| {
//!     println!("signed in: {} as {}", result.success, result.user_id);
//! });
//! ```

pub mod backend;
pub mod correlation;
pub mod error;
pub mod native;
pub mod service;

pub use backend::{Backend, RestBackend, DATABASE_NOT_CONFIGURED};
pub use correlation::{OperationId, OperationIdGenerator, PendingOperations};
pub use error::{CoreError, Result};
pub use native::{
    NativeAuthCompletion, NativeBackend, NativeBridge, NativeDatabaseCompletion,
    NativeValueChanged, OPERATION_CANCELLED, OPERATION_TIMED_OUT, SHUT_DOWN,
};
pub use service::{FirebaseService, AUTHENTICATION_DISABLED};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::{DispatchQueue, QueueDispatcher, ReqwestHttpClient};

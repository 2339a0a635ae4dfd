//! # Event Bus System
//!
//! Broadcast channel for auth and database notifications, built on
//! `tokio::sync::broadcast`.
//!
//! Operation results always travel through the caller's continuation. The bus
//! is for observers that did not start the operation: a HUD showing the signed
//! in user, a debug overlay listing failed writes, value-change fan-out.
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).ok();
//! assert_eq!(rx.recv().await.unwrap(), CoreEvent::Auth(AuthEvent::SignedOut));
//! # }
//! ```
//!
//! Slow subscribers receive `RecvError::Lagged(n)` and can keep reading;
//! `RecvError::Closed` means the bus was dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Auth(AuthEvent),
    Database(DatabaseEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Database(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthFailed { .. }) => EventSeverity::Error,
            CoreEvent::Database(DatabaseEvent::OperationFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Auth(AuthEvent::SignedOut) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Session state changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A sign-in style operation produced a user id.
    SignedIn { user_id: String },
    /// Credentials were cleared.
    SignedOut,
    /// A refresh produced a new ID token.
    TokenRefreshed {
        user_id: String,
        /// Unix epoch seconds, when the backend reported a lifetime
        expires_at: Option<i64>,
    },
    /// An auth operation was rejected or never got a response.
    AuthFailed { operation: String, message: String },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignedIn { .. } => "User signed in",
            AuthEvent::SignedOut => "User signed out",
            AuthEvent::TokenRefreshed { .. } => "ID token refreshed",
            AuthEvent::AuthFailed { .. } => "Authentication operation failed",
        }
    }
}

/// Database notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DatabaseEvent {
    /// A watched path has new content (opaque JSON text).
    ValueChanged { path: String, data: String },
    OperationFailed { path: String, message: String },
}

impl DatabaseEvent {
    fn description(&self) -> &str {
        match self {
            DatabaseEvent::ValueChanged { .. } => "Value changed",
            DatabaseEvent::OperationFailed { .. } => "Database operation failed",
        }
    }
}

/// Central event bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers, which callers
    /// normally ignore.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

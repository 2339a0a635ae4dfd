//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the Firebase core crates:
//! - Logging and tracing setup with host log forwarding
//! - Configuration (`FirebaseConfig`) with validation and descriptor import
//! - Event bus for auth and database notifications
//!
//! ## Overview
//!
//! Nothing in here performs network I/O. The auth, database and time crates
//! receive their settings and host capabilities from [`config::FirebaseConfig`]
//! and report state changes through [`events::EventBus`].

pub mod config;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{AuthProvider, DatabaseRegion, FirebaseConfig, FirebaseConfigBuilder, TransportKind};
pub use descriptor::ServicesDescriptor;
pub use error::{Error, Result};
pub use events::{AuthEvent, CoreEvent, DatabaseEvent, EventBus};

//! Workspace placeholder crate.
//!
//! Exposes the feature flags that map onto the workspace crates. Host
//! applications can depend on `firebase-bridge-workspace` and enable
//! `desktop-shims` instead of wiring `core-service` and `bridge-desktop`
//! by hand.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;

//! # Core Authentication Module
//!
//! REST client for the identity backend: endpoint table, request payloads,
//! credential cache and the [`AuthRestClient`] that ties them together.
//!
//! Results are envelopes ([`AuthResult`]) rather than errors; [`AuthError`]
//! only covers construction problems such as a missing API key.

pub mod client;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod request;
pub mod types;

pub use client::{AuthRestClient, GOOGLE_UNSUPPORTED};
pub use credentials::{CredentialCache, CredentialUpdate, Credentials, TokenSource};
pub use endpoints::{AuthEndpoint, AuthEndpoints};
pub use error::{AuthError, Result};
pub use request::AuthRequest;
pub use types::{AuthResult, NETWORK_ERROR};

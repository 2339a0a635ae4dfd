//! # Core Database Module
//!
//! REST access to the realtime database: URL and query construction, the
//! [`DatabaseRestClient`], JSON payload helpers, local push keys and value
//! listeners.
//!
//! Stored values are opaque JSON text. The client forwards bodies unmodified
//! and reports results as [`DatabaseResult`] envelopes.

pub mod client;
pub mod error;
pub mod json;
pub mod listeners;
pub mod push_id;
pub mod query;
pub mod types;
pub mod url;

pub use client::DatabaseRestClient;
pub use error::{DatabaseError, Result};
pub use json::{
    combine_json, get_json_value, make_json_bool, make_json_float, make_json_int,
    make_json_string, server_timestamp, JsonObject,
};
pub use listeners::{ListenerHandle, RestValueWatcher, ValueCallback, ValueListenerRegistry};
pub use push_id::PushIdGenerator;
pub use query::Query;
pub use types::{DatabaseOperation, DatabaseResult, NETWORK_ERROR};
pub use self::url::{normalize_path, DatabaseUrlBuilder};

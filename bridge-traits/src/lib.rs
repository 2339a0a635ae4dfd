//! # Host Bridge Traits
//!
//! Capability contracts the host platform provides to the Firebase core.
//!
//! ## Overview
//!
//! The REST core never talks to a socket, a wall clock, a log file or a UI
//! thread directly. Each of those is a trait defined here and implemented per
//! platform, so the same core runs inside a desktop tool, a game engine or a
//! test harness with scripted responses.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Performs one HTTP exchange and reports
//!   either a response (any status) or a transport failure
//! - [`Clock`](time::Clock) - Wall-clock source, injectable for tests
//! - [`HostLogSink`](log::HostLogSink) - Mirrors structured log records into
//!   the host's own log
//! - [`CallbackDispatcher`](dispatch::CallbackDispatcher) - Runs operation
//!   continuations on the execution context the caller expects
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Notes |
//! |----------|---------------------|-------|
//! | Desktop  | `bridge-desktop`    | reqwest client, queue dispatcher |
//! | Engine / mobile hosts | host-provided | inject through `FirebaseConfig` |
//!
//! ## Error Handling
//!
//! All bridge traits report failures through [`BridgeError`](error::BridgeError).
//! The HTTP contract is strict about which variant means "no response was
//! received": see [`HttpClient::execute`](http::HttpClient::execute).
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`; completions arrive on transport worker
//! threads and are handed to a dispatcher from there.

pub mod dispatch;
pub mod error;
pub mod http;
pub mod log;
pub mod time;

pub use error::BridgeError;

pub use dispatch::{CallbackDispatcher, DispatchTask, ImmediateDispatcher};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use log::{HostLogSink, LogLevel, LogRecord};
pub use time::{Clock, FixedClock, SystemClock};

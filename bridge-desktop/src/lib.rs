//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux) and for command-line tools.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls
//! - `CallbackDispatcher` backed by a channel that the host thread drains
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{QueueDispatcher, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let (dispatcher, mut queue) = QueueDispatcher::new();
//!
//!     // Hand both to FirebaseConfig, then drain continuations each frame:
//!     queue.run_pending();
//!     Ok(())
//! }
//! ```

mod dispatch;
mod http;

pub use dispatch::{DispatchQueue, QueueDispatcher};
pub use http::ReqwestHttpClient;

//! # Trusted Time
//!
//! Wall-clock time from an external time service, with the local clock as a
//! fallback. Resolution always yields a timestamp; [`TimeTrust`] tells the
//! caller which source produced it so anti-tamper checks can decide for
//! themselves whether a fallback is acceptable.

pub mod resolver;
pub mod types;

pub use resolver::{parse_time_response, TrustedTimeResolver};
pub use types::{TimeTrust, TrustedTime};

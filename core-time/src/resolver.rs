use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{Clock, HttpClient, HttpMethod, HttpRequest};
use chrono::{DateTime, NaiveDateTime};
use core_runtime::config::{FirebaseConfig, DEFAULT_TIME_SERVICE_URL, DEFAULT_TRUSTED_TIME_TIMEOUT};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::types::TrustedTime;

/// Extract epoch milliseconds from a time service response.
///
/// Tries, in order: an ISO-8601 `dateTime` (or `datetime`) field, then
/// `unixtime` seconds, then `timestamp` seconds. A date-time without an
/// offset is read as UTC.
pub fn parse_time_response(body: &str) -> Option<i64> {
    let value: Value = serde_json::from_str(body).ok()?;

    let date_time = ["dateTime", "datetime"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .and_then(parse_date_time);

    date_time
        .or_else(|| value.get("unixtime").and_then(seconds_to_millis))
        .or_else(|| value.get("timestamp").and_then(seconds_to_millis))
}

fn parse_date_time(text: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn seconds_to_millis(value: &Value) -> Option<i64> {
    let seconds = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    seconds.checked_mul(1000)
}

pub struct TrustedTimeResolver {
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    url: String,
    timeout: Duration,
}

impl TrustedTimeResolver {
    pub fn new(http: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            clock,
            url: DEFAULT_TIME_SERVICE_URL.to_string(),
            timeout: DEFAULT_TRUSTED_TIME_TIMEOUT,
        }
    }

    pub fn from_config(config: &FirebaseConfig) -> Self {
        Self::new(Arc::clone(&config.http_client), Arc::clone(&config.clock))
            .with_url(config.time_service_url.clone())
            .with_timeout(config.trusted_time_timeout)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the time, falling back to the local clock on any failure.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn resolve(&self) -> TrustedTime {
        let request = HttpRequest::new(HttpMethod::Get, self.url.as_str()).timeout(self.timeout);

        match self.http.execute(request).await {
            Ok(response) if response.is_success() => {
                match parse_time_response(&response.text_lossy()) {
                    Some(millis) => {
                        debug!(millis, "Trusted time resolved");
                        return TrustedTime::trusted(millis, self.url.clone());
                    }
                    None => warn!("Time service response had no usable field"),
                }
            }
            Ok(response) => warn!(status = response.status, "Time service rejected request"),
            Err(e) => warn!(error = %e, "Time service unreachable"),
        }

        let millis = self.clock.unix_timestamp_millis();
        warn!(millis, "Using local clock, timestamp is less trustworthy");
        TrustedTime::fallback(millis)
    }
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, Clock, FixedClock, HttpClient, HttpRequest, HttpResponse, SystemClock};
use core_time::{TimeTrust, TrustedTimeResolver};

const URL: &str = "https://time.test/api/utc";

struct OneShotHttpClient {
    response: Mutex<Option<BridgeResult<HttpResponse>>>,
    seen_timeout: Mutex<Option<Duration>>,
}

impl OneShotHttpClient {
    fn new(response: BridgeResult<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Some(response)),
            seen_timeout: Mutex::new(None),
        })
    }
}

#[async_trait]
impl HttpClient for OneShotHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        *self.seen_timeout.lock().unwrap() = request.timeout;
        self.response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(BridgeError::OperationFailed("called twice".into())))
    }
}

fn resolver(http: Arc<OneShotHttpClient>, clock: Arc<dyn Clock>) -> TrustedTimeResolver {
    TrustedTimeResolver::new(http, clock)
        .with_url(URL)
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_service_time_is_trusted() {
    let http = OneShotHttpClient::new(Ok(HttpResponse::new(
        200,
        r#"{"unixtime":1709294400,"timezone":"Etc/UTC"}"#,
    )));
    let clock = Arc::new(FixedClock::from_millis(1));

    let time = resolver(http.clone(), clock).resolve().await;

    assert!(time.success);
    assert_eq!(time.millis, "1709294400000");
    assert_eq!(time.trust, TimeTrust::Trusted);
    assert_eq!(time.source_url, URL);
    assert_eq!(*http.seen_timeout.lock().unwrap(), Some(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_transport_failure_falls_back_to_local_clock() {
    let http = OneShotHttpClient::new(Err(BridgeError::Timeout(Duration::from_secs(5))));
    let before = SystemClock.unix_timestamp_millis();

    let time = resolver(http, Arc::new(SystemClock)).resolve().await;

    let after = SystemClock.unix_timestamp_millis();
    assert!(time.success);
    assert_eq!(time.trust, TimeTrust::Fallback);
    assert!(!time.is_trusted());
    let millis = time.millis_value().unwrap();
    assert!(millis >= before && millis <= after);
}

#[tokio::test]
async fn test_error_status_falls_back() {
    let http = OneShotHttpClient::new(Ok(HttpResponse::new(503, "busy")));
    let clock = Arc::new(FixedClock::from_millis(42_000));

    let time = resolver(http, clock).resolve().await;

    assert!(time.success);
    assert_eq!(time.millis, "42000");
    assert_eq!(time.trust, TimeTrust::Fallback);
    assert!(time.source_url.is_empty());
}

#[tokio::test]
async fn test_unparseable_body_falls_back() {
    let http = OneShotHttpClient::new(Ok(HttpResponse::new(200, r#"{"abbreviation":"UTC"}"#)));
    let clock = Arc::new(FixedClock::from_millis(7));

    let time = resolver(http, clock).resolve().await;

    assert_eq!(time.millis, "7");
    assert_eq!(time.trust, TimeTrust::Fallback);
}

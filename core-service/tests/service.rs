use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::QueueDispatcher;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::AuthRequest;
use core_database::DatabaseOperation;
use core_runtime::config::{AuthProvider, FirebaseConfigBuilder, TransportKind};
use core_runtime::FirebaseConfig;
use core_service::{
    CoreError, FirebaseService, NativeAuthCompletion, NativeBridge, NativeDatabaseCompletion,
    NativeValueChanged, OperationId, AUTHENTICATION_DISABLED, DATABASE_NOT_CONFIGURED, SHUT_DOWN,
};
use core_time::TimeTrust;

/// Answers every request after an optional delay, tracking how many run at once.
#[derive(Default)]
struct EchoHttpClient {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

impl EchoHttpClient {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for EchoHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let delay = if request.url.contains("slow") {
            self.delay * 3
        } else {
            self.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let body = if request.url.contains("accounts:signUp") {
            r#"{"idToken":"anon-token","refreshToken":"rt","localId":"anon-uid","expiresIn":"3600"}"#
                .to_string()
        } else if request.url.contains("time.test") {
            return Err(BridgeError::Network("time service unreachable".to_string()));
        } else {
            serde_json::Value::String(request.url.clone()).to_string()
        };
        Ok(HttpResponse::new(200, body))
    }
}

fn builder(http: Arc<EchoHttpClient>) -> FirebaseConfigBuilder {
    FirebaseConfig::builder()
        .api_key("test-key")
        .project_id("demo")
        .database_url("https://db.test")
        .identity_base_url("https://identity.test/v1")
        .token_base_url("https://token.test/v1")
        .time_service_url("https://time.test/now")
        .http_client(http)
}

/// Records every submission; completions are injected by the test.
#[derive(Default)]
struct RecordingBridge {
    auth: Mutex<Vec<(OperationId, String)>>,
    database: Mutex<Vec<(OperationId, String)>>,
    watched: Mutex<Vec<String>>,
}

impl NativeBridge for RecordingBridge {
    fn submit_auth(&self, id: &OperationId, request: &AuthRequest) -> Result<(), BridgeError> {
        self.auth
            .lock()
            .unwrap()
            .push((id.clone(), request.name().to_string()));
        Ok(())
    }

    fn submit_database(
        &self,
        id: &OperationId,
        operation: &DatabaseOperation,
    ) -> Result<(), BridgeError> {
        self.database
            .lock()
            .unwrap()
            .push((id.clone(), operation.path().to_string()));
        Ok(())
    }

    fn watch_value(&self, path: &str) -> Result<(), BridgeError> {
        self.watched.lock().unwrap().push(path.to_string());
        Ok(())
    }

    fn unwatch_value(&self, _path: &str) -> Result<(), BridgeError> {
        Ok(())
    }

    fn sign_out(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[test]
fn test_construction_requires_a_runtime() {
    let config = builder(Arc::new(EchoHttpClient::default())).build().unwrap();
    assert!(matches!(
        FirebaseService::new(config),
        Err(CoreError::InitializationFailed(_))
    ));
}

#[tokio::test]
async fn test_native_transport_requires_a_bridge() {
    let config = builder(Arc::new(EchoHttpClient::default()))
        .transport(TransportKind::Native)
        .build()
        .unwrap();
    assert!(matches!(
        FirebaseService::new(config),
        Err(CoreError::CapabilityMissing { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_continuations_run_on_the_host_queue() {
    let http = Arc::new(EchoHttpClient::default());
    let (dispatcher, mut queue) = QueueDispatcher::new();
    let config = builder(http.clone())
        .dispatcher(Arc::new(dispatcher))
        .build()
        .unwrap();
    let service = FirebaseService::new(config).unwrap();

    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    let test_thread = std::thread::current().id();
    let id = service.submit_auth(AuthRequest::SignInAnonymously, move |result| {
        assert_eq!(std::thread::current().id(), test_thread);
        sink.lock().unwrap().push(result);
    });
    assert_eq!(id.as_str(), "AUTH_1");

    // Nothing runs until the host drains its queue.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(results.lock().unwrap().is_empty());

    assert!(queue.next().await);
    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].user_id, "anon-uid");
    assert!(service.is_signed_in());
    assert_eq!(service.user_id(), "anon-uid");
}

#[tokio::test]
async fn test_write_without_sign_in_completes() {
    let http = Arc::new(EchoHttpClient::default());
    let service = FirebaseService::new(builder(http.clone()).build().unwrap()).unwrap();

    let result = service
        .database(DatabaseOperation::Set {
            path: "public/board".to_string(),
            json: r#"{"score":1}"#.to_string(),
        })
        .await;

    assert!(result.success);
    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Put);
    assert_eq!(requests[0].url, "https://db.test/public/board.json");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_keep_their_paths() {
    let http = Arc::new(EchoHttpClient::with_delay(Duration::from_millis(10)));
    let service = FirebaseService::new(builder(http).build().unwrap()).unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for path in ["slow/a", "fast/b", "fast/c"] {
        let tx = tx.clone();
        let expected = path.to_string();
        service.submit_database(
            DatabaseOperation::Get {
                path: path.to_string(),
            },
            move |result| {
                tx.send((expected, result)).unwrap();
            },
        );
    }
    drop(tx);

    let mut seen = 0;
    while let Some((expected, result)) = rx.recv().await {
        assert!(result.success);
        assert_eq!(result.path, expected);
        assert!(result.payload.contains(&format!("/{}.json", expected)));
        seen += 1;
    }
    assert_eq!(seen, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_operations_are_bounded() {
    let http = Arc::new(EchoHttpClient::with_delay(Duration::from_millis(20)));
    let service =
        FirebaseService::new(builder(http.clone()).max_in_flight(2).build().unwrap()).unwrap();

    let tasks = (0..8).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .database(DatabaseOperation::Get {
                    path: format!("items/{}", i),
                })
                .await
        })
    });
    for result in futures::future::join_all(tasks).await {
        assert!(result.unwrap().success);
    }

    assert_eq!(http.requests().len(), 8);
    assert!(http.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_value_pollers_share_the_in_flight_limit() {
    let http = Arc::new(EchoHttpClient::with_delay(Duration::from_millis(20)));
    let config = builder(http.clone())
        .max_in_flight(1)
        .poll_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    let service = FirebaseService::new(config).unwrap();

    for room in ["rooms/1", "rooms/2", "rooms/3"] {
        service.subscribe_value(room, |_: &str, _: &str| {}).unwrap();
    }
    let read = service.database(DatabaseOperation::Get {
        path: "items/0".to_string(),
    });
    assert!(read.await.success);
    tokio::time::sleep(Duration::from_millis(150)).await;
    service.shutdown();

    assert!(http.requests().len() >= 4);
    assert_eq!(http.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_operations_after_shutdown_fail() {
    let http = Arc::new(EchoHttpClient::default());
    let service = FirebaseService::new(builder(http.clone()).build().unwrap()).unwrap();
    service.subscribe_value("rooms/1", |_: &str, _: &str| {}).unwrap();

    service.shutdown();
    assert!(service.is_shut_down());
    assert!(!service.unsubscribe_value("rooms/1"));

    let (tx, rx) = tokio::sync::oneshot::channel();
    service.submit_database(
        DatabaseOperation::Delete {
            path: "rooms/1".to_string(),
        },
        move |result| {
            let _ = tx.send(result);
        },
    );
    let result = rx.await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error_message, SHUT_DOWN);

    let auth = service.auth(AuthRequest::SignInAnonymously).await;
    assert_eq!(auth.error_message, SHUT_DOWN);

    assert!(matches!(
        service.subscribe_value("rooms/2", |_: &str, _: &str| {}),
        Err(CoreError::ShutDown)
    ));
    assert!(http
        .requests()
        .iter()
        .all(|request| request.method == HttpMethod::Get));
}

#[tokio::test]
async fn test_disabled_features_are_refused() {
    let http = Arc::new(EchoHttpClient::default());
    let service = FirebaseService::new(
        builder(http.clone())
            .enable_authentication(false)
            .enable_database(false)
            .build()
            .unwrap(),
    )
    .unwrap();

    let auth = service.auth(AuthRequest::SignInAnonymously).await;
    assert!(!auth.success);
    assert_eq!(auth.error_message, AUTHENTICATION_DISABLED);

    let database = service
        .database(DatabaseOperation::Get {
            path: "a".to_string(),
        })
        .await;
    assert!(!database.success);
    assert_eq!(database.error_message, DATABASE_NOT_CONFIGURED);
    assert!(service.subscribe_value("a", |_: &str, _: &str| {}).is_err());
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn test_provider_must_be_enabled() {
    let http = Arc::new(EchoHttpClient::default());
    let service = FirebaseService::new(
        builder(http.clone())
            .enabled_providers([AuthProvider::Email])
            .build()
            .unwrap(),
    )
    .unwrap();

    let result = service.auth(AuthRequest::SignInAnonymously).await;

    assert!(!result.success);
    assert!(result.error_message.contains("Anonymous"));
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn test_trusted_time_falls_back_when_unreachable() {
    let http = Arc::new(EchoHttpClient::default());
    let service = FirebaseService::new(builder(http).build().unwrap()).unwrap();

    let before = chrono::Utc::now().timestamp_millis();
    let (tx, rx) = tokio::sync::oneshot::channel();
    let id = service.resolve_trusted_time(move |time| {
        let _ = tx.send(time);
    });
    let time = rx.await.unwrap();

    assert_eq!(id.as_str(), "TIME_1");
    assert!(time.success);
    assert_eq!(time.trust, TimeTrust::Fallback);
    assert!(time.millis_value().unwrap() >= before);
}

#[tokio::test]
async fn test_push_ids_are_unique_and_sortable() {
    let service =
        FirebaseService::new(builder(Arc::new(EchoHttpClient::default())).build().unwrap())
            .unwrap();

    let first = service.generate_push_id();
    let second = service.generate_push_id();

    assert_eq!(first.len(), 20);
    assert!(second > first);
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    while !done() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_native_completions_route_by_operation_id() {
    let bridge = Arc::new(RecordingBridge::default());
    let config = builder(Arc::new(EchoHttpClient::default()))
        .transport(TransportKind::Native)
        .build()
        .unwrap();
    let service = FirebaseService::with_native_bridge(config, bridge.clone()).unwrap();
    assert_eq!(service.transport(), TransportKind::Native);

    let sign_in = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .auth(AuthRequest::SignIn {
                    email: "a@b.c".to_string(),
                    password: "pw".to_string(),
                })
                .await
        }
    });
    let read = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .database(DatabaseOperation::Get {
                    path: "scores".to_string(),
                })
                .await
        }
    });
    wait_until(|| {
        !bridge.auth.lock().unwrap().is_empty() && !bridge.database.lock().unwrap().is_empty()
    })
    .await;

    let (db_id, db_path) = bridge.database.lock().unwrap()[0].clone();
    assert_eq!(db_path, "scores");
    assert!(service.on_native_database_completed(NativeDatabaseCompletion {
        operation_id: db_id.clone(),
        success: true,
        path: "scores".to_string(),
        data: "[1,2]".to_string(),
        error_message: String::new(),
    }));
    // A second completion for the same id has nobody left to resolve.
    assert!(!service.on_native_database_completed(NativeDatabaseCompletion {
        operation_id: db_id,
        success: true,
        ..NativeDatabaseCompletion::default()
    }));
    assert_eq!(read.await.unwrap().payload, "[1,2]");
    assert!(!sign_in.is_finished());

    let (auth_id, operation) = bridge.auth.lock().unwrap()[0].clone();
    assert_eq!(operation, "signIn");
    assert!(service.on_native_auth_completed(NativeAuthCompletion {
        operation_id: auth_id,
        success: true,
        user_id: "native-uid".to_string(),
        email: "a@b.c".to_string(),
        auth_token: "native-token".to_string(),
        ..NativeAuthCompletion::default()
    }));
    let result = sign_in.await.unwrap();
    assert!(result.success);
    assert_eq!(result.operation, "signIn");
    assert_eq!(service.user_id(), "native-uid");
    assert_eq!(service.id_token(), "native-token");
}

#[tokio::test]
async fn test_native_value_changes_reach_subscribers() {
    let bridge = Arc::new(RecordingBridge::default());
    let config = builder(Arc::new(EchoHttpClient::default()))
        .transport(TransportKind::Native)
        .build()
        .unwrap();
    let service = FirebaseService::with_native_bridge(config, bridge.clone()).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    service
        .subscribe_value("rooms/1", move |path: &str, data: &str| {
            sink.lock().unwrap().push((path.to_string(), data.to_string()));
        })
        .unwrap();
    assert_eq!(*bridge.watched.lock().unwrap(), vec!["rooms/1".to_string()]);

    assert!(service.on_native_value_changed(NativeValueChanged {
        path: "rooms/1".to_string(),
        data: r#"{"players":2}"#.to_string(),
    }));
    assert!(!service.on_native_value_changed(NativeValueChanged {
        path: "rooms/2".to_string(),
        data: "null".to_string(),
    }));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("rooms/1".to_string(), r#"{"players":2}"#.to_string())]
    );
}

#[tokio::test]
async fn test_shutdown_fails_pending_native_operations() {
    let bridge = Arc::new(RecordingBridge::default());
    let config = builder(Arc::new(EchoHttpClient::default()))
        .transport(TransportKind::Native)
        .build()
        .unwrap();
    let service = FirebaseService::with_native_bridge(config, bridge.clone()).unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    service.submit_auth(AuthRequest::GetUser, move |result| {
        let _ = tx.send(result);
    });
    wait_until(|| !bridge.auth.lock().unwrap().is_empty()).await;

    service.shutdown();

    let result = rx.await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error_message, SHUT_DOWN);
}

#[tokio::test]
async fn test_rest_service_ignores_native_events() {
    let service =
        FirebaseService::new(builder(Arc::new(EchoHttpClient::default())).build().unwrap())
            .unwrap();
    assert_eq!(service.transport(), TransportKind::Rest);
    assert!(!service.on_native_auth_completed(NativeAuthCompletion::default()));
}

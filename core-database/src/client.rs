//! # Database REST Client
//!
//! Path-addressed CRUD and query calls against the realtime database REST
//! surface. Payloads are opaque JSON text: request bodies go out verbatim
//! and response bodies come back verbatim in [`DatabaseResult::payload`].
//!
//! | Operation | Verb |
//! |---|---|
//! | set / run_transaction | `PUT` |
//! | update | `PATCH` |
//! | push | `POST` |
//! | delete | `DELETE` |
//! | get / query | `GET` |
//!
//! The ID token is read from the [`TokenSource`] when each request is
//! built. An empty token is valid and simply omits the `auth` parameter,
//! which is how public rules are exercised.

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{HttpClient, HttpMethod, HttpRequest};
use core_auth::TokenSource;
use core_runtime::config::{FirebaseConfig, DEFAULT_REQUEST_TIMEOUT};
use core_runtime::events::{CoreEvent, DatabaseEvent, EventBus};
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};
use url::Url;

use crate::error::Result;
use crate::query::Query;
use crate::types::{DatabaseOperation, DatabaseResult};
use crate::url::DatabaseUrlBuilder;

pub struct DatabaseRestClient {
    http: Arc<dyn HttpClient>,
    urls: DatabaseUrlBuilder,
    tokens: Arc<dyn TokenSource>,
    event_bus: Option<EventBus>,
    request_timeout: Duration,
    verbose_http: bool,
}

impl DatabaseRestClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        database_url: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self> {
        Ok(Self {
            http,
            urls: DatabaseUrlBuilder::new(database_url)?,
            tokens,
            event_bus: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            verbose_http: false,
        })
    }

    pub fn from_config(
        config: &FirebaseConfig,
        tokens: Arc<dyn TokenSource>,
        event_bus: EventBus,
    ) -> Result<Self> {
        Ok(Self::new(
            Arc::clone(&config.http_client),
            config.full_database_url(),
            tokens,
        )?
        .with_event_bus(event_bus)
        .with_request_timeout(config.request_timeout)
        .with_verbose_http(config.verbose_http))
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_verbose_http(mut self, enabled: bool) -> Self {
        self.verbose_http = enabled;
        self
    }

    pub fn database_url(&self) -> &str {
        self.urls.base()
    }

    /// URL the operation on `path` would hit with the given token.
    pub fn url_for(&self, path: &str, query: &Query, auth_token: &str) -> Result<Url> {
        self.urls.build(path, query, auth_token)
    }

    #[instrument(skip(self, operation), fields(operation = operation.name(), path = operation.path()))]
    pub async fn execute(&self, operation: DatabaseOperation) -> DatabaseResult {
        let path = operation.path().to_string();
        let no_filters = Query::default();
        let (method, body, query) = match &operation {
            DatabaseOperation::Set { json, .. } | DatabaseOperation::Transaction { json, .. } => {
                (HttpMethod::Put, json.as_str(), &no_filters)
            }
            DatabaseOperation::Update { json, .. } => (HttpMethod::Patch, json.as_str(), &no_filters),
            DatabaseOperation::Push { json, .. } => (HttpMethod::Post, json.as_str(), &no_filters),
            DatabaseOperation::Delete { .. } => (HttpMethod::Delete, "", &no_filters),
            DatabaseOperation::Get { .. } => (HttpMethod::Get, "", &no_filters),
            DatabaseOperation::Query { query, .. } => (HttpMethod::Get, "", query),
        };

        let auth_token = self.tokens.id_token().await;
        let url = match self.urls.build(&path, query, &auth_token) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot build database URL");
                return self.fail(DatabaseResult::failed(path, e.to_string()));
            }
        };

        debug!(method = %method, url = %redact_auth(&url), "Sending database request");
        if self.verbose_http && !body.is_empty() {
            trace!(body, "Database request body");
        }

        let request = HttpRequest::new(method, url.as_str())
            .json_text(body)
            .timeout(self.request_timeout);

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Database request got no response");
                return self.fail(DatabaseResult::network_error(path));
            }
        };

        let status = response.status;
        let body = response.text_lossy();
        if self.verbose_http {
            trace!(status, body = %body, "Database response");
        }

        if !response.is_success() {
            warn!(status, "Database request rejected");
            return self.fail(DatabaseResult::rejected(path, status, body));
        }

        let result_path = match &operation {
            DatabaseOperation::Push { .. } => pushed_child_path(&path, &body),
            _ => path,
        };
        debug!(status, "Database request succeeded");
        DatabaseResult::succeeded(result_path, body)
    }

    fn fail(&self, result: DatabaseResult) -> DatabaseResult {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Database(DatabaseEvent::OperationFailed {
                path: result.path.clone(),
                message: result.error_message.clone(),
            }));
        }
        result
    }

    pub async fn set_value(&self, path: &str, json: &str) -> DatabaseResult {
        self.execute(DatabaseOperation::Set {
            path: path.to_string(),
            json: json.to_string(),
        })
        .await
    }

    pub async fn update_value(&self, path: &str, json: &str) -> DatabaseResult {
        self.execute(DatabaseOperation::Update {
            path: path.to_string(),
            json: json.to_string(),
        })
        .await
    }

    /// Append under a server-generated key. On success the result path
    /// names the new child.
    pub async fn push_value(&self, path: &str, json: &str) -> DatabaseResult {
        self.execute(DatabaseOperation::Push {
            path: path.to_string(),
            json: json.to_string(),
        })
        .await
    }

    pub async fn delete_value(&self, path: &str) -> DatabaseResult {
        self.execute(DatabaseOperation::Delete {
            path: path.to_string(),
        })
        .await
    }

    pub async fn get_value(&self, path: &str) -> DatabaseResult {
        self.execute(DatabaseOperation::Get {
            path: path.to_string(),
        })
        .await
    }

    pub async fn query(&self, path: &str, query: Query) -> DatabaseResult {
        self.execute(DatabaseOperation::Query {
            path: path.to_string(),
            query,
        })
        .await
    }

    /// Unconditional write; there is no compare-and-set over REST here.
    pub async fn run_transaction(&self, path: &str, json: &str) -> DatabaseResult {
        self.execute(DatabaseOperation::Transaction {
            path: path.to_string(),
            json: json.to_string(),
        })
        .await
    }
}

/// `path/name` when the push response names the generated key.
fn pushed_child_path(path: &str, body: &str) -> String {
    let name = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("name").and_then(Value::as_str).map(str::to_string));
    match name {
        Some(name) => format!("{}/{}", path.trim_end_matches('/'), name),
        None => path.to_string(),
    }
}

fn redact_auth(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "auth" {
                "[REDACTED]".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pushed_child_path() {
        assert_eq!(
            pushed_child_path("scores", r#"{"name":"-NabcDEF"}"#),
            "scores/-NabcDEF"
        );
        assert_eq!(pushed_child_path("scores/", r#"{"name":"-N1"}"#), "scores/-N1");
        assert_eq!(pushed_child_path("scores", "null"), "scores");
    }

    #[test]
    fn test_redact_auth() {
        let url = Url::parse("https://db.test/a.json?orderBy=%22x%22&auth=secret").unwrap();
        let rendered = redact_auth(&url);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("orderBy"));
    }
}

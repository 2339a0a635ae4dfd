//! Value listeners.
//!
//! At most one listener per path; registering again replaces the previous
//! one. Notifications go through the configured [`CallbackDispatcher`].
//!
//! Over REST there is no push channel, so [`RestValueWatcher`] polls the
//! path and notifies when the body changes. The first successful read is
//! always delivered. Given a shared semaphore, each poll GET holds a permit
//! so pollers count against the same in-flight limit as regular operations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bridge_traits::CallbackDispatcher;
use core_runtime::events::{CoreEvent, DatabaseEvent, EventBus};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::DatabaseRestClient;
use crate::url::normalize_path;

/// Receives `(path, data)` for a watched path.
pub type ValueCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

struct Listener {
    id: u64,
    path: String,
    callback: ValueCallback,
    cancel: CancellationToken,
}

/// Identifies one registration. Stale registrations cannot notify.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    pub id: u64,
    pub path: String,
    pub cancel: CancellationToken,
}

pub struct ValueListenerRegistry {
    listeners: Mutex<HashMap<String, Listener>>,
    dispatcher: Arc<dyn CallbackDispatcher>,
    next_id: AtomicU64,
}

impl ValueListenerRegistry {
    pub fn new(dispatcher: Arc<dyn CallbackDispatcher>) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            dispatcher,
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for `path`, cancelling any previous listener.
    pub fn register(&self, path: &str, callback: ValueCallback) -> ListenerHandle {
        let key = normalize_path(path);
        let handle = ListenerHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            path: path.to_string(),
            cancel: CancellationToken::new(),
        };

        let previous = self.lock().insert(
            key,
            Listener {
                id: handle.id,
                path: handle.path.clone(),
                callback,
                cancel: handle.cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            debug!(path, "Replacing value listener");
            previous.cancel.cancel();
        }

        handle
    }

    /// Drop the listener for `path`. Returns whether one existed.
    pub fn remove(&self, path: &str) -> bool {
        match self.lock().remove(&normalize_path(path)) {
            Some(listener) => {
                listener.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver `data` to whatever listener currently owns `path`.
    pub fn notify(&self, path: &str, data: &str) -> bool {
        self.deliver(path, None, data)
    }

    /// Deliver only if `handle` is still the registered listener.
    pub fn notify_handle(&self, handle: &ListenerHandle, data: &str) -> bool {
        self.deliver(&handle.path, Some(handle.id), data)
    }

    fn deliver(&self, path: &str, expected_id: Option<u64>, data: &str) -> bool {
        let target = {
            let listeners = self.lock();
            listeners
                .get(&normalize_path(path))
                .filter(|listener| expected_id.map_or(true, |id| id == listener.id))
                .map(|listener| (Arc::clone(&listener.callback), listener.path.clone()))
        };
        let Some((callback, registered_path)) = target else {
            return false;
        };

        let data = data.to_string();
        self.dispatcher
            .dispatch(Box::new(move || callback(&registered_path, &data)));
        true
    }

    /// Cancel and drop every listener.
    pub fn clear(&self) {
        let drained: Vec<Listener> = self.lock().drain().map(|(_, listener)| listener).collect();
        for listener in drained {
            listener.cancel.cancel();
        }
    }
}

/// Polling value listener for the REST transport.
pub struct RestValueWatcher {
    client: Arc<DatabaseRestClient>,
    registry: Arc<ValueListenerRegistry>,
    interval: Duration,
    event_bus: Option<EventBus>,
    permits: Option<Arc<Semaphore>>,
    runtime: Handle,
}

impl RestValueWatcher {
    pub fn new(
        client: Arc<DatabaseRestClient>,
        registry: Arc<ValueListenerRegistry>,
        interval: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            client,
            registry,
            interval,
            event_bus: None,
            permits: None,
            runtime,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Bound poll requests by `permits`. A closed semaphore stops the pollers.
    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = Some(permits);
        self
    }

    pub fn registry(&self) -> &Arc<ValueListenerRegistry> {
        &self.registry
    }

    /// Start polling `path`, replacing any listener already on it.
    pub fn watch(&self, path: &str, callback: ValueCallback) -> JoinHandle<()> {
        let handle = self.registry.register(path, callback);
        info!(path, interval_ms = self.interval.as_millis() as u64, "Watching value");

        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let event_bus = self.event_bus.clone();
        let permits = self.permits.clone();
        let period = self.interval;
        self.runtime
            .spawn(poll(client, registry, handle, period, event_bus, permits))
    }

    pub fn unwatch(&self, path: &str) -> bool {
        self.registry.remove(path)
    }

    pub fn shutdown(&self) {
        self.registry.clear();
    }
}

async fn poll(
    client: Arc<DatabaseRestClient>,
    registry: Arc<ValueListenerRegistry>,
    handle: ListenerHandle,
    period: Duration,
    event_bus: Option<EventBus>,
    permits: Option<Arc<Semaphore>>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen: Option<String> = None;

    loop {
        tokio::select! {
            _ = handle.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let permit = match &permits {
            Some(permits) => tokio::select! {
                _ = handle.cancel.cancelled() => break,
                permit = permits.acquire() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
            },
            None => None,
        };

        let result = tokio::select! {
            _ = handle.cancel.cancelled() => break,
            result = client.get_value(&handle.path) => result,
        };
        drop(permit);

        if !result.success {
            debug!(path = %handle.path, "Poll failed, will retry next tick");
            continue;
        }
        if last_seen.as_deref() == Some(result.payload.as_str()) {
            continue;
        }

        if !registry.notify_handle(&handle, &result.payload) {
            break;
        }
        if let Some(bus) = &event_bus {
            let _ = bus.emit(CoreEvent::Database(DatabaseEvent::ValueChanged {
                path: handle.path.clone(),
                data: result.payload.clone(),
            }));
        }
        last_seen = Some(result.payload);
    }

    debug!(path = %handle.path, "Value poller stopped");
}

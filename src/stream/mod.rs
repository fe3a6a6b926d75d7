//! Streams and stream subscriptions.
//!
//! A `Stream` is a named, append-only fan-out point: `insert` pushes a
//! document to every subscriber in registration order, synchronously, on
//! the caller's thread. A subscriber that panics or returns an error is
//! isolated — it does not stop fan-out to the subscribers after it, and
//! does not poison the stream for future inserts. A single synchronous
//! registry, since this engine's data path has no `tokio` channel hop.

use crate::document::Document;
use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stream used for engine diagnostics (dropped documents, subscriber
/// panics). Always present; cannot be deleted.
pub const SYSTEM_LOG_STREAM: &str = "_log";

pub trait Subscriber: std::fmt::Debug + Send {
    fn on_document(&mut self, doc: &Document);
}

/// A subscriber backed by a plain callback — used for ad-hoc `collect`
/// sinks and `QueryEngine::executeStatement`'s one-shot pipelines.
pub struct CallbackSubscriber {
    callback: Box<dyn FnMut(&Document) + Send>,
}

impl std::fmt::Debug for CallbackSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSubscriber").finish()
    }
}

impl CallbackSubscriber {
    pub fn new(callback: impl FnMut(&Document) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl Subscriber for CallbackSubscriber {
    fn on_document(&mut self, doc: &Document) {
        (self.callback)(doc)
    }
}

struct Stream {
    name: String,
    next_subscriber_id: u64,
    subscribers: Vec<(u64, Arc<Mutex<dyn Subscriber>>)>,
}

impl Stream {
    fn new(name: String) -> Self {
        Self {
            name,
            next_subscriber_id: 0,
            subscribers: Vec::new(),
        }
    }

    fn subscribe(&mut self, subscriber: Arc<Mutex<dyn Subscriber>>) -> u64 {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    fn unsubscribe(&mut self, id: u64) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    /// Fan out in registration order. Takes a snapshot of the subscriber
    /// list rather than `&self` so the caller can run it after dropping the
    /// registry lock — fanning out while the registry is locked would
    /// deadlock the moment a subscriber (e.g. `insert_into`) calls back into
    /// `StreamManager::insert` on the same thread. A subscriber whose
    /// callback panics is caught and isolated — later subscribers still run.
    fn fan_out(
        stream_name: &str,
        subscribers: &[(u64, Arc<Mutex<dyn Subscriber>>)],
        doc: &Document,
    ) -> Vec<u64> {
        let mut panicked = Vec::new();
        for (id, subscriber) in subscribers {
            let subscriber = subscriber.clone();
            let doc = doc.clone();
            let result = catch_unwind(AssertUnwindSafe(|| {
                subscriber.lock().on_document(&doc);
            }));
            if result.is_err() {
                tracing::warn!(stream = stream_name, subscriber_id = id, "subscriber panicked, isolating");
                panicked.push(*id);
            }
        }
        panicked
    }
}

/// Registry of every stream known to the engine. Reserved `_log` stream
/// always exists and cannot be created/deleted by name.
#[derive(Clone)]
pub struct StreamManager {
    streams: Arc<Mutex<HashMap<String, Stream>>>,
    event_counter: Arc<AtomicU64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Created(String),
    Deleted(String),
}

impl StreamManager {
    pub fn new() -> Self {
        let mut streams = HashMap::new();
        streams.insert(
            SYSTEM_LOG_STREAM.to_string(),
            Stream::new(SYSTEM_LOG_STREAM.to_string()),
        );
        Self {
            streams: Arc::new(Mutex::new(streams)),
            event_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn create_stream(&self, name: &str) -> EngineResult<()> {
        let mut streams = self.streams.lock();
        if streams.contains_key(name) {
            return Err(EngineError::StreamAlreadyExists(name.to_string()));
        }
        streams.insert(name.to_string(), Stream::new(name.to_string()));
        tracing::info!(stream = name, "stream-created");
        Ok(())
    }

    pub fn delete_stream(&self, name: &str) -> EngineResult<()> {
        if name == SYSTEM_LOG_STREAM {
            return Err(EngineError::ExecutionError(
                "the reserved _log stream cannot be deleted".to_string(),
            ));
        }
        let mut streams = self.streams.lock();
        streams
            .remove(name)
            .map(|_| tracing::info!(stream = name, "stream-deleted"))
            .ok_or_else(|| EngineError::UnknownStream(name.to_string()))
    }

    /// Fails with `UnknownStream` if `name` hasn't been created — an
    /// `insert_into` sink relies on this to detect a missing target and
    /// drop the document into `_log` instead.
    ///
    /// Snapshots the subscriber list under the registry lock and releases
    /// it before fanning out: a subscriber's `on_document` may itself call
    /// back into `insert` on this same thread (the terminal `insert_into`
    /// sink always does), and `parking_lot::Mutex` is not reentrant — fanning
    /// out under the lock would deadlock on the very first `insert_into`.
    /// This also matches spec §4.3: subscribers added during fan-out are
    /// visible only to subsequent documents, never the one in flight.
    pub fn insert(&self, name: &str, doc: Document) -> EngineResult<()> {
        let subscribers = {
            let streams = self.streams.lock();
            let stream = streams
                .get(name)
                .ok_or_else(|| EngineError::UnknownStream(name.to_string()))?;
            stream.subscribers.clone()
        };
        let panicked = Stream::fan_out(name, &subscribers, &doc);
        if !panicked.is_empty() {
            let mut streams = self.streams.lock();
            if let Some(stream) = streams.get_mut(name) {
                for id in &panicked {
                    stream.unsubscribe(*id);
                }
            }
            drop(streams);
            if name != SYSTEM_LOG_STREAM {
                for id in panicked {
                    let mut extra = serde_json::Map::new();
                    extra.insert("stream".to_string(), Document::String(name.to_string()));
                    extra.insert("subscriberId".to_string(), Document::from(id));
                    self.log_diagnostic(
                        "error",
                        "SUBSCRIBER_PANIC",
                        "subscriber panicked and was unsubscribed",
                        extra,
                    );
                }
            }
        }
        Ok(())
    }

    pub fn subscribe(&self, name: &str, subscriber: Arc<Mutex<dyn Subscriber>>) -> EngineResult<u64> {
        let mut streams = self.streams.lock();
        let stream = streams
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownStream(name.to_string()))?;
        Ok(stream.subscribe(subscriber))
    }

    pub fn unsubscribe(&self, name: &str, id: u64) {
        if let Some(stream) = self.streams.lock().get_mut(name) {
            stream.unsubscribe(id);
        }
    }

    pub fn stream_names(&self) -> Vec<String> {
        self.streams.lock().keys().cloned().collect()
    }

    pub fn stream_exists(&self, name: &str) -> bool {
        self.streams.lock().contains_key(name)
    }

    pub fn log(&self, doc: Document) {
        let _ = self.insert(SYSTEM_LOG_STREAM, doc);
    }

    /// Builds and logs a `{level, code, message, timestamp, ...extra}`
    /// diagnostic document — `_log` receives engine diagnostics as
    /// documents with at least these fields.
    pub fn log_diagnostic(
        &self,
        level: &str,
        code: &str,
        message: impl Into<String>,
        extra: serde_json::Map<String, Document>,
    ) {
        let mut map = serde_json::Map::new();
        map.insert("level".to_string(), Document::String(level.to_string()));
        map.insert("code".to_string(), Document::String(code.to_string()));
        map.insert("message".to_string(), Document::String(message.into()));
        map.insert(
            "timestamp".to_string(),
            Document::String(chrono::Utc::now().to_rfc3339()),
        );
        for (k, v) in extra {
            map.insert(k, v);
        }
        self.log(Document::Object(map));
    }

    pub fn next_event_id(&self) -> u64 {
        self.event_counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("streams", &self.stream_names())
            .finish()
    }
}

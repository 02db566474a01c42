//! In-memory backing store with live listeners.

use super::{BackingStore, ListenerId, Snapshot, SnapshotSink, StoreEvent};
use crate::error::{Result, StoreError};
use crate::query::{FilterOp, Query};
use crate::types::{fields_from, Document, DocumentId, Fields, Timestamp, CREATED_AT};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Memory store configuration.
#[derive(Clone, Debug)]
pub struct MemoryStoreConfig {
    /// Max values accepted by an `in` / `not-in` filter.
    /// Default: 10
    pub max_in_values: usize,

    /// Length of generated document ids.
    /// Default: 20
    pub id_length: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_in_values: 10,
            id_length: 20,
        }
    }
}

/// Listener and document counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Listeners registered.
    pub listens: u64,
    /// Listeners removed, by `unlisten`, failure or pruning.
    pub unlistens: u64,
    /// Currently registered listeners.
    pub active_listeners: usize,
    pub snapshots_delivered: u64,
    pub document_count: usize,
}

/// Internal listener state.
struct Listener {
    query: Query,
    sink: SnapshotSink,
    version: u64,
}

impl Listener {
    /// Deliver the current result. Returns false if the consumer is gone.
    fn push(&mut self, docs: Option<&BTreeMap<DocumentId, Document>>) -> bool {
        self.version += 1;
        let documents = match docs {
            Some(docs) => self.query.evaluate(docs.values()),
            None => Vec::new(),
        };
        let snapshot = Snapshot {
            collection: self.query.collection_name().to_string(),
            documents,
            version: self.version,
        };
        self.sink.send(StoreEvent::Snapshot(snapshot))
    }
}

/// A document store held entirely in memory.
///
/// Every write broadcasts a fresh snapshot to the listeners of the written
/// collection. Writes and broadcasts are serialized by one lock, so each
/// listener sees its snapshots in write order.
pub struct MemoryStore {
    config: MemoryStoreConfig,

    /// Documents by collection, then id.
    collections: RwLock<HashMap<String, BTreeMap<DocumentId, Document>>>,

    /// Active listeners by ID.
    listeners: Mutex<HashMap<ListenerId, Listener>>,

    /// Collections whose queries are refused, with the reason.
    rejected: RwLock<HashMap<String, String>>,

    /// Lock for write operations and broadcasts.
    write_lock: Mutex<()>,

    /// Last creation timestamp handed out.
    last_stamp: Mutex<i64>,

    next_listener: AtomicU64,
    next_document: AtomicU64,
    listens: AtomicU64,
    unlistens: AtomicU64,
    snapshots_delivered: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            collections: RwLock::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            rejected: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            last_stamp: Mutex::new(0),
            next_listener: AtomicU64::new(1),
            next_document: AtomicU64::new(1),
            listens: AtomicU64::new(0),
            unlistens: AtomicU64::new(0),
            snapshots_delivered: AtomicU64::new(0),
        }
    }

    // --- Writes ---

    /// Add a document, stamping `createdAt` unless the caller set it.
    pub fn add<T: Serialize>(&self, collection: &str, data: &T) -> Result<DocumentId> {
        let mut fields = to_fields(data)?;
        if !fields.contains_key(CREATED_AT) {
            fields.insert(CREATED_AT.to_string(), self.next_stamp().to_value());
        }
        Ok(self.insert(collection, fields))
    }

    /// Add a document whose creation timestamp is not committed yet.
    ///
    /// Listeners still see it in their snapshots.
    pub fn add_pending<T: Serialize>(&self, collection: &str, data: &T) -> Result<DocumentId> {
        let mut fields = to_fields(data)?;
        fields.remove(CREATED_AT);
        Ok(self.insert(collection, fields))
    }

    /// Stamp the creation timestamp of a pending document.
    ///
    /// Documents that already carry one keep it.
    pub fn commit(&self, collection: &str, id: &DocumentId) -> Result<Timestamp> {
        let _lock = self.write_lock.lock();
        let stamp = {
            let mut collections = self.collections.write();
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| not_found(collection, id))?;
            match doc.created_at() {
                Some(existing) => return Ok(existing),
                None => {
                    let stamp = self.next_stamp();
                    doc.fields.insert(CREATED_AT.to_string(), stamp.to_value());
                    stamp
                }
            }
        };
        self.broadcast(collection);
        Ok(stamp)
    }

    /// Create or replace a document under a caller-chosen id.
    pub fn set<T: Serialize>(&self, collection: &str, id: impl Into<DocumentId>, data: &T) -> Result<()> {
        let fields = to_fields(data)?;
        let id = id.into();
        let _lock = self.write_lock.lock();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), Document::new(id, fields));
        self.broadcast(collection);
        Ok(())
    }

    /// Merge fields into an existing document.
    pub fn update<T: Serialize>(&self, collection: &str, id: &DocumentId, data: &T) -> Result<()> {
        let fields = to_fields(data)?;
        let _lock = self.write_lock.lock();
        {
            let mut collections = self.collections.write();
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| not_found(collection, id))?;
            doc.fields.extend(fields);
        }
        self.broadcast(collection);
        Ok(())
    }

    /// Remove a document. Returns whether it existed.
    pub fn delete(&self, collection: &str, id: &DocumentId) -> bool {
        let _lock = self.write_lock.lock();
        let removed = self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.broadcast(collection);
        }
        removed
    }

    // --- Reads ---

    pub fn get(&self, collection: &str, id: &DocumentId) -> Option<Document> {
        self.collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// All documents of a collection, ordered by id.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    // --- Failure simulation ---

    /// Fail every listener on `collection` as if its channel dropped.
    ///
    /// Each listener receives a `ConnectionLost` error and is removed.
    pub fn fail_listeners(&self, collection: &str, cause: &str) -> usize {
        let _lock = self.write_lock.lock();
        let mut listeners = self.listeners.lock();
        let failed: Vec<ListenerId> = listeners
            .iter()
            .filter(|(_, l)| l.query.collection_name() == collection)
            .map(|(id, _)| *id)
            .collect();

        for id in &failed {
            if let Some(listener) = listeners.remove(id) {
                warn!(listener = id.0, collection, cause, "Failing listener");
                let _ = listener
                    .sink
                    .send(StoreEvent::Error(StoreError::ConnectionLost(cause.to_string())));
                self.unlistens.fetch_add(1, Ordering::SeqCst);
            }
        }

        failed.len()
    }

    /// Refuse future queries on `collection`.
    pub fn reject_collection(&self, collection: &str, reason: &str) {
        self.rejected
            .write()
            .insert(collection.to_string(), reason.to_string());
    }

    /// Accept queries on a previously rejected collection again.
    pub fn allow_collection(&self, collection: &str) {
        self.rejected.write().remove(collection);
    }

    // --- Introspection ---

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            listens: self.listens.load(Ordering::SeqCst),
            unlistens: self.unlistens.load(Ordering::SeqCst),
            active_listeners: self.listener_count(),
            snapshots_delivered: self.snapshots_delivered.load(Ordering::SeqCst),
            document_count: self.collections.read().values().map(|d| d.len()).sum(),
        }
    }

    // --- Internals ---

    fn insert(&self, collection: &str, fields: Fields) -> DocumentId {
        let counter = self.next_document.fetch_add(1, Ordering::SeqCst);
        let id = DocumentId::generate(collection, counter, self.config.id_length);

        let _lock = self.write_lock.lock();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), Document::new(id.clone(), fields));
        self.broadcast(collection);
        id
    }

    /// Strictly increasing creation timestamps, even within one microsecond.
    fn next_stamp(&self) -> Timestamp {
        let mut last = self.last_stamp.lock();
        let now = Timestamp::now().0.max(*last + 1);
        *last = now;
        Timestamp(now)
    }

    /// Decide whether this store can serve `query`.
    fn validate(&self, query: &Query) -> Result<()> {
        if let Some(reason) = self.rejected.read().get(query.collection_name()) {
            return Err(StoreError::QueryRejected(reason.clone()));
        }

        if query.limit() == Some(0) {
            return Err(StoreError::QueryRejected("limit must be positive".to_string()));
        }

        let Some(filter) = query.filter() else {
            return Ok(());
        };

        if filter.field.is_empty() {
            return Err(StoreError::QueryRejected("filter field must not be empty".to_string()));
        }

        match filter.op {
            FilterOp::In | FilterOp::NotIn => match &filter.value {
                Value::Array(items) if items.len() <= self.config.max_in_values => {}
                Value::Array(items) => {
                    return Err(StoreError::QueryRejected(format!(
                        "'{}' filter supports at most {} values, got {}",
                        filter.op,
                        self.config.max_in_values,
                        items.len()
                    )));
                }
                _ => {
                    return Err(StoreError::QueryRejected(format!(
                        "'{}' filter requires an array value",
                        filter.op
                    )));
                }
            },
            FilterOp::ArrayContains if filter.value.is_array() => {
                return Err(StoreError::QueryRejected(
                    "'array-contains' filter requires a single value".to_string(),
                ));
            }
            _ => {}
        }

        if filter.op.is_range() && filter.field != query.order_by().field {
            return Err(StoreError::QueryRejected(format!(
                "range filter on '{}' requires ordering by '{}' first, query orders by '{}'",
                filter.field,
                filter.field,
                query.order_by().field
            )));
        }

        Ok(())
    }

    /// Push a fresh snapshot to every listener on `collection`.
    /// Drops listeners whose consumer has gone away.
    ///
    /// Callers hold `write_lock`.
    fn broadcast(&self, collection: &str) {
        let collections = self.collections.read();
        let docs = collections.get(collection);
        let mut listeners = self.listeners.lock();
        let mut to_remove = Vec::new();

        for (id, listener) in listeners.iter_mut() {
            if listener.query.collection_name() != collection {
                continue;
            }
            if listener.push(docs) {
                self.snapshots_delivered.fetch_add(1, Ordering::SeqCst);
            } else {
                to_remove.push(*id);
            }
        }

        for id in to_remove {
            if listeners.remove(&id).is_some() {
                debug!(listener = id.0, collection, "Pruned disconnected listener");
                self.unlistens.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for MemoryStore {
    fn listen(&self, query: &Query, sink: SnapshotSink) -> Result<ListenerId> {
        let _lock = self.write_lock.lock();
        self.validate(query)?;

        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        let mut listener = Listener {
            query: query.clone(),
            sink,
            version: 0,
        };

        {
            let collections = self.collections.read();
            if listener.push(collections.get(query.collection_name())) {
                self.snapshots_delivered.fetch_add(1, Ordering::SeqCst);
            }
        }

        self.listeners.lock().insert(id, listener);
        self.listens.fetch_add(1, Ordering::SeqCst);
        debug!(listener = id.0, collection = query.collection_name(), "Listener registered");
        Ok(id)
    }

    fn unlisten(&self, id: ListenerId) {
        let _lock = self.write_lock.lock();
        if self.listeners.lock().remove(&id).is_some() {
            self.unlistens.fetch_add(1, Ordering::SeqCst);
            debug!(listener = id.0, "Listener released");
        }
    }
}

fn to_fields<T: Serialize>(data: &T) -> Result<Fields> {
    match serde_json::to_value(data)? {
        value @ Value::Object(_) => Ok(fields_from(value)),
        other => Err(StoreError::Serialization(format!(
            "document must be a JSON object, got {}",
            other
        ))),
    }
}

fn not_found(collection: &str, id: &DocumentId) -> StoreError {
    StoreError::DocumentNotFound {
        collection: collection.to_string(),
        id: id.clone(),
    }
}

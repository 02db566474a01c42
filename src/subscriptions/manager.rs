//! Subscription manager opening live queries against a backing store.

use crate::error::Result;
use crate::query::Query;
use crate::store::{snapshot_channel, BackingStore};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{SubscriptionHandle, SubscriptionId};

/// Opens subscriptions and keeps open/close counts.
pub struct SubscriptionManager {
    store: Arc<dyn BackingStore>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    open_count: AtomicU64,
    close_count: Arc<AtomicU64>,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self {
            store,
            next_id: AtomicU64::new(1),
            open_count: AtomicU64::new(0),
            close_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open a live query.
    ///
    /// Fails with `QueryRejected` when the store declines the query. On
    /// success the store has already queued the initial snapshot.
    pub fn open(&self, query: Query) -> Result<SubscriptionHandle> {
        let (sink, stream) = snapshot_channel();
        let listener = match self.store.listen(&query, sink) {
            Ok(listener) => listener,
            Err(err) => {
                warn!(collection = query.collection_name(), error = %err, "Store declined query");
                return Err(err);
            }
        };

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.open_count.fetch_add(1, Ordering::SeqCst);
        debug!(
            subscription = id.0,
            listener = listener.0,
            collection = query.collection_name(),
            "Subscription opened"
        );

        Ok(SubscriptionHandle {
            id,
            query,
            listener,
            stream,
            store: Arc::clone(&self.store),
            closed: AtomicBool::new(false),
            close_count: Arc::clone(&self.close_count),
        })
    }

    /// Close a handle. Same as [`SubscriptionHandle::close`].
    pub fn close(&self, handle: &SubscriptionHandle) {
        handle.close();
    }

    /// Handles opened so far.
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Handles closed so far.
    pub fn close_count(&self) -> u64 {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Handles opened and not yet closed.
    pub fn active_count(&self) -> u64 {
        self.open_count().saturating_sub(self.close_count())
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }
}

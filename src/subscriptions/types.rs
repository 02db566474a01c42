//! Subscription types for live collection queries.

use crate::error::{Result, StoreError};
use crate::query::Query;
use crate::store::{BackingStore, ListenerId, Snapshot, SnapshotStream, StoreEvent};
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Events delivered on a subscription.
#[derive(Clone, Debug)]
pub enum SubscriptionEvent {
    /// A full replacement result set.
    Data(Snapshot),
    /// The subscription failed; no further events follow.
    Failed(StoreError),
}

impl From<StoreEvent> for SubscriptionEvent {
    fn from(event: StoreEvent) -> Self {
        match event {
            StoreEvent::Snapshot(snapshot) => SubscriptionEvent::Data(snapshot),
            StoreEvent::Error(err) => SubscriptionEvent::Failed(err),
        }
    }
}

/// Handle owning one open live query.
///
/// Closing is idempotent and also happens on drop. Once closed, every
/// receive reports [`StoreError::SubscriptionClosed`] and events that were
/// already in flight are discarded.
pub struct SubscriptionHandle {
    pub(super) id: SubscriptionId,
    pub(super) query: Query,
    pub(super) listener: ListenerId,
    pub(super) stream: SnapshotStream,
    pub(super) store: Arc<dyn BackingStore>,
    pub(super) closed: AtomicBool,
    /// Shared with the manager that opened this handle.
    pub(super) close_count: Arc<AtomicU64>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SubscriptionEvent> {
        self.ensure_open()?;
        let event = self
            .stream
            .recv()
            .map_err(|_| StoreError::SubscriptionClosed)?;
        self.accept(event)
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<Option<SubscriptionEvent>> {
        self.ensure_open()?;
        match self.stream.try_recv() {
            Ok(event) => self.accept(event).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(StoreError::SubscriptionClosed),
        }
    }

    /// Receive with timeout. `Ok(None)` when nothing arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<SubscriptionEvent>> {
        self.ensure_open()?;
        match self.stream.recv_timeout(timeout) {
            Ok(event) => self.accept(event).map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::SubscriptionClosed),
        }
    }

    /// Release the live query. Further calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.store.unlisten(self.listener);
        self.close_count.fetch_add(1, Ordering::SeqCst);
        debug!(
            subscription = self.id.0,
            collection = self.query.collection_name(),
            "Subscription closed"
        );
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(StoreError::SubscriptionClosed)
        } else {
            Ok(())
        }
    }

    /// Drop events that raced with `close`.
    fn accept(&self, event: StoreEvent) -> Result<SubscriptionEvent> {
        self.ensure_open()?;
        Ok(event.into())
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("collection", &self.query.collection_name())
            .field("listener", &self.listener)
            .field("closed", &self.is_closed())
            .finish()
    }
}

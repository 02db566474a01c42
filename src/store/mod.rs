//! Backing store capability.
//!
//! A backing store answers ordered, filtered queries and pushes a full
//! result snapshot to each listener whenever the result may have changed.
//! This crate treats the store as an opaque [`BackingStore`]; the bundled
//! [`MemoryStore`] is an in-process implementation of it.

mod memory;

pub use memory::{MemoryStore, MemoryStoreConfig, MemoryStoreStats};

use crate::channel::{latest_channel, LatestReceiver, LatestSender};
use crate::error::{Result, StoreError};
use crate::query::Query;
use crate::types::Document;
use serde::{Deserialize, Serialize};

/// Identifier of a listener registered with a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// A full, point-in-time result set for one listener.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub collection: String,
    /// Entries in query order. May include uncommitted documents.
    pub documents: Vec<Document>,
    /// Increases by one with each delivery to the same listener.
    pub version: u64,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Store side of a listener's delivery channel.
pub type SnapshotSink = LatestSender<StoreEvent>;

/// Consumer side of a listener's delivery channel.
pub type SnapshotStream = LatestReceiver<StoreEvent>;

/// Create a last-value-wins channel for one listener.
pub fn snapshot_channel() -> (SnapshotSink, SnapshotStream) {
    latest_channel()
}

/// What a store pushes to a listener.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    Snapshot(Snapshot),
    /// The listener failed and will receive nothing further.
    Error(StoreError),
}

/// A document store offering live queries.
pub trait BackingStore: Send + Sync {
    /// Validate `query` and register a listener.
    ///
    /// The initial snapshot is delivered before this returns. Further
    /// snapshots follow every change to the queried collection.
    fn listen(&self, query: &Query, sink: SnapshotSink) -> Result<ListenerId>;

    /// Release a listener. Unknown or already released ids are ignored.
    fn unlisten(&self, id: ListenerId);
}

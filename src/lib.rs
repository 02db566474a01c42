//! # Live Collection
//!
//! Keeps a consumer supplied with the live, ordered contents of a document
//! collection, backed by a store that pushes full result snapshots.
//!
//! ## Core Concepts
//!
//! - **Queries**: a collection name, an optional filter triple and an
//!   ordering (newest first by default)
//! - **Subscriptions**: one listener on the backing store per handle,
//!   released exactly once
//! - **Projection**: snapshots become records tagged with their store id;
//!   uncommitted entries are skipped
//! - **Live collections**: own at most one subscription and expose the
//!   `data` / `error` pair
//!
//! ## Example
//!
//! ```
//! use live_collection::{Filter, LiveCollection, MemoryStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! fn main() -> live_collection::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.add("projects", &json!({"title": "Bug tracker", "userId": "u1"}))?;
//!
//!     let mut projects = LiveCollection::new(store.clone());
//!     projects.subscribe_to("projects", Some(Filter::eq("userId", "u1")))?;
//!
//!     // Later, after more writes
//!     store.add("projects", &json!({"title": "Mobile app", "userId": "u1"}))?;
//!     projects.poll();
//!     assert_eq!(projects.data().map(|records| records.len()), Some(2));
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod live;
pub mod projector;
pub mod query;
pub mod search;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use channel::{latest_channel, LatestReceiver, LatestSender};
pub use config::{LiveConfig, ProjectorConfig};
pub use error::{Result, StoreError, FETCH_ERROR_MESSAGE};
pub use live::{LiveCollection, Phase, StateWatcher};
pub use projector::{project, CollectionState};
pub use query::{Direction, Filter, FilterOp, OrderBy, ParseFilterOpError, Query, QueryBuilder};
pub use search::{field_contains, title_search};
pub use store::{
    snapshot_channel, BackingStore, ListenerId, MemoryStore, MemoryStoreConfig, MemoryStoreStats,
    Snapshot, SnapshotSink, SnapshotStream, StoreEvent,
};
pub use subscriptions::{SubscriptionEvent, SubscriptionHandle, SubscriptionId, SubscriptionManager};
pub use types::*;

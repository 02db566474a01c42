//! Subscription system for live collection queries.
//!
//! A [`SubscriptionManager`] opens one listener on the backing store per
//! [`SubscriptionHandle`]. Each handle receives full snapshots through a
//! last-value-wins channel, so a consumer that falls behind skips straight
//! to the newest result.
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(store);
//! let handle = manager.open(Query::collection("projects").build()?)?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(SubscriptionEvent::Data(snapshot)) => println!("{} documents", snapshot.len()),
//!         Ok(SubscriptionEvent::Failed(err)) => break,
//!         Err(_) => break,
//!     }
//! }
//! handle.close();
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{SubscriptionEvent, SubscriptionHandle, SubscriptionId};

//! Live collections: one owned subscription feeding two output cells.
//!
//! A [`LiveCollection`] holds at most one [`SubscriptionHandle`]. Calling
//! [`LiveCollection::subscribe`] again closes the previous handle before the
//! new one is opened, so repeated query changes never pile up listeners.
//! Dropping the collection closes whatever is open.
//!
//! ```text
//! Idle -> Subscribing -> Active -> Active (new snapshot)
//!                          |  \-> Closed (close)
//!                          v
//!                       Errored -> Closed (close)
//! Errored | Closed -> Subscribing (subscribe)
//! ```

use crate::channel::{latest_channel, LatestReceiver, LatestSender};
use crate::config::LiveConfig;
use crate::error::{Result, StoreError};
use crate::projector::CollectionState;
use crate::query::{Filter, Query};
use crate::store::BackingStore;
use crate::subscriptions::{SubscriptionEvent, SubscriptionHandle, SubscriptionManager};
use crate::types::Record;
use crossbeam_channel::{RecvError, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Lifecycle phase of a live collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Subscribing,
    Active,
    Errored,
    Closed,
}

/// Keeps the latest result of one query, replacing it wholesale on change.
pub struct LiveCollection {
    manager: SubscriptionManager,
    config: LiveConfig,
    handle: Option<SubscriptionHandle>,
    query: Option<Query>,
    state: CollectionState,
    phase: Phase,
    watchers: Vec<LatestSender<CollectionState>>,
}

impl LiveCollection {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self::with_config(store, LiveConfig::default())
    }

    pub fn with_config(store: Arc<dyn BackingStore>, config: LiveConfig) -> Self {
        Self {
            manager: SubscriptionManager::new(store),
            config,
            handle: None,
            query: None,
            state: CollectionState::default(),
            phase: Phase::Idle,
            watchers: Vec::new(),
        }
    }

    /// Subscribe to `collection`, optionally filtered, in the default order.
    pub fn subscribe_to(&mut self, collection: &str, filter: Option<Filter>) -> Result<()> {
        let query = Query::collection(collection)
            .order_by(
                self.config.default_order.field.clone(),
                self.config.default_order.direction,
            )
            .maybe_where(filter)
            .build()?;
        self.subscribe(query)
    }

    /// Replace the current subscription with one for `query`.
    ///
    /// The previous handle is closed first and the outputs reset. If the
    /// store declines the query the collection ends up `Errored` with the
    /// fixed error message, and the cause is returned.
    pub fn subscribe(&mut self, query: Query) -> Result<()> {
        self.release();
        self.phase = Phase::Subscribing;
        self.query = Some(query.clone());
        self.state = CollectionState::default();
        self.publish();

        match self.manager.open(query) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.phase = Phase::Active;
                self.poll();
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Apply every event that has already arrived. Never blocks.
    ///
    /// Returns whether the outputs changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        loop {
            let event = match &self.handle {
                Some(handle) => handle.try_recv(),
                None => return changed,
            };
            match event {
                Ok(Some(event)) => {
                    changed = true;
                    if !self.apply(event) {
                        return changed;
                    }
                }
                Ok(None) => return changed,
                Err(_) => {
                    self.hang_up();
                    return true;
                }
            }
        }
    }

    /// Block up to `timeout` for the next event, then drain the rest.
    ///
    /// Returns whether the outputs changed.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let event = match &self.handle {
            Some(handle) => handle.recv_timeout(timeout),
            None => return false,
        };
        match event {
            Ok(Some(event)) => {
                if self.apply(event) {
                    self.poll();
                }
                true
            }
            Ok(None) => false,
            Err(_) => {
                self.hang_up();
                true
            }
        }
    }

    /// Tear down the subscription. Does nothing when already closed.
    pub fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.release();
        self.phase = Phase::Closed;
        debug!("Live collection closed");
    }

    /// Observe every published state. A slow watcher sees only the latest.
    pub fn watch(&mut self) -> StateWatcher {
        let (tx, rx) = latest_channel();
        let _ = tx.send(self.state.clone());
        self.watchers.push(tx);
        StateWatcher { receiver: rx }
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    pub fn data(&self) -> Option<&[Record]> {
        self.state.data.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn manager(&self) -> &SubscriptionManager {
        &self.manager
    }

    /// Apply one event. Returns false once the subscription has failed.
    fn apply(&mut self, event: SubscriptionEvent) -> bool {
        match event {
            SubscriptionEvent::Data(snapshot) => {
                self.state.apply_snapshot(&snapshot, &self.config.projector);
                self.publish();
                true
            }
            SubscriptionEvent::Failed(err) => {
                self.fail(&err);
                false
            }
        }
    }

    /// Move to `Errored`, releasing the handle. No retry.
    fn fail(&mut self, err: &StoreError) {
        self.release();
        self.state.apply_failure(err, &self.config.projector);
        self.phase = Phase::Errored;
        self.publish();
    }

    /// The store dropped the sink without reporting an error. Held handles
    /// are never closed, so a receive error here means the stream is gone.
    fn hang_up(&mut self) {
        self.fail(&StoreError::ConnectionLost(
            "notification channel closed".to_string(),
        ));
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }

    fn publish(&mut self) {
        let state = &self.state;
        self.watchers.retain(|w| w.send(state.clone()));
    }
}

impl Drop for LiveCollection {
    fn drop(&mut self) {
        self.release();
    }
}

/// Receives published [`CollectionState`]s, latest value only.
pub struct StateWatcher {
    receiver: LatestReceiver<CollectionState>,
}

impl StateWatcher {
    /// Receive the next state (blocking). Fails once the collection is gone.
    pub fn recv(&self) -> std::result::Result<CollectionState, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> std::result::Result<CollectionState, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<CollectionState, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// The most recent unseen state, if any.
    pub fn latest(&self) -> Option<CollectionState> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FETCH_ERROR_MESSAGE;
    use crate::query::FilterOp;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, LiveCollection) {
        let store = Arc::new(MemoryStore::new());
        let live = LiveCollection::new(store.clone());
        (store, live)
    }

    #[test]
    fn test_starts_idle() {
        let (_store, live) = setup();
        assert_eq!(live.phase(), Phase::Idle);
        assert!(live.data().is_none());
        assert!(live.error().is_none());
    }

    #[test]
    fn test_subscribe_publishes_initial_result() {
        let (store, mut live) = setup();
        store.add("projects", &json!({"title": "A"})).unwrap();

        live.subscribe_to("projects", None).unwrap();
        assert_eq!(live.phase(), Phase::Active);
        assert_eq!(live.data().unwrap().len(), 1);
    }

    #[test]
    fn test_poll_picks_up_writes() {
        let (store, mut live) = setup();
        live.subscribe_to("projects", None).unwrap();
        assert_eq!(live.data().unwrap().len(), 0);
        assert!(!live.poll());

        store.add("projects", &json!({"title": "A"})).unwrap();
        assert!(live.poll());
        assert_eq!(live.data().unwrap().len(), 1);
    }

    #[test]
    fn test_rejected_query_errors() {
        let (_store, mut live) = setup();
        let err = live
            .subscribe_to("projects", Some(Filter::new("userId", FilterOp::In, "u1")))
            .unwrap_err();

        assert!(err.is_query_rejected());
        assert_eq!(live.phase(), Phase::Errored);
        assert!(live.data().is_none());
        assert_eq!(live.error(), Some(FETCH_ERROR_MESSAGE));
    }

    #[test]
    fn test_close_twice() {
        let (store, mut live) = setup();
        live.subscribe_to("projects", None).unwrap();

        live.close();
        live.close();
        assert_eq!(live.phase(), Phase::Closed);
        assert_eq!(store.listener_count(), 0);
        assert_eq!(live.manager().close_count(), 1);
    }

    #[test]
    fn test_errored_then_closed() {
        let (store, mut live) = setup();
        live.subscribe_to("projects", None).unwrap();

        store.fail_listeners("projects", "gone");
        live.poll();
        assert_eq!(live.phase(), Phase::Errored);

        live.close();
        assert_eq!(live.phase(), Phase::Closed);
    }

    #[test]
    fn test_drop_releases_listener() {
        let (store, mut live) = setup();
        live.subscribe_to("projects", None).unwrap();
        drop(live);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_watch_sees_latest_state() {
        let (store, mut live) = setup();
        let watcher = live.watch();
        live.subscribe_to("projects", None).unwrap();

        store.add("projects", &json!({"title": "A"})).unwrap();
        store.add("projects", &json!({"title": "B"})).unwrap();
        live.poll();

        let state = watcher.latest().unwrap();
        assert_eq!(state.data.unwrap().len(), 2);
        assert!(watcher.latest().is_none());
    }

    #[test]
    fn test_dropped_watcher_is_pruned() {
        let (store, mut live) = setup();
        let watcher = live.watch();
        drop(watcher);

        live.subscribe_to("projects", None).unwrap();
        store.add("projects", &json!({"title": "A"})).unwrap();
        live.poll();
        assert!(live.watchers.is_empty());
    }
}

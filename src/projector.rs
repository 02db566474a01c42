//! Projection of store snapshots into published records.

use crate::config::ProjectorConfig;
use crate::error::StoreError;
use crate::store::Snapshot;
use crate::types::{Record, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Build the published sequence from a snapshot.
///
/// Keeps snapshot order. Entries without a timestamp (or with a null one)
/// are not committed yet and are skipped. The store id is merged into each
/// record and wins over any `id` field the document carried.
pub fn project(snapshot: &Snapshot, config: &ProjectorConfig) -> Vec<Record> {
    snapshot
        .documents
        .iter()
        .filter(|doc| {
            doc.get(&config.timestamp_field)
                .map_or(false, |v| !v.is_null())
        })
        .map(|doc| {
            let mut fields = doc.fields.clone();
            fields.remove(ID_FIELD);
            Record {
                id: doc.id.clone(),
                fields,
            }
        })
        .collect()
}

/// The two output cells observed by a consumer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionState {
    /// Latest published sequence. `None` before the first snapshot and after
    /// a failure.
    pub data: Option<Vec<Record>>,
    /// Fixed user-facing message while failed.
    pub error: Option<String>,
}

impl CollectionState {
    /// Replace the published sequence and clear any error.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, config: &ProjectorConfig) {
        let records = project(snapshot, config);
        debug!(
            collection = %snapshot.collection,
            version = snapshot.version,
            raw = snapshot.len(),
            published = records.len(),
            "Applied snapshot"
        );
        self.data = Some(records);
        self.error = None;
    }

    /// Clear the published sequence and show the fixed error message.
    ///
    /// The cause is logged here and not kept.
    pub fn apply_failure(&mut self, err: &StoreError, config: &ProjectorConfig) {
        warn!(error = %err, "Live query failed");
        self.data = None;
        self.error = Some(config.error_message.clone());
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Records as plain JSON objects, each with its `id`.
    pub fn to_json(&self) -> Value {
        match &self.data {
            Some(records) => Value::Array(
                records
                    .iter()
                    .map(|r| Value::Object(r.to_object()))
                    .collect(),
            ),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FETCH_ERROR_MESSAGE;
    use crate::types::{fields_from, Document};
    use serde_json::json;

    fn snapshot(docs: Vec<Document>) -> Snapshot {
        Snapshot {
            collection: "projects".to_string(),
            documents: docs,
            version: 1,
        }
    }

    fn doc(id: &str, value: Value) -> Document {
        Document::new(id, fields_from(value))
    }

    #[test]
    fn test_skips_uncommitted_entries() {
        let snap = snapshot(vec![
            doc("a", json!({"title": "A", "createdAt": 2})),
            doc("b", json!({"title": "X"})),
            doc("c", json!({"title": "C", "createdAt": null})),
            doc("d", json!({"title": "D", "createdAt": 1})),
        ]);

        let records = project(&snap, &ProjectorConfig::default());
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn test_store_id_wins() {
        let snap = snapshot(vec![doc("real", json!({"id": "fake", "createdAt": 1}))]);
        let records = project(&snap, &ProjectorConfig::default());
        assert_eq!(records[0].id.as_str(), "real");
        assert_eq!(records[0].to_object()["id"], json!("real"));
    }

    #[test]
    fn test_custom_timestamp_field() {
        let config = ProjectorConfig {
            timestamp_field: "postedAt".to_string(),
            ..Default::default()
        };
        let snap = snapshot(vec![
            doc("a", json!({"postedAt": 1})),
            doc("b", json!({"createdAt": 1})),
        ]);
        let records = project(&snap, &config);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_str(), "a");
        assert_eq!(
            records[0].timestamp(&config.timestamp_field),
            Some(crate::types::Timestamp(1))
        );
        assert_eq!(records[0].created_at(), None);
    }

    #[test]
    fn test_failure_overwrites_data() {
        let config = ProjectorConfig::default();
        let mut state = CollectionState::default();
        state.apply_snapshot(&snapshot(vec![doc("a", json!({"createdAt": 1}))]), &config);
        assert!(state.is_loaded());

        state.apply_failure(&StoreError::ConnectionLost("reset".into()), &config);
        assert_eq!(state.data, None);
        assert_eq!(state.error.as_deref(), Some(FETCH_ERROR_MESSAGE));
        assert_eq!(state.to_json(), Value::Null);
    }

    #[test]
    fn test_snapshot_clears_error() {
        let config = ProjectorConfig::default();
        let mut state = CollectionState::default();
        state.apply_failure(&StoreError::QueryRejected("index".into()), &config);

        state.apply_snapshot(&snapshot(vec![]), &config);
        assert_eq!(state.data, Some(vec![]));
        assert!(!state.is_failed());
    }

    #[test]
    fn test_to_json() {
        let config = ProjectorConfig::default();
        let mut state = CollectionState::default();
        state.apply_snapshot(
            &snapshot(vec![doc("a", json!({"title": "A", "createdAt": 1}))]),
            &config,
        );
        assert_eq!(
            state.to_json(),
            json!([{"id": "a", "title": "A", "createdAt": 1}])
        );
    }
}

//! Configuration for live collections.

use crate::error::FETCH_ERROR_MESSAGE;
use crate::query::OrderBy;
use crate::types::CREATED_AT;

/// How snapshots are turned into published records.
#[derive(Clone, Debug)]
pub struct ProjectorConfig {
    /// Entries lacking this field are not committed yet and are skipped.
    /// Default: "createdAt"
    pub timestamp_field: String,

    /// Message published in place of any failure.
    /// Default: "Could not fetch data"
    pub error_message: String,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            timestamp_field: CREATED_AT.to_string(),
            error_message: FETCH_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Configuration for a [`LiveCollection`](crate::live::LiveCollection).
#[derive(Clone, Debug, Default)]
pub struct LiveConfig {
    pub projector: ProjectorConfig,

    /// Ordering used by `subscribe_to`. Default: newest first.
    pub default_order: OrderBy,
}

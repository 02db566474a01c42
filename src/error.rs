//! Error types for live collections.

use crate::types::DocumentId;
use thiserror::Error;

/// Message published to consumers whenever a subscription fails.
pub const FETCH_ERROR_MESSAGE: &str = "Could not fetch data";

/// Main error type for store and subscription operations.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StoreError {
    /// The backing store declined the query (malformed filter, missing index,
    /// permission denied).
    #[error("Query rejected: {0}")]
    QueryRejected(String),

    /// The notification channel failed after being established.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Rejected locally before reaching the store.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: DocumentId },

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_query_rejected(&self) -> bool {
        matches!(self, StoreError::QueryRejected(_))
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, StoreError::ConnectionLost(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

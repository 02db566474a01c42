//! Query construction.
//!
//! A [`Query`] names a collection, an optional [`Filter`] triple, an
//! [`OrderBy`] (newest first unless overridden) and an optional limit.
//! Only the collection name is checked locally; the backing store decides
//! whether it can serve the filter.

mod filter;
mod order;

pub use filter::{Filter, FilterOp, ParseFilterOpError};
pub use order::{Direction, OrderBy};

use crate::error::{Result, StoreError};
use crate::types::{Document, Fields};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable query descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    collection: String,
    filter: Option<Filter>,
    order_by: OrderBy,
    limit: Option<usize>,
}

impl Query {
    /// Start building a query against `collection`.
    pub fn collection(name: impl Into<String>) -> QueryBuilder {
        QueryBuilder {
            collection: name.into(),
            filter: None,
            order_by: OrderBy::default(),
            limit: None,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn order_by(&self) -> &OrderBy {
        &self.order_by
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether a document's fields satisfy the filter, if any.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(fields))
    }

    /// Evaluate the query over a collection's documents.
    ///
    /// Filters, orders and truncates. Used by stores that hold their data in
    /// memory.
    pub fn evaluate<'a, I>(&self, docs: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut out: Vec<Document> = docs
            .into_iter()
            .filter(|d| self.matches(&d.fields))
            .cloned()
            .collect();
        self.order_by.sort(&mut out);
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Builder for [`Query`].
#[derive(Clone, Debug)]
pub struct QueryBuilder {
    collection: String,
    filter: Option<Filter>,
    order_by: OrderBy,
    limit: Option<usize>,
}

impl QueryBuilder {
    /// Restrict results with a (field, operator, value) triple.
    pub fn filter(self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.where_(Filter::new(field, op, value))
    }

    /// Restrict results with a prepared filter. Replaces any earlier filter.
    pub fn where_(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Attach an optional filter, as handed over by callers that may or may
    /// not restrict the collection.
    pub fn maybe_where(mut self, filter: Option<Filter>) -> Self {
        if filter.is_some() {
            self.filter = filter;
        }
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = OrderBy::new(field, direction);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<Query> {
        if self.collection.trim().is_empty() {
            return Err(StoreError::InvalidQuery(
                "collection name must not be empty".to_string(),
            ));
        }

        Ok(Query {
            collection: self.collection,
            filter: self.filter,
            order_by: self.order_by,
            limit: self.limit,
        })
    }
}

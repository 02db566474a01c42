//! Result ordering.

use super::filter::compare_values;
use crate::types::{Document, CREATED_AT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// Ordering applied to a query's results.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Desc)
    }

    /// Compare two documents under this ordering.
    ///
    /// Documents missing the field sort last in both directions. Ties fall
    /// back to the document id so the order is total.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let by_field = match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => {
                let ord = total_cmp(x, y);
                match self.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_field.then_with(|| a.id.cmp(&b.id))
    }

    /// Sort documents in place.
    pub fn sort(&self, docs: &mut [Document]) {
        docs.sort_by(|a, b| self.compare(a, b));
    }
}

impl Default for OrderBy {
    /// Newest first.
    fn default() -> Self {
        OrderBy::desc(CREATED_AT)
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type rank, then by value.
fn total_cmp(a: &Value, b: &Value) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = total_cmp(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        // Objects have no useful order; compare their encodings.
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => compare_values(a, b).unwrap_or(Ordering::Equal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fields_from;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document::new(id, fields_from(value))
    }

    #[test]
    fn test_default_is_newest_first() {
        let mut docs = vec![
            doc("a", json!({"createdAt": 1})),
            doc("b", json!({"createdAt": 3})),
            doc("c", json!({"createdAt": 2})),
        ];
        OrderBy::default().sort(&mut docs);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_missing_field_sorts_last() {
        let mut docs = vec![
            doc("pending", json!({"title": "X"})),
            doc("old", json!({"createdAt": 1})),
        ];
        OrderBy::default().sort(&mut docs);
        assert_eq!(docs[1].id.as_str(), "pending");

        OrderBy::asc(CREATED_AT).sort(&mut docs);
        assert_eq!(docs[1].id.as_str(), "pending");
    }

    #[test]
    fn test_ties_break_on_id() {
        let mut docs = vec![
            doc("b", json!({"createdAt": 1})),
            doc("a", json!({"createdAt": 1})),
        ];
        OrderBy::default().sort(&mut docs);
        assert_eq!(docs[0].id.as_str(), "a");
    }

    #[test]
    fn test_mixed_integer_and_float_timestamps_sort() {
        let values = [
            json!(9007199254740993i64),
            json!(9007199254740992.0),
            json!(9007199254740992i64),
        ];
        let mut docs: Vec<Document> = (0..64)
            .map(|i| doc(&format!("d{:02}", i), json!({"createdAt": values[i % 3].clone()})))
            .collect();

        let order = OrderBy::default();
        order.sort(&mut docs);

        for pair in docs.windows(2) {
            assert_ne!(order.compare(&pair[0], &pair[1]), Ordering::Greater);
        }
        assert_eq!(docs[0].get(CREATED_AT), Some(&json!(9007199254740993i64)));
    }

    #[test]
    fn test_mixed_types_rank() {
        let mut docs = vec![
            doc("s", json!({"k": "text"})),
            doc("n", json!({"k": 5})),
            doc("z", json!({"k": null})),
        ];
        OrderBy::asc("k").sort(&mut docs);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "n", "s"]);
    }
}

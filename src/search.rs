//! Client-side text search over a published sequence.

use crate::types::Record;
use serde_json::Value;

/// Records whose `title` contains `needle`, ignoring case.
pub fn title_search<'a>(records: &'a [Record], needle: &str) -> Vec<&'a Record> {
    field_contains(records, "title", needle)
}

/// Records whose string `field` contains `needle`, ignoring case.
///
/// An empty needle keeps every record. Records without the field, or with a
/// non-string value in it, never match a non-empty needle.
pub fn field_contains<'a>(records: &'a [Record], field: &str, needle: &str) -> Vec<&'a Record> {
    if needle.is_empty() {
        return records.iter().collect();
    }

    let needle = needle.to_lowercase();
    records
        .iter()
        .filter(|r| match r.get(field) {
            Some(Value::String(s)) => s.to_lowercase().contains(&needle),
            _ => false,
        })
        .collect()
}

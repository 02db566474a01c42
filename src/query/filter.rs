//! Filter triples and their evaluation against document fields.

use crate::types::Fields;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a filter triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "array-contains")]
    ArrayContains,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "==",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::In => "in",
            FilterOp::NotIn => "not-in",
            FilterOp::ArrayContains => "array-contains",
        }
    }

    /// Operators that constrain a range rather than a single value.
    ///
    /// A store can only serve these on the field it orders by first.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge | FilterOp::Ne | FilterOp::NotIn
        )
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown operator string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseFilterOpError(pub String);

impl fmt::Display for ParseFilterOpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown filter operator: {}", self.0)
    }
}

impl std::error::Error for ParseFilterOpError {}

impl FromStr for FilterOp {
    type Err = ParseFilterOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(FilterOp::Eq),
            "!=" => Ok(FilterOp::Ne),
            "<" => Ok(FilterOp::Lt),
            "<=" => Ok(FilterOp::Le),
            ">" => Ok(FilterOp::Gt),
            ">=" => Ok(FilterOp::Ge),
            "in" => Ok(FilterOp::In),
            "not-in" => Ok(FilterOp::NotIn),
            "array-contains" => Ok(FilterOp::ArrayContains),
            other => Err(ParseFilterOpError(other.to_string())),
        }
    }
}

/// A (field, operator, value) triple restricting a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Shorthand for an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Evaluate the predicate against a document's fields.
    ///
    /// A document without the field never matches, whatever the operator.
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = fields.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Ne => !values_equal(actual, &self.value),
            FilterOp::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Le => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Ge => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::In => match &self.value {
                Value::Array(items) => items.iter().any(|v| values_equal(actual, v)),
                _ => false,
            },
            FilterOp::NotIn => match &self.value {
                Value::Array(items) => !items.iter().any(|v| values_equal(actual, v)),
                _ => false,
            },
            FilterOp::ArrayContains => match actual {
                Value::Array(items) => items.iter().any(|v| values_equal(v, &self.value)),
                _ => false,
            },
        }
    }
}

/// Equality that treats `1` and `1.0` as the same number.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Compare two values of the same type family. `None` across families.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// A JSON number, integers kept exact.
#[derive(Clone, Copy)]
enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    fn of(n: &Number) -> Option<Self> {
        if let Some(i) = n.as_i64() {
            Some(Num::Int(i as i128))
        } else if let Some(u) = n.as_u64() {
            Some(Num::Int(u as i128))
        } else {
            n.as_f64().map(Num::Float)
        }
    }
}

/// Exact numeric comparison, consistent across integers and floats.
///
/// Integers never go through `f64` alone, so 2^53 and 2^53 + 1 stay distinct
/// even when a float equal to one of them is in the mix.
fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    match (Num::of(x)?, Num::of(y)?) {
        (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
        (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b),
        (Num::Int(i), Num::Float(f)) => int_vs_float(i, f),
        (Num::Float(f), Num::Int(i)) => int_vs_float(i, f).map(Ordering::reverse),
    }
}

fn int_vs_float(i: i128, f: f64) -> Option<Ordering> {
    // Rounding to f64 is monotonic: a strict difference there is the answer.
    let ord = (i as f64).partial_cmp(&f)?;
    if ord != Ordering::Equal {
        return Some(ord);
    }
    // Equal after rounding means `f` is integral and close to `i`.
    Some(i.cmp(&(f as i128)))
}

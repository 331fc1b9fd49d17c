//! Field filters evaluated in memory.
//!
//! Queries have no index: every condition is checked against every document
//! of the collection, and a document matches when all conditions hold.
//!
//! Numbers compare by value under every operator, so `2` equals `2.0`.
//! Ordering operators compare numbers numerically, strings lexicographically
//! and booleans with `false < true`. Values of different JSON types are
//! incomparable, so an ordering condition across types never matches. A
//! missing field fails every operator except `!=`.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::document::Document;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "array-contains")]
    ArrayContains,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::ArrayContains => "array-contains",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            "array-contains" => Ok(Operator::ArrayContains),
            other => Err(StoreError::InvalidOperator(other.to_string())),
        }
    }
}

/// A single `field <op> value` filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: JsonValue,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let Some(field_value) = doc.get(&self.field) else {
            return self.operator == Operator::NotEqual;
        };

        match self.operator {
            Operator::Equal => values_equal(field_value, &self.value),
            Operator::NotEqual => !values_equal(field_value, &self.value),
            Operator::LessThan => compare(field_value, &self.value) == Some(Ordering::Less),
            Operator::LessThanOrEqual => matches!(
                compare(field_value, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::GreaterThan => compare(field_value, &self.value) == Some(Ordering::Greater),
            Operator::GreaterThanOrEqual => matches!(
                compare(field_value, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::ArrayContains => match field_value {
                JsonValue::Array(items) => items.iter().any(|item| values_equal(item, &self.value)),
                _ => false,
            },
        }
    }
}

/// JSON equality, except that numbers compare by value so `2` equals `2.0`.
fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    match (left, right) {
        (JsonValue::Number(_), JsonValue::Number(_)) => compare(left, right) == Some(Ordering::Equal),
        _ => left == right,
    }
}

/// Orders two scalars of the same JSON type. `None` when incomparable.
fn compare(left: &JsonValue, right: &JsonValue) -> Option<Ordering> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of conditions.
pub fn matches_all(conditions: &[Condition], doc: &Document) -> bool {
    conditions.iter().all(|c| c.matches(doc))
}

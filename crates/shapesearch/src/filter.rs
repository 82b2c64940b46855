//! Attribute-filter mini-language applied to candidate metadata payloads.
//!
//! A predicate is a conjunction of clauses. Each clause is parsed from a
//! `"field__operator"` key (operator suffix optional, defaulting to equality)
//! plus a literal operand, with dotted-path access into nested payloads:
//!
//! ```
//! use serde_json::json;
//! use shapesearch::FilterPredicate;
//!
//! let predicate = FilterPredicate::parse([
//!     ("geo_type", json!("ZipCode")),
//!     ("population__gte", json!(1000)),
//!     ("ref_data.country", json!("us")),
//! ])?;
//! assert!(predicate.matches(&json!({
//!     "geo_type": "ZipCode",
//!     "population": 3101,
//!     "ref_data": {"country": "us"}
//! })));
//! # Ok::<(), shapesearch::FilterError>(())
//! ```
//!
//! Unknown operators fail at parse time; evaluation is total and never
//! errors. A clause whose operand and field value have incomparable types
//! simply does not match.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("`{0}` is not a valid filter operator")]
    UnknownOperator(String),
    #[error("Filter key `{0}` may carry at most one operator suffix")]
    MalformedKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
}

impl FilterOp {
    fn parse(name: &str) -> Result<Self, FilterError> {
        match name {
            "not" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "gte" => Ok(Self::Gte),
            "lte" => Ok(Self::Lte),
            "in" => Ok(Self::In),
            "not_in" => Ok(Self::NotIn),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
struct FilterClause {
    path: Vec<String>,
    op: FilterOp,
    operand: Value,
}

/// A conjunctive filter over JSON metadata payloads.
#[derive(Debug, Clone, Default)]
pub struct FilterPredicate {
    clauses: Vec<FilterClause>,
}

impl FilterPredicate {
    /// Parse `(key, operand)` pairs into a predicate.
    ///
    /// Fails only on a malformed key or an unknown operator suffix; the
    /// resulting predicate never errors at evaluation time.
    pub fn parse<I, K>(filters: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut clauses = Vec::new();
        for (key, operand) in filters {
            let key = key.as_ref();
            let mut parts = key.split("__");
            let field = parts.next().unwrap_or_default();
            let op = match parts.next() {
                Some(suffix) => FilterOp::parse(suffix)?,
                None => FilterOp::Eq,
            };
            if parts.next().is_some() || field.is_empty() {
                return Err(FilterError::MalformedKey(key.to_string()));
            }
            clauses.push(FilterClause {
                path: field.split('.').map(String::from).collect(),
                op,
                operand,
            });
        }
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate the predicate against a payload. All clauses must hold.
    pub fn matches(&self, payload: &Value) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.eval(lookup(payload, &clause.path)))
    }
}

fn lookup<'a>(payload: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = payload;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

impl FilterClause {
    fn eval(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => loose_eq(value, &self.operand),
            FilterOp::Ne => !loose_eq(value, &self.operand),
            FilterOp::Gt => loose_cmp(value, &self.operand).is_some_and(|o| o.is_gt()),
            FilterOp::Lt => loose_cmp(value, &self.operand).is_some_and(|o| o.is_lt()),
            FilterOp::Gte => loose_cmp(value, &self.operand).is_some_and(|o| o.is_ge()),
            FilterOp::Lte => loose_cmp(value, &self.operand).is_some_and(|o| o.is_le()),
            FilterOp::In => contains(value, &self.operand),
            FilterOp::NotIn => !contains(value, &self.operand),
        }
    }
}

/// Equality with numeric widening so `5` matches `5.0`.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn loose_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

/// Membership: array operands test element membership, string operands test
/// substring containment of a string value.
fn contains(value: &Value, operand: &Value) -> bool {
    match operand {
        Value::Array(items) => items.iter().any(|item| loose_eq(value, item)),
        Value::String(haystack) => value.as_str().is_some_and(|v| haystack.contains(v)),
        _ => false,
    }
}

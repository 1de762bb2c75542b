use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single non-missing cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn text(s: impl Into<String>) -> Self { Scalar::Text(s.into()) }

    /// Coerced string form, used for ids and header names.
    pub fn coerce(&self) -> String { self.to_string() }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            // spreadsheets store every number as a float; 7.0 must read as "7"
            Scalar::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{}", *x as i64),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self { Scalar::Text(s.to_string()) }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self { Scalar::Text(s) }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self { Scalar::Int(i) }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self { Scalar::Float(x) }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self { Scalar::Bool(b) }
}

/// Field name → value, in column order.
pub type Fields = IndexMap<String, Scalar>;

/// One entity update: the id plus the fields to merge into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self { id: id.into(), fields }
    }
}

/// Loose input shape for records supplied as JSON rather than extracted.
/// Accepts `data` as an alias for `fields`, numeric ids, and null values.
#[derive(Debug, Deserialize)]
pub struct RecordInput {
    #[serde(default)]
    pub id: Option<Scalar>,
    #[serde(default, alias = "data")]
    pub fields: IndexMap<String, Option<Scalar>>,
}

impl From<RecordInput> for Record {
    fn from(input: RecordInput) -> Self {
        let id = input.id.map(|s| s.coerce().trim().to_string()).unwrap_or_default();
        let fields = input
            .fields
            .into_iter()
            .filter(|(k, _)| k != "id")
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        Record { id, fields }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self { is_valid: errors.is_empty(), errors }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub id: String,
    pub succeeded: bool,
}

/// Aggregate of one dispatch run. `outcomes` iterates in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub outcomes: IndexMap<String, bool>,
}

impl BatchReport {
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = UpdateOutcome>,
    {
        let mut report = BatchReport::default();
        for o in outcomes {
            report.total += 1;
            if o.succeeded { report.successful += 1; } else { report.failed += 1; }
            // a failure for an id sticks so it stays retryable
            let ok = report.outcomes.get(&o.id).copied().unwrap_or(true) && o.succeeded;
            report.outcomes.insert(o.id, ok);
        }
        report
    }

    /// Ids whose update did not succeed, in processing order.
    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes.iter().filter(|(_, ok)| !**ok).map(|(id, _)| id.as_str()).collect()
    }
}

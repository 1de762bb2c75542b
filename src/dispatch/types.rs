use serde::Serialize;

use crate::model::{BatchReport, Record};

// Plan envelope types
#[derive(Serialize)]
pub struct ApplyPlan<'a> {
    pub source: String,
    pub records: usize,
    pub endpoint: Option<String>,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub sample: &'a [Record],
}

// Apply/result envelope type: the report plus the ids worth retrying
#[derive(Serialize)]
pub struct ApplyResult<'a> {
    #[serde(flatten)]
    pub report: &'a BatchReport,
    pub retry_ids: Vec<&'a str>,
}

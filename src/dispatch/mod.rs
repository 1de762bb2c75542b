use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::Instrument;

use crate::extract;
use crate::model::{Record, RecordInput};
use crate::output::types::Meta;
use crate::telemetry::{self};
use crate::telemetry::ops::apply::Phase as ApplyPhase;

mod batch;
mod config;
mod store;
pub mod types;

pub use batch::Dispatcher;
pub use config::DispatchConfig;
pub use store::{HttpRecordStore, PatchFailure, PatchResult, RecordStore};

/// sheetsync apply: patch every record into the remote store
#[derive(Args)]
pub struct ApplyCmd {
    /// Spreadsheet to extract records from (or a JSON record array with --records-json)
    pub file: PathBuf,
    #[arg(long)] pub sheet: Option<String>,
    /// Treat FILE as `[{"id": ..., "fields"|"data": {...}}]` instead of a spreadsheet
    #[arg(long, default_value_t = false)] pub records_json: bool,
    #[arg(long)] pub base_url: Option<String>,
    #[arg(long)] pub api_key: Option<String>,
    #[arg(long)] pub timeout_secs: Option<u64>,
    #[arg(long)] pub concurrency: Option<usize>,
    /// Stop issuing new calls after this many seconds
    #[arg(long)] pub deadline_secs: Option<u64>,
    #[arg(long, default_value_t = false)] pub apply: bool,
    #[arg(long, default_value_t = 5)] pub plan_limit: usize,
}

impl ApplyCmd {
    /// Env config with CLI flags layered on top.
    fn dispatch_config(&self) -> DispatchConfig {
        let mut cfg = DispatchConfig::from_env();
        if let Some(url) = &self.base_url { cfg.base_url = Some(url.clone()); }
        if let Some(key) = &self.api_key { cfg.api_key = Some(key.clone()); }
        if let Some(t) = self.timeout_secs { cfg.timeout = Duration::from_secs(t); }
        if let Some(n) = self.concurrency { cfg.concurrency = n; }
        if let Some(d) = self.deadline_secs { cfg.deadline = Some(Duration::from_secs(d)); }
        cfg
    }
}

pub async fn run(args: ApplyCmd) -> Result<()> {
    let t0 = Instant::now();
    let log = telemetry::apply();
    let _g = log.root_span_kv([
        ("file", args.file.display().to_string()),
        ("records_json", args.records_json.to_string()),
        ("apply", args.apply.to_string()),
        ("concurrency", format!("{:?}", args.concurrency)),
    ]).entered();

    let records = {
        let _s = log.span(&ApplyPhase::Load).entered();
        let bytes = tokio::fs::read(&args.file).await.with_context(|| format!("reading {}", args.file.display()))?;
        if args.records_json { parse_records_json(&bytes)? } else { extract::process(&bytes, args.sheet.as_deref())? }
    };
    let cfg = args.dispatch_config();

    if !args.apply {
        let _s = log.span(&ApplyPhase::Plan).entered();
        let endpoint = cfg.resolve_base_url().ok().map(|u| u.to_string());
        if telemetry::config::json_mode() {
            let sample = &records[..records.len().min(args.plan_limit)];
            let plan = types::ApplyPlan {
                source: args.file.display().to_string(),
                records: records.len(),
                endpoint,
                concurrency: cfg.concurrency.max(1),
                timeout_secs: cfg.timeout.as_secs(),
                sample,
            };
            log.plan(&plan)?;
        } else {
            log.info(format!("📝 Apply plan — records={} endpoint={} concurrency={}", records.len(), endpoint.as_deref().unwrap_or("<unset>"), cfg.concurrency.max(1)));
            for r in records.iter().take(args.plan_limit) { log.info(format!("  PATCH id={} fields={}", r.id, r.fields.len())); }
            if records.len() > args.plan_limit { log.info(format!("  ... ({} more)", records.len() - args.plan_limit)); }
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    let store = {
        let _s = log.span(&ApplyPhase::Connect).entered();
        HttpRecordStore::new(&cfg)?
    };
    let dispatcher = Dispatcher::new(store)
        .with_concurrency(cfg.concurrency)
        .with_deadline(cfg.deadline);

    let report = dispatcher
        .apply_batch(records)
        .instrument(log.span(&ApplyPhase::Dispatch))
        .await;

    if telemetry::config::json_mode() {
        let result = types::ApplyResult { report: &report, retry_ids: report.failed_ids() };
        log.result_with_meta(&result, Some(Meta::elapsed(t0)))?;
    } else if report.failed > 0 {
        log.warn(format!("⚠️ {} of {} updates failed: {}", report.failed, report.total, report.failed_ids().join(", ")));
    }
    Ok(())
}

/// JSON record array in the wire shape; ids are coerced to strings.
/// Repeated non-empty ids are rejected, same as for spreadsheets.
pub fn parse_records_json(bytes: &[u8]) -> Result<Vec<Record>> {
    let inputs: Vec<RecordInput> = serde_json::from_slice(bytes).context("parsing JSON records")?;
    let records: Vec<Record> = inputs.into_iter().map(Record::from).collect();
    if records.is_empty() {
        bail!("no records provided");
    }
    let dupes = extract::count_duplicate_ids(records.iter().map(|r| r.id.as_str()));
    if dupes > 0 {
        bail!("found {dupes} duplicate ids in the records");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_records_accept_both_field_keys() {
        let raw = br#"[{"id": "1", "fields": {"name": "A"}}, {"id": 2, "data": {"name": "B", "email": null}}]"#;
        let records = parse_records_json(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "2");
        assert_eq!(records[1].fields.len(), 1);
    }

    #[test]
    fn empty_json_array_is_rejected() {
        assert!(parse_records_json(b"[]").is_err());
        assert!(parse_records_json(b"{not json").is_err());
    }

    #[test]
    fn repeated_json_ids_are_rejected() {
        let raw = br#"[{"id": 1, "fields": {}}, {"id": "1", "fields": {}}, {"id": "", "fields": {}}, {"fields": {}}]"#;
        let err = parse_records_json(raw).unwrap_err();
        assert_eq!(err.to_string(), "found 1 duplicate ids in the records");

        let ok = br#"[{"id": "", "fields": {}}, {"fields": {}}, {"id": "2", "fields": {}}]"#;
        assert_eq!(parse_records_json(ok).unwrap().len(), 3);
    }

    #[test]
    fn cli_flags_override_env_config() {
        let cmd = ApplyCmd {
            file: PathBuf::from("users.xlsx"),
            sheet: None,
            records_json: false,
            base_url: Some("http://store.test/users".into()),
            api_key: Some("k".into()),
            timeout_secs: Some(5),
            concurrency: Some(4),
            deadline_secs: Some(60),
            apply: false,
            plan_limit: 5,
        };
        let cfg = cmd.dispatch_config();
        assert_eq!(cfg.base_url.as_deref(), Some("http://store.test/users"));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.deadline, Some(Duration::from_secs(60)));
    }
}

//! Spreadsheet bytes → validated, ordered update records.
//!
//! `process` is the entry point the rest of the crate uses; `parse`,
//! `validate` and `convert` are exposed so each step can be exercised alone.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use crate::error::ExtractError;
use crate::model::{Record, Scalar, ValidationReport};
use crate::telemetry::{self};
use crate::telemetry::ops::extract::Phase as ExtractPhase;
use crate::telemetry::ops::validate::Phase as ValidatePhase;

mod convert;
mod table;
mod validate;

pub use convert::convert;
pub use table::{parse, Table};
pub use validate::{count_duplicate_ids, validate};

pub const ID_COLUMN: &str = "id";

/// Coerced, trimmed id; missing cells give an empty string.
pub(crate) fn coerce_id(cell: Option<&Scalar>) -> String {
    cell.map(|v| v.coerce().trim().to_string()).unwrap_or_default()
}

/// parse → validate → convert. Fails on undecodable input or any rule violation.
pub fn process(bytes: &[u8], sheet: Option<&str>) -> Result<Vec<Record>, ExtractError> {
    let log = telemetry::extract();
    let table = {
        let _s = log.span_kv(&ExtractPhase::Parse, [("bytes", bytes.len().to_string()), ("sheet", format!("{:?}", sheet))]).entered();
        parse(bytes, sheet)?
    };
    log.info_kv("read spreadsheet", [("rows", table.rows.len().to_string()), ("columns", table.columns.len().to_string())]);

    let report = { let _s = log.span(&ExtractPhase::Validate).entered(); validate(&table) };
    if !report.is_valid {
        return Err(ExtractError::Validation { errors: report.errors });
    }

    let _s = log.span(&ExtractPhase::Convert).entered();
    Ok(convert(&table))
}

/// sheetsync extract: spreadsheet → records
#[derive(Args)]
pub struct ExtractCmd {
    pub file: PathBuf,
    #[arg(long)] pub sheet: Option<String>,
    #[arg(long, default_value_t = 5)] pub plan_limit: usize,
}

#[derive(Serialize)]
struct ExtractResult<'a> { count: usize, records: &'a [Record] }

pub async fn run(args: ExtractCmd) -> Result<()> {
    let log = telemetry::extract();
    let _g = log.root_span_kv([
        ("file", args.file.display().to_string()),
        ("sheet", format!("{:?}", args.sheet)),
    ]).entered();

    let bytes = {
        let _s = log.span(&ExtractPhase::Read).entered();
        tokio::fs::read(&args.file).await.with_context(|| format!("reading {}", args.file.display()))?
    };
    let records = process(&bytes, args.sheet.as_deref())?;

    if telemetry::config::json_mode() {
        log.result(&ExtractResult { count: records.len(), records: &records })?;
    } else {
        log.info(format!("✅ Extracted {} records from {}", records.len(), args.file.display()));
        for r in records.iter().take(args.plan_limit) {
            log.info(format!("  id={} fields={}", r.id, serde_json::to_string(&r.fields)?));
        }
        if records.len() > args.plan_limit { log.info(format!("  ... ({} more)", records.len() - args.plan_limit)); }
    }
    Ok(())
}

/// sheetsync validate: check rules only, no conversion
#[derive(Args)]
pub struct ValidateCmd {
    pub file: PathBuf,
    #[arg(long)] pub sheet: Option<String>,
}

pub async fn run_validate(args: ValidateCmd) -> Result<()> {
    let log = telemetry::validate();
    let _g = log.root_span_kv([("file", args.file.display().to_string())]).entered();

    let bytes = {
        let _s = log.span(&ValidatePhase::Read).entered();
        tokio::fs::read(&args.file).await.with_context(|| format!("reading {}", args.file.display()))?
    };
    let table = { let _s = log.span(&ValidatePhase::Parse).entered(); parse(&bytes, args.sheet.as_deref())? };
    let report: ValidationReport = { let _s = log.span(&ValidatePhase::Check).entered(); validate(&table) };

    if telemetry::config::json_mode() {
        log.result(&report)?;
    } else if report.is_valid {
        log.info(format!("✅ {} is valid — rows={}", args.file.display(), table.rows.len()));
    } else {
        for e in &report.errors { log.error(format!("❌ {}", e)); }
    }

    if !report.is_valid {
        bail!("validation failed: {}", report.errors.join("; "));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::Scalar;
    use crate::sample::{workbook_bytes, SheetData};

    /// Text cells; "" becomes a missing cell.
    pub fn row(cells: &[&str]) -> Vec<Option<Scalar>> {
        cells.iter().map(|c| if c.is_empty() { None } else { Some(Scalar::text(*c)) }).collect()
    }

    /// One .xlsx with sheets named Sheet1, Sheet2, ... in the given order.
    pub fn xlsx(sheets: Vec<Vec<Vec<Option<Scalar>>>>) -> Vec<u8> {
        let names: Vec<String> = (1..=sheets.len()).map(|i| format!("Sheet{i}")).collect();
        let data: Vec<SheetData<'_>> = sheets
            .into_iter()
            .zip(names.iter())
            .map(|(rows, name)| SheetData { name: name.as_str(), rows })
            .collect();
        workbook_bytes(&data).expect("fixture workbook")
    }
}

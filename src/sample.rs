use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::Serialize;

use crate::model::Scalar;
use crate::telemetry::{self};
use crate::telemetry::ops::sample::Phase as SamplePhase;

/// One worksheet to write: name plus rows, the first row being the header.
pub struct SheetData<'a> {
    pub name: &'a str,
    pub rows: Vec<Vec<Option<Scalar>>>,
}

/// sheetsync sample: write a demo user workbook
#[derive(Args)]
pub struct SampleCmd {
    /// Output path for the .xlsx file
    pub out: PathBuf,
    #[arg(long, default_value_t = 3)]
    pub rows: usize,
    #[arg(long, default_value = "Users")]
    pub sheet: String,
}

#[derive(Serialize)]
struct SampleResult { path: String, sheet: String, rows: usize, bytes: usize }

pub fn run(args: SampleCmd) -> Result<()> {
    let log = telemetry::sample();
    let _g = log.root_span_kv([
        ("out", args.out.display().to_string()),
        ("rows", args.rows.to_string()),
    ]).entered();

    let sheet = SheetData { name: &args.sheet, rows: demo_rows(args.rows) };
    let bytes = {
        let _s = log.span(&SamplePhase::Write).entered();
        let bytes = workbook_bytes(&[sheet]).context("building sample workbook")?;
        std::fs::write(&args.out, &bytes).with_context(|| format!("writing {}", args.out.display()))?;
        bytes
    };

    log.info(format!("📄 Sample workbook written — path={} rows={}", args.out.display(), args.rows));
    if telemetry::config::json_mode() {
        log.result(&SampleResult { path: args.out.display().to_string(), sheet: args.sheet.clone(), rows: args.rows, bytes: bytes.len() })?;
    }
    Ok(())
}

const NAMES: [&str; 5] = ["John Doe", "Jane Smith", "Bob Johnson", "Alice Brown", "Carlos Diaz"];
const ROLES: [&str; 2] = ["admin", "user"];

/// Header `id, name, email, phone, role` followed by `n` generated users.
pub fn demo_rows(n: usize) -> Vec<Vec<Option<Scalar>>> {
    let header = ["id", "name", "email", "phone", "role"]
        .iter()
        .map(|h| Some(Scalar::text(*h)))
        .collect();
    let mut rows = vec![header];
    for i in 0..n {
        let name = NAMES[i % NAMES.len()];
        let handle = name.split_whitespace().next().unwrap_or("user").to_lowercase();
        rows.push(vec![
            Some(Scalar::text((i + 1).to_string())),
            Some(Scalar::text(name)),
            Some(Scalar::text(format!("{handle}{}@example.com", i + 1))),
            Some(Scalar::text(format!("555-{:03}-{:04}", 100 + i % 900, 1000 + i))),
            Some(Scalar::text(if i == 0 { ROLES[0] } else { ROLES[1] })),
        ]);
    }
    rows
}

/// Serialize sheets into an in-memory .xlsx, in the order given.
pub fn workbook_bytes(sheets: &[SheetData<'_>]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    for sheet in sheets {
        let ws = workbook.add_worksheet();
        ws.set_name(sheet.name)?;
        for (r, row) in sheet.rows.iter().enumerate() {
            let r = r as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    None => {}
                    Some(Scalar::Text(s)) => { ws.write_string(r, c, s.as_str())?; }
                    Some(Scalar::Int(i)) => { ws.write_number(r, c, *i as f64)?; }
                    Some(Scalar::Float(x)) => { ws.write_number(r, c, *x)?; }
                    Some(Scalar::Bool(b)) => { ws.write_boolean(r, c, *b)?; }
                }
            }
        }
    }
    workbook.save_to_buffer()
}

use crate::model::{Fields, Record};
use crate::telemetry::{self};

use super::table::Table;
use super::{coerce_id, ID_COLUMN};

/// Turn table rows into records, in row order.
///
/// Rows whose id is empty are skipped with a warning. Missing cells are left
/// out of `fields` rather than carried as nulls.
pub fn convert(table: &Table) -> Vec<Record> {
    let log = telemetry::extract();
    let id_col = table.column_index(ID_COLUMN);
    let mut records = Vec::with_capacity(table.rows.len());

    for r in 0..table.rows.len() {
        let id = coerce_id(id_col.and_then(|c| table.cell(r, c)));
        if id.is_empty() {
            // +2: one for the header, one for 1-based row numbers
            log.warn_kv("↩️ skip row without id", [("row", (r + 2).to_string())]);
            continue;
        }

        let fields: Fields = table
            .columns
            .iter()
            .enumerate()
            .filter(|(c, _)| Some(*c) != id_col)
            .filter_map(|(c, name)| table.cell(r, c).map(|v| (name.clone(), v.clone())))
            .collect();
        records.push(Record { id, fields });
    }

    log.info_kv("converted records", [("records", records.len().to_string()), ("rows", table.rows.len().to_string())]);
    records
}

use std::collections::HashSet;

use crate::model::ValidationReport;

use super::table::Table;
use super::{coerce_id, ID_COLUMN};

/// Check a parsed table against the ingestion rules.
///
/// An empty table yields a single error and nothing else is checked. Otherwise
/// every violation is collected.
pub fn validate(table: &Table) -> ValidationReport {
    if table.is_empty() {
        return ValidationReport::from_errors(vec!["spreadsheet is empty".to_string()]);
    }

    let mut errors = Vec::new();
    match table.column_index(ID_COLUMN) {
        None => errors.push(format!("spreadsheet must contain an {ID_COLUMN} column")),
        Some(col) => {
            let dupes = count_duplicates(table, col);
            if dupes > 0 {
                errors.push(format!("found {dupes} duplicate ids in the spreadsheet"));
            }
        }
    }
    ValidationReport::from_errors(errors)
}

fn count_duplicates(table: &Table, col: usize) -> usize {
    let ids: Vec<String> = (0..table.rows.len()).map(|r| coerce_id(table.cell(r, col))).collect();
    count_duplicate_ids(ids.iter().map(String::as_str))
}

/// Occurrences of an id beyond its first. Empty ids are skipped by conversion
/// and so never count.
pub fn count_duplicate_ids<'a, I>(ids: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| !id.is_empty())
        .filter(|id| !seen.insert(*id))
        .count()
}

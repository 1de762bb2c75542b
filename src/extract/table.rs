use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use crate::error::ExtractError;
use crate::model::Scalar;

/// A header row plus data rows. A cell is `None` when missing or empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Scalar>>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<Scalar>>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Rows may be shorter than the header; trailing cells read as missing.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Scalar> {
        self.rows.get(row).and_then(|r| r.get(col)).and_then(Option::as_ref)
    }
}

/// Decode a workbook blob and load one sheet: the named one, or the first declared.
pub fn parse(bytes: &[u8], sheet: Option<&str>) -> Result<Table, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::format("input is empty"));
    }
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| ExtractError::format(format!("sheet '{wanted}' not found (available: {})", names.join(", "))))?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| ExtractError::format("workbook contains no sheets"))?,
    };
    let range = workbook.worksheet_range(&name)?;
    Ok(from_range(&range))
}

fn from_range(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let Some(header) = rows.next() else { return Table::default() };
    let columns = header_names(header);
    let rows = rows.map(|r| r.iter().map(cell_value).collect()).collect();
    Table { columns, rows }
}

/// Header text is kept verbatim. Blank headers become `Unnamed: <i>`; repeats
/// get `.1`, `.2`, ... suffixes.
pub(crate) fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let base = cell_value(d)
                .map(|s| s.coerce())
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| format!("Unnamed: {i}"));
            let n = seen.entry(base.clone()).or_insert(0);
            let name = if *n == 0 { base } else { format!("{base}.{n}") };
            *n += 1;
            name
        })
        .collect()
}

pub(crate) fn cell_value(d: &Data) -> Option<Scalar> {
    match d {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(Scalar::Text(s.clone())),
        Data::Int(i) => Some(Scalar::Int(*i)),
        Data::Float(x) => Some(Scalar::Float(*x)),
        Data::Bool(b) => Some(Scalar::Bool(*b)),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|t| Scalar::Text(t.format("%Y-%m-%dT%H:%M:%S").to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Scalar::Text(s.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fixtures::{row, xlsx};
    use crate::sample::SheetData;

    #[test]
    fn parse_reads_header_and_rows() {
        let bytes = xlsx(vec![vec![
            row(&["id", "name"]),
            row(&["1", "A"]),
            row(&["2", "B"]),
        ]]);
        let table = parse(&bytes, None).unwrap();
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(1, 1), Some(&Scalar::text("B")));
    }

    #[test]
    fn parse_defaults_to_first_declared_sheet() {
        let bytes = crate::sample::workbook_bytes(&[
            SheetData { name: "First", rows: vec![row(&["id"]), row(&["a"])] },
            SheetData { name: "Second", rows: vec![row(&["id"]), row(&["b"]), row(&["c"])] },
        ])
        .unwrap();
        let first = parse(&bytes, None).unwrap();
        assert_eq!(first.rows.len(), 1);
        let second = parse(&bytes, Some("Second")).unwrap();
        assert_eq!(second.rows.len(), 2);
    }

    #[test]
    fn unknown_sheet_is_a_format_error() {
        let bytes = xlsx(vec![vec![row(&["id"]), row(&["1"])]]);
        let err = parse(&bytes, Some("Nope")).unwrap_err();
        assert!(matches!(err, ExtractError::Format(ref m) if m.contains("Nope")));
    }

    #[test]
    fn garbage_and_empty_input_are_format_errors() {
        assert!(matches!(parse(b"", None), Err(ExtractError::Format(_))));
        assert!(matches!(parse(b"id,name\n1,A\n", None), Err(ExtractError::Format(_))));
    }

    #[test]
    fn header_names_fill_blanks_and_dedupe() {
        let header = vec![
            Data::String("id".into()),
            Data::Empty,
            Data::String("name".into()),
            Data::String("name".into()),
            Data::Float(2024.0),
        ];
        assert_eq!(header_names(&header), vec!["id", "Unnamed: 1", "name", "name.1", "2024"]);
    }

    #[test]
    fn padded_headers_are_not_trimmed() {
        let header = vec![Data::String(" id ".into()), Data::String("   ".into())];
        assert_eq!(header_names(&header), vec![" id ", "Unnamed: 1"]);
    }

    #[test]
    fn empty_strings_and_error_cells_are_missing() {
        assert_eq!(cell_value(&Data::String(String::new())), None);
        assert_eq!(cell_value(&Data::Error(calamine::CellErrorType::Div0)), None);
        assert_eq!(cell_value(&Data::Float(1.5)), Some(Scalar::Float(1.5)));
    }

    #[test]
    fn short_rows_read_trailing_cells_as_missing() {
        let table = Table::new(vec!["id".into(), "name".into()], vec![vec![Some(Scalar::text("1"))]]);
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.column_index("name"), Some(1));
    }
}

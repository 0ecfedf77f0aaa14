//! Row records of a decoded worksheet, keyed by header text.
//!
//! The first non-blank row is the header. Each later non-blank row becomes a [`SheetRow`]
//! holding only the cells present in it, keyed by the header above each cell;
//! absent cells read as [`CellValue::Empty`].

use crate::error::RustyIntakeError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use chrono::NaiveDateTime;
use chrono::Timelike;
use std::collections::HashMap;
use std::fmt::Display;
use tracing::debug;

/// Header key given to header cells without text
pub const EMPTY_HEADER: &str = "__EMPTY";

static EMPTY: CellValue = CellValue::Empty;

/// The raw value of one cell
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    /// A cell the workbook marks as a date, time or date-time
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Decodes a cell, resolving shared-string references.
    /// Error cells and date serials outside the calendar fall back to their plain form.
    fn from_cell(cell: &Cell, shared_strings: &[String]) -> Result<CellValue, RustyIntakeError> {
        let value = match cell.kind {
            CellType::Empty | CellType::Error => CellValue::Empty,
            CellType::Boolean => CellValue::Boolean(cell.to_boolean()),
            CellType::Number => CellValue::Number(cell.to_double()?),
            CellType::InlineString => CellValue::Text(cell.value.to_owned()),
            CellType::SharedString => {
                let index = cell.value.parse::<usize>()?;
                let text = shared_strings
                    .get(index)
                    .ok_or(SpreadsheetError::SharedStringIndexError(index))?;
                CellValue::Text(text.to_owned())
            }
            CellType::IsoDateTime => CellValue::DateTime(cell.to_datetime()?),
            _ => match cell.to_datetime() {
                Ok(datetime) => CellValue::DateTime(datetime),
                Err(_) => CellValue::Number(cell.to_double()?),
            },
        };
        Ok(value)
    }
}

impl Display for CellValue {
    /// Formats the value the way it reads in a header cell
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Boolean(true) => write!(f, "TRUE"),
            CellValue::Boolean(false) => write!(f, "FALSE"),
            CellValue::DateTime(datetime) if datetime.num_seconds_from_midnight() == 0 && datetime.nanosecond() == 0 => {
                write!(f, "{}", datetime.format("%Y-%m-%d"))
            }
            CellValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// One data row of the sheet, keyed by header
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetRow {
    values: HashMap<String, CellValue>,
}

impl SheetRow {
    /// The value under a header key; unknown keys and absent cells read as empty
    pub fn get(&self, key: &str) -> &CellValue {
        self.values.get(key).unwrap_or(&EMPTY)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: CellValue) {
        self.values.insert(key.into(), value);
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for SheetRow {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        let mut row = SheetRow::default();
        for (key, value) in iter {
            row.insert(key, value);
        }
        row
    }
}

/// The header keys and data rows of a worksheet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetRecords {
    /// Header keys in column order
    pub columns: Vec<String>,
    /// Non-blank data rows in sheet order
    pub rows: Vec<SheetRow>,
}

impl SheetRecords {
    pub(crate) fn from_sheet(sheet: &Sheet, shared_strings: &[String]) -> Result<SheetRecords, RustyIntakeError> {
        if sheet.is_empty() {
            debug!(sheet = %sheet.name, "Sheet has no cells");
            return Ok(SheetRecords::default());
        }
        let col_lower_bound = sheet.col_lower_bound.unwrap_or(0);
        let width = sheet.col_upper_bound.map_or(0, |col_upper_bound| col_upper_bound - col_lower_bound + 1);
        let mut columns = Vec::<String>::new();
        let mut rows = Vec::<SheetRow>::new();
        for (_, cells) in sheet.rows() {
            let mut values = Vec::<(usize, CellValue)>::with_capacity(cells.len());
            for cell in cells {
                let value = CellValue::from_cell(cell, shared_strings)?;
                if !value.is_empty() {
                    values.push((cell.col - col_lower_bound, value));
                }
            }
            if values.is_empty() {
                continue;
            }
            if columns.is_empty() {
                let mut header = vec![CellValue::Empty; width];
                for (offset, value) in values {
                    header[offset] = value;
                }
                columns = to_header_keys(&header);
            } else {
                rows.push(
                    values
                        .into_iter()
                        .filter_map(|(offset, value)| columns.get(offset).map(|key| (key.to_owned(), value)))
                        .collect(),
                );
            }
        }
        debug!(
            sheet = %sheet.name,
            first_row = ?sheet.row_lower_bound,
            last_row = ?sheet.row_upper_bound,
            columns = columns.len(),
            rows = rows.len(),
            "Decoded sheet records"
        );
        Ok(SheetRecords { columns, rows })
    }
}

/// Derives header keys from the header row's values.
/// Cells without text become `__EMPTY`; a repeated key gets a `_1`, `_2`, ... suffix,
/// skipping suffixed names that are already taken.
pub(crate) fn to_header_keys(values: &[CellValue]) -> Vec<String> {
    let mut counters = HashMap::<String, usize>::new();
    let mut keys = Vec::<String>::with_capacity(values.len());
    for value in values {
        let text = match value {
            CellValue::Empty => EMPTY_HEADER.to_owned(),
            value => value.to_string(),
        };
        let key = match counters.get(&text).copied() {
            None => {
                counters.insert(text.to_owned(), 1);
                text
            }
            Some(mut counter) => {
                let mut candidate = format!("{text}_{counter}");
                counter += 1;
                while counters.contains_key(&candidate) {
                    candidate = format!("{text}_{counter}");
                    counter += 1;
                }
                counters.insert(text, counter);
                counters.insert(candidate.to_owned(), 1);
                candidate
            }
        };
        keys.push(key);
    }
    keys
}

/// Decodes the first worksheet of a workbook into header keys and row records
pub fn read_records(bytes: &[u8]) -> Result<SheetRecords, RustyIntakeError> {
    let mut spreadsheet = open_spreadsheet(bytes)?;
    let shared_strings = spreadsheet.load_shared_strings()?;
    let sheet = spreadsheet.read_first_sheet()?;
    SheetRecords::from_sheet(&sheet, &shared_strings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_owned())
    }

    fn cell(row: usize, col: usize, kind: CellType, value: &str) -> Cell {
        Cell { row, col, kind, value: value.to_owned() }
    }

    fn sheet(cells: Vec<Cell>) -> Sheet {
        let mut sheet = Sheet::new("Sheet1");
        for cell in cells {
            sheet.push(cell).expect("cell inside the grid");
        }
        sheet.finish();
        sheet
    }

    #[test]
    fn header_keys_are_deduplicated() {
        let keys = to_header_keys(&[
            text("Name"),
            CellValue::Empty,
            text("Name"),
            text("Name_1"),
            text("Name"),
            CellValue::Empty,
            CellValue::Number(2024.0),
        ]);
        assert_eq!(keys, vec!["Name", "__EMPTY", "Name_1", "Name_1_1", "Name_2", "__EMPTY_1", "2024"]);
    }

    #[test]
    fn header_text_of_typed_cells() {
        let date = NaiveDateTime::parse_from_str("2025-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").expect("datetime literal");
        assert_eq!(CellValue::DateTime(date).to_string(), "2025-01-01");
        assert_eq!(CellValue::Boolean(true).to_string(), "TRUE");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
    }

    #[test]
    fn records_skip_blank_rows_and_fill_gaps() {
        let shared_strings = vec!["Name".to_owned(), "Amount".to_owned()];
        let sheet = sheet(vec![
            cell(0, 0, CellType::SharedString, "0"),
            cell(0, 1, CellType::SharedString, "1"),
            cell(0, 2, CellType::InlineString, "Date"),
            cell(1, 0, CellType::InlineString, "Bob"),
            cell(1, 1, CellType::Number, "12.5"),
            cell(1, 2, CellType::NumberDate1900, "45658"),
            cell(2, 2, CellType::Error, "#N/A"),
            cell(4, 1, CellType::Boolean, "0"),
        ]);

        let records = SheetRecords::from_sheet(&sheet, &shared_strings).expect("records");
        assert_eq!(records.columns, vec!["Name", "Amount", "Date"]);
        assert_eq!(records.rows.len(), 2);

        let first = &records.rows[0];
        assert_eq!(first.get("Name"), &text("Bob"));
        assert_eq!(first.get("Amount"), &CellValue::Number(12.5));
        assert!(matches!(first.get("Date"), CellValue::DateTime(_)));

        let second = &records.rows[1];
        assert_eq!(second.get("Name"), &CellValue::Empty);
        assert_eq!(second.get("Amount"), &CellValue::Boolean(false));
        assert_eq!(second.get("Missing"), &CellValue::Empty);
    }

    #[test]
    fn header_only_sheet_has_no_rows() {
        let sheet = sheet(vec![cell(3, 1, CellType::InlineString, "Name")]);
        let records = SheetRecords::from_sheet(&sheet, &[]).expect("records");
        assert_eq!(records.columns, vec!["Name"]);
        assert!(records.rows.is_empty());
    }

    #[test]
    fn rows_hold_only_present_cells() {
        let mut cells = vec![
            cell(0, 0, CellType::InlineString, "Name"),
            cell(0, 16_383, CellType::InlineString, "Note"),
        ];
        cells.extend((1..=3).map(|row| cell(row, 0, CellType::InlineString, "Bob")));
        cells.push(cell(4, 16_383, CellType::InlineString, "late"));

        let records = SheetRecords::from_sheet(&sheet(cells), &[]).expect("records");
        assert_eq!(records.columns.len(), 16_384);
        assert_eq!(records.columns[1], "__EMPTY");
        assert_eq!(records.columns[16_383], "Note");
        assert_eq!(records.rows.len(), 4);
        assert!(records.rows[..3].iter().all(|row| row.values.len() == 1));
        assert_eq!(records.rows[0].get("Name"), &text("Bob"));
        assert_eq!(records.rows[0].get("Note"), &CellValue::Empty);
        assert_eq!(records.rows[3].values.len(), 1);
        assert_eq!(records.rows[3].get("Note"), &text("late"));
    }

    #[test]
    fn shared_string_out_of_range_is_an_error() {
        let sheet = sheet(vec![cell(0, 0, CellType::SharedString, "3")]);
        assert!(SheetRecords::from_sheet(&sheet, &[]).is_err());
    }
}

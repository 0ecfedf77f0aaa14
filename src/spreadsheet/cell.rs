use crate::error::RustyIntakeError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Quoted literals, escaped characters and bracketed sections (colors, locales,
    /// conditions) are ignored; any remaining y/d marks a date, h/s marks a time.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_literal => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    /// True for numbers that carry a date, time or date-time number format
    pub(crate) fn is_serial_date(&self) -> bool {
        matches!(
            self,
            Self::NumberDateTime1900
                | Self::NumberDate1900
                | Self::NumberTime1900
                | Self::NumberDateTime1904
                | Self::NumberDate1904
                | Self::NumberTime1904
        )
    }

    fn is_1904(&self) -> bool {
        matches!(self, Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904)
    }
}

/// Converts Excel error codes to human-readable error strings.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// Represents a single cell in a spreadsheet with position, type, and value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as string
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Converts cell value to boolean ("1" or "true" = true, other = false).
    pub(crate) fn to_boolean(&self) -> bool {
        self.value == "1" || self.value.eq_ignore_ascii_case("true")
    }

    /// Converts cell value to double-precision floating point.
    pub(crate) fn to_double(&self) -> Result<f64, RustyIntakeError> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| self.value_error())
    }

    /// Converts a date-formatted serial number or an ISO 8601 string to a timestamp.
    pub(crate) fn to_datetime(&self) -> Result<NaiveDateTime, RustyIntakeError> {
        match self.kind {
            kind if kind.is_serial_date() => {
                let serial = self.to_double()?;
                from_serial_number(serial, kind.is_1904()).ok_or_else(|| self.value_error())
            }
            CellType::IsoDateTime => {
                let value = self.value.trim().trim_end_matches('Z');
                if value.contains('T') {
                    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                        .map_err(|_| self.value_error())
                } else {
                    NaiveDate::parse_from_str(value, "%Y-%m-%d")
                        .map(|date| date.and_time(NaiveTime::MIN))
                        .map_err(|_| self.value_error())
                }
            }
            _ => Err(self.value_error()),
        }
    }

    fn value_error(&self) -> RustyIntakeError {
        SpreadsheetError::CellValueError(self.reference(), self.value.to_owned()).into()
    }
}

/// Converts an Excel serial date number to a timestamp, rounded to the millisecond.
/// The 1900 system counts the fictitious 1900-02-29 (Lotus 1-2-3 leap year bug), so serials
/// before 60 are shifted by one day.
pub(crate) fn from_serial_number(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial >= 2_958_466.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let milliseconds = (serial.fract() * 86_400_000f64).round() as i64;
    let offset = if is_1904 {
        1_462
    } else if days < 60 {
        1
    } else {
        0
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    epoch.checked_add_signed(Duration::days(days + offset) + Duration::milliseconds(milliseconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 1, col: 2, kind, value: value.to_owned() }
    }

    fn datetime(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").expect("datetime literal")
    }

    #[test]
    fn builtin_number_formats() {
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(CellType::NumberDate1900));
        assert_eq!(CellType::parse_builtin_number_format_id("22", true), Some(CellType::NumberDateTime1904));
        assert_eq!(CellType::parse_builtin_number_format_id("46", false), Some(CellType::NumberTime1900));
        assert_eq!(CellType::parse_builtin_number_format_id("0", false), None);
    }

    #[test]
    fn custom_number_formats() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("dd/mm/yyyy hh:mm", false), CellType::NumberDateTime1900);
        assert_eq!(CellType::parse_custom_number_format("[h]:mm:ss", true), CellType::NumberTime1904);
        assert_eq!(CellType::parse_custom_number_format("#,##0.00\" days\"", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00_)", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("0\\d", false), CellType::Number);
    }

    #[test]
    fn serial_numbers_to_datetime() {
        assert_eq!(cell(CellType::NumberDate1900, "45658").to_datetime().ok(), Some(datetime("2025-01-01 00:00:00")));
        assert_eq!(cell(CellType::NumberDateTime1900, "45658.75").to_datetime().ok(), Some(datetime("2025-01-01 18:00:00")));
        assert_eq!(cell(CellType::NumberDate1900, "59").to_datetime().ok(), Some(datetime("1900-02-28 00:00:00")));
        assert_eq!(cell(CellType::NumberDate1900, "61").to_datetime().ok(), Some(datetime("1900-03-01 00:00:00")));
        assert_eq!(cell(CellType::NumberDate1904, "0").to_datetime().ok(), Some(datetime("1904-01-01 00:00:00")));
        assert!(cell(CellType::NumberDate1900, "-1").to_datetime().is_err());
    }

    #[test]
    fn iso_strings_to_datetime() {
        assert_eq!(cell(CellType::IsoDateTime, "2025-01-01").to_datetime().ok(), Some(datetime("2025-01-01 00:00:00")));
        assert_eq!(cell(CellType::IsoDateTime, "2025-01-01T08:30:00Z").to_datetime().ok(), Some(datetime("2025-01-01 08:30:00")));
        assert!(cell(CellType::IsoDateTime, "yesterday").to_datetime().is_err());
        assert!(cell(CellType::Number, "45658").to_datetime().is_err());
    }

    #[test]
    fn value_errors_name_the_cell() {
        let error = cell(CellType::Number, "abc").to_double().err().map(|e| e.to_string());
        assert_eq!(error.as_deref(), Some("Invalid value 'abc' at cell C2"));
    }

    #[test]
    fn booleans() {
        assert!(cell(CellType::Boolean, "1").to_boolean());
        assert!(cell(CellType::Boolean, "TRUE").to_boolean());
        assert!(!cell(CellType::Boolean, "0").to_boolean());
    }
}

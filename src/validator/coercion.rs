//! Type rules applied to cell values.
//!
//! Number columns accept anything that coerces to a number: decimal literals with optional
//! sign and exponent, `0x`/`0o`/`0b` integer literals, `Infinity`, surrounding whitespace,
//! booleans, date cells and empty cells (which count as zero). Date columns accept date
//! cells and text that reads as a calendar date. String columns accept text and empty cells only.

use crate::schema::ColumnType;
use crate::spreadsheet::record::CellValue;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use regex::Captures;
use regex::Regex;
use std::sync::LazyLock;

static DECIMAL_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(Infinity|(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?)$").expect("Hardcode regex pattern")
});

static RADIX_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^0([xX][0-9a-fA-F]+|[oO][0-7]+|[bB][01]+)$").expect("Hardcode regex pattern")
});

/// Optional time of day after a date: `10:30`, `10:30:15`, `10:30:15.250`, `10:30 PM`, plus a zone
const TIME_SUFFIX: &str = r"(?:[T\s]+(\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d+))?)?\s*([AaPp][Mm])?)?\s*(?:Z|GMT|UTC|[+-]\d{2}:?\d{2})?";

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"^([+-]\d{{6}}|\d{{4}})(?:-(\d{{2}})(?:-(\d{{2}}))?)?{TIME_SUFFIX}$");
    Regex::new(&pattern).expect("Hardcode regex pattern")
});

static YEAR_FIRST_DATE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"^(\d{{4}})[/-](\d{{1,2}})[/-](\d{{1,2}}){TIME_SUFFIX}$");
    Regex::new(&pattern).expect("Hardcode regex pattern")
});

static MONTH_FIRST_DATE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"^(\d{{1,2}})[/-](\d{{1,2}})[/-](\d{{2}}|\d{{4}}){TIME_SUFFIX}$");
    Regex::new(&pattern).expect("Hardcode regex pattern")
});

const WEEKDAY_PREFIX: &str = r"(?:(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+)?";

static MONTH_NAME_FIRST_DATE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)^{WEEKDAY_PREFIX}([a-z]{{3,}})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}}){TIME_SUFFIX}$");
    Regex::new(&pattern).expect("Hardcode regex pattern")
});

static DAY_FIRST_DATE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)^{WEEKDAY_PREFIX}(\d{{1,2}})(?:st|nd|rd|th)?[\s-]+([a-z]{{3,}})\.?,?[\s-]+(\d{{4}}){TIME_SUFFIX}$");
    Regex::new(&pattern).expect("Hardcode regex pattern")
});

const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];

/// Whether a cell value satisfies a column's declared type
pub(crate) fn accepts(kind: ColumnType, value: &CellValue) -> bool {
    match kind {
        ColumnType::Number => is_number(value),
        ColumnType::Date => is_date(value),
        ColumnType::String => is_string(value),
    }
}

/// Empty cells coerce to zero and are therefore numbers. Intentional: a blank amount is
/// not reported.
fn is_number(value: &CellValue) -> bool {
    match value {
        CellValue::Empty | CellValue::Boolean(_) | CellValue::DateTime(_) => true,
        CellValue::Number(number) => !number.is_nan(),
        CellValue::Text(text) => coerce_number(text).is_some(),
    }
}

fn is_date(value: &CellValue) -> bool {
    match value {
        CellValue::DateTime(_) => true,
        CellValue::Text(text) => parse_date(text).is_some(),
        CellValue::Empty | CellValue::Number(_) | CellValue::Boolean(_) => false,
    }
}

/// Only textual cells pass; an empty cell reads as empty text. Numbers, booleans and dates
/// fail even when their displayed form would be acceptable text.
fn is_string(value: &CellValue) -> bool {
    matches!(value, CellValue::Empty | CellValue::Text(_))
}

fn trim(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}')
}

/// Coerces text to a number; blank text is zero
pub fn coerce_number(text: &str) -> Option<f64> {
    let text = trim(text);
    if text.is_empty() {
        Some(0.0)
    } else if DECIMAL_LITERAL.is_match(text) {
        match text.trim_start_matches(['+', '-']) {
            "Infinity" if text.starts_with('-') => Some(f64::NEG_INFINITY),
            "Infinity" => Some(f64::INFINITY),
            _ => text.parse::<f64>().ok(),
        }
    } else if RADIX_LITERAL.is_match(text) {
        let radix = match text.as_bytes()[1] {
            b'x' | b'X' => 16,
            b'o' | b'O' => 8,
            _ => 2,
        };
        u128::from_str_radix(&text[2..], radix)
            .map(|number| number as f64)
            .ok()
            .or(Some(f64::INFINITY))
    } else {
        None
    }
}

/// Parses text as a calendar date or date-time.
/// Accepts ISO 8601 (`2025-01-31`, `2025-01-31T10:00:00Z`), RFC 2822, numeric dates written
/// year-first (`2025/1/31`) or month-first (`1/31/2025`), and dates with an English month name
/// (`Jan 31, 2025`, `31 January 2025`), each with an optional time of day.
/// Every date must exist in the calendar.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = trim(text);
    if text.is_empty() {
        return None;
    }
    if let Some(captures) = ISO_DATE.captures(text) {
        let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
        let month = number(&captures, 2).unwrap_or(1);
        let day = number(&captures, 3).unwrap_or(1);
        return to_datetime(year, month, day, &captures, 4);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc2822(text) {
        return Some(datetime.naive_utc());
    }
    if let Some(captures) = YEAR_FIRST_DATE.captures(text) {
        let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
        return to_datetime(year, number(&captures, 2)?, number(&captures, 3)?, &captures, 4);
    }
    if let Some(captures) = MONTH_FIRST_DATE.captures(text) {
        let year = to_full_year(captures.get(3)?.as_str())?;
        return to_datetime(year, number(&captures, 1)?, number(&captures, 2)?, &captures, 4);
    }
    if let Some(captures) = MONTH_NAME_FIRST_DATE.captures(text) {
        let month = to_month(captures.get(1)?.as_str())?;
        let year = captures.get(3)?.as_str().parse::<i32>().ok()?;
        return to_datetime(year, month, number(&captures, 2)?, &captures, 4);
    }
    if let Some(captures) = DAY_FIRST_DATE.captures(text) {
        let month = to_month(captures.get(2)?.as_str())?;
        let year = captures.get(3)?.as_str().parse::<i32>().ok()?;
        return to_datetime(year, month, number(&captures, 1)?, &captures, 4);
    }
    None
}

fn number(captures: &Captures, index: usize) -> Option<u32> {
    captures.get(index)?.as_str().parse::<u32>().ok()
}

/// Two-digit years below 50 fall in the 2000s, the rest in the 1900s
fn to_full_year(year: &str) -> Option<i32> {
    let value = year.parse::<i32>().ok()?;
    Some(match (year.len(), value) {
        (2, value) if value < 50 => 2000 + value,
        (2, value) => 1900 + value,
        (_, value) => value,
    })
}

/// Month number from an English month name or its three-letter abbreviation
fn to_month(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|month| name.starts_with(month))
        .map(|index| index as u32 + 1)
}

/// Builds the timestamp from a date and the time captures starting at `first`
/// (hour, minute, second, fraction, meridiem).
fn to_datetime(year: i32, month: u32, day: u32, captures: &Captures, first: usize) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = match number(captures, first) {
        None => NaiveTime::MIN,
        Some(hour) => {
            let minute = number(captures, first + 1)?;
            let second = number(captures, first + 2).unwrap_or(0);
            let millisecond = captures
                .get(first + 3)
                .map(|fraction| format!("{:0<3}", &fraction.as_str()[..fraction.as_str().len().min(3)]))
                .and_then(|fraction| fraction.parse::<u32>().ok())
                .unwrap_or(0);
            let hour = match captures.get(first + 4) {
                None => hour,
                Some(_) if !(1..=12).contains(&hour) => return None,
                Some(meridiem) if meridiem.as_str().eq_ignore_ascii_case("am") => hour % 12,
                Some(_) => hour % 12 + 12,
            };
            NaiveTime::from_hms_milli_opt(hour, minute, second, millisecond)?
        }
    };
    Some(date.and_time(time))
}

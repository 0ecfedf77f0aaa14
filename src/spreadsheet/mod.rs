//! # Spreadsheet Decoding
//!
//! Reads the first worksheet of an uploaded workbook. Two container formats are accepted:
//! the legacy Excel 97-2003 binary workbook (`.xls`, BIFF8 records in an OLE compound file)
//! and the Excel 2007+ workbook (`.xlsx`, XML parts in a zip archive). The format is
//! detected from the leading bytes, never from a file name.
pub(crate) mod cell;
pub(crate) mod excel;
pub mod record;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xls;
pub(crate) mod xlsx;

use crate::error::RustyIntakeError;
use crate::helpers::cfb::Cfb;
use crate::helpers::zip::is_zip_archive;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use thiserror::Error;
use tracing::debug;

/// Errors raised while decoding a workbook
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing workbook part '{0}'")]
    FileError(String),

    #[error("The workbook contains no worksheet")]
    SpreadsheetEmptyError,

    #[error("The workbook is password protected")]
    SpreadsheetPasswordProtectedError,

    #[error("Unrecognized file format (expected an .xls or .xlsx workbook)")]
    UnknownFormatError,

    #[error("Shared string index '{0}' is out of range")]
    SharedStringIndexError(usize),

    #[error("Invalid value '{1}' at cell {0}")]
    CellValueError(String, String),

    #[error("Cell at row {0}, column {1} is outside the worksheet grid")]
    CellPositionError(usize, usize),
}

/// Common interface of the workbook readers
pub(crate) trait Spreadsheet {
    /// Loads the shared string table that shared-string cells index into
    fn load_shared_strings(&mut self) -> Result<Vec<String>, RustyIntakeError>;

    /// Reads the cells of the first worksheet in workbook order
    fn read_first_sheet(&mut self) -> Result<Sheet, RustyIntakeError>;
}

/// Opens a workbook from its raw bytes, choosing the reader by file signature
pub(crate) fn open_spreadsheet(bytes: &[u8]) -> Result<Box<dyn Spreadsheet + '_>, RustyIntakeError> {
    if Cfb::is_compound_file(bytes) {
        debug!(size = bytes.len(), "Detected compound file workbook");
        Ok(Box::new(XlsSpreadsheet::open(bytes)?))
    } else if is_zip_archive(bytes) {
        debug!(size = bytes.len(), "Detected zip workbook");
        Ok(Box::new(XlsxSpreadsheet::open(bytes)?))
    } else {
        Err(SpreadsheetError::UnknownFormatError)?
    }
}

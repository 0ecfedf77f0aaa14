use crate::error::ResultOptionChain;
use crate::error::RustyIntakeError;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

// BIFF8 record type identifiers for Excel file parsing
const FORMULA: u16 = 6;        // Formula record containing calculation expressions
const EOF: u16 = 10;           // End of file record marking the end of a substream
const DATE1904: u16 = 34;      // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47;     // File password protection record
const CODE_PAGE: u16 = 66;     // Character encoding specification
const BOUND_SHEET8: u16 = 133; // Worksheet definition and position
const MUL_RK: u16 = 189;       // Multiple RK number records for efficiency
const XF: u16 = 224;           // Extended format record for cell styling
const SST: u16 = 252;          // Shared string table containing repeated text
const LABEL_SST: u16 = 253;    // Label referencing shared string table
const NUMBER: u16 = 515;       // Numeric cell value
const LABEL: u16 = 516;        // Text label cell value
const BOOL_ERR: u16 = 517;     // Boolean or error cell value
const STRING: u16 = 519;       // String value for formula results
const RK: u16 = 638;           // RK number format for compressed numeric storage
const FORMAT: u16 = 1054;      // Custom number format definition
const BOF: u16 = 2057;         // Beginning of file record for substreams

/// Sheet type of a worksheet or dialog sheet in BOUNDSHEET8
const WORKSHEET: u8 = 0;

/// Error types specific to XLS file parsing
#[derive(Error, Debug)]
pub enum XlsError {
    /// Invalid character encoding code page encountered
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    /// Invalid formula value or structure encountered
    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),

    /// Sheet stream position outside of the workbook stream
    #[error("Invalid sheet position '{0}'")]
    SheetPositionError(usize),
}

/// A legacy Excel 97-2003 workbook held in memory
pub(crate) struct XlsSpreadsheet {
    /// BIFF8 reader over the workbook stream
    reader: Biff8Reader,
    /// Shared string table containing repeated text values
    shared_strings: Vec<String>,
    /// Cell type of every extended format, indexed by the cell's XF index
    number_formats: Vec<CellType>,
    /// Worksheets with their names and stream positions
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Opens the compound file and reads the workbook globals substream
    pub(crate) fn open(bytes: &[u8]) -> Result<XlsSpreadsheet, RustyIntakeError> {
        let cfb = Cfb::new(&mut Cursor::new(bytes))?;
        // Office encrypts .xlsx (and newer .xls) workbooks into an OLE container
        if cfb.exists("EncryptedPackage") {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError)?
        }
        let mut reader = cfb.read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or(SpreadsheetError::SpreadsheetEmptyError)?;
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<String, CellType> = HashMap::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::SpreadsheetPasswordProtectedError)?,
            DATE1904 if reader.read_u16()? == 1 => is_1904 = true,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
            XF => {
                reader.skip(2)?;
                let id = reader.read_u16()?;
                format_indexes.push(id.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                reader.skip(1)?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                if sheet_type == WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError)?
        }

        // DATE1904 may follow the FORMAT records, so custom formats are resolved again here
        let custom_formats = if is_1904 {
            custom_formats.into_iter().map(|(id, kind)| (id, to_1904(kind))).collect()
        } else {
            custom_formats
        };
        let number_formats = load_number_formats(format_indexes, custom_formats, is_1904);
        debug!(sheets = sheets.len(), formats = number_formats.len(), strings = shared_strings.len(), is_1904, "Opened xls workbook");

        Ok(XlsSpreadsheet {
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    fn number_format(&self, index: usize) -> CellType {
        self.number_formats.get(index).copied().unwrap_or(CellType::Number)
    }
}

impl Spreadsheet for XlsSpreadsheet {
    /// The shared string table is part of the globals substream and is loaded on open
    fn load_shared_strings(&mut self) -> Result<Vec<String>, RustyIntakeError> {
        Ok(std::mem::take(&mut self.shared_strings))
    }

    /// Reads the cell records of the first worksheet's substream.
    /// Error values, including formulas evaluating to an error, are dropped.
    fn read_first_sheet(&mut self) -> Result<Sheet, RustyIntakeError> {
        let (sheet_name, pointer) = self.sheets.first().cloned().ok_or(SpreadsheetError::SpreadsheetEmptyError)?;
        let mut sheet = Sheet::new(&sheet_name);
        self.reader.goto(pointer);
        if self.reader.next()? != Some(BOF) {
            Err(XlsError::SheetPositionError(pointer))?
        }
        while let Some(tag) = self.reader.next()? {
            match tag {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let col_lower_bound = self.reader.read_u16()? as usize;
                    let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                    for col in col_lower_bound..=col_upper_bound {
                        let index = self.reader.read_u16()? as usize;
                        let value = self.reader.read_rk_number()?;
                        sheet.push(Cell {
                            row,
                            col,
                            kind: self.number_format(index),
                            value,
                        })?;
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let (either, value) = match tag {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    let kind = match either {
                        Either::Left(kind) => kind,
                        Either::Right(index) => self.number_format(index),
                    };
                    if kind == CellType::Error {
                        debug!(cell = %index_to_reference(row, col), value = %value, "Skipping error cell");
                    } else if !value.is_empty() {
                        sheet.push(Cell {
                            row,
                            col,
                            kind,
                            value,
                        })?;
                    }
                }
                _ => (),
            }
        }
        sheet.finish();
        Ok(sheet)
    }
}

/// Switches a date-formatted cell type to the 1904 date system
fn to_1904(kind: CellType) -> CellType {
    match kind {
        CellType::NumberDateTime1900 => CellType::NumberDateTime1904,
        CellType::NumberDate1900 => CellType::NumberDate1904,
        CellType::NumberTime1900 => CellType::NumberTime1904,
        kind => kind,
    }
}

/// Loads the shared string table from BIFF8 SST record
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, RustyIntakeError> {
    let mut shared_strings: Vec<String> = Vec::new();
    reader.skip(4)?;
    let count = reader.read_usize()?;
    for _ in 0..count {
        let string = reader.read_xl_unicode_rich_extended_string()?;
        shared_strings.push(string);
    }
    Ok(shared_strings)
}

/// Reads a BOOL_ERR record: a boolean or an error code, told apart by a flag byte
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), RustyIntakeError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let flag = reader.read_u8()?;
    if flag == 0 {
        Ok((Either::Left(CellType::Boolean), value.to_string()))
    } else {
        Ok((Either::Left(CellType::Error), to_error_value(value).to_owned()))
    }
}

/// Reads a NUMBER record; the XF index decides whether it is a date
fn read_number_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), RustyIntakeError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((Either::Right(index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), RustyIntakeError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((Either::Right(index), value))
}

/// Reads a LABEL_SST record; the value is an index into the shared string table
fn read_label_sst_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), RustyIntakeError> {
    reader.skip(2)?;
    let value = reader.read_usize()?;
    Ok((Either::Left(CellType::SharedString), value.to_string()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), RustyIntakeError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((Either::Left(CellType::InlineString), value))
}

/// Reads the cached result of a FORMULA record.
/// Non-numeric results mark the top two bytes with 0xFFFF and name their type in the low byte;
/// a string result lives in the STRING record that follows.
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), RustyIntakeError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    let flag = formula & 0xFF;
    if is_number {
        Ok((Either::Right(index), f64::from_bits(formula).to_string()))
    } else if flag == 0 {
        match reader.next()? {
            Some(STRING) => {
                let value = reader.read_xl_unicode_string()?;
                Ok((Either::Left(CellType::InlineString), value))
            }
            _ => Err(XlsError::FormulaValueError(formula))?,
        }
    } else if flag == 1 {
        let value = if (formula & 0xFF0000) > 0 { "1" } else { "0" };
        Ok((Either::Left(CellType::Boolean), value.to_owned()))
    } else if flag == 2 {
        let code = ((formula >> 16) & 0xFF) as u8;
        Ok((Either::Left(CellType::Error), to_error_value(code).to_owned()))
    } else if flag == 3 {
        Ok((Either::Left(CellType::InlineString), "".to_owned()))
    } else {
        Err(XlsError::FormulaValueError(formula))?
    }
}

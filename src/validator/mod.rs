//! # Validator
//!
//! Checks the first sheet of an uploaded workbook against the schema of its file type:
//! first that every required column is present in the header, then that every cell of
//! those columns has the declared type. Failures are collected into a [`ValidationResult`];
//! the validator itself never fails on malformed input.

mod coercion;

use crate::error::RustyIntakeError;
use crate::schema::ColumnType;
use crate::schema::FileSchema;
use crate::schema::SchemaRegistry;
use crate::spreadsheet::record::read_records;
use crate::spreadsheet::record::SheetRecords;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub use coercion::coerce_number;
pub use coercion::parse_date;

/// Most type-mismatch messages listed in one result
pub const MAX_DISPLAYED_ERRORS: usize = 10;

/// Trailing line added when more mismatches were found than are listed
pub const TRUNCATION_NOTICE: &str = "Only the first 10 errors are displayed out of many.";

/// A reason for rejecting a file. `Display` renders the message shown to the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unknown file type.")]
    UnknownFileType,

    #[error("File could not be read: {0}")]
    UnreadableFile(String),

    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Row {row}: \"{column}\" should be a {expected}.")]
    CellTypeMismatch {
        row: usize,
        column: String,
        expected: ColumnType,
    },
}

/// The terminal failure that ended a validation, if any
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownFileType,
    UnreadableFile,
    MissingColumns,
    CellTypeMismatch,
}

impl From<&ValidationError> for FailureKind {
    fn from(error: &ValidationError) -> Self {
        match error {
            ValidationError::UnknownFileType => Self::UnknownFileType,
            ValidationError::UnreadableFile(_) => Self::UnreadableFile,
            ValidationError::MissingColumns(_) => Self::MissingColumns,
            ValidationError::CellTypeMismatch { .. } => Self::CellTypeMismatch,
        }
    }
}

/// Outcome of validating one file
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    /// Messages in the order found, truncation notice last
    pub errors: Vec<String>,
    /// Every type mismatch found, listed or not. Terminal failures count as one.
    pub total_error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            total_error_count: 0,
            failure: None,
        }
    }

    /// A result holding a single terminal failure
    pub fn failure(error: ValidationError) -> Self {
        Self {
            valid: false,
            errors: vec![error.to_string()],
            total_error_count: 1,
            failure: Some(FailureKind::from(&error)),
        }
    }
}

/// Type mismatches found so far: the listed messages (at most [`MAX_DISPLAYED_ERRORS`])
/// and the uncapped total.
#[derive(Debug, Default)]
struct ErrorAccumulator {
    messages: Vec<String>,
    total: usize,
}

impl ErrorAccumulator {
    fn push(&mut self, error: ValidationError) {
        self.total += 1;
        if self.messages.len() < MAX_DISPLAYED_ERRORS {
            self.messages.push(error.to_string());
        }
    }

    fn finish(self) -> ValidationResult {
        let mut errors = self.messages;
        if self.total > MAX_DISPLAYED_ERRORS {
            errors.push(TRUNCATION_NOTICE.to_owned());
        }
        ValidationResult {
            valid: errors.is_empty(),
            failure: (self.total > 0).then_some(FailureKind::CellTypeMismatch),
            errors,
            total_error_count: self.total,
        }
    }
}

/// Validates workbooks against the schemas of a registry
#[derive(Copy, Clone, Debug, Default)]
pub struct Validator {
    registry: SchemaRegistry,
}

impl Validator {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validates raw workbook bytes against the schema of `file_type`
    pub fn validate(&self, bytes: &[u8], file_type: &str) -> ValidationResult {
        let schema = match self.registry.lookup(file_type) {
            Some(schema) => schema,
            None => {
                info!(file_type, "Rejected file: unknown file type");
                return ValidationResult::failure(ValidationError::UnknownFileType);
            }
        };
        let records = match read_records(bytes) {
            Ok(records) => records,
            Err(error) => {
                warn!(file_type, size = bytes.len(), %error, "Unreadable workbook");
                return ValidationResult::failure(ValidationError::UnreadableFile(error.to_string()));
            }
        };
        let result = validate_records(&records, schema);
        info!(
            file_type,
            rows = records.rows.len(),
            valid = result.valid,
            errors = result.total_error_count,
            "Validated workbook"
        );
        result
    }

    /// Reads the file at `path` and validates it. Only the read can fail.
    pub fn validate_file(&self, path: impl AsRef<Path>, file_type: &str) -> Result<ValidationResult, RustyIntakeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        debug!(path = %path.display(), size = bytes.len(), "Read upload");
        Ok(self.validate(&bytes, file_type))
    }
}

/// Checks decoded records against a schema: required columns first, then cell types.
/// A missing column ends the check before any row is looked at.
pub fn validate_records(records: &SheetRecords, schema: &FileSchema) -> ValidationResult {
    let observed: HashSet<&str> = records.columns.iter().map(String::as_str).collect();
    let missing: Vec<String> = schema
        .keys()
        .filter(|key| !observed.contains(key))
        .map(str::to_owned)
        .collect();
    if !missing.is_empty() {
        debug!(schema = schema.id, ?missing, "Missing columns");
        return ValidationResult::failure(ValidationError::MissingColumns(missing));
    }

    let mut accumulator = ErrorAccumulator::default();
    for (index, row) in records.rows.iter().enumerate() {
        for column in schema.columns {
            if !coercion::accepts(column.kind, row.get(column.key)) {
                accumulator.push(ValidationError::CellTypeMismatch {
                    // Header occupies the first row and numbering is 1-based
                    row: index + 2,
                    column: column.key.to_owned(),
                    expected: column.kind,
                });
            }
        }
    }
    accumulator.finish()
}

/// Validates raw workbook bytes with the built-in registry
pub fn validate(bytes: &[u8], file_type: &str) -> ValidationResult {
    Validator::default().validate(bytes, file_type)
}

/// Reads and validates a file with the built-in registry
pub fn validate_file(path: impl AsRef<Path>, file_type: &str) -> Result<ValidationResult, RustyIntakeError> {
    Validator::default().validate_file(path, file_type)
}

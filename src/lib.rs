//! # Rusty Intake
//!
//! Schema-driven validation of spreadsheet uploads. A file type names the columns an
//! uploaded workbook must carry and the type of each; the validator reads the first sheet
//! of an `.xls` or `.xlsx` workbook and reports, in order, missing columns and then cells
//! that do not match their column type.
//!
//! ## Features
//!
//! - **Pure Rust decoding**: BIFF8 compound files and Office Open XML workbooks, no native dependencies
//! - **Schema registry**: static file types with ordered `string`, `number` and `date` columns
//! - **Bounded reports**: at most ten mismatch messages, with an uncapped total count
//! - **Intake gate**: one file, spreadsheet types only, 25 MiB at most
//! - **Upload session**: file-type selection and stale-result cancellation for interactive hosts
//!
//! ```no_run
//! let bytes = std::fs::read("report.xlsx")?;
//! let result = rusty_intake::validate(&bytes, "report");
//! for message in &result.errors {
//!     eprintln!("{message}");
//! }
//! # Ok::<(), std::io::Error>(())
//! ```
pub mod error;
mod helpers;
pub mod intake;
pub mod schema;
pub mod session;
pub mod spreadsheet;
pub mod validator;

pub use crate::error::RustyIntakeError;
pub use crate::schema::ColumnDefinition;
pub use crate::schema::ColumnType;
pub use crate::schema::FileSchema;
pub use crate::schema::SchemaRegistry;
pub use crate::spreadsheet::record::read_records;
pub use crate::spreadsheet::record::CellValue;
pub use crate::spreadsheet::record::SheetRecords;
pub use crate::validator::validate;
pub use crate::validator::validate_file;
pub use crate::validator::validate_records;
pub use crate::validator::ValidationResult;
pub use crate::validator::Validator;

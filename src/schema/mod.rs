//! # Schema Registry
//!
//! The column contract of every accepted file type. The registry is a static table:
//! supporting a new file type means adding a [`FileSchema`] entry, nothing else.

use serde::Serialize;
use std::fmt::Display;
use tracing::debug;

/// Declared type of a column
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Date,
}

impl ColumnType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required column: its header text (case-sensitive) and declared type
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub key: &'static str,
    #[serde(rename = "type")]
    pub kind: ColumnType,
}

impl ColumnDefinition {
    pub const fn new(key: &'static str, kind: ColumnType) -> Self {
        Self { key, kind }
    }
}

/// The contract of one file type
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileSchema {
    /// File-type identifier, unique within a registry
    pub id: &'static str,
    /// Name shown when choosing the file type
    pub label: &'static str,
    /// Required columns in declared order
    pub columns: &'static [ColumnDefinition],
}

impl FileSchema {
    /// Column keys in declared order
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|column| column.key)
    }
}

const REPORT_COLUMNS: &[ColumnDefinition] = &[
    ColumnDefinition::new("Name", ColumnType::String),
    ColumnDefinition::new("Amount", ColumnType::Number),
    ColumnDefinition::new("Date", ColumnType::Date),
];

static BUILTIN_SCHEMAS: &[FileSchema] = &[
    FileSchema { id: "report", label: "Report", columns: REPORT_COLUMNS },
];

/// Lookup table from file-type identifier to schema
#[derive(Copy, Clone, Debug)]
pub struct SchemaRegistry {
    schemas: &'static [FileSchema],
}

impl SchemaRegistry {
    /// The file types accepted by the upload portal
    pub const fn builtin() -> Self {
        Self { schemas: BUILTIN_SCHEMAS }
    }

    /// A registry over another static schema table. Identifiers are expected to be unique;
    /// on a duplicate the first entry wins.
    pub const fn new(schemas: &'static [FileSchema]) -> Self {
        Self { schemas }
    }

    pub fn lookup(&self, id: &str) -> Option<&'static FileSchema> {
        let schema = self.schemas.iter().find(|schema| schema.id == id);
        debug!(id, found = schema.is_some(), "Schema lookup");
        schema
    }

    /// Known file types in registry order, for a selection control
    pub fn file_types(&self) -> impl Iterator<Item = &'static FileSchema> {
        self.schemas.iter()
    }

    /// The first registered file type, the default selection
    pub fn default_file_type(&self) -> Option<&'static FileSchema> {
        self.schemas.first()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

//! # Intake Gate
//!
//! Screens dropped or picked files before any byte is decoded: one file at a time, of an
//! accepted spreadsheet type, no larger than [`MAX_FILE_SIZE`]. Rejections are reported per
//! file and are never turned into validation results.

use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Largest accepted upload, 25 MiB
pub const MAX_FILE_SIZE: u64 = 26_214_400;

/// Spreadsheet formats accepted at intake
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadsheetKind {
    Xls,
    Xlsx,
}

impl SpreadsheetKind {
    pub const ALL: [SpreadsheetKind; 2] = [SpreadsheetKind::Xls, SpreadsheetKind::Xlsx];

    pub fn mime(&self) -> &'static str {
        match self {
            SpreadsheetKind::Xls => "application/vnd.ms-excel",
            SpreadsheetKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SpreadsheetKind::Xls => "xls",
            SpreadsheetKind::Xlsx => "xlsx",
        }
    }

    pub fn from_mime(mime: &str) -> Option<SpreadsheetKind> {
        let mime = mime.trim();
        Self::ALL.into_iter().find(|kind| kind.mime().eq_ignore_ascii_case(mime))
    }

    /// Recognises a file by its extension, ignoring case
    pub fn from_path(path: impl AsRef<Path>) -> Option<SpreadsheetKind> {
        let extension = path.as_ref().extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(extension))
    }
}

/// A file offered for upload, described without its content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileCandidate {
    pub name: String,
    /// Media type reported by the host, if any
    pub mime: Option<String>,
    pub size: u64,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, mime: Option<&str>, size: u64) -> Self {
        Self {
            name: name.into(),
            mime: mime.map(str::to_owned),
            size,
        }
    }

    /// Describes a local file, guessing the media type from its extension
    pub fn from_path(path: impl AsRef<Path>, size: u64) -> Self {
        let path = path.as_ref();
        Self {
            name: path.display().to_string(),
            mime: SpreadsheetKind::from_path(path).map(|kind| kind.mime().to_owned()),
            size,
        }
    }

    /// The accepted kind, by reported media type first and then by extension
    pub fn kind(&self) -> Option<SpreadsheetKind> {
        self.mime
            .as_deref()
            .and_then(SpreadsheetKind::from_mime)
            .or_else(|| SpreadsheetKind::from_path(&self.name))
    }
}

/// Why a file was turned away at intake
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Too many files")]
    TooManyFiles,

    #[error("File type must be application/vnd.ms-excel,.xls,application/vnd.openxmlformats-officedocument.spreadsheetml.sheet,.xlsx")]
    InvalidType,

    #[error("File is larger than 26214400 bytes")]
    TooLarge,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedFile {
    pub name: String,
    pub reasons: Vec<Rejection>,
}

impl RejectedFile {
    pub fn messages(&self) -> Vec<String> {
        self.reasons.iter().map(Rejection::to_string).collect()
    }
}

/// Result of screening one drop
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Admission {
    /// Index of the admitted candidate
    pub accepted: Option<usize>,
    pub rejected: Vec<RejectedFile>,
}

fn screen(candidate: &FileCandidate) -> Vec<Rejection> {
    let mut reasons = Vec::new();
    if candidate.kind().is_none() {
        reasons.push(Rejection::InvalidType);
    }
    if candidate.size > MAX_FILE_SIZE {
        reasons.push(Rejection::TooLarge);
    }
    reasons
}

/// Screens the files of one drop. Several files are all rejected, each also carrying
/// its own type and size reasons.
pub fn admit(candidates: &[FileCandidate]) -> Admission {
    let mut admission = Admission::default();
    let too_many = candidates.len() > 1;
    for (index, candidate) in candidates.iter().enumerate() {
        let mut reasons = screen(candidate);
        if too_many {
            reasons.insert(0, Rejection::TooManyFiles);
        }
        if reasons.is_empty() {
            admission.accepted = Some(index);
        } else {
            debug!(name = %candidate.name, ?reasons, "Rejected file at intake");
            admission.rejected.push(RejectedFile {
                name: candidate.name.to_owned(),
                reasons,
            });
        }
    }
    admission
}

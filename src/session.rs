//! # Upload Session
//!
//! Ties the intake gate and the validator to one upload form: a selected file type and
//! at most one current selection. Every selection is stamped with a ticket; only the
//! most recent ticket may publish its outcome, so a slow validation that finishes after
//! a newer drop (or after [`UploadSession::clear`]) is dropped on the floor.

use crate::error::RustyIntakeError;
use crate::intake::admit;
use crate::intake::FileCandidate;
use crate::intake::RejectedFile;
use crate::schema::FileSchema;
use crate::schema::SchemaRegistry;
use crate::validator::ValidationError;
use crate::validator::ValidationResult;
use crate::validator::Validator;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown file type '{0}'")]
    UnknownFileType(String),
}

/// A file handed over by the host, content included
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.map(str::to_owned),
            bytes,
        }
    }

    fn candidate(&self) -> FileCandidate {
        FileCandidate {
            name: self.name.to_owned(),
            mime: self.mime.to_owned(),
            size: self.bytes.len() as u64,
        }
    }
}

/// What became of the admitted file of a selection
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SelectionOutcome {
    #[default]
    None,
    /// Passed validation and may be submitted
    Accepted { file_name: String, size: u64 },
    Invalid { file_name: String, result: ValidationResult },
}

/// The files of one drop and what became of them
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub rejected: Vec<RejectedFile>,
    pub outcome: SelectionOutcome,
}

/// Stamp of one selection; only the newest may publish
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SelectionTicket(u64);

pub struct UploadSession {
    validator: Validator,
    file_type: Mutex<Option<&'static FileSchema>>,
    generation: AtomicU64,
    selection: Mutex<Selection>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl UploadSession {
    /// Starts with the registry's first file type selected
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            validator: Validator::new(registry),
            file_type: Mutex::new(registry.default_file_type()),
            generation: AtomicU64::new(0),
            selection: Mutex::new(Selection::default()),
        }
    }

    pub fn file_type(&self) -> Option<&'static FileSchema> {
        *lock(&self.file_type)
    }

    /// Selects the schema used for later drops. The current selection is kept as is.
    pub fn set_file_type(&self, id: &str) -> Result<(), RustyIntakeError> {
        let schema = self
            .validator
            .registry()
            .lookup(id)
            .ok_or_else(|| SessionError::UnknownFileType(id.to_owned()))?;
        *lock(&self.file_type) = Some(schema);
        debug!(file_type = schema.id, "Selected file type");
        Ok(())
    }

    pub fn selection(&self) -> Selection {
        lock(&self.selection).clone()
    }

    /// True only when the current selection holds a file that passed validation
    pub fn can_submit(&self) -> bool {
        matches!(lock(&self.selection).outcome, SelectionOutcome::Accepted { .. })
    }

    /// Issues a ticket that supersedes every earlier one
    pub fn begin_selection(&self) -> SelectionTicket {
        SelectionTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Publishes a selection if its ticket is still the newest. Returns whether it was published.
    pub fn complete_selection(&self, ticket: SelectionTicket, selection: Selection) -> bool {
        let mut current = lock(&self.selection);
        let latest = self.generation.load(Ordering::SeqCst);
        if ticket.0 != latest {
            warn!(ticket = ticket.0, latest, "Discarded stale selection result");
            return false;
        }
        *current = selection;
        true
    }

    /// Empties the selection and invalidates every ticket in flight
    pub fn clear(&self) {
        let mut current = lock(&self.selection);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *current = Selection::default();
    }

    /// Screens and validates one drop, publishing the result unless a newer selection
    /// started meanwhile. Returns the selection either way.
    pub fn drop_files(&self, files: &[DroppedFile]) -> Selection {
        let ticket = self.begin_selection();
        let file_type = self.file_type();
        let candidates: Vec<FileCandidate> = files.iter().map(DroppedFile::candidate).collect();
        let admission = admit(&candidates);

        let outcome = match admission.accepted.and_then(|index| files.get(index)) {
            None => SelectionOutcome::None,
            Some(file) => {
                let result = match file_type {
                    Some(schema) => self.validator.validate(&file.bytes, schema.id),
                    None => ValidationResult::failure(ValidationError::UnknownFileType),
                };
                info!(file = %file.name, valid = result.valid, "Validated dropped file");
                if result.valid {
                    SelectionOutcome::Accepted {
                        file_name: file.name.to_owned(),
                        size: file.bytes.len() as u64,
                    }
                } else {
                    SelectionOutcome::Invalid {
                        file_name: file.name.to_owned(),
                        result,
                    }
                }
            }
        };

        let selection = Selection {
            rejected: admission.rejected,
            outcome,
        };
        self.complete_selection(ticket, selection.clone());
        selection
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new(SchemaRegistry::default())
    }
}

//! Error types for the file registry

use filereg_storage::StoreError;
use filereg_types::{FileId, Identity, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unauthorized: {caller} may not modify file {file_id}")]
    Unauthorized { file_id: FileId, caller: Identity },

    #[error("File not found: {file_id}")]
    NotFound { file_id: FileId },

    #[error("File already exists: {file_id}")]
    Conflict { file_id: FileId },

    #[error("Registry storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Coarse classification of a rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    Validation,
    Unauthorized,
    NotFound,
    Conflict,
    Storage,
}

impl RegistryError {
    pub fn kind(&self) -> RejectionKind {
        match self {
            RegistryError::Validation(_) => RejectionKind::Validation,
            RegistryError::Unauthorized { .. } => RejectionKind::Unauthorized,
            RegistryError::NotFound { .. } => RejectionKind::NotFound,
            RegistryError::Conflict { .. } => RejectionKind::Conflict,
            RegistryError::Storage(_) => RejectionKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

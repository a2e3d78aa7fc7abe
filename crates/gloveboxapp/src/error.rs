use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::RestrictedLocation;

#[derive(Error, Debug)]
pub enum GloveboxError {
    #[error("Vehicle not found: {0}")]
    VehicleNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("Storage folder is not configured")]
    StorageNotConfigured,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Api Error: {0}")]
    Api(String),
}

/// Failures of the storage manager.
///
/// Every variant carries the path involved so the UI can render an
/// actionable message instead of a bare OS error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No storage folder has been chosen yet")]
    NotConfigured,

    #[error("Could not save a reference to {path}: {reason}")]
    ReferenceCreation { path: PathBuf, reason: String },

    #[error("The storage folder {path} is no longer reachable")]
    ReferenceResolution { path: PathBuf },

    #[error("Access denied to {path}: {source}")]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not create folder {path}: {source}")]
    FolderCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not save file {path}: {source}")]
    FileSave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not move {from} to {to}: {source}")]
    Migration {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not delete {path}: {source}")]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} cannot be used: {}", .kind.advice())]
    RestrictedLocation {
        path: PathBuf,
        kind: RestrictedLocation,
    },
}

impl StorageError {
    /// Whether the error means the user has to pick the storage folder again.
    pub fn needs_reconfiguration(&self) -> bool {
        matches!(
            self,
            StorageError::NotConfigured
                | StorageError::ReferenceResolution { .. }
                | StorageError::AccessDenied { .. }
                | StorageError::RestrictedLocation { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GloveboxError>;
pub type StorageResult<T> = std::result::Result<T, StorageError>;

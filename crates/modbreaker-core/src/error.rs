// modbreaker-core/src/error.rs
//! Workspace-wide error type
//!
//! Every crate keeps its own narrow error enum; this type is what they
//! convert into once a result crosses a crate boundary (VFS, catalog, CLI).

use thiserror::Error;

use crate::types::Stage;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Hard parse failure at a known stage and byte offset
    #[error("{stage} error at offset {offset}: {message}")]
    Parse {
        stage: Stage,
        offset: u64,
        message: String,
    },

    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    #[error("Archive entry not found: {path}")]
    EntryNotFound { path: String },

    #[error("VFS path not found: {0}")]
    VfsNotFound(String),

    /// Folder or archive could not be mounted at all
    #[error("Mount failed: {0}")]
    MountFailed(String),

    /// Class inheritance chain loops back on itself
    #[error("Inheritance cycle through class {class}")]
    InheritanceCycle { class: String },

    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap with the input being processed (a path, a class name)
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn parse(stage: Stage, offset: u64, message: impl Into<String>) -> Self {
        Error::Parse {
            stage,
            offset,
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Stage of the innermost parse error, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Parse { stage, .. } => Some(*stage),
            Error::WithContext { source, .. } => source.stage(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::VfsNotFound(_) | Error::EntryNotFound { .. } => true,
            Error::WithContext { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Every way a migration run can end early. None of these are retried.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("migration source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("migration not found: {0}")]
    UnitNotFound(String),

    #[error("migration {0} is listed more than once")]
    DuplicateName(String),

    #[error("failed to initialise migration tracking table: {0}")]
    TrackingInitFailed(#[source] rusqlite::Error),

    #[error("failed to check whether migration {name} has run: {source}")]
    CheckFailed {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("migration {name} failed: {source}")]
    ApplyFailed {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to record migration {name}: {source}")]
    RecordFailed {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to commit migration {name}: {source}")]
    CommitFailed {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to read migration records: {0}")]
    ReadRecordsFailed(#[source] rusqlite::Error),

    #[error("failed to lock {}: {source}", path.display())]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrationError {
    /// The migration the run stopped at, if the failure belongs to one.
    pub fn unit_name(&self) -> Option<&str> {
        match self {
            Self::UnitNotFound(name) | Self::DuplicateName(name) => Some(name),
            Self::CheckFailed { name, .. }
            | Self::ApplyFailed { name, .. }
            | Self::RecordFailed { name, .. }
            | Self::CommitFailed { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<MigrationError> for ermon_common::Error {
    fn from(e: MigrationError) -> Self {
        ermon_common::Error::Database(e.to_string())
    }
}

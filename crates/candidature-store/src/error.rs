use candidature_core::{CoreError, Submission};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
    NotNull,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Check => "check",
            ConstraintKind::NotNull => "not null",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing home directory")]
    MissingHomeDir,
    #[error("invalid data path: {0}")]
    InvalidDataPath(PathBuf),
    #[error("invalid id string: {0}")]
    InvalidId(String),
    #[error("invalid stored date: {0}")]
    InvalidDate(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("migration error: {0}")]
    Migration(String),
    /// `existing` is `None` only when the unique index fired but the prior
    /// row could not be read back.
    #[error("duplicate email: {email}")]
    DuplicateEmail {
        email: String,
        existing: Option<Submission>,
    },
    #[error("{kind} constraint failed: {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    Io,
    Sql,
    Core,
    Json,
    MissingHomeDir,
    InvalidDataPath,
    InvalidId,
    InvalidDate,
    NotFound,
    Migration,
    DuplicateEmail,
    Constraint,
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::Io(_) => StoreErrorKind::Io,
            StoreError::Sql(_) => StoreErrorKind::Sql,
            StoreError::Core(_) => StoreErrorKind::Core,
            StoreError::Json(_) => StoreErrorKind::Json,
            StoreError::MissingHomeDir => StoreErrorKind::MissingHomeDir,
            StoreError::InvalidDataPath(_) => StoreErrorKind::InvalidDataPath,
            StoreError::InvalidId(_) => StoreErrorKind::InvalidId,
            StoreError::InvalidDate(_) => StoreErrorKind::InvalidDate,
            StoreError::NotFound(_) => StoreErrorKind::NotFound,
            StoreError::Migration(_) => StoreErrorKind::Migration,
            StoreError::DuplicateEmail { .. } => StoreErrorKind::DuplicateEmail,
            StoreError::Constraint { .. } => StoreErrorKind::Constraint,
        }
    }
}

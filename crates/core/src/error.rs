use std::{io, path::PathBuf};

use thiserror::Error;

use crate::StatementKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("{operation} `{}` failed", path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, operation: &'static str, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("unterminated {kind} statement at line {line}: {excerpt}")]
    UnterminatedStatement {
        kind: StatementKind,
        line: usize,
        excerpt: String,
    },
    #[error("{kind} statement at line {line} cannot be guarded: {reason}")]
    UnguardableStatement {
        kind: StatementKind,
        line: usize,
        reason: &'static str,
    },
    #[error("DO block at line {line} contains a nested DO block")]
    NestedGuardBlock { line: usize },
}

impl ScanError {
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::UnterminatedStatement { line, .. }
            | Self::UnguardableStatement { line, .. }
            | Self::NestedGuardBlock { line } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("guard checking {guard_key} wraps no {kind} creation clause")]
    MalformedGuardTarget {
        kind: StatementKind,
        guard_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("indent must be at most {max} spaces, got {actual}")]
    IndentTooWide { actual: usize, max: usize },
    #[error("every statement kind is disabled; nothing would be rewritten")]
    NothingEnabled,
}

pub type Result<T> = std::result::Result<T, Error>;

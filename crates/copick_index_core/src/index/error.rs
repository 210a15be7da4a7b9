//! Per-node storage failures.

use crate::model::node::NodeId;
use std::fmt::{Display, Formatter};
use std::io;
use thiserror::Error;

/// Coarse failure class of a storage round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    PermissionDenied,
    TimedOut,
    /// Storage answered, but the content does not match the layout.
    InvalidData,
    /// A load was abandoned before it completed.
    Interrupted,
    Other,
}

impl From<io::ErrorKind> for StorageErrorKind {
    fn from(value: io::ErrorKind) -> Self {
        match value {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => Self::InvalidData,
            io::ErrorKind::Interrupted => Self::Interrupted,
            _ => Self::Other,
        }
    }
}

impl Display for StorageErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::TimedOut => "timed_out",
            Self::InvalidData => "invalid_data",
            Self::Interrupted => "interrupted",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Storage failure tagged with the node whose resolution failed.
///
/// Cloneable so it can be cached as the node's failure marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{node}: {kind}: {message}")]
pub struct StorageError {
    pub node: NodeId,
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(node: NodeId, kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            node,
            kind,
            message: message.into(),
        }
    }

    pub fn from_io(node: NodeId, err: &io::Error) -> Self {
        Self::new(node, err.kind().into(), err.to_string())
    }

    pub fn not_found(node: NodeId, message: impl Into<String>) -> Self {
        Self::new(node, StorageErrorKind::NotFound, message)
    }

    pub fn invalid_data(node: NodeId, message: impl Into<String>) -> Self {
        Self::new(node, StorageErrorKind::InvalidData, message)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

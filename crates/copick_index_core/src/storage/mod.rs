//! Storage backends behind the project index.
//!
//! # Responsibility
//! - Define the minimal listing/reading/writing contract the index needs.
//! - Keep filesystem and object-store details out of index orchestration.
//!
//! # Invariants
//! - Paths are project-relative, `/`-separated, and never contain `..`.
//! - `list_dir` returns entry names (not paths), sorted ascending.
//! - A missing directory or file is reported as `io::ErrorKind::NotFound`.

pub mod layout;
mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use std::io;

/// Storage contract implemented by every project storage backend.
///
/// Each call is one storage round trip; the index counts on that to keep
/// traversal cost proportional to the nodes actually visited.
pub trait ProjectStorage: Send + Sync {
    /// Human-readable backend location for diagnostics.
    fn describe(&self) -> String;
    /// Checks that the project root is reachable.
    fn probe(&self) -> io::Result<()>;
    /// Lists entry names directly under one directory.
    fn list_dir(&self, path: &str) -> io::Result<Vec<String>>;
    /// Reads one object/file fully.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
    /// Reads at most `len` bytes starting at `offset`.
    ///
    /// Backends that support ranged reads should override this.
    fn read_range(&self, path: &str, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let bytes = self.read(path)?;
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    /// Creates or replaces one file, creating missing parent directories.
    ///
    /// Read-only backends keep this default.
    fn write(&self, path: &str, _bytes: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("storage is read-only: {path}"),
        ))
    }
}

/// Splits a project-relative path into validated components.
pub(crate) fn path_components(path: &str) -> io::Result<Vec<&str>> {
    let mut components = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes project root: {path}"),
                ))
            }
            other => components.push(other),
        }
    }
    Ok(components)
}

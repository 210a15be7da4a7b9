//! In-memory backend.
//!
//! Directories are implicit: a directory exists while at least one file
//! lives below it. Used for fixtures and for hosts that stage projects in
//! memory.

use super::{path_components, ProjectStorage};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one file.
    pub fn insert(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        let key = normalize(path);
        self.files.write().insert(key, bytes.into());
    }

    /// Removes one file. Returns whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(normalize(path).as_str()).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl ProjectStorage for MemoryStorage {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    fn probe(&self) -> io::Result<()> {
        Ok(())
    }

    fn list_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let components = path_components(path)?;
        let prefix = if components.is_empty() {
            String::new()
        } else {
            format!("{}/", components.join("/"))
        };

        let files = self.files.read();
        let mut names = BTreeSet::new();
        for (key, _) in files.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            if let Some(name) = rest.split('/').next().filter(|name| !name.is_empty()) {
                names.insert(name.to_string());
            }
        }

        if names.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {path}"),
            ));
        }
        Ok(names.into_iter().collect())
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let key = path_components(path)?.join("/");
        self.files.read().get(key.as_str()).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
        })
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let key = path_components(path)?.join("/");
        self.files.write().insert(key, bytes.to_vec());
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::MemoryStorage;
    use crate::storage::ProjectStorage;
    use std::io::ErrorKind;

    #[test]
    fn lists_implicit_directories() {
        let storage = MemoryStorage::new();
        storage.insert("ExperimentRuns/RunB/Picks/a_1_x.json", b"{}".to_vec());
        storage.insert("ExperimentRuns/RunA/VoxelSpacing10.000/wbp.zarr/.zattrs", b"{}".to_vec());
        storage.insert("ExperimentRunsExtra/file", b"".to_vec());

        assert_eq!(
            storage.list_dir("ExperimentRuns").expect("list"),
            vec!["RunA".to_string(), "RunB".to_string()]
        );
        assert_eq!(
            storage.list_dir("/").expect("list root"),
            vec!["ExperimentRuns".to_string(), "ExperimentRunsExtra".to_string()]
        );
    }

    #[test]
    fn missing_entries_are_not_found() {
        let storage = MemoryStorage::new();
        storage.insert("a/b.txt", b"x".to_vec());
        assert_eq!(storage.list_dir("c").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(storage.read("a/c.txt").unwrap_err().kind(), ErrorKind::NotFound);
        assert!(storage.remove("a/b.txt"));
        assert!(storage.is_empty());
    }

    #[test]
    fn writes_create_implicit_directories() {
        let storage = MemoryStorage::new();
        storage
            .write("ExperimentRuns/RunA/Picks/a_1_x.json", b"{}")
            .expect("write");
        assert_eq!(
            storage.list_dir("ExperimentRuns/RunA/Picks").expect("list"),
            vec!["a_1_x.json".to_string()]
        );
        let err = storage.write("../escape.json", b"{}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}

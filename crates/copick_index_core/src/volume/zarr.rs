//! Zarr v2 multiscale datasets.

use super::PyramidLevel;
use crate::model::refs::TomogramRef;
use crate::storage::layout::join;
use crate::storage::ProjectStorage;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::io;
use std::sync::Arc;

const ATTRS_FILE: &str = ".zattrs";
const ARRAY_FILE: &str = ".zarray";

fn default_order() -> String {
    "C".to_string()
}

fn default_separator() -> String {
    ".".to_string()
}

/// `.zarray` metadata of one pyramid level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    #[serde(default)]
    pub zarr_format: u32,
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    pub dtype: String,
    #[serde(default)]
    pub compressor: Option<serde_json::Value>,
    #[serde(default)]
    pub fill_value: Option<serde_json::Value>,
    #[serde(default = "default_order")]
    pub order: String,
    #[serde(default = "default_separator")]
    pub dimension_separator: String,
}

impl ArrayMetadata {
    fn parse(bytes: &[u8]) -> io::Result<Self> {
        let metadata: Self = serde_json::from_slice(bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        if metadata.shape.len() != 3 || metadata.chunks.len() != 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "expected 3-d array, got shape {:?} chunks {:?}",
                    metadata.shape, metadata.chunks
                ),
            ));
        }
        if metadata.chunks.contains(&0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "chunk size must be positive",
            ));
        }
        Ok(metadata)
    }
}

#[derive(Debug, Deserialize)]
struct GroupAttributes {
    #[serde(default)]
    multiscales: Vec<Multiscale>,
}

#[derive(Debug, Deserialize)]
struct Multiscale {
    #[serde(default)]
    datasets: Vec<MultiscaleDataset>,
}

#[derive(Debug, Deserialize)]
struct MultiscaleDataset {
    path: String,
}

/// An opened tomogram dataset: its location and the levels it advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZarrDataset {
    path: String,
    levels: Vec<PyramidLevel>,
}

impl ZarrDataset {
    /// Opens the group at `path`.
    ///
    /// Reads the multiscale attributes; when they are absent, falls back to
    /// listing the group for conventional level directories.
    pub fn open(storage: &dyn ProjectStorage, path: &str) -> io::Result<Self> {
        let advertised = match storage.read(join(path, ATTRS_FILE).as_str()) {
            Ok(bytes) => {
                let attrs: GroupAttributes = serde_json::from_slice(&bytes)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
                attrs
                    .multiscales
                    .into_iter()
                    .next()
                    .map(|multiscale| {
                        multiscale
                            .datasets
                            .iter()
                            .filter_map(|dataset| dataset.path.parse::<PyramidLevel>().ok())
                            .collect::<Vec<_>>()
                    })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };

        let mut levels = match advertised {
            Some(levels) => levels,
            None => storage
                .list_dir(path)?
                .iter()
                .filter_map(|name| PyramidLevel::from_group(name))
                .collect(),
        };
        levels.sort();
        levels.dedup();

        Ok(Self {
            path: path.to_string(),
            levels,
        })
    }

    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn has_level(&self, level: PyramidLevel) -> bool {
        self.levels.contains(&level)
    }

    /// Reads one level's array metadata and returns a handle to it.
    pub fn open_level(
        &self,
        storage: Arc<dyn ProjectStorage>,
        tomogram: &TomogramRef,
        level: PyramidLevel,
    ) -> io::Result<VolumeHandle> {
        if !self.has_level(level) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("pyramid level {level} is not present in {}", self.path),
            ));
        }
        let array_path = join(self.path.as_str(), level.group());
        let metadata = ArrayMetadata::parse(&storage.read(join(&array_path, ARRAY_FILE).as_str())?)?;
        Ok(VolumeHandle {
            tomogram: tomogram.clone(),
            level,
            array_path,
            metadata,
            storage,
        })
    }
}

/// One resolved pyramid level of a tomogram.
pub struct VolumeHandle {
    tomogram: TomogramRef,
    level: PyramidLevel,
    array_path: String,
    metadata: ArrayMetadata,
    storage: Arc<dyn ProjectStorage>,
}

impl Debug for VolumeHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeHandle")
            .field("tomogram", &self.tomogram)
            .field("level", &self.level)
            .field("array_path", &self.array_path)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl VolumeHandle {
    pub fn tomogram(&self) -> &TomogramRef {
        &self.tomogram
    }

    pub fn level(&self) -> PyramidLevel {
        self.level
    }

    pub fn path(&self) -> &str {
        self.array_path.as_str()
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    /// Array shape as `[z, y, x]`.
    pub fn shape(&self) -> [u64; 3] {
        [
            self.metadata.shape[0],
            self.metadata.shape[1],
            self.metadata.shape[2],
        ]
    }

    /// Number of chunks along each axis.
    pub fn chunk_grid(&self) -> [u64; 3] {
        let mut grid = [0; 3];
        for (axis, slot) in grid.iter_mut().enumerate() {
            *slot = self.metadata.shape[axis].div_ceil(self.metadata.chunks[axis]);
        }
        grid
    }

    /// Storage key of one chunk, or `None` when outside the grid.
    pub fn chunk_key(&self, coords: [u64; 3]) -> Option<String> {
        let grid = self.chunk_grid();
        if coords.iter().zip(grid.iter()).any(|(c, g)| c >= g) {
            return None;
        }
        let separator = self.metadata.dimension_separator.as_str();
        let key = coords
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(separator);
        Some(join(self.array_path.as_str(), key.as_str()))
    }

    /// Reads the encoded bytes of one chunk.
    ///
    /// A missing chunk is `NotFound`; callers substitute `fill_value`.
    pub fn read_chunk(&self, coords: [u64; 3]) -> io::Result<Vec<u8>> {
        let key = self.chunk_key(coords).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("chunk {coords:?} outside grid {:?}", self.chunk_grid()),
            )
        })?;
        self.storage.read(key.as_str())
    }
}

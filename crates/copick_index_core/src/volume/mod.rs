//! Volumetric datasets: multi-resolution tomograms and reference maps.
//!
//! # Responsibility
//! - Describe pyramid levels of chunked (zarr v2) tomogram datasets.
//! - Parse dataset and array metadata without touching voxel chunks.
//! - Read reference density map (MRC) headers.
//!
//! # Invariants
//! - Level `0` is full resolution; each further level halves every axis.
//! - Opening a `VolumeHandle` reads metadata only; chunks are read on demand.

pub mod mrc;
mod zarr;

pub use mrc::{MrcHeader, ObjectVolume};
pub use zarr::{ArrayMetadata, VolumeHandle, ZarrDataset};

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Level of detail of a tomogram pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PyramidLevel {
    /// 100% scale, group `0`.
    Full,
    /// 50% scale, group `1`.
    Half,
    /// 25% scale, group `2`.
    Quarter,
}

impl PyramidLevel {
    pub const ALL: [PyramidLevel; 3] = [Self::Full, Self::Half, Self::Quarter];

    /// Position in `ALL`, also the zarr group index.
    pub fn index(self) -> usize {
        match self {
            Self::Full => 0,
            Self::Half => 1,
            Self::Quarter => 2,
        }
    }

    /// Zarr group name holding this level.
    pub fn group(self) -> &'static str {
        match self {
            Self::Full => "0",
            Self::Half => "1",
            Self::Quarter => "2",
        }
    }

    /// Downsampling factor relative to full resolution.
    pub fn scale_factor(self) -> u32 {
        1 << self.index()
    }

    fn from_group(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.group() == value)
    }
}

impl Display for PyramidLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Full => "full",
            Self::Half => "half",
            Self::Quarter => "quarter",
        };
        f.write_str(label)
    }
}

impl FromStr for PyramidLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" | "100" | "100%" => Ok(Self::Full),
            "half" | "50" | "50%" => Ok(Self::Half),
            "quarter" | "25" | "25%" => Ok(Self::Quarter),
            other => Self::from_group(other).ok_or_else(|| {
                format!("unsupported pyramid level `{other}`; expected full|half|quarter|0|1|2")
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PyramidLevel;

    #[test]
    fn levels_map_to_groups_and_scales() {
        assert_eq!(PyramidLevel::Full.group(), "0");
        assert_eq!(PyramidLevel::Quarter.group(), "2");
        assert_eq!(PyramidLevel::Half.scale_factor(), 2);
        assert_eq!(PyramidLevel::Quarter.scale_factor(), 4);
    }

    #[test]
    fn parses_names_and_group_indices() {
        assert_eq!("HALF".parse::<PyramidLevel>(), Ok(PyramidLevel::Half));
        assert_eq!("2".parse::<PyramidLevel>(), Ok(PyramidLevel::Quarter));
        assert_eq!("100%".parse::<PyramidLevel>(), Ok(PyramidLevel::Full));
        assert!("eighth".parse::<PyramidLevel>().is_err());
    }
}

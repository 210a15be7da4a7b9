//! Node identities inside the project tree.
//!
//! # Responsibility
//! - Name every cacheable node so failures and invalidation can target it.
//! - Give voxel spacings a stable, hashable identity.
//!
//! # Invariants
//! - Two `VoxelSize` values are equal iff they round to the same 1/1000 Å.
//! - `NodeId` display strings are stable and used verbatim in log events.

use std::fmt::{Display, Formatter};

const MILLI_PER_ANGSTROM: f64 = 1000.0;

/// Voxel spacing tag in Ångström, quantized to three decimals.
///
/// Storage directories encode spacings as `VoxelSpacing%.3f`, so the
/// quantized value is the identity used for caching and lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelSize {
    milli: i64,
}

impl VoxelSize {
    /// Builds a spacing from Ångström. Returns `None` for non-finite or
    /// non-positive values.
    pub fn from_angstrom(value: f64) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let milli = (value * MILLI_PER_ANGSTROM).round();
        if milli < 1.0 || milli > i64::MAX as f64 {
            return None;
        }
        Some(Self {
            milli: milli as i64,
        })
    }

    /// Parses a decimal spacing such as `10.000` or `7.84`.
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse::<f64>().ok().and_then(Self::from_angstrom)
    }

    pub fn as_angstrom(self) -> f64 {
        self.milli as f64 / MILLI_PER_ANGSTROM
    }
}

impl Display for VoxelSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.as_angstrom())
    }
}

/// Identity of one node in the lazily materialized project tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// Project root; its children are the runs.
    Project,
    /// One run; its children are the voxel spacings.
    Run { run: String },
    /// Annotation listing of one run.
    Annotations { run: String },
    /// One annotation file inside a run.
    AnnotationFile { run: String, file: String },
    /// Segmentation listing of one run.
    Segmentations { run: String },
    /// Mesh listing of one run.
    Meshes { run: String },
    /// One voxel spacing of a run; its children are the tomograms.
    VoxelSpacing { run: String, voxel_size: VoxelSize },
    /// One tomogram dataset and its pyramid levels.
    Tomogram {
        run: String,
        voxel_size: VoxelSize,
        tomo_type: String,
    },
    /// Reference volume of one pickable object.
    PickableObject { name: String },
}

impl NodeId {
    pub fn run(run: impl Into<String>) -> Self {
        Self::Run { run: run.into() }
    }

    pub fn annotations(run: impl Into<String>) -> Self {
        Self::Annotations { run: run.into() }
    }

    pub fn segmentations(run: impl Into<String>) -> Self {
        Self::Segmentations { run: run.into() }
    }

    pub fn meshes(run: impl Into<String>) -> Self {
        Self::Meshes { run: run.into() }
    }

    pub fn voxel_spacing(run: impl Into<String>, voxel_size: VoxelSize) -> Self {
        Self::VoxelSpacing {
            run: run.into(),
            voxel_size,
        }
    }

    pub fn tomogram(
        run: impl Into<String>,
        voxel_size: VoxelSize,
        tomo_type: impl Into<String>,
    ) -> Self {
        Self::Tomogram {
            run: run.into(),
            voxel_size,
            tomo_type: tomo_type.into(),
        }
    }

    pub fn pickable_object(name: impl Into<String>) -> Self {
        Self::PickableObject { name: name.into() }
    }

    /// Returns the run this node lives under, if any.
    pub fn run_name(&self) -> Option<&str> {
        match self {
            Self::Project | Self::PickableObject { .. } => None,
            Self::Run { run }
            | Self::Annotations { run }
            | Self::AnnotationFile { run, .. }
            | Self::Segmentations { run }
            | Self::Meshes { run }
            | Self::VoxelSpacing { run, .. }
            | Self::Tomogram { run, .. } => Some(run.as_str()),
        }
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Project => write!(f, "project"),
            Self::Run { run } => write!(f, "run:{run}"),
            Self::Annotations { run } => write!(f, "run:{run}/picks"),
            Self::AnnotationFile { run, file } => write!(f, "run:{run}/picks/{file}"),
            Self::Segmentations { run } => write!(f, "run:{run}/segmentations"),
            Self::Meshes { run } => write!(f, "run:{run}/meshes"),
            Self::VoxelSpacing { run, voxel_size } => write!(f, "run:{run}/vs:{voxel_size}"),
            Self::Tomogram {
                run,
                voxel_size,
                tomo_type,
            } => write!(f, "run:{run}/vs:{voxel_size}/tomo:{tomo_type}"),
            Self::PickableObject { name } => write!(f, "object:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, VoxelSize};

    #[test]
    fn voxel_size_quantizes_to_three_decimals() {
        let a = VoxelSize::from_angstrom(10.0).expect("10.0 is valid");
        let b = VoxelSize::parse("10.0004").expect("parse should succeed");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "10.000");
    }

    #[test]
    fn voxel_size_rejects_invalid_values() {
        assert!(VoxelSize::from_angstrom(0.0).is_none());
        assert!(VoxelSize::from_angstrom(-3.0).is_none());
        assert!(VoxelSize::from_angstrom(f64::NAN).is_none());
        assert!(VoxelSize::parse("abc").is_none());
    }

    #[test]
    fn voxel_sizes_order_numerically() {
        let mut sizes = vec![
            VoxelSize::parse("13.48").unwrap(),
            VoxelSize::parse("7.84").unwrap(),
            VoxelSize::parse("10").unwrap(),
        ];
        sizes.sort();
        let labels: Vec<String> = sizes.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["7.840", "10.000", "13.480"]);
    }

    #[test]
    fn node_display_is_path_like() {
        let vs = VoxelSize::parse("10").unwrap();
        assert_eq!(NodeId::run("RunA").to_string(), "run:RunA");
        assert_eq!(
            NodeId::tomogram("RunA", vs, "denoised").to_string(),
            "run:RunA/vs:10.000/tomo:denoised"
        );
        assert_eq!(NodeId::meshes("RunA").to_string(), "run:RunA/meshes");
        assert_eq!(NodeId::segmentations("RunA").run_name(), Some("RunA"));
        assert_eq!(NodeId::Project.run_name(), None);
        assert_eq!(NodeId::voxel_spacing("RunB", vs).run_name(), Some("RunB"));
    }
}

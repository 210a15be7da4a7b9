//! Project directory conventions.
//!
//! ```text
//! <root>/Objects/<object>.mrc
//! <root>/ExperimentRuns/<run>/VoxelSpacing<%.3f>/<tomo_type>.zarr/{.zattrs,0,1,2}
//! <root>/ExperimentRuns/<run>/Picks/<user_id>_<session_id>_<object>.json
//! <root>/ExperimentRuns/<run>/Segmentations/<%.3f>_<user_id>_<session_id>_<name>[-multilabel].zarr
//! <root>/ExperimentRuns/<run>/Meshes/<user_id>_<session_id>_<object>.glb
//! ```
//!
//! Spacing directories are matched by value, not by spelling; callers keep
//! the listed name to build child paths.

use crate::model::node::VoxelSize;
use once_cell::sync::Lazy;
use regex::Regex;

pub const OBJECTS_DIR: &str = "Objects";
pub const RUNS_DIR: &str = "ExperimentRuns";
pub const PICKS_DIR: &str = "Picks";
pub const SEGMENTATIONS_DIR: &str = "Segmentations";
pub const MESHES_DIR: &str = "Meshes";
pub const MESH_SUFFIX: &str = ".glb";
pub const MULTILABEL_SUFFIX: &str = "-multilabel";
pub const SPACING_PREFIX: &str = "VoxelSpacing";
pub const ZARR_SUFFIX: &str = ".zarr";
pub const OBJECT_MAP_SUFFIX: &str = ".mrc";

static PICKS_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<user>[^_/]+)_(?P<session>[^_/]+)_(?P<object>[^_/]+)\.json$")
        .expect("valid picks file regex")
});

static SEGMENTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<voxel>[0-9]+(?:\.[0-9]+)?)_(?P<user>[^_/]+)_(?P<session>[^_/]+)_(?P<name>[^_/]+)\.zarr$",
    )
    .expect("valid segmentation regex")
});

static MESH_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<user>[^_/]+)_(?P<session>[^_/]+)_(?P<object>[^_/]+)\.glb$")
        .expect("valid mesh file regex")
});

/// Components of an annotation file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PicksFileName {
    pub user_id: String,
    pub session_id: String,
    pub object_name: String,
}

/// Components of a segmentation group name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationName {
    pub voxel_size: VoxelSize,
    pub user_id: String,
    pub session_id: String,
    pub name: String,
    pub is_multilabel: bool,
}

pub fn runs_dir() -> String {
    RUNS_DIR.to_string()
}

pub fn run_dir(run: &str) -> String {
    format!("{RUNS_DIR}/{run}")
}

pub fn spacing_dir(run: &str, voxel_size: VoxelSize) -> String {
    format!("{RUNS_DIR}/{run}/{}", spacing_dir_name(voxel_size))
}

pub fn spacing_dir_name(voxel_size: VoxelSize) -> String {
    format!("{SPACING_PREFIX}{voxel_size}")
}

/// Path of a tomogram group inside a listed spacing directory.
pub fn tomogram_path(spacing_dir: &str, tomo_type: &str) -> String {
    join(spacing_dir, &format!("{tomo_type}{ZARR_SUFFIX}"))
}

pub fn picks_dir(run: &str) -> String {
    format!("{RUNS_DIR}/{run}/{PICKS_DIR}")
}

pub fn picks_file(run: &str, user_id: &str, session_id: &str, object_name: &str) -> String {
    format!(
        "{}/{user_id}_{session_id}_{object_name}.json",
        picks_dir(run)
    )
}

pub fn segmentations_dir(run: &str) -> String {
    format!("{RUNS_DIR}/{run}/{SEGMENTATIONS_DIR}")
}

pub fn meshes_dir(run: &str) -> String {
    format!("{RUNS_DIR}/{run}/{MESHES_DIR}")
}

/// Default reference volume path of a pickable object.
pub fn default_object_map(object_name: &str) -> String {
    format!("{OBJECTS_DIR}/{object_name}{OBJECT_MAP_SUFFIX}")
}

pub fn join(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    if base.is_empty() {
        return child.to_string();
    }
    format!("{base}/{child}")
}

/// Entries starting with `.` are storage metadata, never tree nodes.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Parses `VoxelSpacing10.000` into its spacing.
pub fn parse_spacing_dir(name: &str) -> Option<VoxelSize> {
    name.strip_prefix(SPACING_PREFIX).and_then(VoxelSize::parse)
}

/// Parses `denoised.zarr` into `denoised`.
pub fn parse_tomogram_entry(name: &str) -> Option<&str> {
    name.strip_suffix(ZARR_SUFFIX)
        .filter(|tomo_type| !tomo_type.is_empty() && !is_hidden(tomo_type))
}

/// Parses `<user>_<session>_<object>.json`.
pub fn parse_picks_file(name: &str) -> Option<PicksFileName> {
    let captures = PICKS_FILE_RE.captures(name)?;
    Some(PicksFileName {
        user_id: captures["user"].to_string(),
        session_id: captures["session"].to_string(),
        object_name: captures["object"].to_string(),
    })
}

/// Parses `<voxel>_<user>_<session>_<name>[-multilabel].zarr`.
pub fn parse_segmentation_entry(entry: &str) -> Option<SegmentationName> {
    let captures = SEGMENTATION_RE.captures(entry)?;
    let voxel_size = VoxelSize::parse(&captures["voxel"])?;
    let raw_name = &captures["name"];
    let (name, is_multilabel) = match raw_name.strip_suffix(MULTILABEL_SUFFIX) {
        Some(name) if !name.is_empty() => (name, true),
        _ => (raw_name, false),
    };
    Some(SegmentationName {
        voxel_size,
        user_id: captures["user"].to_string(),
        session_id: captures["session"].to_string(),
        name: name.to_string(),
        is_multilabel,
    })
}

/// Parses `<user>_<session>_<object>.glb`.
pub fn parse_mesh_file(name: &str) -> Option<PicksFileName> {
    let captures = MESH_FILE_RE.captures(name)?;
    Some(PicksFileName {
        user_id: captures["user"].to_string(),
        session_id: captures["session"].to_string(),
        object_name: captures["object"].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        join, parse_mesh_file, parse_picks_file, parse_segmentation_entry, parse_spacing_dir,
        parse_tomogram_entry, picks_file, spacing_dir, tomogram_path, PicksFileName,
    };
    use crate::model::node::VoxelSize;

    #[test]
    fn builds_conventional_paths() {
        let vs = VoxelSize::parse("10").expect("valid spacing");
        assert_eq!(spacing_dir("RunA", vs), "ExperimentRuns/RunA/VoxelSpacing10.000");
        assert_eq!(
            tomogram_path(&spacing_dir("RunA", vs), "denoised"),
            "ExperimentRuns/RunA/VoxelSpacing10.000/denoised.zarr"
        );
        assert_eq!(
            tomogram_path("ExperimentRuns/RunA/VoxelSpacing10.0", "wbp"),
            "ExperimentRuns/RunA/VoxelSpacing10.0/wbp.zarr"
        );
        assert_eq!(
            picks_file("RunA", "alice", "17", "ribosome"),
            "ExperimentRuns/RunA/Picks/alice_17_ribosome.json"
        );
        assert_eq!(join("a/", "/b"), "a/b");
        assert_eq!(join("", "b"), "b");
    }

    #[test]
    fn parses_directory_entries() {
        assert_eq!(
            parse_spacing_dir("VoxelSpacing7.840"),
            VoxelSize::parse("7.84")
        );
        assert_eq!(parse_spacing_dir("VoxelSpacing10.0"), VoxelSize::parse("10"));
        assert_eq!(parse_spacing_dir("Picks"), None);
        assert_eq!(parse_spacing_dir("VoxelSpacingabc"), None);
        assert_eq!(parse_tomogram_entry("wbp.zarr"), Some("wbp"));
        assert_eq!(parse_tomogram_entry(".zarr"), None);
        assert_eq!(parse_tomogram_entry("notes.txt"), None);
    }

    #[test]
    fn parses_picks_file_names() {
        assert_eq!(
            parse_picks_file("alice_17_ribosome.json"),
            Some(PicksFileName {
                user_id: "alice".to_string(),
                session_id: "17".to_string(),
                object_name: "ribosome".to_string(),
            })
        );
        assert_eq!(parse_picks_file("alice_ribosome.json"), None);
        assert_eq!(parse_picks_file("a_b_c_d.json"), None);
        assert_eq!(parse_picks_file("alice_17_ribosome.txt"), None);
    }

    #[test]
    fn parses_segmentation_entries() {
        let plain = parse_segmentation_entry("10.000_alice_17_membrane.zarr").expect("parses");
        assert_eq!(plain.voxel_size, VoxelSize::parse("10").unwrap());
        assert_eq!(plain.user_id, "alice");
        assert_eq!(plain.session_id, "17");
        assert_eq!(plain.name, "membrane");
        assert!(!plain.is_multilabel);

        let multi = parse_segmentation_entry("7.840_membrain_0_all-multilabel.zarr").expect("parses");
        assert_eq!(multi.name, "all");
        assert!(multi.is_multilabel);

        assert_eq!(parse_segmentation_entry("alice_17_membrane.zarr"), None);
        assert_eq!(parse_segmentation_entry("10.000_alice_17_membrane.json"), None);
        assert_eq!(parse_segmentation_entry("abc_alice_17_membrane.zarr"), None);
    }

    #[test]
    fn parses_mesh_file_names() {
        assert_eq!(
            parse_mesh_file("bob_3_ribosome.glb").map(|m| m.object_name),
            Some("ribosome".to_string())
        );
        assert_eq!(parse_mesh_file("bob_3_ribosome.json"), None);
        assert_eq!(parse_mesh_file("bob_ribosome.glb"), None);
    }
}

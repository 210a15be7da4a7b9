//! Lightweight references handed out by the project index.
//!
//! # Responsibility
//! - Identify runs, spacings, tomograms, annotations, segmentations, and
//!   meshes without carrying any child data.
//! - Carry the storage path of leaf nodes so resolution needs no re-listing.
//!
//! # Invariants
//! - References are plain values; holding one never pins cache state.
//! - Storage paths are project-relative and `/`-separated.

use super::node::{NodeId, VoxelSize};
use crate::storage::layout;

/// Session id recorded by automated tools instead of an interactive session.
pub const TOOL_SESSION_ID: &str = "0";

/// One run of the project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunRef {
    pub name: String,
}

impl RunRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::run(self.name.as_str())
    }
}

/// One voxel spacing under a run.
///
/// `path` is the directory as listed in storage, so spellings such as
/// `VoxelSpacing10.0` resolve to the directory that actually exists.
/// Further directories that parse to the same spacing are kept in `aliases`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpacingRef {
    pub run: String,
    pub voxel_size: VoxelSize,
    /// Project-relative path of the spacing directory.
    pub path: String,
    pub aliases: Vec<String>,
}

impl SpacingRef {
    /// Reference at the conventional `VoxelSpacing%.3f` directory.
    pub fn new(run: impl Into<String>, voxel_size: VoxelSize) -> Self {
        let run = run.into();
        let path = layout::spacing_dir(run.as_str(), voxel_size);
        Self::at(run, voxel_size, path)
    }

    /// Reference at a directory whose name was read from storage.
    pub fn at(run: impl Into<String>, voxel_size: VoxelSize, path: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            voxel_size,
            path: path.into(),
            aliases: Vec::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::voxel_spacing(self.run.as_str(), self.voxel_size)
    }

    /// Every directory holding tomograms of this spacing, primary first.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.path.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Tree label used by pickers, e.g. `VS:10.000`.
    pub fn label(&self) -> String {
        format!("VS:{}", self.voxel_size)
    }
}

/// One tomogram dataset at a voxel spacing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TomogramRef {
    pub run: String,
    pub voxel_size: VoxelSize,
    /// Displayable tomogram type, e.g. `denoised` or `wbp`.
    pub tomo_type: String,
    /// Project-relative path of the `.zarr` group.
    pub path: String,
}

impl TomogramRef {
    pub fn node_id(&self) -> NodeId {
        NodeId::tomogram(self.run.as_str(), self.voxel_size, self.tomo_type.as_str())
    }

    /// Spacing this tomogram was listed under, at its containing directory.
    pub fn spacing(&self) -> SpacingRef {
        match self.path.rsplit_once('/') {
            Some((dir, _)) => SpacingRef::at(self.run.as_str(), self.voxel_size, dir),
            None => SpacingRef::new(self.run.as_str(), self.voxel_size),
        }
    }
}

/// Who produced an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Producer {
    /// Interactive user session.
    User { user_id: String, session_id: String },
    /// Automated picking tool.
    Tool { tool_name: String },
}

/// Composite annotation key, unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationKey {
    pub user_id: String,
    pub session_id: String,
    pub object_name: String,
}

/// One annotation (pick set) file of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationRef {
    pub run: String,
    pub key: AnnotationKey,
    /// Project-relative path of the annotation file.
    pub path: String,
}

impl AnnotationRef {
    pub fn object_name(&self) -> &str {
        self.key.object_name.as_str()
    }

    pub fn from_tool(&self) -> bool {
        self.key.session_id == TOOL_SESSION_ID
    }

    pub fn producer(&self) -> Producer {
        if self.from_tool() {
            Producer::Tool {
                tool_name: self.key.user_id.clone(),
            }
        } else {
            Producer::User {
                user_id: self.key.user_id.clone(),
                session_id: self.key.session_id.clone(),
            }
        }
    }

    pub fn node_id(&self) -> NodeId {
        let file = self
            .path
            .rsplit('/')
            .next()
            .unwrap_or(self.path.as_str())
            .to_string();
        NodeId::AnnotationFile {
            run: self.run.clone(),
            file,
        }
    }
}

/// One segmentation group of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentationRef {
    pub run: String,
    pub voxel_size: VoxelSize,
    /// `object_name` holds the segmentation name.
    pub key: AnnotationKey,
    /// Label volume with one integer label per pickable object.
    pub is_multilabel: bool,
    /// Project-relative path of the `.zarr` group.
    pub path: String,
}

impl SegmentationRef {
    pub fn name(&self) -> &str {
        self.key.object_name.as_str()
    }

    pub fn from_tool(&self) -> bool {
        self.key.session_id == TOOL_SESSION_ID
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::segmentations(self.run.as_str())
    }
}

/// One mesh file of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshRef {
    pub run: String,
    pub key: AnnotationKey,
    /// Project-relative path of the `.glb` file.
    pub path: String,
}

impl MeshRef {
    pub fn object_name(&self) -> &str {
        self.key.object_name.as_str()
    }

    pub fn from_tool(&self) -> bool {
        self.key.session_id == TOOL_SESSION_ID
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::meshes(self.run.as_str())
    }
}

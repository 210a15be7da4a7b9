//! Lazy hierarchical index over copick cryo-ET projects.
//!
//! Opening a project reads only its root configuration. Runs, voxel
//! spacings, tomograms, and the per-run pick, segmentation, and mesh files
//! are listed one level at a time on first access and cached per node until
//! invalidated. User picks can be written back.

pub mod config;
pub mod index;
pub mod logging;
pub mod model;
pub mod storage;
pub mod volume;

pub use config::{
    sanitize_name, validate_name, ConfigurationError, NameValidationError, PickableObject,
    RootConfig, StorageLocation,
};
pub use index::{
    CancellationToken, IndexSummary, NodeStatus, ProjectHandle, ProjectIndex, Resolution,
    StorageError, StorageErrorKind, StorageResult, DEFAULT_SESSION_ID, DEFAULT_USER_ID,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{NodeId, VoxelSize};
pub use model::picks::{Location, PickPoint, Picks};
pub use model::refs::{
    AnnotationKey, AnnotationRef, MeshRef, Producer, RunRef, SegmentationRef, SpacingRef,
    TomogramRef, TOOL_SESSION_ID,
};
pub use storage::{LocalStorage, MemoryStorage, ProjectStorage};
pub use volume::{MrcHeader, ObjectVolume, PyramidLevel, VolumeHandle};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

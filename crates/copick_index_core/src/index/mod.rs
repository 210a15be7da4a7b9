//! Lazy, cached project index.
//!
//! # Responsibility
//! - Open a project from a validated root configuration.
//! - Materialize runs, voxel spacings, tomograms, and the per-run listings
//!   (picks, segmentations, meshes) one level at a time, only when a caller
//!   asks for them.
//! - Cache every resolved level per node until explicitly invalidated.
//!
//! # Invariants
//! - `open` never enumerates runs.
//! - Listing a parent never populates its children.
//! - Each node is queried at most once between invalidations.
//! - A failed node keeps its error marker; siblings are unaffected.
//!
//! # See also
//! - `index::cache` for the per-node state machine.

pub mod cache;
pub mod cancel;
pub mod error;
mod annotate;
mod resolve;
mod status;
mod tree;

pub use cache::NodeStatus;
pub use annotate::{DEFAULT_SESSION_ID, DEFAULT_USER_ID};
pub use cancel::{CancellationToken, Resolution};
pub use error::{StorageError, StorageErrorKind, StorageResult};
pub use resolve::PREFERRED_TOMO_TYPES;
pub use status::IndexSummary;

use crate::config::{
    ConfigurationError, PickableObject, RootConfig, StorageLocation, CONFIG_TYPE_FILESYSTEM,
};
use crate::model::node::{NodeId, VoxelSize};
use crate::model::refs::{
    AnnotationKey, AnnotationRef, MeshRef, RunRef, SegmentationRef, SpacingRef, TomogramRef,
};
use crate::storage::layout;
use crate::storage::{LocalStorage, ProjectStorage};
use log::{debug, error, info, warn};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tree::{
    AnnotationList, Children, MeshList, ObjectVolumeCache, RunList, RunNode, SegmentationList,
    SpacingList, SpacingNode, TomogramList, TomogramNode,
};
use uuid::Uuid;

use self::cache::NodeCache;

/// Caller-owned handle of one open project.
pub type ProjectHandle = ProjectIndex;

/// Lazily materialized view of one project.
///
/// `Send + Sync`: a background worker may resolve nodes while a foreground
/// caller reads nodes that are already cached.
pub struct ProjectIndex {
    instance_id: Uuid,
    config: RootConfig,
    storage: Arc<dyn ProjectStorage>,
    runs: NodeCache<RunList>,
    run_nodes: Children<String, RunNode>,
    object_volumes: Children<String, ObjectVolumeCache>,
}

impl ProjectIndex {
    /// Validates `config` and connects to its storage location.
    ///
    /// # Errors
    /// - `ConfigurationError` when the configuration is invalid, names an
    ///   unsupported driver/scheme, or the root is unreachable.
    pub fn open(config: RootConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if config.config_type != CONFIG_TYPE_FILESYSTEM {
            return Err(ConfigurationError::UnsupportedConfigType(
                config.config_type.clone(),
            ));
        }
        let storage: Arc<dyn ProjectStorage> = match config.location()? {
            StorageLocation::Local(path) => Arc::new(LocalStorage::new(path)),
            StorageLocation::Remote { scheme, .. } => {
                return Err(ConfigurationError::UnsupportedScheme(scheme))
            }
        };
        Self::connect(config, storage)
    }

    /// Reads the configuration document at `path`, then opens it.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        Self::open(RootConfig::load(path)?)
    }

    /// Opens a project on a caller-supplied backend (object stores, fixtures).
    pub fn open_with_storage(
        config: RootConfig,
        storage: Arc<dyn ProjectStorage>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Self::connect(config, storage)
    }

    fn connect(
        config: RootConfig,
        storage: Arc<dyn ProjectStorage>,
    ) -> Result<Self, ConfigurationError> {
        let started_at = Instant::now();
        let instance_id = Uuid::new_v4();
        if let Err(source) = storage.probe() {
            error!(
                "event=project_open module=index status=error project_id={} duration_ms={} error_code=storage_unreachable",
                instance_id,
                started_at.elapsed().as_millis()
            );
            return Err(ConfigurationError::Unreachable {
                location: storage.describe(),
                source,
            });
        }

        info!(
            "event=project_open module=index status=ok project_id={} location={} objects={} duration_ms={}",
            instance_id,
            storage.describe(),
            config.pickable_objects.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            instance_id,
            config,
            storage,
            runs: NodeCache::new(),
            run_nodes: Children::default(),
            object_volumes: Children::default(),
        })
    }

    /// Stable id of this handle, used to correlate log events.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn config(&self) -> &RootConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        self.config.name.as_str()
    }

    pub fn storage(&self) -> Arc<dyn ProjectStorage> {
        Arc::clone(&self.storage)
    }

    pub fn pickable_objects(&self) -> &[PickableObject] {
        &self.config.pickable_objects
    }

    pub fn pickable_object(&self, name: &str) -> Option<&PickableObject> {
        self.config.pickable_object(name)
    }

    /// Lists the project's runs. One storage query per project until invalidated.
    pub fn list_runs(&self) -> StorageResult<Vec<RunRef>> {
        settle(
            self.list_runs_cancellable(&CancellationToken::new()),
            || NodeId::Project,
        )
    }

    pub fn list_runs_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> StorageResult<Resolution<Vec<RunRef>>> {
        let outcome = self.runs.get_or_load(cancel, || self.load_runs())?;
        Ok(outcome.map(|runs| runs.as_ref().clone()))
    }

    /// Lists voxel spacings of one run, independently of every other run.
    pub fn list_voxel_spacings(&self, run: &RunRef) -> StorageResult<Vec<SpacingRef>> {
        settle(
            self.list_voxel_spacings_cancellable(run, &CancellationToken::new()),
            || run.node_id(),
        )
    }

    pub fn list_voxel_spacings_cancellable(
        &self,
        run: &RunRef,
        cancel: &CancellationToken,
    ) -> StorageResult<Resolution<Vec<SpacingRef>>> {
        let node = self.run_node(run.name.as_str());
        let outcome = node
            .spacings
            .get_or_load(cancel, || self.load_spacings(run.name.as_str()))?;
        Ok(outcome.map(|spacings| spacings.as_ref().clone()))
    }

    /// Lists tomograms stored at one voxel spacing.
    pub fn list_tomograms(&self, spacing: &SpacingRef) -> StorageResult<Vec<TomogramRef>> {
        settle(
            self.list_tomograms_cancellable(spacing, &CancellationToken::new()),
            || spacing.node_id(),
        )
    }

    pub fn list_tomograms_cancellable(
        &self,
        spacing: &SpacingRef,
        cancel: &CancellationToken,
    ) -> StorageResult<Resolution<Vec<TomogramRef>>> {
        let node = self.spacing_node(spacing);
        let outcome = node
            .tomograms
            .get_or_load(cancel, || self.load_tomograms(spacing))?;
        Ok(outcome.map(|tomograms| tomograms.as_ref().clone()))
    }

    /// Lists annotation files of one run without reading their content.
    pub fn list_annotations(&self, run: &RunRef) -> StorageResult<Vec<AnnotationRef>> {
        settle(
            self.list_annotations_cancellable(run, &CancellationToken::new()),
            || NodeId::annotations(run.name.as_str()),
        )
    }

    pub fn list_annotations_cancellable(
        &self,
        run: &RunRef,
        cancel: &CancellationToken,
    ) -> StorageResult<Resolution<Vec<AnnotationRef>>> {
        let node = self.run_node(run.name.as_str());
        let outcome = node
            .annotations
            .get_or_load(cancel, || self.load_annotations(run.name.as_str()))?;
        Ok(outcome.map(|annotations| annotations.as_ref().clone()))
    }

    /// Lists segmentation groups of one run without opening them.
    pub fn list_segmentations(&self, run: &RunRef) -> StorageResult<Vec<SegmentationRef>> {
        settle(
            self.list_segmentations_cancellable(run, &CancellationToken::new()),
            || NodeId::segmentations(run.name.as_str()),
        )
    }

    pub fn list_segmentations_cancellable(
        &self,
        run: &RunRef,
        cancel: &CancellationToken,
    ) -> StorageResult<Resolution<Vec<SegmentationRef>>> {
        let node = self.run_node(run.name.as_str());
        let outcome = node
            .segmentations
            .get_or_load(cancel, || self.load_segmentations(run.name.as_str()))?;
        Ok(outcome.map(|segmentations| segmentations.as_ref().clone()))
    }

    /// Lists mesh files of one run without reading them.
    pub fn list_meshes(&self, run: &RunRef) -> StorageResult<Vec<MeshRef>> {
        settle(
            self.list_meshes_cancellable(run, &CancellationToken::new()),
            || NodeId::meshes(run.name.as_str()),
        )
    }

    pub fn list_meshes_cancellable(
        &self,
        run: &RunRef,
        cancel: &CancellationToken,
    ) -> StorageResult<Resolution<Vec<MeshRef>>> {
        let node = self.run_node(run.name.as_str());
        let outcome = node
            .meshes
            .get_or_load(cancel, || self.load_meshes(run.name.as_str()))?;
        Ok(outcome.map(|meshes| meshes.as_ref().clone()))
    }

    /// Drops cached children of `node` and everything below it.
    ///
    /// Sibling caches are untouched. Loads already in flight for the dropped
    /// nodes finish for their own caller but are not cached.
    pub fn invalidate(&self, node: &NodeId) {
        match node {
            NodeId::Project => {
                self.runs.invalidate();
                self.run_nodes.clear();
                self.object_volumes.clear();
            }
            NodeId::Run { run } => {
                self.run_nodes.remove(run);
            }
            NodeId::Annotations { run } | NodeId::AnnotationFile { run, .. } => {
                if let Some(run_node) = self.run_nodes.get(run) {
                    run_node.annotations.invalidate();
                }
            }
            NodeId::Segmentations { run } => {
                if let Some(run_node) = self.run_nodes.get(run) {
                    run_node.segmentations.invalidate();
                }
            }
            NodeId::Meshes { run } => {
                if let Some(run_node) = self.run_nodes.get(run) {
                    run_node.meshes.invalidate();
                }
            }
            NodeId::VoxelSpacing { run, voxel_size } => {
                if let Some(run_node) = self.run_nodes.get(run) {
                    run_node.spacing_nodes.remove(voxel_size);
                }
            }
            NodeId::Tomogram {
                run,
                voxel_size,
                tomo_type,
            } => {
                if let Some(spacing_node) = self
                    .run_nodes
                    .get(run)
                    .and_then(|run_node| run_node.spacing_nodes.get(voxel_size))
                {
                    spacing_node.tomogram_nodes.remove(tomo_type);
                }
            }
            NodeId::PickableObject { name } => {
                self.object_volumes.remove(name);
            }
        }
        info!(
            "event=invalidate module=index status=ok project_id={} node={}",
            self.instance_id, node
        );
    }

    fn run_node(&self, run: &str) -> Arc<RunNode> {
        self.run_nodes.get_or_create(&run.to_string())
    }

    fn spacing_node(&self, spacing: &SpacingRef) -> Arc<SpacingNode> {
        self.run_node(spacing.run.as_str())
            .spacing_nodes
            .get_or_create(&spacing.voxel_size)
    }

    fn tomogram_node(&self, tomogram: &TomogramRef) -> Arc<TomogramNode> {
        self.spacing_node(&tomogram.spacing())
            .tomogram_nodes
            .get_or_create(&tomogram.tomo_type)
    }

    fn load_runs(&self) -> StorageResult<RunList> {
        let started_at = Instant::now();
        let names = match self.storage.list_dir(layout::runs_dir().as_str()) {
            Ok(names) => names,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                return Err(self.storage_failure("list_runs", NodeId::Project, started_at, &err))
            }
        };

        // Listings carry no file/directory flag. A stray file here becomes a
        // run whose own listing fails, tagged with that run only.
        let runs: Vec<RunRef> = names
            .into_iter()
            .filter(|name| !layout::is_hidden(name))
            .map(RunRef::new)
            .collect();
        debug!(
            "event=list_runs module=index status=ok project_id={} count={} duration_ms={}",
            self.instance_id,
            runs.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(runs))
    }

    fn load_spacings(&self, run: &str) -> StorageResult<SpacingList> {
        let started_at = Instant::now();
        let run_dir = layout::run_dir(run);
        let names = self.storage.list_dir(run_dir.as_str()).map_err(|err| {
            self.storage_failure("list_voxel_spacings", NodeId::run(run), started_at, &err)
        })?;

        let mut found: Vec<(VoxelSize, &String)> = names
            .iter()
            .filter_map(|name| layout::parse_spacing_dir(name).map(|size| (size, name)))
            .collect();
        // Stable: among equal values the first listed spelling is primary.
        found.sort_by_key(|(size, _)| *size);
        let mut spacings: Vec<SpacingRef> = Vec::with_capacity(found.len());
        for (voxel_size, name) in found {
            let path = layout::join(run_dir.as_str(), name);
            match spacings.last_mut() {
                Some(last) if last.voxel_size == voxel_size => last.aliases.push(path),
                _ => spacings.push(SpacingRef::at(run, voxel_size, path)),
            }
        }
        debug!(
            "event=list_voxel_spacings module=index status=ok project_id={} run={} count={} duration_ms={}",
            self.instance_id,
            run,
            spacings.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(spacings))
    }

    fn load_tomograms(&self, spacing: &SpacingRef) -> StorageResult<TomogramList> {
        let started_at = Instant::now();
        let mut tomograms: Vec<TomogramRef> = Vec::new();
        for dir in spacing.directories() {
            let names = self.storage.list_dir(dir).map_err(|err| {
                self.storage_failure("list_tomograms", spacing.node_id(), started_at, &err)
            })?;
            for tomo_type in names.iter().filter_map(|name| layout::parse_tomogram_entry(name)) {
                if tomograms.iter().any(|known| known.tomo_type == tomo_type) {
                    warn!(
                        "event=list_tomograms module=index status=duplicate project_id={} node={} tomo_type={} dir={}",
                        self.instance_id,
                        spacing.node_id(),
                        tomo_type,
                        dir
                    );
                    continue;
                }
                tomograms.push(TomogramRef {
                    run: spacing.run.clone(),
                    voxel_size: spacing.voxel_size,
                    tomo_type: tomo_type.to_string(),
                    path: layout::tomogram_path(dir, tomo_type),
                });
            }
        }
        tomograms.sort_by(|a, b| a.tomo_type.cmp(&b.tomo_type));
        debug!(
            "event=list_tomograms module=index status=ok project_id={} node={} dirs={} count={} duration_ms={}",
            self.instance_id,
            spacing.node_id(),
            spacing.aliases.len() + 1,
            tomograms.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(tomograms))
    }

    fn load_annotations(&self, run: &str) -> StorageResult<AnnotationList> {
        let started_at = Instant::now();
        let dir = layout::picks_dir(run);
        let names = self.list_optional_dir(
            "list_annotations",
            dir.as_str(),
            NodeId::annotations(run),
            started_at,
        )?;

        let mut annotations = Vec::with_capacity(names.len());
        let mut skipped = 0usize;
        for name in &names {
            match layout::parse_picks_file(name) {
                Some(parsed) => annotations.push(AnnotationRef {
                    run: run.to_string(),
                    path: layout::join(dir.as_str(), name),
                    key: AnnotationKey {
                        user_id: parsed.user_id,
                        session_id: parsed.session_id,
                        object_name: parsed.object_name,
                    },
                }),
                None => skipped += 1,
            }
        }
        annotations.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(
            "event=list_annotations module=index status=ok project_id={} run={} count={} skipped={} duration_ms={}",
            self.instance_id,
            run,
            annotations.len(),
            skipped,
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(annotations))
    }

    fn load_segmentations(&self, run: &str) -> StorageResult<SegmentationList> {
        let started_at = Instant::now();
        let dir = layout::segmentations_dir(run);
        let names = self.list_optional_dir(
            "list_segmentations",
            dir.as_str(),
            NodeId::segmentations(run),
            started_at,
        )?;

        let mut segmentations: Vec<SegmentationRef> = names
            .iter()
            .filter_map(|name| {
                let parsed = layout::parse_segmentation_entry(name)?;
                Some(SegmentationRef {
                    run: run.to_string(),
                    voxel_size: parsed.voxel_size,
                    key: AnnotationKey {
                        user_id: parsed.user_id,
                        session_id: parsed.session_id,
                        object_name: parsed.name,
                    },
                    is_multilabel: parsed.is_multilabel,
                    path: layout::join(dir.as_str(), name),
                })
            })
            .collect();
        segmentations.sort_by(|a, b| {
            (a.voxel_size, &a.key, a.is_multilabel).cmp(&(b.voxel_size, &b.key, b.is_multilabel))
        });
        debug!(
            "event=list_segmentations module=index status=ok project_id={} run={} count={} skipped={} duration_ms={}",
            self.instance_id,
            run,
            segmentations.len(),
            names.len() - segmentations.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(segmentations))
    }

    fn load_meshes(&self, run: &str) -> StorageResult<MeshList> {
        let started_at = Instant::now();
        let dir = layout::meshes_dir(run);
        let names =
            self.list_optional_dir("list_meshes", dir.as_str(), NodeId::meshes(run), started_at)?;

        let mut meshes: Vec<MeshRef> = names
            .iter()
            .filter_map(|name| {
                let parsed = layout::parse_mesh_file(name)?;
                Some(MeshRef {
                    run: run.to_string(),
                    key: AnnotationKey {
                        user_id: parsed.user_id,
                        session_id: parsed.session_id,
                        object_name: parsed.object_name,
                    },
                    path: layout::join(dir.as_str(), name),
                })
            })
            .collect();
        meshes.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(
            "event=list_meshes module=index status=ok project_id={} run={} count={} skipped={} duration_ms={}",
            self.instance_id,
            run,
            meshes.len(),
            names.len() - meshes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(meshes))
    }

    /// Lists a per-run directory that may legitimately be absent.
    fn list_optional_dir(
        &self,
        event: &str,
        dir: &str,
        node: NodeId,
        started_at: Instant,
    ) -> StorageResult<Vec<String>> {
        match self.storage.list_dir(dir) {
            Ok(names) => Ok(names),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.storage_failure(event, node, started_at, &err)),
        }
    }

    fn storage_failure(
        &self,
        event: &str,
        node: NodeId,
        started_at: Instant,
        err: &io::Error,
    ) -> StorageError {
        let failure = StorageError::from_io(node, err);
        warn!(
            "event={} module=index status=error project_id={} node={} error_code={} duration_ms={}",
            event,
            self.instance_id,
            failure.node,
            failure.kind,
            started_at.elapsed().as_millis()
        );
        failure
    }
}

/// Collapses a cancellable outcome for callers that never cancel.
fn settle<T>(
    outcome: StorageResult<Resolution<T>>,
    node: impl FnOnce() -> NodeId,
) -> StorageResult<T> {
    match outcome? {
        Resolution::Ready(value) => Ok(value),
        Resolution::Cancelled => Err(StorageError::new(
            node(),
            StorageErrorKind::Interrupted,
            "load abandoned",
        )),
    }
}

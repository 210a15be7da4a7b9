//! Leaf resolution: tomogram pyramid levels, reference volumes, pick files.

use super::cancel::{CancellationToken, Resolution};
use super::error::{StorageError, StorageErrorKind, StorageResult};
use super::{settle, ProjectIndex};
use crate::config::PickableObject;
use crate::model::node::NodeId;
use crate::model::picks::Picks;
use crate::model::refs::{AnnotationRef, RunRef, TomogramRef};
use crate::storage::layout;
use crate::volume::mrc::MRC_HEADER_LEN;
use crate::volume::{MrcHeader, ObjectVolume, PyramidLevel, VolumeHandle, ZarrDataset};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Instant;

/// Tomogram types preferred for previews, most preferred first.
pub const PREFERRED_TOMO_TYPES: &[&str] = &["denoised", "wbp", "ribo", "defocus"];

impl ProjectIndex {
    /// Resolves one pyramid level of a tomogram.
    ///
    /// The dataset is opened once per tomogram; every level is read at most
    /// once and then served from cache.
    pub fn resolve_tomogram(
        &self,
        tomogram: &TomogramRef,
        level: PyramidLevel,
    ) -> StorageResult<Arc<VolumeHandle>> {
        settle(
            self.resolve_tomogram_cancellable(tomogram, level, &CancellationToken::new()),
            || tomogram.node_id(),
        )
    }

    pub fn resolve_tomogram_cancellable(
        &self,
        tomogram: &TomogramRef,
        level: PyramidLevel,
        cancel: &CancellationToken,
    ) -> StorageResult<Resolution<Arc<VolumeHandle>>> {
        let node = self.tomogram_node(tomogram);
        node.level(level).get_or_load(cancel, || {
            let dataset = match node
                .dataset
                .get_or_load(cancel, || self.open_dataset(tomogram))?
            {
                Resolution::Ready(dataset) => dataset,
                // The outer entry sees the same token and discards this.
                Resolution::Cancelled => {
                    return Err(StorageError::new(
                        tomogram.node_id(),
                        StorageErrorKind::Interrupted,
                        "dataset open abandoned",
                    ))
                }
            };
            self.open_level(&dataset, tomogram, level)
        })
    }

    fn open_dataset(&self, tomogram: &TomogramRef) -> StorageResult<Arc<ZarrDataset>> {
        let started_at = Instant::now();
        let dataset = ZarrDataset::open(self.storage.as_ref(), tomogram.path.as_str())
            .map_err(|err| {
                self.storage_failure("open_dataset", tomogram.node_id(), started_at, &err)
            })?;
        debug!(
            "event=open_dataset module=index status=ok project_id={} node={} levels={} duration_ms={}",
            self.instance_id,
            tomogram.node_id(),
            dataset.levels().len(),
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(dataset))
    }

    fn open_level(
        &self,
        dataset: &ZarrDataset,
        tomogram: &TomogramRef,
        level: PyramidLevel,
    ) -> StorageResult<Arc<VolumeHandle>> {
        let started_at = Instant::now();
        let handle = dataset
            .open_level(self.storage(), tomogram, level)
            .map_err(|err| {
                self.storage_failure("resolve_tomogram", tomogram.node_id(), started_at, &err)
            })?;
        debug!(
            "event=resolve_tomogram module=index status=ok project_id={} node={} level={} shape={:?} duration_ms={}",
            self.instance_id,
            tomogram.node_id(),
            level,
            handle.shape(),
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(handle))
    }

    /// Resolves the reference density map of one pickable object.
    ///
    /// Failures are tagged with the object name and cached per object.
    pub fn resolve_object_volume(&self, name: &str) -> StorageResult<Arc<ObjectVolume>> {
        settle(
            self.resolve_object_volume_cancellable(name, &CancellationToken::new()),
            || NodeId::pickable_object(name),
        )
    }

    pub fn resolve_object_volume_cancellable(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Resolution<Arc<ObjectVolume>>> {
        let object = self.pickable_object(name).ok_or_else(|| {
            StorageError::not_found(
                NodeId::pickable_object(name),
                format!("no pickable object named `{name}`"),
            )
        })?;
        self.object_volumes
            .get_or_create(&object.name)
            .get_or_load(cancel, || self.load_object_volume(object))
    }

    fn load_object_volume(&self, object: &PickableObject) -> StorageResult<Arc<ObjectVolume>> {
        let started_at = Instant::now();
        let node = NodeId::pickable_object(object.name.as_str());
        let path = object
            .map_path
            .clone()
            .unwrap_or_else(|| layout::default_object_map(object.name.as_str()));

        let bytes = self
            .storage
            .read_range(path.as_str(), 0, MRC_HEADER_LEN)
            .map_err(|err| self.storage_failure("resolve_object_volume", node.clone(), started_at, &err))?;
        let header = MrcHeader::parse(&bytes)
            .map_err(|err| self.storage_failure("resolve_object_volume", node, started_at, &err))?;

        debug!(
            "event=resolve_object_volume module=index status=ok project_id={} object={} dims={:?} duration_ms={}",
            self.instance_id,
            object.name,
            header.dims,
            started_at.elapsed().as_millis()
        );
        Ok(Arc::new(ObjectVolume {
            object_name: object.name.clone(),
            path,
            header,
        }))
    }

    /// Reads the points of one annotation file.
    ///
    /// Not cached: annotation files are rewritten by their authors.
    pub fn load_picks(&self, annotation: &AnnotationRef) -> StorageResult<Picks> {
        let started_at = Instant::now();
        let node = annotation.node_id();
        let bytes = self
            .storage
            .read(annotation.path.as_str())
            .map_err(|err| self.storage_failure("load_picks", node.clone(), started_at, &err))?;
        let picks: Picks = serde_json::from_slice(&bytes).map_err(|err| {
            warn!(
                "event=load_picks module=index status=error project_id={} node={} error_code=invalid_data",
                self.instance_id, node
            );
            StorageError::invalid_data(node.clone(), err.to_string())
        })?;

        if picks.pickable_object_name != annotation.key.object_name {
            warn!(
                "event=load_picks module=index status=mismatch project_id={} node={} object={}",
                self.instance_id, node, picks.pickable_object_name
            );
        }
        debug!(
            "event=load_picks module=index status=ok project_id={} node={} points={} duration_ms={}",
            self.instance_id,
            node,
            picks.len(),
            started_at.elapsed().as_millis()
        );
        Ok(picks)
    }

    /// Chooses the tomogram to preview for one run.
    ///
    /// Highest voxel spacing first; within a spacing, the first type in
    /// `PREFERRED_TOMO_TYPES` (substring, case-insensitive), else the first
    /// tomogram listed. Spacings whose listing fails are skipped.
    pub fn best_tomogram(&self, run: &RunRef) -> StorageResult<Option<TomogramRef>> {
        let mut spacings = self.list_voxel_spacings(run)?;
        spacings.sort_by(|a, b| b.voxel_size.cmp(&a.voxel_size));

        for spacing in &spacings {
            let tomograms = match self.list_tomograms(spacing) {
                Ok(tomograms) => tomograms,
                Err(err) => {
                    warn!(
                        "event=best_tomogram module=index status=skip project_id={} node={} error_code={}",
                        self.instance_id, err.node, err.kind
                    );
                    continue;
                }
            };
            if let Some(choice) = preferred_tomogram(&tomograms) {
                return Ok(Some(choice.clone()));
            }
        }
        Ok(None)
    }
}

fn preferred_tomogram(tomograms: &[TomogramRef]) -> Option<&TomogramRef> {
    PREFERRED_TOMO_TYPES
        .iter()
        .find_map(|preferred| {
            tomograms
                .iter()
                .find(|tomogram| tomogram.tomo_type.to_ascii_lowercase().contains(preferred))
        })
        .or_else(|| tomograms.first())
}

//! In-memory tree nodes backing the index.
//!
//! Child node maps only ever grow on access; invalidation removes a whole
//! subtree by dropping its entry, so in-flight loads on the removed node
//! cannot touch the replacement.

use super::cache::NodeCache;
use crate::model::node::VoxelSize;
use crate::model::refs::{
    AnnotationRef, MeshRef, RunRef, SegmentationRef, SpacingRef, TomogramRef,
};
use crate::volume::{ObjectVolume, PyramidLevel, VolumeHandle, ZarrDataset};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

pub(crate) type RunList = Arc<Vec<RunRef>>;
pub(crate) type SpacingList = Arc<Vec<SpacingRef>>;
pub(crate) type TomogramList = Arc<Vec<TomogramRef>>;
pub(crate) type AnnotationList = Arc<Vec<AnnotationRef>>;
pub(crate) type SegmentationList = Arc<Vec<SegmentationRef>>;
pub(crate) type MeshList = Arc<Vec<MeshRef>>;

/// Map of lazily created child nodes.
pub(crate) struct Children<K, N> {
    nodes: RwLock<HashMap<K, Arc<N>>>,
}

impl<K, N> Default for Children<K, N> {
    fn default() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, N: Default> Children<K, N> {
    /// Returns the child for `key`, creating an empty one if needed.
    pub(crate) fn get_or_create(&self, key: &K) -> Arc<N> {
        if let Some(node) = self.nodes.read().get(key) {
            return Arc::clone(node);
        }
        Arc::clone(self.nodes.write().entry(key.clone()).or_default())
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<N>> {
        self.nodes.read().get(key).cloned()
    }

    pub(crate) fn remove(&self, key: &K) -> bool {
        self.nodes.write().remove(key).is_some()
    }

    pub(crate) fn clear(&self) {
        self.nodes.write().clear();
    }

    /// Snapshot of current children; never triggers loads.
    pub(crate) fn snapshot(&self) -> Vec<Arc<N>> {
        self.nodes.read().values().cloned().collect()
    }

    /// Like `snapshot`, keeping each child's key.
    pub(crate) fn entries(&self) -> Vec<(K, Arc<N>)> {
        self.nodes
            .read()
            .iter()
            .map(|(key, node)| (key.clone(), Arc::clone(node)))
            .collect()
    }
}

#[derive(Default)]
pub(crate) struct RunNode {
    pub(crate) spacings: NodeCache<SpacingList>,
    pub(crate) annotations: NodeCache<AnnotationList>,
    pub(crate) segmentations: NodeCache<SegmentationList>,
    pub(crate) meshes: NodeCache<MeshList>,
    pub(crate) spacing_nodes: Children<VoxelSize, SpacingNode>,
}

#[derive(Default)]
pub(crate) struct SpacingNode {
    pub(crate) tomograms: NodeCache<TomogramList>,
    pub(crate) tomogram_nodes: Children<String, TomogramNode>,
}

#[derive(Default)]
pub(crate) struct TomogramNode {
    pub(crate) dataset: NodeCache<Arc<ZarrDataset>>,
    levels: [NodeCache<Arc<VolumeHandle>>; 3],
}

impl TomogramNode {
    pub(crate) fn level(&self, level: PyramidLevel) -> &NodeCache<Arc<VolumeHandle>> {
        &self.levels[level.index()]
    }

    pub(crate) fn levels(&self) -> impl Iterator<Item = &NodeCache<Arc<VolumeHandle>>> {
        self.levels.iter()
    }
}

pub(crate) type ObjectVolumeCache = NodeCache<Arc<ObjectVolume>>;

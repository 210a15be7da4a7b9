//! Cache inspection without storage access.

use super::cache::NodeStatus;
use super::error::StorageError;
use super::ProjectIndex;
use crate::model::node::NodeId;
use std::collections::HashSet;

/// Snapshot of how much of the tree is materialized.
///
/// Suited for "N of M runs loaded, 1 failed" displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    /// Status of the run listing itself.
    pub runs: NodeStatus,
    /// Listed runs whose voxel spacings are cached.
    ///
    /// Runs reached by reference but absent from the cached run listing are
    /// not counted, so this never exceeds `runs_total()`.
    pub runs_loaded: usize,
    /// Every failure marker currently cached, ordered by node.
    pub failures: Vec<StorageError>,
}

impl IndexSummary {
    /// Total number of runs, once the run listing is resolved.
    pub fn runs_total(&self) -> Option<usize> {
        match self.runs {
            NodeStatus::Resolved { children } => Some(children),
            _ => None,
        }
    }
}

impl ProjectIndex {
    /// Reports the cache status of one node. Never queries storage.
    ///
    /// For list nodes `children` counts cached entries; for a tomogram it
    /// counts resolved pyramid levels.
    pub fn node_status(&self, node: &NodeId) -> NodeStatus {
        match node {
            NodeId::Project => self.runs.status(),
            NodeId::Run { run } => self
                .run_nodes
                .get(run)
                .map_or(NodeStatus::Unresolved, |run_node| run_node.spacings.status()),
            NodeId::Annotations { run } | NodeId::AnnotationFile { run, .. } => self
                .run_nodes
                .get(run)
                .map_or(NodeStatus::Unresolved, |run_node| {
                    run_node.annotations.status()
                }),
            NodeId::Segmentations { run } => self
                .run_nodes
                .get(run)
                .map_or(NodeStatus::Unresolved, |run_node| {
                    run_node.segmentations.status()
                }),
            NodeId::Meshes { run } => self
                .run_nodes
                .get(run)
                .map_or(NodeStatus::Unresolved, |run_node| run_node.meshes.status()),
            NodeId::VoxelSpacing { run, voxel_size } => self
                .run_nodes
                .get(run)
                .and_then(|run_node| run_node.spacing_nodes.get(voxel_size))
                .map_or(NodeStatus::Unresolved, |spacing_node| {
                    spacing_node.tomograms.status()
                }),
            NodeId::Tomogram {
                run,
                voxel_size,
                tomo_type,
            } => {
                let Some(tomogram_node) = self
                    .run_nodes
                    .get(run)
                    .and_then(|run_node| run_node.spacing_nodes.get(voxel_size))
                    .and_then(|spacing_node| spacing_node.tomogram_nodes.get(tomo_type))
                else {
                    return NodeStatus::Unresolved;
                };
                match tomogram_node.dataset.status_with(|_| 1) {
                    NodeStatus::Resolved { .. } => NodeStatus::Resolved {
                        children: tomogram_node
                            .levels()
                            .filter(|level| matches!(level.cached(), Some(Ok(_))))
                            .count(),
                    },
                    other => other,
                }
            }
            NodeId::PickableObject { name } => self
                .object_volumes
                .get(name)
                .map_or(NodeStatus::Unresolved, |cache| cache.status_with(|_| 1)),
        }
    }

    /// Summarizes cached state across the whole tree. Never queries storage.
    pub fn summary(&self) -> IndexSummary {
        let mut failures = Vec::new();
        let mut runs_loaded = 0usize;

        let runs = self.runs.status();
        if let NodeStatus::Failed(err) = &runs {
            failures.push(err.clone());
        }

        let listed: Option<HashSet<String>> = match self.runs.cached() {
            Some(Ok(list)) => Some(list.iter().map(|run| run.name.clone()).collect()),
            _ => None,
        };

        for (name, run_node) in self.run_nodes.entries() {
            match run_node.spacings.status() {
                NodeStatus::Resolved { .. }
                    if listed.as_ref().map_or(true, |names| names.contains(&name)) =>
                {
                    runs_loaded += 1
                }
                NodeStatus::Failed(err) => failures.push(err),
                _ => {}
            }
            for listing in [
                run_node.annotations.status(),
                run_node.segmentations.status(),
                run_node.meshes.status(),
            ] {
                if let NodeStatus::Failed(err) = listing {
                    failures.push(err);
                }
            }
            for spacing_node in run_node.spacing_nodes.snapshot() {
                if let NodeStatus::Failed(err) = spacing_node.tomograms.status() {
                    failures.push(err);
                }
                for tomogram_node in spacing_node.tomogram_nodes.snapshot() {
                    if let Some(Err(err)) = tomogram_node.dataset.cached() {
                        failures.push(err);
                    }
                    for level in tomogram_node.levels() {
                        if let Some(Err(err)) = level.cached() {
                            failures.push(err);
                        }
                    }
                }
            }
        }
        for cache in self.object_volumes.snapshot() {
            if let Some(Err(err)) = cache.cached() {
                failures.push(err);
            }
        }

        failures.sort_by_key(|err| err.node.to_string());
        failures.dedup();
        IndexSummary {
            runs,
            runs_loaded,
            failures,
        }
    }
}

//! Writing user picks back to the project.
//!
//! # Responsibility
//! - Store a user's pick set under its `<user>_<session>_<object>.json` name.
//! - Copy picks from another annotation into the configured user's set.
//!
//! # Invariants
//! - Tool output (session `"0"`) is never written.
//! - Every write drops the run's cached annotation listing; nothing else.

use super::error::{StorageError, StorageErrorKind, StorageResult};
use super::ProjectIndex;
use crate::config::validate_name;
use crate::model::picks::Picks;
use crate::model::refs::{AnnotationKey, AnnotationRef, RunRef};
use crate::storage::layout;
use log::info;
use std::time::Instant;

/// User id for taken picks when the configuration names none.
pub const DEFAULT_USER_ID: &str = "ArtiaX";
/// Session id for a new pick set when the configuration names none.
pub const DEFAULT_SESSION_ID: &str = "19";

impl ProjectIndex {
    /// Writes `picks` as the annotation file of its user, session, and object.
    ///
    /// # Errors
    /// - `InvalidData` when one of the three ids is not a valid name.
    /// - `PermissionDenied` for tool output.
    /// - The mapped storage failure when the write fails.
    pub fn store_picks(&self, run: &RunRef, picks: &Picks) -> StorageResult<AnnotationRef> {
        let started_at = Instant::now();
        let annotation = AnnotationRef {
            run: run.name.clone(),
            key: AnnotationKey {
                user_id: picks.user_id.clone(),
                session_id: picks.session_id.clone(),
                object_name: picks.pickable_object_name.clone(),
            },
            path: layout::picks_file(
                run.name.as_str(),
                picks.user_id.as_str(),
                picks.session_id.as_str(),
                picks.pickable_object_name.as_str(),
            ),
        };
        let node = annotation.node_id();

        for (field, value) in [
            ("user_id", &picks.user_id),
            ("session_id", &picks.session_id),
            ("pickable_object_name", &picks.pickable_object_name),
        ] {
            validate_name(value).map_err(|err| {
                StorageError::invalid_data(node.clone(), format!("{field} `{value}`: {err}"))
            })?;
        }
        if annotation.from_tool() {
            return Err(StorageError::new(
                node,
                StorageErrorKind::PermissionDenied,
                "picks produced by a tool are read-only",
            ));
        }

        let bytes = serde_json::to_vec_pretty(picks)
            .map_err(|err| StorageError::invalid_data(node.clone(), err.to_string()))?;
        self.storage
            .write(annotation.path.as_str(), &bytes)
            .map_err(|err| self.storage_failure("store_picks", node.clone(), started_at, &err))?;
        if let Some(run_node) = self.run_nodes.get(&run.name) {
            run_node.annotations.invalidate();
        }

        info!(
            "event=store_picks module=index status=ok project_id={} node={} points={} duration_ms={}",
            self.instance_id,
            node,
            picks.len(),
            started_at.elapsed().as_millis()
        );
        Ok(annotation)
    }

    /// Copies the points of `source` into the configured user's pick set.
    ///
    /// The first existing set of that user for the same object receives the
    /// points it does not already hold. Without one, a new set is created
    /// under the configured session.
    pub fn take_picks(&self, source: &AnnotationRef) -> StorageResult<AnnotationRef> {
        let run = RunRef::new(source.run.as_str());
        let user_id = self
            .config
            .user_id
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());
        let session_id = self
            .config
            .session_id
            .clone()
            .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

        let taken = self.load_picks(source)?;
        let existing = self.list_annotations(&run)?.into_iter().find(|annotation| {
            annotation.key.user_id == user_id
                && annotation.key.object_name == source.key.object_name
                && !annotation.from_tool()
        });

        let (target, appended) = match existing {
            Some(existing) => {
                let mut target = self.load_picks(&existing)?;
                // Written back under the listed name, whatever the document says.
                target.user_id = existing.key.user_id.clone();
                target.session_id = existing.key.session_id.clone();
                target.pickable_object_name = existing.key.object_name.clone();
                let appended = target.append_new_points(&taken.points);
                (target, appended)
            }
            None => {
                let appended = taken.len();
                let target = Picks {
                    pickable_object_name: source.key.object_name.clone(),
                    user_id,
                    session_id,
                    run_name: Some(run.name.clone()),
                    voxel_spacing: taken.voxel_spacing,
                    unit: taken.unit,
                    points: taken.points,
                    trust_orientation: taken.trust_orientation,
                };
                (target, appended)
            }
        };

        let stored = self.store_picks(&run, &target)?;
        info!(
            "event=take_picks module=index status=ok project_id={} source={} target={} appended={}",
            self.instance_id,
            source.node_id(),
            stored.node_id(),
            appended
        );
        Ok(stored)
    }
}


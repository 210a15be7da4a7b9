//! Domain references for the project tree.
//!
//! # Responsibility
//! - Define the node identities and reference values exposed by the index.
//! - Define the on-disk annotation record shape.
//!
//! # Invariants
//! - Run names are unique within a project.
//! - Voxel spacing values are unique within a run.
//! - Annotation keys `(user_id, session_id, object_name)` are unique within a run.

pub mod node;
pub mod picks;
pub mod refs;

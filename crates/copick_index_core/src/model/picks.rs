//! Annotation file content.

use serde::{Deserialize, Serialize};

fn default_unit() -> String {
    "angstrom".to_string()
}

fn default_score() -> f64 {
    1.0
}

fn default_trust_orientation() -> bool {
    true
}

const RELATIVE_TOLERANCE: f64 = 1e-5;
const ABSOLUTE_TOLERANCE: f64 = 1e-8;

fn close(value: f64, reference: f64) -> bool {
    (value - reference).abs() <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * reference.abs()
}

/// Point location in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    /// Same position up to floating point noise on every axis.
    pub fn is_close(&self, other: &Location) -> bool {
        close(self.x, other.x) && close(self.y, other.y) && close(self.z, other.z)
    }
}

/// One picked instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickPoint {
    pub location: Location,
    /// Row-major 4x4 rigid transformation. `None` means identity.
    #[serde(default, alias = "transformation_")]
    pub transformation: Option<[[f64; 4]; 4]>,
    #[serde(default)]
    pub instance_id: i64,
    #[serde(default = "default_score")]
    pub score: f64,
}

/// Content of one annotation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Picks {
    pub pickable_object_name: String,
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub voxel_spacing: Option<f64>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub points: Vec<PickPoint>,
    #[serde(default = "default_trust_orientation")]
    pub trust_orientation: bool,
}

impl Picks {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends every incoming point whose location is not already present.
    ///
    /// Only points held before the call are compared against. Returns the
    /// number of points appended.
    pub fn append_new_points(&mut self, incoming: &[PickPoint]) -> usize {
        let existing = self.points.len();
        let mut appended = 0;
        for point in incoming {
            let duplicate = self.points[..existing]
                .iter()
                .any(|held| held.location.is_close(&point.location));
            if !duplicate {
                self.points.push(point.clone());
                appended += 1;
            }
        }
        appended
    }
}

#[cfg(test)]
mod tests {
    use super::{Location, PickPoint, Picks};

    fn point(x: f64) -> PickPoint {
        PickPoint {
            location: Location { x, y: 1.0, z: 2.0 },
            transformation: None,
            instance_id: 0,
            score: 1.0,
        }
    }

    fn picks(points: Vec<PickPoint>) -> Picks {
        Picks {
            pickable_object_name: "ribosome".to_string(),
            user_id: "alice".to_string(),
            session_id: "17".to_string(),
            run_name: None,
            voxel_spacing: None,
            unit: "angstrom".to_string(),
            points,
            trust_orientation: true,
        }
    }

    #[test]
    fn parses_minimal_document_with_defaults() {
        let raw = r#"{
            "pickable_object_name": "ribosome",
            "user_id": "alice",
            "session_id": "17",
            "points": [
                {"location": {"x": 1.0, "y": 2.0, "z": 3.0}},
                {"location": {"x": 4.0, "y": 5.0, "z": 6.0}, "score": 0.25, "instance_id": 9}
            ]
        }"#;
        let picks: Picks = serde_json::from_str(raw).expect("document should parse");
        assert_eq!(picks.len(), 2);
        assert_eq!(picks.unit, "angstrom");
        assert!(picks.trust_orientation);
        assert_eq!(picks.points[0].score, 1.0);
        assert!(picks.points[0].transformation.is_none());
        assert_eq!(picks.points[1].instance_id, 9);
    }

    #[test]
    fn accepts_legacy_transformation_field() {
        let raw = r#"{
            "pickable_object_name": "ribosome",
            "user_id": "pytom",
            "session_id": "0",
            "points": [{
                "location": {"x": 0.0, "y": 0.0, "z": 0.0},
                "transformation_": [[1,0,0,5],[0,1,0,0],[0,0,1,0],[0,0,0,1]]
            }]
        }"#;
        let picks: Picks = serde_json::from_str(raw).expect("document should parse");
        let matrix = picks.points[0].transformation.expect("transformation present");
        assert_eq!(matrix[0][3], 5.0);
    }

    #[test]
    fn append_skips_points_already_held() {
        let mut target = picks(vec![point(1.0), point(2.0)]);
        let appended = target.append_new_points(&[point(2.0 + 1e-9), point(3.0), point(3.0)]);
        assert_eq!(appended, 2);
        let xs: Vec<f64> = target.points.iter().map(|p| p.location.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn append_into_empty_takes_everything() {
        let mut target = picks(Vec::new());
        assert_eq!(target.append_new_points(&[point(1.0), point(4.0)]), 2);
        assert_eq!(target.len(), 2);
        assert_eq!(target.append_new_points(&[]), 0);
    }
}

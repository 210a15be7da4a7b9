//! Root configuration document and validation.
//!
//! # Responsibility
//! - Parse the project configuration document (JSON) into an explicit record.
//! - Validate the record once, before any storage is touched.
//! - Resolve the storage location into a backend-neutral description.
//!
//! # Invariants
//! - A configuration that passed `validate()` is never re-validated per field.
//! - Pickable object names and labels are unique.
//! - Only schema major versions listed in `SUPPORTED_SCHEMA_MAJORS` are accepted.

pub mod names;

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

pub use names::{sanitize_name, validate_name, NameValidationError};

/// Storage driver name for plain directory trees.
pub const CONFIG_TYPE_FILESYSTEM: &str = "filesystem";
/// Schema major versions this index can read.
pub const SUPPORTED_SCHEMA_MAJORS: &[u32] = &[0, 1];

const DEFAULT_PROJECT_NAME: &str = "CoPick";
const DEFAULT_OBJECT_COLOR: [u8; 4] = [100, 100, 100, 255];
const LOCAL_SCHEMES: &[&str] = &["file://", "local://"];

fn default_project_name() -> String {
    DEFAULT_PROJECT_NAME.to_string()
}

fn default_config_type() -> String {
    CONFIG_TYPE_FILESYSTEM.to_string()
}

fn default_is_particle() -> bool {
    true
}

fn default_color() -> [u8; 4] {
    DEFAULT_OBJECT_COLOR
}

/// Errors that make a configuration unusable. Always fatal to `open`.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read configuration `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("configuration must name a storage root")]
    MissingRoot,
    #[error("unsupported configuration schema version `{found}`")]
    UnsupportedVersion { found: String },
    #[error("unsupported storage driver `{0}`")]
    UnsupportedConfigType(String),
    #[error("unsupported storage scheme `{0}`; supply a storage backend explicitly")]
    UnsupportedScheme(String),
    #[error("invalid {field} `{value}`: {reason}")]
    InvalidName {
        field: &'static str,
        value: String,
        #[source]
        reason: NameValidationError,
    },
    #[error("pickable object `{0}` is defined more than once")]
    DuplicateObject(String),
    #[error("pickable object label {label} is used by both `{first}` and `{second}`")]
    DuplicateLabel {
        label: u32,
        first: String,
        second: String,
    },
    #[error("reference volume path `{path}` of `{object}` must be project-relative")]
    InvalidMapPath { object: String, path: String },
    #[error("storage location `{location}` is unreachable: {source}")]
    Unreachable {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

/// One class of annotatable entity (e.g. a particle species).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickableObject {
    pub name: String,
    /// `true` for point annotations, `false` for segmentation masks.
    #[serde(default = "default_is_particle")]
    pub is_particle: bool,
    /// Numeric label used in segmentation masks.
    #[serde(default)]
    pub label: Option<u32>,
    /// RGBA display color shared by every annotation of this object.
    #[serde(default = "default_color")]
    pub color: [u8; 4],
    /// External identifier such as a GO term or UniProt accession.
    #[serde(default)]
    pub identifier: Option<String>,
    /// Particle radius in Ångström.
    #[serde(default)]
    pub radius: Option<f64>,
    /// Project-relative path of the reference density map.
    #[serde(default, alias = "mrc_path")]
    pub map_path: Option<String>,
}

impl PickableObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_particle: default_is_particle(),
            label: None,
            color: default_color(),
            identifier: None,
            radius: None,
            map_path: None,
        }
    }
}

/// Where the project lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Directory on a local or mounted filesystem.
    Local(PathBuf),
    /// URI handled by a caller-supplied backend (object stores, HTTP, ...).
    Remote { scheme: String, uri: String },
}

/// Root configuration of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default = "default_project_name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Schema version, `major[.minor[.patch]]`.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_config_type")]
    pub config_type: String,
    /// Local path or URI of the project root.
    #[serde(default, alias = "overlay_root")]
    pub root: String,
    /// Driver parameters passed through to the storage backend.
    #[serde(default, alias = "overlay_fs_args")]
    pub storage_options: BTreeMap<String, String>,
    /// Annotator identity used for new picks.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub pickable_objects: Vec<PickableObject>,
}

impl RootConfig {
    /// Creates a configuration pointing at `root` with default metadata.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            name: default_project_name(),
            description: None,
            version: None,
            config_type: default_config_type(),
            root: root.into(),
            storage_options: BTreeMap::new(),
            user_id: None,
            session_id: None,
            pickable_objects: Vec::new(),
        }
    }

    /// Parses a configuration document. Does not validate.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads and parses a configuration document from disk.
    ///
    /// A relative local `root` is resolved against the document's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let started_at = Instant::now();
        let raw = std::fs::read_to_string(path).map_err(|source| {
            error!(
                "event=config_load module=config status=error duration_ms={} error_code=config_read_failed",
                started_at.elapsed().as_millis()
            );
            ConfigurationError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let mut config = Self::from_json_str(raw.as_str())?;

        if let Some(base_dir) = path.parent() {
            config.root = resolve_relative_root(config.root.as_str(), base_dir);
        }

        info!(
            "event=config_load module=config status=ok duration_ms={} objects={}",
            started_at.elapsed().as_millis(),
            config.pickable_objects.len()
        );
        Ok(config)
    }

    /// Validates declaration-level invariants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.root.trim().is_empty() {
            return Err(ConfigurationError::MissingRoot);
        }
        if let Some(version) = &self.version {
            if !is_supported_version(version) {
                return Err(ConfigurationError::UnsupportedVersion {
                    found: version.clone(),
                });
            }
        }
        if let Some(user_id) = &self.user_id {
            check_name("user_id", user_id)?;
        }
        if let Some(session_id) = &self.session_id {
            check_name("session_id", session_id)?;
        }

        let mut names = BTreeSet::new();
        let mut labels: BTreeMap<u32, &str> = BTreeMap::new();
        for object in &self.pickable_objects {
            check_name("pickable object name", &object.name)?;
            if !names.insert(object.name.as_str()) {
                return Err(ConfigurationError::DuplicateObject(object.name.clone()));
            }
            if let Some(label) = object.label {
                if let Some(first) = labels.insert(label, object.name.as_str()) {
                    return Err(ConfigurationError::DuplicateLabel {
                        label,
                        first: first.to_string(),
                        second: object.name.clone(),
                    });
                }
            }
            if let Some(map_path) = &object.map_path {
                if !is_project_relative(map_path) {
                    return Err(ConfigurationError::InvalidMapPath {
                        object: object.name.clone(),
                        path: map_path.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Classifies `root` as a local directory or a remote URI.
    pub fn location(&self) -> Result<StorageLocation, ConfigurationError> {
        let root = self.root.trim();
        if root.is_empty() {
            return Err(ConfigurationError::MissingRoot);
        }
        for scheme in LOCAL_SCHEMES {
            if let Some(path) = root.strip_prefix(scheme) {
                return Ok(StorageLocation::Local(PathBuf::from(path)));
            }
        }
        match root.split_once("://") {
            Some((scheme, _)) => Ok(StorageLocation::Remote {
                scheme: scheme.to_ascii_lowercase(),
                uri: root.to_string(),
            }),
            None => Ok(StorageLocation::Local(PathBuf::from(root))),
        }
    }

    pub fn pickable_object(&self, name: &str) -> Option<&PickableObject> {
        self.pickable_objects
            .iter()
            .find(|object| object.name == name)
    }
}

fn check_name(field: &'static str, value: &str) -> Result<(), ConfigurationError> {
    validate_name(value).map_err(|reason| ConfigurationError::InvalidName {
        field,
        value: value.to_string(),
        reason,
    })
}

fn is_supported_version(value: &str) -> bool {
    let major = value.trim().split('.').next().unwrap_or_default();
    match major.parse::<u32>() {
        Ok(major) => SUPPORTED_SCHEMA_MAJORS.contains(&major),
        Err(_) => false,
    }
}

fn is_project_relative(path: &str) -> bool {
    let trimmed = path.trim();
    !trimmed.is_empty()
        && !trimmed.starts_with('/')
        && !trimmed.contains("://")
        && trimmed.split('/').all(|part| part != "..")
}

fn resolve_relative_root(root: &str, base_dir: &Path) -> String {
    let trimmed = root.trim();
    if trimmed.is_empty() || trimmed.contains("://") || Path::new(trimmed).is_absolute() {
        return trimmed.to_string();
    }
    base_dir.join(trimmed).to_string_lossy().into_owned()
}

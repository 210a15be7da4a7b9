use copick_index_core::{
    ConfigurationError, NodeId, PyramidLevel, RunRef, SpacingRef, StorageErrorKind, VoxelSize,
    ProjectIndex,
};
use std::fs;
use std::path::Path;

const ZATTRS: &str = r#"{"multiscales":[{"datasets":[{"path":"0"},{"path":"1"}]}]}"#;
const ZARRAY: &str = r#"{"zarr_format":2,"shape":[100,200,300],"chunks":[50,50,50],"dtype":"<f4","compressor":null,"fill_value":0}"#;

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project_on_disk(root: &Path) {
    let tomo = "ExperimentRuns/TS_001/VoxelSpacing7.840/wbp.zarr";
    write(root, &format!("{tomo}/.zattrs"), ZATTRS.as_bytes());
    write(root, &format!("{tomo}/0/.zarray"), ZARRAY.as_bytes());
    write(root, &format!("{tomo}/0/0.0.0"), &[7u8; 16]);
    fs::create_dir_all(root.join("ExperimentRuns/TS_002")).unwrap();
    write(
        root,
        "ExperimentRuns/TS_001/Picks/bob_3_apoferritin.json",
        br#"{"pickable_object_name":"apoferritin","user_id":"bob","session_id":"3","points":[]}"#,
    );
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("copick_config.json");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn opens_relative_root_and_walks_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    project_on_disk(&dir.path().join("project"));
    let config = write_config(
        dir.path(),
        r#"{
            "name": "demo",
            "version": "0.5.0",
            "config_type": "filesystem",
            "overlay_root": "project",
            "pickable_objects": [
                {"name": "apoferritin", "label": 1, "color": [0, 117, 220, 255], "radius": 60.0}
            ]
        }"#,
    );

    let index = ProjectIndex::open_path(&config).unwrap();
    assert_eq!(index.name(), "demo");

    let runs = index.list_runs().unwrap();
    assert_eq!(runs, vec![RunRef::new("TS_001"), RunRef::new("TS_002")]);

    let spacings = index.list_voxel_spacings(&runs[0]).unwrap();
    assert_eq!(spacings.len(), 1);
    assert_eq!(spacings[0].label(), "VS:7.840");
    assert!(index.list_voxel_spacings(&runs[1]).unwrap().is_empty());

    let tomograms = index.list_tomograms(&spacings[0]).unwrap();
    let handle = index
        .resolve_tomogram(&tomograms[0], PyramidLevel::Full)
        .unwrap();
    assert_eq!(handle.shape(), [100, 200, 300]);
    assert_eq!(handle.chunk_grid(), [2, 4, 6]);
    assert_eq!(handle.read_chunk([0, 0, 0]).unwrap(), vec![7u8; 16]);

    let annotations = index.list_annotations(&runs[0]).unwrap();
    assert_eq!(annotations.len(), 1);
    let picks = index.load_picks(&annotations[0]).unwrap();
    assert!(picks.is_empty());
    assert!(picks.trust_orientation);
}

#[test]
fn missing_tomogram_level_on_disk_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    project_on_disk(dir.path());
    let config = write_config(dir.path(), r#"{"root": "."}"#);
    let index = ProjectIndex::open_path(&config).unwrap();

    let spacing = SpacingRef::new("TS_001", VoxelSize::parse("7.84").unwrap());
    let tomogram = index.list_tomograms(&spacing).unwrap().remove(0);
    let err = index
        .resolve_tomogram(&tomogram, PyramidLevel::Half)
        .unwrap_err();
    assert_eq!(err.kind, StorageErrorKind::NotFound);
    assert_eq!(err.node, NodeId::tomogram("TS_001", spacing.voxel_size, "wbp"));
}

#[test]
fn malformed_document_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "{\"root\": ");
    let err = ProjectIndex::open_path(&config).err().unwrap();
    assert!(matches!(err, ConfigurationError::Parse(_)));
}

#[test]
fn unreadable_document_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ProjectIndex::open_path(dir.path().join("absent.json"))
        .err()
        .unwrap();
    assert!(matches!(err, ConfigurationError::Read { .. }));
}

#[test]
fn unreachable_root_fails_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), r#"{"root": "does/not/exist"}"#);
    let err = ProjectIndex::open_path(&config).err().unwrap();
    assert!(matches!(err, ConfigurationError::Unreachable { .. }));
}

#[test]
fn unsupported_schema_version_fails_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), r#"{"root": ".", "version": "2.0.0"}"#);
    let err = ProjectIndex::open_path(&config).err().unwrap();
    assert!(
        matches!(err, ConfigurationError::UnsupportedVersion { ref found } if found == "2.0.0")
    );
}

#[test]
fn invalid_object_definitions_fail_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"{"root": ".", "pickable_objects": [
            {"name": "ribo_some"}
        ]}"#,
    );
    let err = ProjectIndex::open_path(&config).err().unwrap();
    assert!(matches!(err, ConfigurationError::InvalidName { .. }));

    let config = write_config(
        dir.path(),
        r#"{"root": ".", "pickable_objects": [
            {"name": "a", "label": 3},
            {"name": "b", "label": 3}
        ]}"#,
    );
    let err = ProjectIndex::open_path(&config).err().unwrap();
    assert!(matches!(err, ConfigurationError::DuplicateLabel { label: 3, .. }));
}

#[test]
fn object_map_path_is_read_relative_to_root() {
    let dir = tempfile::tempdir().unwrap();
    project_on_disk(dir.path());
    let mut header = vec![0u8; 1024];
    header[0..4].copy_from_slice(&16i32.to_le_bytes());
    header[4..8].copy_from_slice(&16i32.to_le_bytes());
    header[8..12].copy_from_slice(&16i32.to_le_bytes());
    header[12..16].copy_from_slice(&2i32.to_le_bytes());
    for axis in 0..3 {
        header[28 + axis * 4..32 + axis * 4].copy_from_slice(&16i32.to_le_bytes());
        header[40 + axis * 4..44 + axis * 4].copy_from_slice(&(16.0f32 * 4.0).to_le_bytes());
    }
    header[208..212].copy_from_slice(b"MAP ");
    header[212] = 0x44;
    header.extend_from_slice(&[0u8; 4096]);
    write(dir.path(), "maps/apo.mrc", &header);

    let config = write_config(
        dir.path(),
        r#"{"root": ".", "pickable_objects": [
            {"name": "apoferritin", "mrc_path": "maps/apo.mrc"},
            {"name": "membrane", "is_particle": false}
        ]}"#,
    );
    let index = ProjectIndex::open_path(&config).unwrap();

    let volume = index.resolve_object_volume("apoferritin").unwrap();
    assert_eq!(volume.header.dims, [16, 16, 16]);
    assert!((volume.header.voxel_size[1] - 4.0).abs() < 1e-4);

    let err = index.resolve_object_volume("membrane").unwrap_err();
    assert_eq!(err.node, NodeId::pickable_object("membrane"));
    assert_eq!(err.kind, StorageErrorKind::NotFound);
}

#[test]
fn taken_picks_are_written_under_the_configured_identity() {
    let dir = tempfile::tempdir().unwrap();
    project_on_disk(dir.path());
    let config = write_config(
        dir.path(),
        r#"{"root": ".", "user_id": "carol", "session_id": "2"}"#,
    );
    let index = ProjectIndex::open_path(&config).unwrap();
    let run = RunRef::new("TS_001");

    let source = index.list_annotations(&run).unwrap().remove(0);
    let taken = index.take_picks(&source).unwrap();
    assert_eq!(taken.path, "ExperimentRuns/TS_001/Picks/carol_2_apoferritin.json");

    let on_disk = fs::read_to_string(dir.path().join(&taken.path)).unwrap();
    assert!(on_disk.contains(r#""user_id": "carol""#));
    let keys: Vec<String> = index
        .list_annotations(&run)
        .unwrap()
        .into_iter()
        .map(|annotation| annotation.key.user_id)
        .collect();
    assert_eq!(keys, vec!["bob", "carol"]);
}

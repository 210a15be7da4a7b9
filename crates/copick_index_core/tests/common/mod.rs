#![allow(dead_code)]

use byteorder::{ByteOrder, LittleEndian};
use copick_index_core::{
    MemoryStorage, PickableObject, ProjectIndex, ProjectStorage, RootConfig,
};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

/// Wraps `MemoryStorage`, counting every round trip and injecting faults.
pub struct TrackedStorage {
    inner: MemoryStorage,
    calls: Mutex<HashMap<String, usize>>,
    faults: Mutex<HashMap<String, io::ErrorKind>>,
    hold: Mutex<Option<String>>,
    held: Condvar,
    released: Mutex<bool>,
    release: Condvar,
}

impl TrackedStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
            faults: Mutex::new(HashMap::new()),
            hold: Mutex::new(None),
            held: Condvar::new(),
            released: Mutex::new(true),
            release: Condvar::new(),
        }
    }

    /// Number of `list_dir` calls for `path`.
    pub fn lists(&self, path: &str) -> usize {
        self.count(format!("list:{path}"))
    }

    /// Number of `read`/`read_range` calls for `path`.
    pub fn reads(&self, path: &str) -> usize {
        self.count(format!("read:{path}"))
    }

    pub fn writes(&self, path: &str) -> usize {
        self.count(format!("write:{path}"))
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn fail(&self, path: &str, kind: io::ErrorKind) {
        self.faults.lock().insert(path.to_string(), kind);
    }

    pub fn heal(&self, path: &str) {
        self.faults.lock().remove(path);
    }

    pub fn insert(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.inner.insert(path, bytes);
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    /// Makes the next access to `path` block until `release` is called.
    pub fn hold(&self, path: &str) {
        *self.released.lock() = false;
        *self.hold.lock() = Some(path.to_string());
    }

    /// Waits until a caller is blocked on the held path.
    pub fn wait_until_held(&self) {
        let mut hold = self.hold.lock();
        while hold.is_some() {
            self.held.wait(&mut hold);
        }
    }

    pub fn release(&self) {
        *self.released.lock() = true;
        self.release.notify_all();
    }

    fn count(&self, key: String) -> usize {
        self.calls.lock().get(&key).copied().unwrap_or(0)
    }

    fn enter(&self, op: &str, path: &str) -> io::Result<()> {
        *self.calls.lock().entry(format!("{op}:{path}")).or_insert(0) += 1;

        let should_hold = {
            let mut hold = self.hold.lock();
            if hold.as_deref() == Some(path) {
                *hold = None;
                self.held.notify_all();
                true
            } else {
                false
            }
        };
        if should_hold {
            let mut released = self.released.lock();
            while !*released {
                self.release.wait(&mut released);
            }
        }

        match self.faults.lock().get(path) {
            Some(kind) => Err(io::Error::new(*kind, format!("injected fault on {path}"))),
            None => Ok(()),
        }
    }
}

impl ProjectStorage for TrackedStorage {
    fn describe(&self) -> String {
        "tracked://fixture".to_string()
    }

    fn probe(&self) -> io::Result<()> {
        Ok(())
    }

    fn list_dir(&self, path: &str) -> io::Result<Vec<String>> {
        self.enter("list", path)?;
        self.inner.list_dir(path)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.enter("read", path)?;
        self.inner.read(path)
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.enter("read", path)?;
        self.inner.read_range(path, offset, len)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.enter("write", path)?;
        self.inner.write(path, bytes)
    }
}

pub const ZATTRS: &str = r#"{"multiscales":[{"version":"0.4","datasets":[{"path":"0"},{"path":"1"},{"path":"2"}]}]}"#;

pub fn zarray(shape: [u64; 3]) -> String {
    format!(
        r#"{{"zarr_format":2,"shape":[{},{},{}],"chunks":[64,64,64],"dtype":"<f4","compressor":null,"fill_value":0,"order":"C"}}"#,
        shape[0], shape[1], shape[2]
    )
}

/// Writes a three-level tomogram below `zarr_path`.
pub fn add_tomogram(storage: &MemoryStorage, zarr_path: &str, full_shape: [u64; 3]) {
    storage.insert(&format!("{zarr_path}/.zattrs"), ZATTRS);
    for (group, divisor) in [("0", 1), ("1", 2), ("2", 4)] {
        let shape = full_shape.map(|axis| axis / divisor);
        storage.insert(&format!("{zarr_path}/{group}/.zarray"), zarray(shape));
    }
}

/// Little-endian MRC header with the `MAP ` tag and cubic sampling.
pub fn mrc_header(dims: [i32; 3], voxel: f32) -> Vec<u8> {
    let mut bytes = vec![0u8; 1024];
    for (axis, dim) in dims.iter().enumerate() {
        LittleEndian::write_i32(&mut bytes[axis * 4..axis * 4 + 4], *dim);
        LittleEndian::write_i32(&mut bytes[28 + axis * 4..32 + axis * 4], *dim);
        LittleEndian::write_f32(&mut bytes[40 + axis * 4..44 + axis * 4], *dim as f32 * voxel);
    }
    LittleEndian::write_i32(&mut bytes[12..16], 2);
    bytes[208..212].copy_from_slice(b"MAP ");
    bytes[212] = 0x44;
    bytes[213] = 0x41;
    bytes
}

pub fn picks_json(object: &str, user: &str, session: &str, points: usize) -> String {
    let points: Vec<String> = (0..points)
        .map(|i| {
            format!(
                r#"{{"location":{{"x":{i}.0,"y":1.5,"z":2.5}},"transformation_":[[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]],"instance_id":0,"score":1.0}}"#
            )
        })
        .collect();
    format!(
        r#"{{"pickable_object_name":"{object}","user_id":"{user}","session_id":"{session}","run_name":"RunA","voxel_spacing":null,"unit":"angstrom","points":[{}],"trust_orientation":true}}"#,
        points.join(",")
    )
}

/// Two runs, two objects (only `proteasome` has a map on disk).
///
/// - RunA: VS 10.000 {denoised, wbp}, picks by alice and a tool, one stray file,
///   two segmentations and one mesh.
/// - RunB: VS 10.000 {wbp}, VS 20.000 {denoised}.
pub fn sample_project() -> MemoryStorage {
    let storage = MemoryStorage::new();
    add_tomogram(
        &storage,
        "ExperimentRuns/RunA/VoxelSpacing10.000/denoised.zarr",
        [256, 512, 512],
    );
    add_tomogram(
        &storage,
        "ExperimentRuns/RunA/VoxelSpacing10.000/wbp.zarr",
        [256, 512, 512],
    );
    add_tomogram(
        &storage,
        "ExperimentRuns/RunB/VoxelSpacing10.000/wbp.zarr",
        [128, 256, 256],
    );
    add_tomogram(
        &storage,
        "ExperimentRuns/RunB/VoxelSpacing20.000/denoised.zarr",
        [64, 128, 128],
    );
    storage.insert(
        "ExperimentRuns/RunA/Picks/alice_17_ribosome.json",
        picks_json("ribosome", "alice", "17", 3),
    );
    storage.insert(
        "ExperimentRuns/RunA/Picks/pytom_0_proteasome.json",
        picks_json("proteasome", "pytom", "0", 2),
    );
    storage.insert("ExperimentRuns/RunA/Picks/notes.txt", "scratch");
    storage.insert(
        "ExperimentRuns/RunA/Segmentations/10.000_alice_17_membrane.zarr/.zattrs",
        ZATTRS,
    );
    storage.insert(
        "ExperimentRuns/RunA/Segmentations/10.000_membrain_0_all-multilabel.zarr/.zattrs",
        ZATTRS,
    );
    storage.insert("ExperimentRuns/RunA/Segmentations/README", "");
    storage.insert("ExperimentRuns/RunA/Meshes/alice_17_ribosome.glb", vec![0u8; 12]);
    storage.insert("ExperimentRuns/.DS_Store", "");
    storage.insert("Objects/proteasome.mrc", mrc_header([32, 32, 32], 10.0));
    storage
}

pub fn sample_config() -> RootConfig {
    let mut config = RootConfig::new("tracked://fixture");
    config.version = Some("1.0.0".to_string());
    let mut ribosome = PickableObject::new("ribosome");
    ribosome.label = Some(1);
    let mut proteasome = PickableObject::new("proteasome");
    proteasome.label = Some(2);
    config.pickable_objects = vec![ribosome, proteasome];
    config
}

pub fn open_sample() -> (ProjectIndex, Arc<TrackedStorage>) {
    let storage = Arc::new(TrackedStorage::new(sample_project()));
    let index = ProjectIndex::open_with_storage(sample_config(), storage.clone()).unwrap();
    (index, storage)
}

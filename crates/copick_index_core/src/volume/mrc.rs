//! MRC2014 header reading for reference density maps.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io;

/// Fixed MRC header length in bytes.
pub const MRC_HEADER_LEN: usize = 1024;

const MAP_TAG_OFFSET: usize = 208;
const MACHINE_STAMP_OFFSET: usize = 212;

/// Dimensions and sampling of an MRC map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MrcHeader {
    /// Columns, rows, sections.
    pub dims: [i32; 3],
    /// MRC data mode (0 = int8, 1 = int16, 2 = float32, 6 = uint16, ...).
    pub mode: i32,
    /// Voxel size in Ångström along x, y, z.
    pub voxel_size: [f32; 3],
}

impl MrcHeader {
    /// Parses the first 1024 bytes of an MRC file.
    pub fn parse(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < MRC_HEADER_LEN {
            return Err(invalid(format!(
                "MRC header needs {MRC_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if &bytes[MAP_TAG_OFFSET..MAP_TAG_OFFSET + 4] != b"MAP " {
            return Err(invalid("missing `MAP ` tag".to_string()));
        }
        // Machine stamp 0x11 0x11 marks big-endian data; everything else is read as little-endian.
        if bytes[MACHINE_STAMP_OFFSET] == 0x11 {
            Self::parse_with::<BigEndian>(bytes)
        } else {
            Self::parse_with::<LittleEndian>(bytes)
        }
    }

    fn parse_with<B: ByteOrder>(bytes: &[u8]) -> io::Result<Self> {
        let word = |index: usize| B::read_i32(&bytes[index * 4..index * 4 + 4]);
        let real = |index: usize| B::read_f32(&bytes[index * 4..index * 4 + 4]);

        let dims = [word(0), word(1), word(2)];
        if dims.iter().any(|dim| *dim <= 0) {
            return Err(invalid(format!("non-positive map dimensions {dims:?}")));
        }
        let sampling = [word(7), word(8), word(9)];
        let cell = [real(10), real(11), real(12)];

        let mut voxel_size = [0.0f32; 3];
        for axis in 0..3 {
            voxel_size[axis] = if sampling[axis] > 0 {
                cell[axis] / sampling[axis] as f32
            } else {
                0.0
            };
        }

        Ok(Self {
            dims,
            mode: word(3),
            voxel_size,
        })
    }
}

/// Resolved reference volume of one pickable object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectVolume {
    pub object_name: String,
    /// Project-relative path of the map file.
    pub path: String,
    pub header: MrcHeader,
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

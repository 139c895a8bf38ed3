use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::binary_utils::{read_bytes, read_fixed_string, read_u16_le, read_u32_le, seek_to};
use crate::error::{ExtractError, Result};
use crate::resources::ResourceType;

const HEADER_LEN: usize = 64;
const FILE_ENTRY_LEN: usize = 12;
const KEY_ENTRY_LEN: usize = 22;

/// One payload archive (BIF) listed in the key file. The stored path is
/// relative to the game directory, with `\` separators normalised to `/`.
#[derive(Debug)]
#[allow(dead_code)]
pub struct BifReference {
    pub path: String,
    pub file_size: u32,
}

/// One resource listed in the key file. The packed resource id splits into
/// the owning archive index (high 12 bits) and the in-archive slot (low 20).
#[derive(Debug)]
pub struct KeyResource {
    /// Resource name, lower-cased (lookups are case-insensitive).
    pub resref: String,
    pub res_type: ResourceType,
    pub bif_index: usize,
    pub slot_id: u32,
}

pub struct KeyFile {
    pub bif_references: Vec<BifReference>,
    pub resources: Vec<KeyResource>,
}

impl KeyFile {
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path.as_ref()).map_err(|e| {
            ExtractError::CorruptIndex(format!("cannot open {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(ExtractError::CorruptIndex(
                "file shorter than header".to_string(),
            ));
        }

        if &data[0..4] != b"KEY " || &data[4..8] != b"V1  " {
            return Err(ExtractError::CorruptIndex(
                "bad magic or version (expected KEY V1)".to_string(),
            ));
        }

        let mut cursor = Cursor::new(data);
        seek_to(&mut cursor, 8).map_err(corrupt)?;

        let bif_count = read_u32_le(&mut cursor).map_err(corrupt)? as usize;
        let resource_count = read_u32_le(&mut cursor).map_err(corrupt)? as usize;
        let file_table_offset = read_u32_le(&mut cursor).map_err(corrupt)? as u64;
        let key_table_offset = read_u32_le(&mut cursor).map_err(corrupt)? as u64;

        // Declared counts must fit inside the file.
        let file_table_end = file_table_offset as usize + bif_count * FILE_ENTRY_LEN;
        let key_table_end = key_table_offset as usize + resource_count * KEY_ENTRY_LEN;
        if file_table_end > data.len() || key_table_end > data.len() {
            return Err(ExtractError::CorruptIndex(format!(
                "declared tables overrun file length ({} bytes)",
                data.len()
            )));
        }

        let mut bif_references = Vec::with_capacity(bif_count);
        seek_to(&mut cursor, file_table_offset).map_err(corrupt)?;
        for _ in 0..bif_count {
            let file_size = read_u32_le(&mut cursor).map_err(corrupt)?;
            let filename_offset = read_u32_le(&mut cursor).map_err(corrupt)? as usize;
            let filename_size = read_u16_le(&mut cursor).map_err(corrupt)? as usize;
            let _drives = read_u16_le(&mut cursor).map_err(corrupt)?;

            if filename_offset + filename_size > data.len() {
                return Err(ExtractError::CorruptIndex(format!(
                    "archive filename at {}+{} overruns file",
                    filename_offset, filename_size
                )));
            }

            let saved = cursor.position();
            seek_to(&mut cursor, filename_offset as u64).map_err(corrupt)?;
            let raw = read_bytes(&mut cursor, filename_size).map_err(corrupt)?;
            seek_to(&mut cursor, saved).map_err(corrupt)?;

            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let path = String::from_utf8_lossy(&raw[..end]).replace('\\', "/");

            bif_references.push(BifReference { path, file_size });
        }

        let mut resources = Vec::with_capacity(resource_count);
        seek_to(&mut cursor, key_table_offset).map_err(corrupt)?;
        for _ in 0..resource_count {
            let resref = read_fixed_string(&mut cursor, 16)
                .map_err(corrupt)?
                .to_lowercase();
            let res_type = ResourceType(read_u16_le(&mut cursor).map_err(corrupt)?);
            let id = read_u32_le(&mut cursor).map_err(corrupt)?;

            let bif_index = (id >> 20) as usize;
            if bif_index >= bif_count {
                return Err(ExtractError::CorruptIndex(format!(
                    "resource {} references archive {} of {}",
                    resref, bif_index, bif_count
                )));
            }

            resources.push(KeyResource {
                resref,
                res_type,
                bif_index,
                slot_id: id & 0xFFFFF,
            });
        }

        Ok(KeyFile {
            bif_references,
            resources,
        })
    }
}

fn corrupt(e: std::io::Error) -> ExtractError {
    ExtractError::CorruptIndex(e.to_string())
}

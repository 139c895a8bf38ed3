use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::binary_utils::{read_u32_le, seek_to};
use crate::error::{ExtractError, Result};

const HEADER_LEN: usize = 20;
const VAR_ENTRY_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub struct BifResource {
    pub offset: u32,
    pub size: u32,
    pub res_type: u32,
}

/// One payload archive, fully slurped. Resources are addressed by the low
/// 20 bits of their packed id (the slot), matching the key file's resource
/// ids.
pub struct BifArchive {
    pub path: PathBuf,
    resources: HashMap<u32, BifResource>,
    data: Vec<u8>,
}

impl BifArchive {
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path).map_err(|e| ExtractError::CorruptArchive {
            path: path.clone(),
            reason: format!("cannot open: {}", e),
        })?;
        Self::from_bytes(path, data)
    }

    pub fn from_bytes(path: PathBuf, data: Vec<u8>) -> Result<Self> {
        let corrupt = |reason: String| ExtractError::CorruptArchive {
            path: path.clone(),
            reason,
        };

        if data.len() < HEADER_LEN {
            return Err(corrupt("file shorter than header".to_string()));
        }

        if &data[0..4] != b"BIFF" || &data[4..8] != b"V1  " {
            return Err(corrupt("bad magic or version (expected BIFF V1)".to_string()));
        }

        let mut cursor = Cursor::new(data.as_slice());
        seek_to(&mut cursor, 8).map_err(|e| corrupt(e.to_string()))?;

        let variable_count = read_u32_le(&mut cursor).map_err(|e| corrupt(e.to_string()))? as usize;
        let _fixed_count = read_u32_le(&mut cursor).map_err(|e| corrupt(e.to_string()))?;
        let table_offset = read_u32_le(&mut cursor).map_err(|e| corrupt(e.to_string()))? as usize;

        if table_offset + variable_count * VAR_ENTRY_LEN > data.len() {
            return Err(corrupt(format!(
                "variable table ({} entries at {}) overruns file length {}",
                variable_count,
                table_offset,
                data.len()
            )));
        }

        let mut resources = HashMap::with_capacity(variable_count);
        seek_to(&mut cursor, table_offset as u64).map_err(|e| corrupt(e.to_string()))?;
        for _ in 0..variable_count {
            let id = read_u32_le(&mut cursor).map_err(|e| corrupt(e.to_string()))?;
            let offset = read_u32_le(&mut cursor).map_err(|e| corrupt(e.to_string()))?;
            let size = read_u32_le(&mut cursor).map_err(|e| corrupt(e.to_string()))?;
            let res_type = read_u32_le(&mut cursor).map_err(|e| corrupt(e.to_string()))?;

            if offset as usize + size as usize > data.len() {
                return Err(corrupt(format!(
                    "resource {:#x} range {}+{} overruns file length {}",
                    id,
                    offset,
                    size,
                    data.len()
                )));
            }

            resources.insert(
                id & 0xFFFFF,
                BifResource {
                    offset,
                    size,
                    res_type,
                },
            );
        }

        Ok(BifArchive {
            path,
            resources,
            data,
        })
    }

    pub fn resource_bytes(&self, slot_id: u32) -> Option<&[u8]> {
        let res = self.resources.get(&slot_id)?;
        Some(&self.data[res.offset as usize..(res.offset + res.size) as usize])
    }
}

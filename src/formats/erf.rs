use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::binary_utils::{read_bytes, read_fixed_string, read_u16_le, read_u32_le, seek_to};
use crate::error::{ExtractError, Result};
use crate::resources::ResourceType;

const HEADER_LEN: usize = 160;
const KEY_ENTRY_LEN: usize = 24;
const RES_ENTRY_LEN: usize = 8;

/// One resource bundled in the module, bytes copied out of the container.
pub struct ErfResource {
    /// Resource name, lower-cased.
    pub resref: String,
    pub res_type: ResourceType,
    pub data: Vec<u8>,
}

/// A module container (ERF/MOD). Self-contained: names, types and payloads
/// all live in the one file, in declaration order.
pub struct ErfFile {
    pub resources: Vec<ErfResource>,
}

impl ErfFile {
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path.as_ref()).map_err(|e| {
            ExtractError::InvalidModule(format!("cannot open {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(ExtractError::InvalidModule(
                "file shorter than header".to_string(),
            ));
        }

        let file_type = &data[0..4];
        if file_type != b"MOD " && file_type != b"ERF " && file_type != b"SAV " && file_type != b"HAK "
        {
            return Err(ExtractError::InvalidModule(format!(
                "unrecognised file type {:?}",
                file_type
            )));
        }
        if &data[4..8] != b"V1.0" {
            return Err(ExtractError::InvalidModule(format!(
                "unsupported version {:?}",
                &data[4..8]
            )));
        }

        let mut cursor = Cursor::new(data);
        seek_to(&mut cursor, 8).map_err(invalid)?;

        let _language_count = read_u32_le(&mut cursor).map_err(invalid)?;
        let _localized_string_size = read_u32_le(&mut cursor).map_err(invalid)?;
        let entry_count = read_u32_le(&mut cursor).map_err(invalid)? as usize;
        let _localized_string_offset = read_u32_le(&mut cursor).map_err(invalid)?;
        let key_list_offset = read_u32_le(&mut cursor).map_err(invalid)? as usize;
        let resource_list_offset = read_u32_le(&mut cursor).map_err(invalid)? as usize;

        if key_list_offset + entry_count * KEY_ENTRY_LEN > data.len()
            || resource_list_offset + entry_count * RES_ENTRY_LEN > data.len()
        {
            return Err(ExtractError::InvalidModule(format!(
                "entry tables overrun file length ({} bytes)",
                data.len()
            )));
        }

        // Key list gives names and types; the resource list at the same
        // positions gives the byte ranges.
        let mut names = Vec::with_capacity(entry_count);
        seek_to(&mut cursor, key_list_offset as u64).map_err(invalid)?;
        for _ in 0..entry_count {
            let resref = read_fixed_string(&mut cursor, 16)
                .map_err(invalid)?
                .to_lowercase();
            let _id = read_u32_le(&mut cursor).map_err(invalid)?;
            let res_type = ResourceType(read_u16_le(&mut cursor).map_err(invalid)?);
            let _unused = read_u16_le(&mut cursor).map_err(invalid)?;
            names.push((resref, res_type));
        }

        let mut resources = Vec::with_capacity(entry_count);
        seek_to(&mut cursor, resource_list_offset as u64).map_err(invalid)?;
        for (resref, res_type) in names {
            let offset = read_u32_le(&mut cursor).map_err(invalid)? as usize;
            let size = read_u32_le(&mut cursor).map_err(invalid)? as usize;

            if offset + size > data.len() {
                return Err(ExtractError::InvalidModule(format!(
                    "resource {} range {}+{} overruns file length {}",
                    resref,
                    offset,
                    size,
                    data.len()
                )));
            }

            let saved = cursor.position();
            seek_to(&mut cursor, offset as u64).map_err(invalid)?;
            let bytes = read_bytes(&mut cursor, size).map_err(invalid)?;
            seek_to(&mut cursor, saved).map_err(invalid)?;

            resources.push(ErfResource {
                resref,
                res_type,
                data: bytes,
            });
        }

        Ok(ErfFile { resources })
    }
}

fn invalid(e: std::io::Error) -> ExtractError {
    ExtractError::InvalidModule(e.to_string())
}

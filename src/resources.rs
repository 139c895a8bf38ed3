use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{ExtractError, Result};
use crate::formats::bif::BifArchive;
use crate::formats::key::{KeyFile, KeyResource};

/// Numeric resource type tag shared by the key, archive and module formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceType(pub u16);

impl ResourceType {
    /// Targa tile bitmap.
    pub const TGA: ResourceType = ResourceType(3);
    /// Area metadata record.
    pub const ARE: ResourceType = ResourceType(2012);
    /// Tileset markup text.
    pub const SET: ResourceType = ResourceType(2013);
    /// Area instance record (placed objects, transitions).
    pub const GIT: ResourceType = ResourceType(2023);
}

/// Copy out the bytes of every key-listed resource matching `predicate`.
///
/// Matches are grouped by owning payload archive so each archive file is
/// opened at most once per call; archives with no matching resource are
/// never touched. A predicate matching nothing yields an empty map. A
/// resource whose declared slot is absent from its archive is a fatal
/// index/archive inconsistency.
pub fn resolve<F>(key: &KeyFile, game_dir: &Path, predicate: F) -> Result<HashMap<String, Vec<u8>>>
where
    F: Fn(&KeyResource) -> bool,
{
    let mut by_archive: BTreeMap<usize, Vec<&KeyResource>> = BTreeMap::new();
    for resource in key.resources.iter().filter(|r| predicate(r)) {
        by_archive.entry(resource.bif_index).or_default().push(resource);
    }

    let mut out = HashMap::new();
    for (bif_index, resources) in by_archive {
        let bif_path = game_dir.join(&key.bif_references[bif_index].path);
        let archive = BifArchive::read_from_file(&bif_path)?;

        for resource in resources {
            let bytes = archive.resource_bytes(resource.slot_id).ok_or_else(|| {
                ExtractError::MissingResource {
                    resref: resource.resref.clone(),
                    slot_id: resource.slot_id,
                    archive: archive.path.clone(),
                }
            })?;
            out.insert(resource.resref.clone(), bytes.to_vec());
        }
    }

    Ok(out)
}

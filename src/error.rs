use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("corrupt key file: {0}")]
    CorruptIndex(String),

    #[error("corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("resource {resref} declares slot {slot_id} which does not exist in {archive}")]
    MissingResource {
        resref: String,
        slot_id: u32,
        archive: PathBuf,
    },

    #[error("invalid module container: {0}")]
    InvalidModule(String),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("field {label}: stored type {found} does not match expected {expected}")]
    FieldTypeMismatch {
        label: String,
        expected: &'static str,
        found: u32,
    },

    #[error("field {0} not found")]
    FieldNotFound(String),

    #[error("malformed tileset section {section}: missing {key}")]
    MalformedTileset { section: String, key: &'static str },

    #[error("area references unknown tileset {0}")]
    UnknownTileset(String),

    #[error("tile id {id} not present in tileset {tileset}")]
    UnknownTileId { id: i32, tileset: String },

    #[error("fallback bitmap {0} was not loaded")]
    MissingFallbackBitmap(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

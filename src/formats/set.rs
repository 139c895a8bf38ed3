use std::collections::HashMap;

use crate::error::{ExtractError, Result};

/// One tile's visual definition from the markup: which bitmap resource
/// draws it and the orientation the bitmap was authored at.
#[derive(Debug, Clone)]
pub struct TileDef {
    /// Bitmap resource name, lower-cased for case-insensitive lookup.
    pub bitmap: String,
    pub base_orientation: i32,
}

/// Parse tileset markup: an INI-like text where `[TILE<n>]` sections carry
/// `ImageMap2D=` and `Orientation=` keys. The `[TILES]` count header and the
/// door sections are not tiles and contribute nothing. Section order does
/// not matter; the result is a map.
pub fn parse_tileset(data: &[u8]) -> Result<HashMap<i32, TileDef>> {
    let text = String::from_utf8_lossy(data);
    let mut tiles = HashMap::new();

    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let header = line.trim();
        let Some(id) = tile_section_id(header) else {
            continue;
        };

        let mut bitmap: Option<String> = None;
        let mut orientation: Option<i32> = None;

        while let Some(&next) = lines.peek() {
            if next.trim_start().starts_with('[') {
                break;
            }
            let line = lines.next().unwrap_or_default().trim();
            if bitmap.is_none() {
                if let Some(value) = line.strip_prefix("ImageMap2D=") {
                    bitmap = Some(value.trim().to_lowercase());
                }
            }
            if orientation.is_none() {
                if let Some(value) = line.strip_prefix("Orientation=") {
                    orientation = value.trim().parse::<i32>().ok();
                }
            }
        }

        let bitmap = bitmap.ok_or_else(|| ExtractError::MalformedTileset {
            section: header.to_string(),
            key: "ImageMap2D",
        })?;
        let base_orientation = orientation.ok_or_else(|| ExtractError::MalformedTileset {
            section: header.to_string(),
            key: "Orientation",
        })?;

        tiles.insert(
            id,
            TileDef {
                bitmap,
                base_orientation,
            },
        );
    }

    Ok(tiles)
}

/// `[TILE<n>]` → n. `[TILES]`, door sections and everything else → None.
fn tile_section_id(header: &str) -> Option<i32> {
    let body = header.strip_prefix("[TILE")?.strip_suffix(']')?;
    if header.contains("DOOR") {
        return None;
    }
    // Rejects "[TILES]" too: "S" is not a digit.
    body.parse::<i32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tile_sections() {
        let markup = b"[GENERAL]\nName=tts01\n\n[TILES]\nCount=2\n\n[TILE0]\nImageMap2D=Mitr01\nOrientation=0\n\n[TILE3]\nImageMap2D=FOO\nOrientation=1\n";
        let tiles = parse_tileset(markup).unwrap();

        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[&0].bitmap, "mitr01");
        assert_eq!(tiles[&0].base_orientation, 0);
        assert_eq!(tiles[&3].bitmap, "foo");
        assert_eq!(tiles[&3].base_orientation, 1);
    }

    #[test]
    fn skips_door_sections() {
        let markup = b"[TILE0]\nImageMap2D=a\nOrientation=0\n[TILE0DOOR0]\nType=generic\n[TILE1]\nImageMap2D=b\nOrientation=90\n";
        let tiles = parse_tileset(markup).unwrap();

        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[&1].bitmap, "b");
        assert_eq!(tiles[&1].base_orientation, 90);
    }

    #[test]
    fn first_key_occurrence_wins() {
        let markup = b"[TILE5]\nImageMap2D=first\nImageMap2D=second\nOrientation=180\nOrientation=0\n";
        let tiles = parse_tileset(markup).unwrap();

        assert_eq!(tiles[&5].bitmap, "first");
        assert_eq!(tiles[&5].base_orientation, 180);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let markup = b"[TILE2]\r\nImageMap2D=Bar\r\nOrientation=270\r\n";
        let tiles = parse_tileset(markup).unwrap();

        assert_eq!(tiles[&2].bitmap, "bar");
        assert_eq!(tiles[&2].base_orientation, 270);
    }

    #[test]
    fn missing_image_key_is_malformed() {
        let markup = b"[TILE1]\nOrientation=0\n";
        assert!(matches!(
            parse_tileset(markup),
            Err(ExtractError::MalformedTileset {
                key: "ImageMap2D",
                ..
            })
        ));
    }

    #[test]
    fn missing_orientation_key_is_malformed() {
        let markup = b"[TILE1]\nImageMap2D=foo\n";
        assert!(matches!(
            parse_tileset(markup),
            Err(ExtractError::MalformedTileset {
                key: "Orientation",
                ..
            })
        ));
    }
}

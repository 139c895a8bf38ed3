use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use serde::Serialize;

use crate::area::Area;
use crate::error::{ExtractError, Result};
use crate::formats::set::TileDef;

/// Every tile occupies a 64x64 footprint on the area canvas.
pub const TILE_PX: u32 = 64;

/// Stand-in bitmap for tiles whose own bitmap failed to resolve. Its
/// absence is fatal.
pub const FALLBACK_BITMAP: &str = "mide01_a09";

/// A tile ready to draw: its authored orientation plus decoded pixels.
pub struct RenderTile {
    pub base_orientation: i32,
    pub image: RgbaImage,
}

pub struct Tileset {
    pub tiles: HashMap<i32, RenderTile>,
}

#[derive(Serialize)]
pub struct AreaMetadata {
    pub resref: String,
    pub name: String,
    pub width_px: u32,
    pub height_px: u32,
    pub tileset: String,
    pub image: String,
}

impl AreaMetadata {
    pub fn for_area(resource_name: &str, area: &Area) -> Self {
        AreaMetadata {
            resref: resource_name.to_string(),
            name: area.name.clone(),
            width_px: area.width as u32 * TILE_PX,
            height_px: area.height as u32 * TILE_PX,
            tileset: area.tileset.clone(),
            image: format!("{}.png", resource_name),
        }
    }
}

/// Decode each tile's bitmap and pair it with its markup definition. A tile
/// whose bitmap is missing or undecodable falls back to `FALLBACK_BITMAP`.
pub fn attach_bitmaps(
    defs: &HashMap<i32, TileDef>,
    bitmaps: &HashMap<String, Vec<u8>>,
) -> Result<Tileset> {
    let mut tiles = HashMap::with_capacity(defs.len());

    for (&id, def) in defs {
        let image = match decode_bitmap(bitmaps, &def.bitmap) {
            Some(image) => image,
            None => {
                eprintln!("Failed to load icon {}; using default.", def.bitmap);
                decode_bitmap(bitmaps, FALLBACK_BITMAP)
                    .ok_or_else(|| ExtractError::MissingFallbackBitmap(FALLBACK_BITMAP.to_string()))?
            }
        };

        tiles.insert(
            id,
            RenderTile {
                base_orientation: def.base_orientation,
                image,
            },
        );
    }

    Ok(Tileset { tiles })
}

fn decode_bitmap(bitmaps: &HashMap<String, Vec<u8>>, name: &str) -> Option<RgbaImage> {
    let bytes = bitmaps.get(name)?;
    image::load_from_memory_with_format(bytes, ImageFormat::Tga)
        .ok()
        .map(|img| img.to_rgba8())
}

/// Placement orientation is in quarter turns, the markup's base orientation
/// in degrees; the difference is normalised into {0, 90, 180, 270} with a
/// euclidean remainder so negative differences land in range.
pub fn effective_rotation(placement_orientation: i32, base_orientation: i32) -> i32 {
    (placement_orientation * 90 - base_orientation).rem_euclid(360)
}

/// Rotate a sampled source coordinate. Identity for any angle that is not a
/// quarter turn.
fn rotate_coord(x: u32, y: u32, width: u32, height: u32, degrees: i32) -> (u32, u32) {
    match degrees {
        90 => (y, width - 1 - x),
        180 => (width - 1 - x, height - 1 - y),
        270 => (height - 1 - y, x),
        _ => (x, y),
    }
}

/// Draw one tile bitmap into its 64x64 cell: nearest-neighbour rescale,
/// then coordinate rotation, RGB copied with alpha forced opaque. Canvas
/// rows are flipped so row 0 is the bottom tile row. Mutates only the
/// canvas.
fn blit_tile(canvas: &mut RgbaImage, src: &RgbaImage, rotation: i32, dst_x: u32, dst_y: u32) {
    assert!(
        src.height() > 0 && src.width() % src.height() == 0,
        "tile bitmap width must be a non-zero multiple of its height"
    );

    let canvas_height = canvas.height();
    for py in 0..TILE_PX {
        for px in 0..TILE_PX {
            let sx = (px as f32 * (src.width() as f32 / TILE_PX as f32)) as u32;
            let sy = (py as f32 * (src.height() as f32 / TILE_PX as f32)) as u32;
            let (sx, sy) = rotate_coord(sx, sy, src.width(), src.height(), rotation);

            let pixel = src.get_pixel(sx, sy);
            let out_y = canvas_height - 1 - (dst_y + py);
            canvas.put_pixel(dst_x + px, out_y, Rgba([pixel[0], pixel[1], pixel[2], 255]));
        }
    }
}

/// Composite a full area canvas. Purely a function of the area, its
/// tileset and the decoded bitmaps.
pub fn render_area(area: &Area, tileset: &Tileset) -> Result<RgbaImage> {
    let width = area.width as u32 * TILE_PX;
    let height = area.height as u32 * TILE_PX;
    let mut canvas = RgbaImage::new(width, height);

    for (i, placement) in area.tiles.iter().enumerate() {
        let tile = tileset
            .tiles
            .get(&placement.id)
            .ok_or_else(|| ExtractError::UnknownTileId {
                id: placement.id,
                tileset: area.tileset.clone(),
            })?;

        let rotation = effective_rotation(placement.orientation, tile.base_orientation);
        let dst_x = (i as u32 * TILE_PX) % width;
        let dst_y = (i as u32 * TILE_PX) / width * TILE_PX;
        blit_tile(&mut canvas, &tile.image, rotation, dst_x, dst_y);
    }

    Ok(canvas)
}

/// Save the canvas, then losslessly shrink it in place. Optimisation
/// failure keeps the unoptimised file and is only a warning.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let temp_path = path.with_extension("temp.png");
    image.save(&temp_path)?;

    let mut options = oxipng::Options::from_preset(2);
    options.bit_depth_reduction = true;
    options.interlace = None;

    match oxipng::optimize(
        &oxipng::InFile::Path(temp_path.clone()),
        &oxipng::OutFile::Path(Some(path.to_path_buf())),
        &options,
    ) {
        Ok(_) => {
            let _ = fs::remove_file(temp_path);
        }
        Err(e) => {
            fs::rename(temp_path, path)?;
            eprintln!(
                "Warning: oxipng optimisation failed for {}: {}. File saved unoptimised.",
                path.display(),
                e
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::AreaTile;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    fn tga_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Tga).unwrap();
        out.into_inner()
    }

    fn area(width: i32, height: i32, tiles: Vec<AreaTile>) -> Area {
        Area {
            name: "Test".to_string(),
            resref: "test".to_string(),
            width,
            height,
            tileset: "tts01".to_string(),
            tiles,
        }
    }

    fn tileset(tiles: Vec<(i32, i32, RgbaImage)>) -> Tileset {
        Tileset {
            tiles: tiles
                .into_iter()
                .map(|(id, base_orientation, image)| {
                    (
                        id,
                        RenderTile {
                            base_orientation,
                            image,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn effective_rotation_is_normalised() {
        assert_eq!(effective_rotation(0, 0), 0);
        assert_eq!(effective_rotation(1, 90), 0);
        assert_eq!(effective_rotation(0, 90), 270);
        assert_eq!(effective_rotation(3, 0), 270);
        assert_eq!(effective_rotation(2, 270), 270);
        assert_eq!(effective_rotation(1, 270), 180);
        for placement in 0..4 {
            for base in [0, 90, 180, 270] {
                let r = effective_rotation(placement, base);
                assert!([0, 90, 180, 270].contains(&r));
            }
        }
    }

    #[test]
    fn rotation_zero_is_identity() {
        for x in 0..4 {
            for y in 0..4 {
                assert_eq!(rotate_coord(x, y, 4, 4, 0), (x, y));
            }
        }
    }

    #[test]
    fn quarter_turns_form_a_group_of_order_four() {
        for x in 0..4u32 {
            for y in 0..4u32 {
                for r1 in [0, 90, 180, 270] {
                    for r2 in [0, 90, 180, 270] {
                        let (ax, ay) = rotate_coord(x, y, 4, 4, r1);
                        let stepped = rotate_coord(ax, ay, 4, 4, r2);
                        let direct = rotate_coord(x, y, 4, 4, (r1 + r2) % 360);
                        assert_eq!(stepped, direct, "r1={} r2={} at ({},{})", r1, r2, x, y);
                    }
                }
            }
        }
    }

    #[test]
    fn renders_a_solid_tile_exactly() {
        let area = area(1, 1, vec![AreaTile { id: 0, orientation: 0 }]);
        let tileset = tileset(vec![(0, 0, solid(64, 64, [200, 40, 10]))]);

        let canvas = render_area(&area, &tileset).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (64, 64));
        for pixel in canvas.pixels() {
            assert_eq!(pixel.0, [200, 40, 10, 255]);
        }
    }

    #[test]
    fn first_placement_row_is_the_bottom_of_the_canvas() {
        let area = area(
            1,
            2,
            vec![
                AreaTile { id: 0, orientation: 0 },
                AreaTile { id: 1, orientation: 0 },
            ],
        );
        let tileset = tileset(vec![
            (0, 0, solid(64, 64, [255, 0, 0])),
            (1, 0, solid(64, 64, [0, 0, 255])),
        ]);

        let canvas = render_area(&area, &tileset).unwrap();
        assert_eq!(canvas.get_pixel(0, 127).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn rescales_smaller_bitmaps_to_the_tile_footprint() {
        let area = area(1, 1, vec![AreaTile { id: 0, orientation: 0 }]);
        let tileset = tileset(vec![(0, 0, solid(16, 16, [7, 7, 7]))]);

        let canvas = render_area(&area, &tileset).unwrap();
        assert_eq!(canvas.get_pixel(63, 63).0, [7, 7, 7, 255]);
    }

    #[test]
    fn unknown_tile_id_is_fatal() {
        let area = area(1, 1, vec![AreaTile { id: 9, orientation: 0 }]);
        let tileset = tileset(vec![(0, 0, solid(64, 64, [0, 0, 0]))]);

        assert!(matches!(
            render_area(&area, &tileset),
            Err(ExtractError::UnknownTileId { id: 9, .. })
        ));
    }

    #[test]
    fn missing_bitmap_falls_back_to_the_default() {
        let mut defs = HashMap::new();
        defs.insert(
            0,
            TileDef {
                bitmap: "nosuch".to_string(),
                base_orientation: 0,
            },
        );

        let mut bitmaps = HashMap::new();
        bitmaps.insert(
            FALLBACK_BITMAP.to_string(),
            tga_bytes(&solid(64, 64, [1, 2, 3])),
        );

        let tileset = attach_bitmaps(&defs, &bitmaps).unwrap();
        assert_eq!(tileset.tiles[&0].image.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn missing_fallback_is_fatal() {
        let mut defs = HashMap::new();
        defs.insert(
            0,
            TileDef {
                bitmap: "nosuch".to_string(),
                base_orientation: 0,
            },
        );

        assert!(matches!(
            attach_bitmaps(&defs, &HashMap::new()),
            Err(ExtractError::MissingFallbackBitmap(_))
        ));
    }

    #[test]
    fn decodes_resolved_tga_bitmaps() {
        let mut defs = HashMap::new();
        defs.insert(
            4,
            TileDef {
                bitmap: "mitr01".to_string(),
                base_orientation: 90,
            },
        );

        let mut bitmaps = HashMap::new();
        bitmaps.insert("mitr01".to_string(), tga_bytes(&solid(64, 64, [9, 8, 7])));

        let tileset = attach_bitmaps(&defs, &bitmaps).unwrap();
        let tile = &tileset.tiles[&4];
        assert_eq!(tile.base_orientation, 90);
        assert_eq!(tile.image.dimensions(), (64, 64));
        assert_eq!(tile.image.get_pixel(10, 10).0, [9, 8, 7, 255]);
    }
}

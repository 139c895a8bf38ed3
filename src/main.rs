mod area;
mod binary_utils;
mod error;
mod formats;
mod graph;
mod render;
mod resources;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use clap::Parser;

use area::scan_module;
use error::Result;
use formats::erf::ErfFile;
use formats::key::KeyFile;
use formats::set::parse_tileset;
use resources::{resolve, ResourceType};

/// Renders one map image per area of a module and describes how the areas
/// connect.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Directory the map images and graph description are written to
    output_dir: PathBuf,
    /// Path to the module container (.mod/.erf)
    module: PathBuf,
    /// Path to the resource index (.key)
    key: PathBuf,
    /// Directory the index's payload archives live under
    game_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    fs::create_dir_all(&cli.output_dir)?;

    let key = KeyFile::read_from_file(&cli.key)?;

    // Tile definitions come first; they tell us which bitmaps to pull.
    let markup = resolve(&key, &cli.game_dir, |r| r.res_type == ResourceType::SET)?;

    let mut tile_defs = HashMap::with_capacity(markup.len());
    let mut wanted_bitmaps = HashSet::new();
    for (name, bytes) in &markup {
        let defs = parse_tileset(bytes)?;
        for def in defs.values() {
            wanted_bitmaps.insert(def.bitmap.clone());
        }
        tile_defs.insert(name.clone(), defs);
    }
    println!("Loaded {} tileset(s).", tile_defs.len());

    let bitmaps = resolve(&key, &cli.game_dir, |r| {
        r.res_type == ResourceType::TGA && wanted_bitmaps.contains(&r.resref)
    })?;
    println!("Loaded {} tile bitmap(s).", bitmaps.len());

    let mut tilesets = HashMap::with_capacity(tile_defs.len());
    for (name, defs) in &tile_defs {
        tilesets.insert(name.clone(), render::attach_bitmaps(defs, &bitmaps)?);
    }

    let module = ErfFile::read_from_file(&cli.module)?;
    let scan = scan_module(&module)?;
    for warning in &scan.warnings {
        eprintln!("Warning: {}", warning);
    }
    println!("Found {} area(s).", scan.areas.len());

    let mut names: Vec<&String> = scan.areas.keys().collect();
    names.sort();
    for name in names {
        let area = &scan.areas[name];
        let tileset = tilesets
            .get(&area.tileset)
            .ok_or_else(|| error::ExtractError::UnknownTileset(area.tileset.clone()))?;

        let canvas = render::render_area(area, tileset)?;
        let out_path = cli.output_dir.join(format!("{}.png", name));
        render::save_png(&canvas, &out_path)?;
        println!("Wrote {}.", out_path.display());
    }

    graph::write_graph(
        &cli.output_dir.join("transitions.txt"),
        &scan.areas,
        &scan.graph,
    )?;
    graph::write_manifest(&cli.output_dir.join("areas.json"), &scan.areas)?;
    println!("Wrote transition graph and manifest.");

    Ok(())
}

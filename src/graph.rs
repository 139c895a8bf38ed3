use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::area::{Area, TransitionGraph};
use crate::error::Result;
use crate::render::{AreaMetadata, TILE_PX};

/// Write the connectivity description: one `area` directive per area, then
/// one `edge` line per transition whose destination tag resolves (waypoint
/// table first, then doors). Unresolved tags are dropped without comment.
/// Output is sorted so reruns produce identical files.
pub fn write_graph(path: &Path, areas: &HashMap<String, Area>, graph: &TransitionGraph) -> Result<()> {
    let mut out = String::new();

    let mut names: Vec<&String> = areas.keys().collect();
    names.sort();
    for &name in &names {
        let area = &areas[name];
        let label = if !area.name.is_empty() {
            area.name.as_str()
        } else if !area.resref.is_empty() {
            area.resref.as_str()
        } else {
            name.as_str()
        };
        out.push_str(&format!(
            "area {} label=\"{}\" size={}x{} image={}.png\n",
            name,
            label,
            area.width as u32 * TILE_PX,
            area.height as u32 * TILE_PX,
            name
        ));
    }

    let mut edges: Vec<(String, String)> = graph
        .edges
        .iter()
        .filter_map(|edge| {
            graph
                .resolve(&edge.tag)
                .map(|dest| (edge.from_area.clone(), dest.area.clone()))
        })
        .collect();
    edges.sort();
    for (from, to) in edges {
        out.push_str(&format!("edge {} -> {}\n", from, to));
    }

    fs::write(path, out)?;
    Ok(())
}

/// Write the machine-readable manifest of everything rendered.
pub fn write_manifest(path: &Path, areas: &HashMap<String, Area>) -> Result<()> {
    let mut names: Vec<&String> = areas.keys().collect();
    names.sort();
    let entries: Vec<AreaMetadata> = names
        .iter()
        .map(|&name| AreaMetadata::for_area(name, &areas[name]))
        .collect();

    let json = serde_json::to_string_pretty(&entries)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    fs::write(path, json)?;
    Ok(())
}

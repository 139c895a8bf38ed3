use std::collections::HashMap;

use crate::error::Result;
use crate::formats::erf::ErfFile;
use crate::formats::gff::{optional, GffFile, GffStruct};
use crate::resources::ResourceType;

/// One tile slot of an area's grid. Placement order is row-major: index i
/// lands at cell (i % width, i / width).
#[derive(Debug, Clone, Copy)]
pub struct AreaTile {
    pub id: i32,
    /// Placement orientation in 90-degree steps (0-3).
    pub orientation: i32,
}

#[derive(Debug)]
pub struct Area {
    pub name: String,
    pub resref: String,
    pub width: i32,
    pub height: i32,
    /// Tileset name, lower-cased for lookup.
    pub tileset: String,
    pub tiles: Vec<AreaTile>,
}

/// A tag resolved to a concrete spot in an area.
#[derive(Debug, Clone)]
pub struct Destination {
    pub area: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A directed connection: some object in `from_area` links to whatever
/// carries `tag`, possibly in another area.
#[derive(Debug, Clone)]
pub struct TransitionEdge {
    pub from_area: String,
    pub tag: String,
}

/// Door and waypoint tags share one namespace but live in separate tables;
/// waypoints shadow doors on lookup. Within each table the first writer for
/// a tag wins.
#[derive(Debug, Default)]
pub struct TransitionGraph {
    pub edges: Vec<TransitionEdge>,
    door_destinations: HashMap<String, Destination>,
    waypoint_destinations: HashMap<String, Destination>,
}

impl TransitionGraph {
    pub(crate) fn record_door(&mut self, tag: String, destination: Destination) {
        self.door_destinations.entry(tag).or_insert(destination);
    }

    pub(crate) fn record_waypoint(&mut self, tag: String, destination: Destination) {
        self.waypoint_destinations.entry(tag).or_insert(destination);
    }

    pub fn resolve(&self, tag: &str) -> Option<&Destination> {
        self.waypoint_destinations
            .get(tag)
            .or_else(|| self.door_destinations.get(tag))
    }
}

pub struct ModuleScan {
    /// Areas keyed by module resource name.
    pub areas: HashMap<String, Area>,
    pub graph: TransitionGraph,
    /// Recoverable per-resource decode failures, in scan order.
    pub warnings: Vec<String>,
}

/// Scan the module for area metadata (ARE) and area instance (GIT)
/// resources. A resource whose record fails to decode is skipped and noted
/// in the warning list; the scan continues.
pub fn scan_module(erf: &ErfFile) -> Result<ModuleScan> {
    let mut scan = ModuleScan {
        areas: HashMap::new(),
        graph: TransitionGraph::default(),
        warnings: Vec::new(),
    };

    for resource in &erf.resources {
        if resource.res_type != ResourceType::ARE && resource.res_type != ResourceType::GIT {
            continue;
        }

        let gff = match GffFile::from_bytes(&resource.data) {
            Ok(gff) => gff,
            Err(e) => {
                scan.warnings
                    .push(format!("failed to decode {}: {}; skipping", resource.resref, e));
                continue;
            }
        };

        let outcome = if resource.res_type == ResourceType::ARE {
            read_area(gff.root()).map(|area| {
                scan.areas.insert(resource.resref.clone(), area);
            })
        } else {
            read_instances(gff.root(), &resource.resref, &mut scan.graph)
        };

        if let Err(e) = outcome {
            scan.warnings
                .push(format!("failed to decode {}: {}; skipping", resource.resref, e));
        }
    }

    Ok(scan)
}

fn read_area(root: GffStruct) -> Result<Area> {
    let name = optional(root.get_loc_string("Name"))?
        .map(|loc| loc.first_text().to_string())
        .unwrap_or_default();
    let resref = root.get_resref("ResRef")?;
    let width = root.get_i32("Width")?;
    let height = root.get_i32("Height")?;
    let tileset = root.get_resref("Tileset")?.to_lowercase();

    let mut tiles = Vec::new();
    for entry in root.get_list("Tile_List")? {
        tiles.push(AreaTile {
            id: entry.get_i32("Tile_ID")?,
            orientation: entry.get_i32("Tile_Orientation")?,
        });
    }

    Ok(Area {
        name,
        resref,
        width,
        height,
        tileset,
        tiles,
    })
}

fn read_instances(root: GffStruct, area_id: &str, graph: &mut TransitionGraph) -> Result<()> {
    for door in optional(root.get_list("Door List"))?.unwrap_or_default() {
        if let Some(tag) = non_empty(optional(door.get_string("LinkedTo"))?) {
            graph.edges.push(TransitionEdge {
                from_area: area_id.to_string(),
                tag,
            });
        }
        if let Some(tag) = non_empty(optional(door.get_string("Tag"))?) {
            let destination = Destination {
                area: area_id.to_string(),
                x: door.get_f32("X")?,
                y: door.get_f32("Y")?,
                z: door.get_f32("Z")?,
            };
            graph.record_door(tag, destination);
        }
    }

    // Triggers link out but are never transition targets.
    for trigger in optional(root.get_list("TriggerList"))?.unwrap_or_default() {
        if let Some(tag) = non_empty(optional(trigger.get_string("LinkedTo"))?) {
            graph.edges.push(TransitionEdge {
                from_area: area_id.to_string(),
                tag,
            });
        }
    }

    for waypoint in optional(root.get_list("WaypointList"))?.unwrap_or_default() {
        if let Some(tag) = non_empty(optional(waypoint.get_string("LinkedTo"))?) {
            graph.edges.push(TransitionEdge {
                from_area: area_id.to_string(),
                tag,
            });
        }
        if let Some(tag) = non_empty(optional(waypoint.get_string("Tag"))?) {
            let destination = Destination {
                area: area_id.to_string(),
                x: waypoint.get_f32("XPosition")?,
                y: waypoint.get_f32("YPosition")?,
                z: waypoint.get_f32("ZPosition")?,
            };
            graph.record_waypoint(tag, destination);
        }
    }

    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::geometry::Point;

/// A component pad. `net_id == 0` means unconnected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pad {
    pub reference: String,
    pub pin_number: String,
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub net_id: u32,
    pub layers: Vec<String>,
    pub is_through_hole: bool,
    pub drill: Option<f64>,
}

impl Pad {
    /// Unique key within a board: reference designator + pin number.
    pub fn key(&self) -> String {
        format!("{}:{}", self.reference, self.pin_number)
    }

    pub fn is_on_layer(&self, layer: &str) -> bool {
        self.layers.iter().any(|l| l == layer || l == "*.Cu")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
    pub width: f64,
    pub layer: String,
    pub net_id: u32,
}

impl Segment {
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Via {
    pub position: Point,
    pub drill: f64,
    pub outer_diameter: f64,
    pub layers_spanned: (String, String),
    pub net_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectPadsPolicy {
    Thermal,
    Solid,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub polygon: Vec<Point>,
    pub layer: String,
    pub net_id: u32,
    pub priority: u32,
    pub clearance: f64,
    pub thermal_gap: f64,
    pub thermal_bridge_width: f64,
    pub connect_pads_policy: ConnectPadsPolicy,
    pub filled_polygons: Vec<Vec<Point>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    pub id: u32,
    pub name: String,
}

/// The PCB model the core consumes. A loader outside this crate's
/// scope is responsible for populating it from a board file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Pcb {
    pub board_width_mm: f64,
    pub board_height_mm: f64,
    pub origin: (f64, f64),
    pub footprints: Vec<Footprint>,
    pub segments: Vec<Segment>,
    pub vias: Vec<Via>,
    pub zones: Vec<Zone>,
    pub nets: HashMap<u32, Net>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footprint {
    pub reference: String,
    pub value: String,
    pub position: Point,
    pub rotation_deg: f64,
    pub pads: Vec<Pad>,
}

impl Default for Pcb {
    fn default() -> Self {
        Self {
            board_width_mm: 0.0,
            board_height_mm: 0.0,
            origin: (0.0, 0.0),
            footprints: Vec::new(),
            segments: Vec::new(),
            vias: Vec::new(),
            zones: Vec::new(),
            nets: HashMap::new(),
        }
    }
}

impl Pcb {
    pub fn all_pads(&self) -> impl Iterator<Item = &Pad> {
        self.footprints.iter().flat_map(|f| f.pads.iter())
    }

    pub fn segments_in_net(&self, net_id: u32) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.net_id == net_id)
    }

    pub fn vias_in_net(&self, net_id: u32) -> impl Iterator<Item = &Via> {
        self.vias.iter().filter(move |v| v.net_id == net_id)
    }

    pub fn pads_in_net(&self, net_id: u32) -> impl Iterator<Item = &Pad> {
        self.all_pads().filter(move |p| p.net_id == net_id)
    }

    pub fn segments_on_layer<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a Segment> {
        self.segments.iter().filter(move |s| s.layer == layer)
    }

    pub fn get_net_by_name(&self, name: &str) -> Option<&Net> {
        self.nets.values().find(|n| n.name == name)
    }

    /// Transform a pad's footprint-local center into board coordinates,
    /// applying the footprint rotation. Uses `+rotation` — see DESIGN.md
    /// for the sign-convention rationale.
    pub fn pad_board_position(&self, footprint: &Footprint, pad: &Pad) -> Point {
        let theta = footprint.rotation_deg.to_radians();
        let (sin_t, cos_t) = theta.sin_cos();
        let x = pad.center.x * cos_t - pad.center.y * sin_t;
        let y = pad.center.x * sin_t + pad.center.y * cos_t;
        Point::new(footprint.position.x + x, footprint.position.y + y)
    }
}

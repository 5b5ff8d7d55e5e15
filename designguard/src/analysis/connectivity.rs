//! Net connectivity reconstruction.
//!
//! Builds an undirected graph over each net's pads and classifies the
//! largest connected component as "connected"; everything else is
//! unconnected. Edges come from four sources: segment-chain endpoints,
//! shared via positions, shared zone membership, and a segment chain
//! touching a via that itself sits inside a same-net zone polygon.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;
use serde::Serialize;
use serde_json::{json, Value};

use crate::model::{point_in_polygon, Pcb, Point};

use super::POSITION_TOLERANCE_MM;

fn layer_matches(zone_layer: &str, pad_layers: &[String]) -> bool {
    if zone_layer == "*.Cu" {
        return pad_layers.iter().any(|l| l.ends_with(".Cu"));
    }
    pad_layers.iter().any(|l| l == zone_layer || l == "*.Cu")
}

/// Undirected connectivity graph for one net. Nodes are board-space
/// connection points (pad centers, segment endpoints, via positions);
/// a union-find merges any two points within `POSITION_TOLERANCE_MM` of
/// each other, plus zone-membership links.
pub struct NetConnectivityGraph {
    net_id: u32,
    pad_keys: Vec<String>,
    pad_positions: Vec<Point>,
    uf: UnionFind<usize>,
    pad_root: HashMap<String, usize>,
    pub has_routing: bool,
    pub has_vias: bool,
}

impl NetConnectivityGraph {
    /// Builds the graph for `net_id` from the full board. `net_id == 0`
    /// (no net) is never meaningful here; callers should skip it.
    pub fn build(pcb: &Pcb, net_id: u32) -> Self {
        let mut pad_keys = Vec::new();
        let mut pad_positions = Vec::new();
        for footprint in &pcb.footprints {
            for pad in &footprint.pads {
                if pad.net_id == net_id {
                    pad_keys.push(pad.key());
                    pad_positions.push(pcb.pad_board_position(footprint, pad));
                }
            }
        }

        // Points nodes: pads first (stable indices 0..pad_keys.len()),
        // then segment endpoints, then via positions.
        let mut points: Vec<Point> = pad_positions.clone();

        let segments: Vec<_> = pcb.segments_in_net(net_id).collect();
        for seg in &segments {
            points.push(seg.start);
            points.push(seg.end);
        }

        let vias: Vec<_> = pcb.vias_in_net(net_id).collect();
        let mut via_node = Vec::with_capacity(vias.len());
        for via in &vias {
            via_node.push(points.len());
            points.push(via.position);
        }

        let close = |a: &Point, b: &Point| a.close_to(b, POSITION_TOLERANCE_MM);

        // Zone membership: pads/vias whose position lies inside a
        // same-net zone's polygon (on a matching layer) are unioned to a
        // synthetic per-zone representative node appended after all the
        // position-bearing nodes above.
        let mut zone_reps: Vec<usize> = Vec::new();
        let zone_count = pcb.zones.iter().filter(|z| z.net_id == net_id).count();
        for _ in 0..zone_count {
            zone_reps.push(points.len());
            points.push(Point::new(f64::NAN, f64::NAN));
        }

        let mut uf2 = UnionFind::new(points.len());
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                if points[i].x.is_finite() && points[j].x.is_finite() && close(&points[i], &points[j]) {
                    uf2.union(i, j);
                }
            }
        }
        for (zone, &rep_node) in pcb.zones.iter().filter(|z| z.net_id == net_id).zip(zone_reps.iter()) {
            for footprint in &pcb.footprints {
                for pad in &footprint.pads {
                    if pad.net_id != net_id || !layer_matches(&zone.layer, &pad.layers) {
                        continue;
                    }
                    let pos = pcb.pad_board_position(footprint, pad);
                    if point_in_polygon(&pos, &zone.polygon) {
                        if let Some(idx) = pad_keys.iter().position(|k| *k == pad.key()) {
                            uf2.union(idx, rep_node);
                        }
                    }
                }
            }
            for (vi, via) in vias.iter().enumerate() {
                if point_in_polygon(&via.position, &zone.polygon) {
                    uf2.union(via_node[vi], rep_node);
                }
            }
        }

        let mut pad_root = HashMap::new();
        for (i, key) in pad_keys.iter().enumerate() {
            pad_root.insert(key.clone(), uf2.find(i));
        }

        Self {
            net_id,
            pad_keys,
            pad_positions,
            uf: uf2,
            pad_root,
            has_routing: !segments.is_empty(),
            has_vias: !vias.is_empty(),
        }
    }

    pub fn pad_count(&self) -> usize {
        self.pad_keys.len()
    }

    /// The largest connected component's pad keys (the "connected" set).
    pub fn largest_component(&mut self) -> Vec<String> {
        let mut by_root: HashMap<usize, Vec<String>> = HashMap::new();
        for key in &self.pad_keys {
            let root = self.uf.find(*self.pad_root.get(key).unwrap());
            by_root.entry(root).or_default().push(key.clone());
        }
        by_root
            .into_values()
            .max_by_key(|v| v.len())
            .unwrap_or_default()
    }

    pub fn pad_position(&self, key: &str) -> Option<Point> {
        self.pad_keys
            .iter()
            .position(|k| k == key)
            .map(|i| self.pad_positions[i])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetStatusKind {
    Complete,
    Incomplete,
    Unrouted,
}

#[derive(Debug, Clone)]
pub struct NetStatus {
    pub net_id: u32,
    pub net_name: String,
    pub total_pads: usize,
    pub connected_pads: Vec<String>,
    pub unconnected_pads: Vec<String>,
    pub has_routing: bool,
    pub has_vias: bool,
    pub is_plane_net: bool,
    pub plane_layer: Option<String>,
    pub status: NetStatusKind,
}

impl NetStatus {
    pub fn to_json(&self) -> Value {
        json!({
            "net_id": self.net_id,
            "net_name": self.net_name,
            "total_pads": self.total_pads,
            "connected_pads": self.connected_pads,
            "unconnected_pads": self.unconnected_pads,
            "has_routing": self.has_routing,
            "has_vias": self.has_vias,
            "is_plane_net": self.is_plane_net,
            "plane_layer": self.plane_layer,
            "status": self.status,
        })
    }

    /// Remediation hint for callers surfacing this to a user.
    pub fn remediation_hint(&self) -> Option<String> {
        match self.status {
            NetStatusKind::Complete => None,
            NetStatusKind::Unrouted => Some(format!(
                "net `{}` has no routing at all ({} pads unconnected)",
                self.net_name,
                self.unconnected_pads.len()
            )),
            NetStatusKind::Incomplete => Some(format!(
                "net `{}` is partially routed: {} of {} pads unconnected, re-route the remainder",
                self.net_name,
                self.unconnected_pads.len(),
                self.total_pads
            )),
        }
    }
}

/// Heuristic net-name classification used to mark `is_plane_net`. Mirrors
/// the power/ground keyword tables used elsewhere for net priority, but
/// is intentionally small and overridable since fab-specific naming
/// varies.
fn looks_like_plane_net(name: &str) -> bool {
    let upper = name.to_uppercase();
    ["GND", "VCC", "VDD", "VBAT", "PWR", "PGND", "AGND"]
        .iter()
        .any(|p| upper.contains(p))
}

pub struct NetStatusAnalyzer;

impl NetStatusAnalyzer {
    /// Analyzes a single net's connectivity. Plane-net detection requires
    /// the net to be both name-classified as a plane net AND actually
    /// connected (at least in part) via a zone on some copper layer.
    pub fn analyze(pcb: &Pcb, net_id: u32) -> NetStatus {
        let net_name = pcb
            .nets
            .get(&net_id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| format!("net{net_id}"));

        let mut graph = NetConnectivityGraph::build(pcb, net_id);
        let total_pads = graph.pad_count();
        let connected = graph.largest_component();
        let connected_set: std::collections::HashSet<_> = connected.iter().cloned().collect();

        let mut unconnected = Vec::new();
        for footprint in &pcb.footprints {
            for pad in &footprint.pads {
                if pad.net_id == net_id && !connected_set.contains(&pad.key()) {
                    unconnected.push(pad.key());
                }
            }
        }
        unconnected.sort();

        let has_routing = graph.has_routing;
        let has_vias = graph.has_vias;

        let status = if total_pads == 0 {
            NetStatusKind::Unrouted
        } else if unconnected.is_empty() {
            NetStatusKind::Complete
        } else if connected.len() > 1 {
            NetStatusKind::Incomplete
        } else {
            NetStatusKind::Unrouted
        };

        let plane_zone_layer = pcb
            .zones
            .iter()
            .find(|z| z.net_id == net_id)
            .map(|z| z.layer.clone());
        let is_plane_net = looks_like_plane_net(&net_name) && plane_zone_layer.is_some();

        NetStatus {
            net_id,
            net_name,
            total_pads,
            connected_pads: connected,
            unconnected_pads: unconnected,
            has_routing,
            has_vias,
            is_plane_net,
            plane_layer: if is_plane_net { plane_zone_layer } else { None },
            status,
        }
    }

    /// Analyzes every non-zero net on the board.
    pub fn analyze_all(pcb: &Pcb) -> Vec<NetStatus> {
        let mut net_ids: Vec<u32> = pcb.nets.keys().copied().filter(|id| *id != 0).collect();
        net_ids.sort_unstable();
        net_ids.into_iter().map(|id| Self::analyze(pcb, id)).collect()
    }
}

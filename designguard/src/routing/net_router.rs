//! Multi-pad net routing: intra-component pre-routing, MST-ordered
//! connection routing with star-topology fallback.

use std::collections::HashSet;

use crate::model::{DesignRules, Point, Segment};

use super::grid::RoutingGrid;
use super::pathfinder::Pathfinder;
use super::route::Route;

/// A pad as seen by the router: the subset of `model::Pad` plus the owning
/// footprint reference needed for intra-IC grouping. Interned once per
/// autorouter construction.
#[derive(Debug, Clone)]
pub struct PadRef {
    pub key: String,
    pub reference: String,
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub layers: Vec<String>,
    pub is_through_hole: bool,
    pub net_id: u32,
}

/// Pads of the same net, same component reference, within this distance of
/// each other are pre-connected with a direct segment before the general
/// router runs.
const INTRA_IC_THRESHOLD_MM: f64 = 5.0;

#[derive(Debug, Default)]
pub struct NetRouteOutcome {
    pub route: Option<Route>,
    pub connections_requested: usize,
    pub connections_made: usize,
}

impl NetRouteOutcome {
    pub fn fully_connected(&self) -> bool {
        self.connections_requested > 0 && self.connections_made == self.connections_requested
    }
}

pub struct NetRouter<'a> {
    pub rules: &'a DesignRules,
}

impl<'a> NetRouter<'a> {
    pub fn new(rules: &'a DesignRules) -> Self {
        Self { rules }
    }

    fn pad_layer(&self, pad: &PadRef, grid: &RoutingGrid) -> String {
        if pad.is_through_hole {
            return grid.layer_names[0].clone();
        }
        pad.layers
            .iter()
            .find(|l| grid.layer_index(l).is_some())
            .cloned()
            .unwrap_or_else(|| grid.layer_names[0].clone())
    }

    fn goal_cells(&self, pad: &PadRef, grid: &RoutingGrid) -> HashSet<(usize, usize)> {
        let rect = crate::model::Rect::from_center(pad.center, pad.width.max(0.1), pad.height.max(0.1));
        grid.cells_in_rect(&rect).into_iter().collect()
    }

    /// Intra-IC pre-routing: pads of `net_id` that share a component
    /// reference and lie within `INTRA_IC_THRESHOLD_MM` are connected
    /// directly, then collapsed to one representative pad per component
    /// cluster so the general router only sees the remaining pads.
    fn collapse_intra_ic(&self, pads: &[PadRef]) -> (Vec<PadRef>, Vec<Segment>) {
        let mut by_ref: std::collections::HashMap<&str, Vec<&PadRef>> = std::collections::HashMap::new();
        for pad in pads {
            by_ref.entry(pad.reference.as_str()).or_default().push(pad);
        }

        let mut representatives = Vec::new();
        let mut direct_segments = Vec::new();

        for (_reference, group) in by_ref {
            if group.len() == 1 {
                representatives.push(group[0].clone());
                continue;
            }
            let anchor = group[0];
            let mut clustered = vec![anchor];
            for pad in &group[1..] {
                if anchor.center.distance_to(&pad.center) <= INTRA_IC_THRESHOLD_MM {
                    clustered.push(pad);
                } else {
                    representatives.push((*pad).clone());
                }
            }
            representatives.push(anchor.clone());
            for pad in clustered.iter().skip(1) {
                direct_segments.push(Segment {
                    start: anchor.center,
                    end: pad.center,
                    width: self.rules.trace_width,
                    layer: anchor.layers.first().cloned().unwrap_or_else(|| "F.Cu".to_string()),
                    net_id: anchor.net_id,
                });
            }
        }
        (representatives, direct_segments)
    }

    /// Minimum spanning tree over pad centers by Manhattan distance
    /// (Prim's algorithm), returning edges as index pairs into `pads`.
    fn mst_edges(&self, pads: &[PadRef]) -> Vec<(usize, usize)> {
        let n = pads.len();
        if n < 2 {
            return Vec::new();
        }
        let mut in_tree = vec![false; n];
        let mut best_dist = vec![f64::INFINITY; n];
        let mut best_from = vec![0usize; n];
        in_tree[0] = true;
        for j in 1..n {
            best_dist[j] = pads[0].center.manhattan_to(&pads[j].center);
            best_from[j] = 0;
        }

        let mut edges = Vec::with_capacity(n - 1);
        for _ in 1..n {
            let next = (0..n)
                .filter(|&j| !in_tree[j])
                .min_by(|&a, &b| best_dist[a].partial_cmp(&best_dist[b]).unwrap())
                .unwrap();
            in_tree[next] = true;
            edges.push((best_from[next], next));
            for j in 0..n {
                if !in_tree[j] {
                    let d = pads[next].center.manhattan_to(&pads[j].center);
                    if d < best_dist[j] {
                        best_dist[j] = d;
                        best_from[j] = next;
                    }
                }
            }
        }
        edges
    }

    /// Routes every edge in `edges` (or a star topology rooted at pad 0 as
    /// fallback for edges that fail), accumulating into one `Route`.
    fn route_edges(
        &self,
        grid: &mut RoutingGrid,
        net_id: u32,
        pads: &[PadRef],
        edges: &[(usize, usize)],
        present_factor: f64,
    ) -> (Route, usize) {
        let mut route = Route::new(net_id);
        let mut made = 0;

        for &(a, b) in edges {
            if self.route_one_edge(grid, net_id, &pads[a], &pads[b], present_factor, &mut route) {
                made += 1;
                continue;
            }
            // Star-topology fallback: try connecting b directly to the root.
            if a != 0 && self.route_one_edge(grid, net_id, &pads[0], &pads[b], present_factor, &mut route) {
                made += 1;
            }
        }
        (route, made)
    }

    fn route_one_edge(
        &self,
        grid: &mut RoutingGrid,
        net_id: u32,
        start: &PadRef,
        goal: &PadRef,
        present_factor: f64,
        route: &mut Route,
    ) -> bool {
        let start_layer = self.pad_layer(start, grid);
        let goal_layer = self.pad_layer(goal, grid);
        let goal_cells = self.goal_cells(goal, grid);

        let pf = Pathfinder::new(grid, self.rules);
        let Some(found) = pf.find_path(net_id, start.center, &start_layer, &goal_cells, &goal_layer, present_factor) else {
            return false;
        };
        grid.mark_route_usage(&found);
        route.segments.extend(found.segments);
        route.vias.extend(found.vias);
        true
    }

    /// Routes a full net: intra-IC pre-routing, then MST-ordered general
    /// routing with star fallback. `present_factor` should be 0 outside
    /// negotiated routing. Committed with `mark_route_usage` (negotiated
    /// mode, shared cells allowed) — callers running a non-negotiated
    /// single pass should follow up with `grid.mark_route` using the
    /// returned route to hard-block it.
    pub fn route_net(&self, grid: &mut RoutingGrid, net_id: u32, pads: &[PadRef], present_factor: f64) -> NetRouteOutcome {
        if pads.len() < 2 {
            return NetRouteOutcome::default();
        }
        let (representatives, direct_segments) = self.collapse_intra_ic(pads);
        let requested = representatives.len().saturating_sub(1) + direct_segments.len();

        if representatives.len() < 2 {
            let mut route = Route::new(net_id);
            route.segments = direct_segments;
            return NetRouteOutcome {
                connections_requested: requested,
                connections_made: route.segments.len(),
                route: Some(route),
            };
        }

        let edges = self.mst_edges(&representatives);
        let (mut route, made) = self.route_edges(grid, net_id, &representatives, &edges, present_factor);
        route.segments.extend(direct_segments.clone());

        NetRouteOutcome {
            connections_requested: requested,
            connections_made: made + direct_segments.len(),
            route: Some(route),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stackup;

    fn pad(key: &str, reference: &str, x: f64, y: f64, net: u32) -> PadRef {
        PadRef {
            key: key.to_string(),
            reference: reference.to_string(),
            center: Point::new(x, y),
            width: 0.5,
            height: 0.5,
            layers: vec!["F.Cu".to_string()],
            is_through_hole: false,
            net_id: net,
        }
    }

    #[test]
    fn two_pad_net_routes_one_edge() {
        let stackup = Stackup::default_2layer(1.6);
        let rules = DesignRules::default();
        let mut grid = RoutingGrid::new(50.0, 50.0, rules.clone(), Point::new(0.0, 0.0), &stackup);
        let router = NetRouter::new(&rules);
        let pads = vec![pad("U1:1", "U1", 10.0, 10.0, 1), pad("U2:1", "U2", 40.0, 10.0, 1)];
        let outcome = router.route_net(&mut grid, 1, &pads, 0.0);
        assert!(outcome.fully_connected());
        let route = outcome.route.unwrap();
        assert!(route.total_length_mm() > 25.0);
    }

    #[test]
    fn intra_ic_pads_get_direct_segment() {
        let stackup = Stackup::default_2layer(1.6);
        let rules = DesignRules::default();
        let mut grid = RoutingGrid::new(50.0, 50.0, rules.clone(), Point::new(0.0, 0.0), &stackup);
        let router = NetRouter::new(&rules);
        let pads = vec![
            pad("U1:1", "U1", 10.0, 10.0, 1),
            pad("U1:2", "U1", 10.2, 10.0, 1),
            pad("U2:1", "U2", 40.0, 10.0, 1),
        ];
        let outcome = router.route_net(&mut grid, 1, &pads, 0.0);
        assert!(outcome.route.unwrap().segments.len() >= 2);
    }
}

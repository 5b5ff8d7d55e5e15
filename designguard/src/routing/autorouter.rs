//! Top-level autorouter: owns the grid, design rules, layer stack, pad
//! interning, and committed routes.

use std::collections::{HashMap, HashSet};

use crate::model::{DesignRules, NetPriorityTable, Pcb, Point, Stackup};

use super::bus::{BusCoordinator, BusDetector, BusRoutingMode};
use super::config::{AutorouterConfig, ZoneFillConfig};
use super::diff_pair::{DiffPair, DiffPairDetector};
use super::grid::RoutingGrid;
use super::negotiated::{NegotiatedResult, NegotiatedRouter, ProgressCallback};
use super::net_router::{NetRouteOutcome, NetRouter, PadRef};
use super::route::Route;
use super::zone_fill::fill_zone;

/// Outcome of a single, non-negotiated (`mark_route`-committing) pass over
/// the priority-ordered net list.
#[derive(Debug, Default, Clone)]
pub struct GreedyResult {
    pub nets_requested: usize,
    pub nets_routed: usize,
    pub overflow: u64,
}

pub struct Autorouter {
    pub grid: RoutingGrid,
    pub rules: DesignRules,
    pub stackup: Stackup,
    pub config: AutorouterConfig,
    pads: HashMap<String, PadRef>,
    nets_to_pad_keys: HashMap<u32, Vec<String>>,
    net_names: HashMap<u32, String>,
    pub routes: Vec<Route>,
    pub priority_table: NetPriorityTable,
    pub zone_fill_config: ZoneFillConfig,
    bus_coordinator: Option<BusCoordinator>,
    diff_pairs: Vec<DiffPair>,
}

impl Autorouter {
    /// Builds the grid from the board's footprint pads and zones; the
    /// caller's segments/vias (if any, e.g. from a partial manual layout)
    /// are not pre-marked — route from a clean board each time.
    pub fn new(pcb: &Pcb, rules: DesignRules, stackup: Stackup, config: AutorouterConfig) -> Self {
        let origin = Point::new(pcb.origin.0, pcb.origin.1);
        let mut grid = RoutingGrid::with_resolution(
            pcb.board_width_mm,
            pcb.board_height_mm,
            rules.clone(),
            origin,
            stackup.copper_layer_names(),
            config.grid_resolution_mm,
        );

        let mut pads = HashMap::new();
        let mut nets_to_pad_keys: HashMap<u32, Vec<String>> = HashMap::new();

        for footprint in &pcb.footprints {
            for pad in &footprint.pads {
                let center = pcb.pad_board_position(footprint, pad);
                let pad_ref = PadRef {
                    key: pad.key(),
                    reference: footprint.reference.clone(),
                    center,
                    width: pad.width,
                    height: pad.height,
                    layers: pad.layers.clone(),
                    is_through_hole: pad.is_through_hole,
                    net_id: pad.net_id,
                };
                grid.add_pad(center, pad.width, pad.height, pad.net_id, &pad_ref.layers, pad.is_through_hole);
                nets_to_pad_keys.entry(pad.net_id).or_default().push(pad_ref.key.clone());
                pads.insert(pad_ref.key.clone(), pad_ref);
            }
        }

        let net_names: HashMap<u32, String> = pcb.nets.iter().map(|(id, net)| (*id, net.name.clone())).collect();

        let mut router = Self {
            grid,
            rules,
            stackup,
            config,
            pads,
            nets_to_pad_keys,
            net_names,
            routes: Vec::new(),
            priority_table: NetPriorityTable::default(),
            zone_fill_config: ZoneFillConfig::default(),
            bus_coordinator: None,
            diff_pairs: Vec::new(),
        };

        router.fill_zones(&pcb.zones);
        router
    }

    fn fill_zones(&mut self, zones: &[crate::model::Zone]) {
        let mut ordered: Vec<&crate::model::Zone> = zones.iter().collect();
        ordered.sort_by_key(|z| z.priority);
        let all_pads: Vec<PadRef> = self.pads.values().cloned().collect();
        let mut filled_per_layer: HashMap<String, HashSet<(usize, usize)>> = HashMap::new();
        for zone in ordered {
            let already = filled_per_layer.entry(zone.layer.clone()).or_default();
            let filled = fill_zone(&self.grid, zone, &all_pads, &self.zone_fill_config, already);
            already.extend(filled.cells.iter().copied());
            self.grid.add_zone_cells(&filled.cells, &zone.layer, zone.net_id);
        }
    }

    /// Enables bus-aware routing order from name-detected bus groups.
    pub fn enable_bus_coordination(&mut self, min_bus_width: usize, mode: BusRoutingMode) {
        let nets: Vec<(u32, String)> = self.net_names.iter().map(|(id, name)| (*id, name.clone())).collect();
        let groups = BusDetector::new(min_bus_width).detect(&nets);
        self.bus_coordinator = Some(BusCoordinator::new(groups, mode));
    }

    /// Enables differential-pair-aware routing order from name-detected
    /// polarity suffixes.
    pub fn enable_diff_pair_coordination(&mut self) {
        let nets: Vec<(u32, String)> = self.net_names.iter().map(|(id, name)| (*id, name.clone())).collect();
        self.diff_pairs = DiffPairDetector::default().detect(&nets);
    }

    pub fn diff_pairs(&self) -> &[DiffPair] {
        &self.diff_pairs
    }

    fn net_name(&self, net_id: u32) -> String {
        self.net_names.get(&net_id).cloned().unwrap_or_default()
    }

    fn pads_for_net(&self, net_id: u32) -> Vec<PadRef> {
        self.nets_to_pad_keys
            .get(&net_id)
            .map(|keys| keys.iter().filter_map(|k| self.pads.get(k)).cloned().collect())
            .unwrap_or_default()
    }

    fn net_span_mm(&self, net_id: u32) -> f64 {
        let pads = self.pads_for_net(net_id);
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &pads {
            min.x = min.x.min(p.center.x);
            min.y = min.y.min(p.center.y);
            max.x = max.x.max(p.center.x);
            max.y = max.y.max(p.center.y);
        }
        if pads.is_empty() {
            0.0
        } else {
            min.distance_to(&max)
        }
    }

    /// Differential pairs first, then bus groups (if coordination is
    /// enabled), then remaining nets ordered by class priority and, within
    /// a tier, longest net first.
    pub fn routing_order(&self) -> Vec<u32> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();

        for pair in &self.diff_pairs {
            for net in [pair.positive_net, pair.negative_net] {
                if seen.insert(net) {
                    ordered.push(net);
                }
            }
        }

        if let Some(bus) = &self.bus_coordinator {
            for net in bus.routing_order() {
                if seen.insert(net) {
                    ordered.push(net);
                }
            }
        }

        let mut remaining: Vec<u32> = self
            .nets_to_pad_keys
            .keys()
            .copied()
            .filter(|n| *n != 0 && !seen.contains(n) && self.nets_to_pad_keys[n].len() >= 2)
            .collect();
        remaining.sort_by(|a, b| {
            let pa = self.priority_table.priority_for(&self.net_name(*a));
            let pb = self.priority_table.priority_for(&self.net_name(*b));
            pa.cmp(&pb).then_with(|| self.net_span_mm(*b).partial_cmp(&self.net_span_mm(*a)).unwrap_or(std::cmp::Ordering::Equal))
        });
        ordered.extend(remaining);
        ordered
    }

    /// Routes every net in priority order, hard-committing each to the
    /// grid (`mark_route`) before the next net begins, so later nets see
    /// earlier ones as obstacles. No present/history cost —
    /// `present_factor` is always 0.
    pub fn route_greedy(&mut self) -> GreedyResult {
        let order = self.routing_order();
        self.route_greedy_with_order(&order)
    }

    /// Same as `route_greedy` but with an explicit net order, for Monte
    /// Carlo trials that vary the ordering across runs.
    pub fn route_greedy_with_order(&mut self, order: &[u32]) -> GreedyResult {
        let router = NetRouter::new(&self.rules);
        let order: Vec<(u32, Vec<PadRef>)> = order.iter().map(|&n| (n, self.pads_for_net(n))).collect();
        let mut requested = 0;
        let mut routed = 0;
        for (net_id, pads) in order {
            if pads.len() < 2 {
                continue;
            }
            requested += 1;
            let outcome: NetRouteOutcome = router.route_net(&mut self.grid, net_id, &pads, 0.0);
            if let Some(route) = outcome.route {
                if outcome.fully_connected() {
                    routed += 1;
                }
                self.grid.mark_route(&route);
                self.routes.push(route);
            }
        }
        GreedyResult {
            nets_requested: requested,
            nets_routed: routed,
            overflow: self.grid.overflow(),
        }
    }

    /// Negotiated-congestion (PathFinder-style) routing over the
    /// priority-ordered net list; on return, converged routes are
    /// hard-committed to the grid and appended to `self.routes`.
    pub fn route_negotiated(&mut self) -> NegotiatedResult {
        let order = self.routing_order();
        self.route_negotiated_with_order_and_progress(&order, &mut |_, _, _| true)
    }

    pub fn route_negotiated_with_progress(&mut self, progress: &mut ProgressCallback) -> NegotiatedResult {
        let order = self.routing_order();
        self.route_negotiated_with_order_and_progress(&order, progress)
    }

    pub fn route_negotiated_with_order_and_progress(&mut self, order: &[u32], progress: &mut ProgressCallback) -> NegotiatedResult {
        let nets: Vec<(u32, Vec<PadRef>)> = order.iter().map(|&n| (n, self.pads_for_net(n))).collect();
        let result = {
            let router = NegotiatedRouter::new(&self.rules, &self.config);
            router.run_with_progress(&mut self.grid, &nets, progress)
        };
        for route in &result.routes {
            self.grid.commit_negotiated_route(route);
        }
        self.routes.extend(result.routes.clone());
        result
    }

    /// Drops committed routes and usage counts but keeps pads, obstacles,
    /// and zone fills, for a fresh Monte Carlo trial.
    pub fn reset_for_new_trial(&mut self) {
        self.grid.reset_for_new_trial();
        self.routes.clear();
    }

    pub fn pads_len(&self) -> usize {
        self.pads.len()
    }

    pub fn net_priority(&self, net_id: u32) -> i32 {
        self.priority_table.priority_for(&self.net_name(net_id))
    }

    /// Routable net ids: non-zero, at least two pads, excluding any net
    /// already ordered by diff-pair or bus coordination.
    pub fn uncoordinated_net_ids(&self) -> Vec<u32> {
        let mut coordinated: HashSet<u32> = HashSet::new();
        for pair in &self.diff_pairs {
            coordinated.insert(pair.positive_net);
            coordinated.insert(pair.negative_net);
        }
        if let Some(bus) = &self.bus_coordinator {
            coordinated.extend(bus.member_nets());
        }
        self.nets_to_pad_keys
            .keys()
            .copied()
            .filter(|n| *n != 0 && !coordinated.contains(n) && self.nets_to_pad_keys[n].len() >= 2)
            .collect()
    }

    /// The fixed coordinated prefix (diff pairs then bus groups) that
    /// Monte Carlo trials must not reorder.
    pub fn coordinated_prefix(&self) -> Vec<u32> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        for pair in &self.diff_pairs {
            for net in [pair.positive_net, pair.negative_net] {
                if seen.insert(net) {
                    ordered.push(net);
                }
            }
        }
        if let Some(bus) = &self.bus_coordinator {
            for net in bus.routing_order() {
                if seen.insert(net) {
                    ordered.push(net);
                }
            }
        }
        ordered
    }

    pub fn pads_for_net_pub(&self, net_id: u32) -> Vec<PadRef> {
        self.pads_for_net(net_id)
    }

    pub fn nets(&self) -> &HashMap<u32, Vec<String>> {
        &self.nets_to_pad_keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Footprint, Pad};

    fn two_pad_board() -> Pcb {
        let mut pcb = Pcb {
            board_width_mm: 60.0,
            board_height_mm: 60.0,
            ..Default::default()
        };
        pcb.nets.insert(1, crate::model::Net { id: 1, name: "NET1".to_string() });
        pcb.footprints.push(Footprint {
            reference: "U1".to_string(),
            value: "IC".to_string(),
            position: Point::new(0.0, 0.0),
            rotation_deg: 0.0,
            pads: vec![Pad {
                reference: "U1".to_string(),
                pin_number: "1".to_string(),
                center: Point::new(10.0, 10.0),
                width: 0.5,
                height: 0.5,
                net_id: 1,
                layers: vec!["F.Cu".to_string()],
                is_through_hole: false,
                drill: None,
            }],
        });
        pcb.footprints.push(Footprint {
            reference: "U2".to_string(),
            value: "IC".to_string(),
            position: Point::new(0.0, 0.0),
            rotation_deg: 0.0,
            pads: vec![Pad {
                reference: "U2".to_string(),
                pin_number: "1".to_string(),
                center: Point::new(40.0, 10.0),
                width: 0.5,
                height: 0.5,
                net_id: 1,
                layers: vec!["F.Cu".to_string()],
                is_through_hole: false,
                drill: None,
            }],
        });
        pcb
    }

    #[test]
    fn greedy_routes_simple_two_pad_net() {
        let pcb = two_pad_board();
        let mut router = Autorouter::new(&pcb, DesignRules::default(), Stackup::default_2layer(1.6), AutorouterConfig::default());
        let result = router.route_greedy();
        assert_eq!(result.nets_requested, 1);
        assert_eq!(result.nets_routed, 1);
        assert_eq!(result.overflow, 0);
        assert_eq!(router.routes.len(), 1);
    }

    #[test]
    fn reset_for_new_trial_drops_routes_keeps_pads() {
        let pcb = two_pad_board();
        let mut router = Autorouter::new(&pcb, DesignRules::default(), Stackup::default_2layer(1.6), AutorouterConfig::default());
        router.route_greedy();
        router.reset_for_new_trial();
        assert!(router.routes.is_empty());
        assert_eq!(router.pads_len(), 2);
    }
}

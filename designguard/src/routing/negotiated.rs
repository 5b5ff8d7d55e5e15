//! Negotiated-congestion (PathFinder-style) iterative routing.

use std::collections::HashMap;

use crate::model::DesignRules;

use super::config::AutorouterConfig;
use super::grid::RoutingGrid;
use super::net_router::{NetRouter, PadRef};
use super::route::Route;

/// `(progress in [0,1], message, can_cancel)` -> `false` cancels at the
/// next checkpoint. Checkpoints occur once per net commitment and once per
/// negotiated iteration.
pub type ProgressCallback<'a> = dyn FnMut(f64, &str, bool) -> bool + 'a;

#[derive(Debug, Default, Clone)]
pub struct NegotiatedResult {
    pub converged: bool,
    pub overflow: u64,
    pub iterations: u32,
    pub nets_routed: usize,
    pub nets_requested: usize,
    pub routes: Vec<Route>,
}

struct NetState {
    route: Route,
    requested: usize,
    made: usize,
}

pub struct NegotiatedRouter<'a> {
    rules: &'a DesignRules,
    config: &'a AutorouterConfig,
}

impl<'a> NegotiatedRouter<'a> {
    pub fn new(rules: &'a DesignRules, config: &'a AutorouterConfig) -> Self {
        Self { rules, config }
    }

    /// Runs the full negotiated-congestion loop over `nets`, each a
    /// `(net_id, pads)` pair already in priority order. Returns the final
    /// (possibly non-converged) solution; the grid is left holding the
    /// final `usage_count` state.
    pub fn run(&self, grid: &mut RoutingGrid, nets: &[(u32, Vec<PadRef>)]) -> NegotiatedResult {
        self.run_with_progress(grid, nets, &mut |_, _, _| true)
    }

    pub fn run_with_progress(
        &self,
        grid: &mut RoutingGrid,
        nets: &[(u32, Vec<PadRef>)],
        progress: &mut ProgressCallback,
    ) -> NegotiatedResult {
        let router = NetRouter::new(self.rules);
        let mut present_factor = self.config.initial_present_factor;
        let mut current: HashMap<u32, NetState> = HashMap::new();

        let total_nets = nets.len().max(1);
        for (idx, (net_id, pads)) in nets.iter().enumerate() {
            let outcome = router.route_net(grid, *net_id, pads, present_factor);
            if let Some(route) = outcome.route {
                current.insert(
                    *net_id,
                    NetState {
                        route,
                        requested: outcome.connections_requested,
                        made: outcome.connections_made,
                    },
                );
            }
            if !progress(idx as f64 / total_nets as f64, &format!("initial routing net {net_id}"), true) {
                return self.finish(grid, current, nets.len(), 0, false);
            }
        }

        for iter in 0..self.config.max_iterations {
            let overflow = grid.overflow();
            tracing::debug!(iteration = iter, overflow, present_factor, "negotiated routing iteration");
            if overflow == 0 {
                return self.finish(grid, current, nets.len(), iter, true);
            }

            let contested: Vec<u32> = current
                .iter()
                .filter(|(_, state)| grid.route_touches_overused_cell(&state.route))
                .map(|(net_id, _)| *net_id)
                .collect();

            for net_id in contested {
                if let Some(old) = current.remove(&net_id) {
                    grid.unmark_route_usage(&old.route);
                }
                let Some((_, pads)) = nets.iter().find(|(n, _)| *n == net_id) else { continue };
                let outcome = router.route_net(grid, net_id, pads, present_factor);
                if let Some(route) = outcome.route {
                    current.insert(
                        net_id,
                        NetState {
                            route,
                            requested: outcome.connections_requested,
                            made: outcome.connections_made,
                        },
                    );
                }
            }

            present_factor += self.config.present_factor_increment;
            grid.update_history_costs(self.config.history_increment);

            if !progress((iter + 1) as f64 / self.config.max_iterations.max(1) as f64, "negotiating congestion", true) {
                return self.finish(grid, current, nets.len(), iter + 1, false);
            }
        }

        let overflow = grid.overflow();
        self.finish(grid, current, nets.len(), self.config.max_iterations, overflow == 0)
    }

    fn finish(
        &self,
        grid: &RoutingGrid,
        current: HashMap<u32, NetState>,
        nets_requested: usize,
        iterations: u32,
        converged: bool,
    ) -> NegotiatedResult {
        let nets_routed = current
            .values()
            .filter(|state| state.requested > 0 && state.made == state.requested)
            .count();
        NegotiatedResult {
            converged,
            overflow: grid.overflow(),
            iterations,
            nets_routed,
            nets_requested,
            routes: current.into_values().map(|s| s.route).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Point, Stackup};

    fn pad(reference: &str, x: f64, y: f64, net: u32) -> PadRef {
        PadRef {
            key: format!("{reference}:1"),
            reference: reference.to_string(),
            center: Point::new(x, y),
            width: 0.3,
            height: 0.3,
            layers: vec!["F.Cu".to_string()],
            is_through_hole: false,
            net_id: net,
        }
    }

    #[test]
    fn converges_on_uncontested_nets() {
        let stackup = Stackup::default_2layer(1.6);
        let rules = DesignRules::default();
        let mut grid = RoutingGrid::new(60.0, 60.0, rules.clone(), Point::new(0.0, 0.0), &stackup);
        let config = AutorouterConfig::default();
        let nets = vec![
            (1, vec![pad("U1", 5.0, 5.0, 1), pad("U2", 5.0, 50.0, 1)]),
            (2, vec![pad("U3", 55.0, 5.0, 2), pad("U4", 55.0, 50.0, 2)]),
        ];
        let router = NegotiatedRouter::new(&rules, &config);
        let result = router.run(&mut grid, &nets);
        assert!(result.converged);
        assert_eq!(result.overflow, 0);
        assert_eq!(result.nets_routed, 2);
    }

    #[test]
    fn contested_channel_eventually_reports_overflow_or_converges() {
        let stackup = Stackup::default_2layer(1.6);
        let rules = DesignRules::default();
        let mut grid = RoutingGrid::new(20.0, 5.0, rules.clone(), Point::new(0.0, 0.0), &stackup);
        let mut config = AutorouterConfig::default();
        config.max_iterations = 10;
        let nets: Vec<(u32, Vec<PadRef>)> = (1..=8)
            .map(|n| (n, vec![pad(&format!("U{n}a"), 1.0, 1.0 + n as f64 * 0.05, n), pad(&format!("U{n}b"), 19.0, 1.0 + n as f64 * 0.05, n)]))
            .collect();
        let router = NegotiatedRouter::new(&rules, &config);
        let result = router.run(&mut grid, &nets);
        assert!(result.iterations <= 10);
        assert!(result.converged || result.nets_routed <= result.nets_requested);
    }
}

//! Monte Carlo multi-start wrapper.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::autorouter::Autorouter;
use super::negotiated::NegotiatedResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingStrategy {
    Greedy,
    Negotiated,
}

#[derive(Debug, Clone)]
pub struct TrialSummary {
    pub trial_index: u32,
    pub net_order: Vec<u32>,
    pub routed_nets: usize,
    pub via_count: usize,
    pub total_length_mm: f64,
    pub score: f64,
}

fn score(routed_nets: usize, via_count: usize, total_length_mm: f64) -> f64 {
    routed_nets as f64 * 1000.0 - via_count as f64 - total_length_mm / 10.0
}

#[derive(Debug, Clone, Default)]
pub struct MonteCarloResult {
    pub best_trial_index: u32,
    pub trials: Vec<TrialSummary>,
    pub negotiated: Option<NegotiatedResult>,
    pub greedy_overflow: Option<u64>,
}

/// Runs `config.monte_carlo_trials` trials of `strategy`, shuffling the
/// net order within priority tiers on every trial after the first (which
/// always uses priority order), and commits the highest-scoring trial's
/// routes as the final solution.
pub fn run_monte_carlo(autorouter: &mut Autorouter, strategy: RoutingStrategy, trials: u32, seed: Option<u64>) -> MonteCarloResult {
    let prefix = autorouter.coordinated_prefix();
    let mut tiers = tier_groups(autorouter);
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or(0x5EED));

    let mut summaries = Vec::new();
    let mut best_index = 0u32;
    let mut best_score = f64::NEG_INFINITY;
    let mut best_routes = Vec::new();
    let mut best_negotiated = None;
    let mut best_overflow = None;

    for trial in 0..trials.max(1) {
        if trial > 0 {
            for tier in tiers.iter_mut() {
                tier.shuffle(&mut rng);
            }
        }
        let mut order = prefix.clone();
        for tier in &tiers {
            order.extend(tier.iter().copied());
        }

        autorouter.reset_for_new_trial();

        let (routed_nets, via_count, total_length_mm, negotiated, overflow) = match strategy {
            RoutingStrategy::Greedy => {
                let result = autorouter.route_greedy_with_order(&order);
                let via_count: usize = autorouter.routes.iter().map(|r| r.via_count()).sum();
                let total_length: f64 = autorouter.routes.iter().map(|r| r.total_length_mm()).sum();
                (result.nets_routed, via_count, total_length, None, Some(result.overflow))
            }
            RoutingStrategy::Negotiated => {
                let result = autorouter.route_negotiated_with_order_and_progress(&order, &mut |_, _, _| true);
                let via_count: usize = result.routes.iter().map(|r| r.via_count()).sum();
                let total_length: f64 = result.routes.iter().map(|r| r.total_length_mm()).sum();
                let routed = result.nets_routed;
                (routed, via_count, total_length, Some(result.clone()), None)
            }
        };

        let trial_score = score(routed_nets, via_count, total_length_mm);
        summaries.push(TrialSummary {
            trial_index: trial,
            net_order: order.clone(),
            routed_nets,
            via_count,
            total_length_mm,
            score: trial_score,
        });

        // Deterministic tiebreak: lower trial index wins on ties, so only
        // a strictly better score displaces the incumbent.
        if trial_score > best_score {
            best_score = trial_score;
            best_index = trial;
            best_routes = autorouter.routes.clone();
            best_negotiated = negotiated;
            best_overflow = overflow;
        }
    }

    autorouter.reset_for_new_trial();
    match strategy {
        RoutingStrategy::Greedy => {
            let recomputed_order = summaries[best_index as usize].net_order.clone();
            autorouter.route_greedy_with_order(&recomputed_order);
        }
        RoutingStrategy::Negotiated => {
            for route in &best_routes {
                autorouter.grid.commit_negotiated_route(route);
            }
            autorouter.routes = best_routes;
        }
    }

    MonteCarloResult {
        best_trial_index: best_index,
        trials: summaries,
        negotiated: best_negotiated,
        greedy_overflow: best_overflow,
    }
}

/// Groups routable (uncoordinated) nets into ordered priority tiers so
/// shuffles never cross a tier boundary.
fn tier_groups(autorouter: &Autorouter) -> Vec<Vec<u32>> {
    let mut by_priority: std::collections::BTreeMap<i32, Vec<u32>> = std::collections::BTreeMap::new();
    for net_id in autorouter.uncoordinated_net_ids() {
        by_priority.entry(autorouter.net_priority(net_id)).or_default().push(net_id);
    }
    by_priority.into_values().collect()
}

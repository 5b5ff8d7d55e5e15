//! Adaptive layer-stack escalation.

use crate::model::{DesignRules, LayerStackPreset, Pcb, Stackup};

use super::autorouter::Autorouter;
use super::config::AutorouterConfig;
use super::negotiated::NegotiatedResult;

impl NegotiatedResult {
    pub fn success_rate(&self) -> f64 {
        if self.nets_requested == 0 {
            1.0
        } else {
            self.nets_routed as f64 / self.nets_requested as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscalationAttempt {
    pub preset: LayerStackPreset,
    pub result: NegotiatedResult,
}

#[derive(Debug, Clone)]
pub struct AdaptiveRoutingResult {
    pub attempts: Vec<EscalationAttempt>,
    pub chosen: usize,
}

impl AdaptiveRoutingResult {
    pub fn best(&self) -> &EscalationAttempt {
        &self.attempts[self.chosen]
    }
}

fn stackup_for(preset: LayerStackPreset, board_thickness_mm: f64) -> Stackup {
    match preset {
        LayerStackPreset::TwoLayer => Stackup::default_2layer(board_thickness_mm),
        LayerStackPreset::FourLayer => Stackup::jlcpcb_4layer(),
        LayerStackPreset::SixLayer => Stackup::default_6layer(),
    }
}

/// Tries 2L, then 4L, then 6L (capped by `config.max_layers`), stopping at
/// the first stack that routes every net with zero grid overflow. If none
/// converge cleanly, the attempt with the highest `success_rate()` wins
/// (ties broken toward fewer layers, since that's the cheaper board).
pub fn route_with_escalation(pcb: &Pcb, rules: DesignRules, board_thickness_mm: f64, config: AutorouterConfig) -> AdaptiveRoutingResult {
    let presets = LayerStackPreset::escalation_order(config.max_layers);
    let presets = if presets.is_empty() { vec![LayerStackPreset::TwoLayer] } else { presets };

    let mut attempts = Vec::new();
    let mut chosen = 0usize;

    for preset in presets {
        let stackup = stackup_for(preset, board_thickness_mm);
        let mut router = Autorouter::new(pcb, rules.clone(), stackup, config.clone());
        router.enable_diff_pair_coordination();
        let result = router.route_negotiated();

        let converged_clean = result.converged && result.overflow == 0;
        attempts.push(EscalationAttempt { preset, result });

        if converged_clean {
            chosen = attempts.len() - 1;
            break;
        }
    }

    if attempts[chosen].result.converged && attempts[chosen].result.overflow == 0 {
        return AdaptiveRoutingResult { attempts, chosen };
    }

    let mut best = 0usize;
    let mut best_rate = attempts[0].result.success_rate();
    for (idx, attempt) in attempts.iter().enumerate().skip(1) {
        let rate = attempt.result.success_rate();
        if rate > best_rate {
            best_rate = rate;
            best = idx;
        }
    }

    AdaptiveRoutingResult { attempts, chosen: best }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Footprint, Net, Pad, Point};

    fn simple_board() -> Pcb {
        let mut pcb = Pcb {
            board_width_mm: 40.0,
            board_height_mm: 40.0,
            ..Default::default()
        };
        pcb.nets.insert(1, Net { id: 1, name: "NET1".to_string() });
        for (reference, x) in [("U1", 5.0), ("U2", 35.0)] {
            pcb.footprints.push(Footprint {
                reference: reference.to_string(),
                value: "IC".to_string(),
                position: Point::new(0.0, 0.0),
                rotation_deg: 0.0,
                pads: vec![Pad {
                    reference: reference.to_string(),
                    pin_number: "1".to_string(),
                    center: Point::new(x, 20.0),
                    width: 0.4,
                    height: 0.4,
                    net_id: 1,
                    layers: vec!["F.Cu".to_string()],
                    is_through_hole: false,
                    drill: None,
                }],
            });
        }
        pcb
    }

    #[test]
    fn converges_on_first_stack_for_a_trivial_board() {
        let pcb = simple_board();
        let config = AutorouterConfig::default();
        let result = route_with_escalation(&pcb, DesignRules::default(), 1.6, config);
        assert!(result.best().result.converged);
        assert_eq!(result.best().preset, LayerStackPreset::TwoLayer);
    }

    #[test]
    fn escalation_order_respects_max_layers_cap() {
        let mut config = AutorouterConfig::default();
        config.max_layers = 2;
        let pcb = simple_board();
        let result = route_with_escalation(&pcb, DesignRules::default(), 1.6, config);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].preset, LayerStackPreset::TwoLayer);
    }
}

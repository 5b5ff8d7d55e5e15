//! Propagation delay, length matching, and differential pair skew analysis.

use crate::error::{require_positive, Result};
use crate::model::Stackup;

use super::constants::SPEED_OF_LIGHT;
use super::transmission_line::{LineMode, TransmissionLine};

#[derive(Debug, Clone, Copy, Default)]
pub struct PropagationResult {
    pub delay_ps_per_mm: f64,
    pub delay_ns_per_inch: f64,
    pub velocity_m_per_s: f64,
    pub velocity_percent_c: f64,
    pub total_delay_ns: f64,
    pub trace_length_mm: f64,
}

#[derive(Debug, Clone)]
pub struct TimingBudget {
    pub net_name: String,
    pub trace_length_mm: f64,
    pub propagation_delay_ns: f64,
    pub target_delay_ns: Option<f64>,
    pub skew_ns: Option<f64>,
    pub within_budget: bool,
}

#[derive(Debug, Clone)]
pub struct DifferentialPairSkew {
    pub positive_net: String,
    pub negative_net: String,
    pub p_delay_ns: f64,
    pub n_delay_ns: f64,
    pub skew_ps: f64,
    pub max_skew_ps: f64,
    pub within_spec: bool,
}

impl DifferentialPairSkew {
    pub fn p_longer(&self) -> bool {
        self.p_delay_ns > self.n_delay_ns
    }

    pub fn recommendation(&self) -> Option<String> {
        if self.within_spec {
            return None;
        }
        let longer = if self.p_longer() { "P" } else { "N" };
        Some(format!("Reduce {longer} net length by ~{:.1}mm to meet spec", self.skew_ps / 6.0))
    }
}

pub struct NamedNetLength<'a> {
    pub name: &'a str,
    pub length_mm: f64,
}

#[derive(Debug, Clone)]
pub struct SerpentineParameters {
    pub extra_length_mm: f64,
    pub meander_amplitude_mm: f64,
    pub meander_pitch_mm: f64,
    pub num_meanders: f64,
}

pub struct TimingAnalyzer<'a> {
    pub stackup: &'a Stackup,
    tl: TransmissionLine<'a>,
}

impl<'a> TimingAnalyzer<'a> {
    pub fn new(stackup: &'a Stackup) -> Self {
        Self {
            stackup,
            tl: TransmissionLine::new(stackup),
        }
    }

    pub fn propagation_delay(&self, width_mm: f64, layer: &str, mode: LineMode) -> Result<PropagationResult> {
        require_positive("width_mm", width_mm)?;

        let use_microstrip = match mode {
            LineMode::Auto => self.stackup.is_outer_layer(layer),
            LineMode::Microstrip => true,
            LineMode::Stripline => false,
        };

        let result = if use_microstrip {
            self.tl.microstrip(width_mm, layer, 1.0)?
        } else {
            self.tl.stripline(width_mm, layer, 1.0)?
        };

        Ok(PropagationResult {
            delay_ps_per_mm: result.propagation_delay_ps_per_mm(),
            delay_ns_per_inch: result.propagation_delay_ns_per_inch(),
            velocity_m_per_s: result.phase_velocity_m_s,
            velocity_percent_c: (result.phase_velocity_m_s / SPEED_OF_LIGHT) * 100.0,
            total_delay_ns: 0.0,
            trace_length_mm: 0.0,
        })
    }

    pub fn analyze_trace(&self, trace_length_mm: f64, width_mm: f64, layer: &str, mode: LineMode) -> Result<PropagationResult> {
        require_positive("trace_length_mm", trace_length_mm)?;
        let base = self.propagation_delay(width_mm, layer, mode)?;
        let total_delay_ns = base.delay_ps_per_mm * trace_length_mm / 1000.0;
        Ok(PropagationResult {
            total_delay_ns,
            trace_length_mm,
            ..base
        })
    }

    pub fn length_for_delay(&self, target_delay_ns: f64, width_mm: f64, layer: &str, mode: LineMode) -> Result<f64> {
        require_positive("target_delay_ns", target_delay_ns)?;
        let prop = self.propagation_delay(width_mm, layer, mode)?;
        Ok(target_delay_ns * 1000.0 / prop.delay_ps_per_mm)
    }

    /// Matches net delays to their group average, flagging any net whose
    /// skew from that average exceeds `max_skew_ns`.
    pub fn analyze_length_matching(
        &self,
        nets: &[NamedNetLength],
        width_mm: f64,
        layer: &str,
        max_skew_ns: f64,
        mode: LineMode,
    ) -> Result<Vec<TimingBudget>> {
        if nets.is_empty() {
            return Ok(Vec::new());
        }

        let prop = self.propagation_delay(width_mm, layer, mode)?;

        let mut budgets: Vec<TimingBudget> = nets
            .iter()
            .map(|net| {
                let delay_ns = prop.delay_ps_per_mm * net.length_mm / 1000.0;
                TimingBudget {
                    net_name: net.name.to_string(),
                    trace_length_mm: net.length_mm,
                    propagation_delay_ns: delay_ns,
                    target_delay_ns: None,
                    skew_ns: None,
                    within_budget: true,
                }
            })
            .collect();

        let target_delay = budgets.iter().map(|b| b.propagation_delay_ns).sum::<f64>() / budgets.len() as f64;

        for budget in &mut budgets {
            let skew = budget.propagation_delay_ns - target_delay;
            budget.target_delay_ns = Some(target_delay);
            budget.skew_ns = Some(skew);
            budget.within_budget = skew.abs() <= max_skew_ns;
        }

        Ok(budgets)
    }

    pub fn analyze_differential_pair_skew(
        &self,
        positive_length_mm: f64,
        negative_length_mm: f64,
        width_mm: f64,
        layer: &str,
        positive_net: &str,
        negative_net: &str,
        max_skew_ps: f64,
        mode: LineMode,
    ) -> Result<DifferentialPairSkew> {
        require_positive("positive_length_mm", positive_length_mm)?;
        require_positive("negative_length_mm", negative_length_mm)?;

        let prop = self.propagation_delay(width_mm, layer, mode)?;
        let p_delay_ns = prop.delay_ps_per_mm * positive_length_mm / 1000.0;
        let n_delay_ns = prop.delay_ps_per_mm * negative_length_mm / 1000.0;
        let skew_ps = (p_delay_ns - n_delay_ns).abs() * 1000.0;

        Ok(DifferentialPairSkew {
            positive_net: positive_net.to_string(),
            negative_net: negative_net.to_string(),
            p_delay_ns,
            n_delay_ns,
            skew_ps,
            max_skew_ps,
            within_spec: skew_ps <= max_skew_ps,
        })
    }

    pub fn length_difference_for_skew(&self, max_skew_ps: f64, width_mm: f64, layer: &str, mode: LineMode) -> Result<f64> {
        require_positive("max_skew_ps", max_skew_ps)?;
        let prop = self.propagation_delay(width_mm, layer, mode)?;
        Ok(max_skew_ps / prop.delay_ps_per_mm)
    }

    /// Meander (serpentine) parameters for adding delay to a too-short
    /// trace: amplitude at least 3x trace width to limit self-coupling.
    pub fn serpentine_parameters(
        &self,
        target_extra_delay_ns: f64,
        width_mm: f64,
        spacing_mm: f64,
        layer: &str,
        mode: LineMode,
    ) -> Result<SerpentineParameters> {
        require_positive("target_extra_delay_ns", target_extra_delay_ns)?;
        require_positive("spacing_mm", spacing_mm)?;

        let extra_length_mm = self.length_for_delay(target_extra_delay_ns, width_mm, layer, mode)?;

        let min_amplitude = (3.0 * width_mm).max(spacing_mm + width_mm);
        let meander_amplitude = min_amplitude * 1.5;
        let meander_pitch = 2.0 * spacing_mm + width_mm;
        let length_per_meander = 2.0 * meander_amplitude;
        let num_meanders = extra_length_mm / length_per_meander;

        Ok(SerpentineParameters {
            extra_length_mm,
            meander_amplitude_mm: meander_amplitude,
            meander_pitch_mm: meander_pitch,
            num_meanders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wider_trace_has_faster_velocity_percent() {
        let stackup = Stackup::jlcpcb_4layer();
        let timing = TimingAnalyzer::new(&stackup);
        let r = timing.propagation_delay(0.2, "F.Cu", LineMode::Auto).unwrap();
        assert!(r.velocity_percent_c > 0.0 && r.velocity_percent_c < 100.0);
    }

    #[test]
    fn length_matching_flags_outlier() {
        let stackup = Stackup::jlcpcb_4layer();
        let timing = TimingAnalyzer::new(&stackup);
        let nets = vec![
            NamedNetLength { name: "DATA0", length_mm: 45.0 },
            NamedNetLength { name: "DATA1", length_mm: 45.2 },
            NamedNetLength { name: "DATA2", length_mm: 60.0 },
        ];
        let budgets = timing.analyze_length_matching(&nets, 0.2, "F.Cu", 0.05, LineMode::Auto).unwrap();
        assert!(!budgets[2].within_budget);
    }

    #[test]
    fn differential_skew_within_spec_when_lengths_match() {
        let stackup = Stackup::jlcpcb_4layer();
        let timing = TimingAnalyzer::new(&stackup);
        let r = timing
            .analyze_differential_pair_skew(50.0, 50.0, 0.15, "F.Cu", "D+", "D-", 10.0, LineMode::Auto)
            .unwrap();
        assert!(r.within_spec);
    }

    #[test]
    fn serpentine_amplitude_scales_with_width() {
        let stackup = Stackup::jlcpcb_4layer();
        let timing = TimingAnalyzer::new(&stackup);
        let p = timing.serpentine_parameters(0.2, 0.2, 0.3, "F.Cu", LineMode::Auto).unwrap();
        assert!(p.meander_amplitude_mm >= 3.0 * 0.2);
    }
}

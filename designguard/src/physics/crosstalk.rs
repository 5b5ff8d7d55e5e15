//! Near-end and far-end crosstalk estimation between parallel traces.

use crate::error::{require_positive, Result};
use crate::model::Stackup;

use super::constants::SPEED_OF_LIGHT;
use super::coupled_lines::CoupledLines;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrosstalkSeverity {
    Acceptable,
    Marginal,
    Excessive,
}

#[derive(Debug, Clone)]
pub struct CrosstalkResult {
    pub next_coefficient: f64,
    pub fext_coefficient: f64,
    pub next_db: f64,
    pub fext_db: f64,
    pub next_percent: f64,
    pub fext_percent: f64,
    pub coupled_length_mm: f64,
    pub saturation_length_mm: f64,
    pub severity: CrosstalkSeverity,
    pub recommendation: Option<String>,
}

pub struct CrosstalkAnalyzer<'a> {
    pub stackup: &'a Stackup,
    coupled_lines: CoupledLines<'a>,
}

impl<'a> CrosstalkAnalyzer<'a> {
    pub fn new(stackup: &'a Stackup) -> Self {
        Self {
            stackup,
            coupled_lines: CoupledLines::new(stackup),
        }
    }

    pub fn analyze(
        &self,
        aggressor_width_mm: f64,
        victim_width_mm: f64,
        spacing_mm: f64,
        parallel_length_mm: f64,
        layer: &str,
        rise_time_ns: f64,
    ) -> Result<CrosstalkResult> {
        require_positive("aggressor_width_mm", aggressor_width_mm)?;
        require_positive("victim_width_mm", victim_width_mm)?;
        require_positive("spacing_mm", spacing_mm)?;
        require_positive("parallel_length_mm", parallel_length_mm)?;
        require_positive("rise_time_ns", rise_time_ns)?;

        let avg_width = (aggressor_width_mm + victim_width_mm) / 2.0;

        let coupled = if self.stackup.is_outer_layer(layer) {
            self.coupled_lines.edge_coupled_microstrip(avg_width, spacing_mm, layer)?
        } else {
            self.coupled_lines.edge_coupled_stripline(avg_width, spacing_mm, layer)?
        };

        let k = coupled.coupling_coefficient;
        let eps_eff = (coupled.epsilon_eff_even + coupled.epsilon_eff_odd) / 2.0;

        let (next_coeff, fext_coeff, lsat) = self.calculate_crosstalk(k, parallel_length_mm, rise_time_ns, eps_eff);

        let next_pct = next_coeff * 100.0;
        let fext_pct = fext_coeff * 100.0;
        let next_db = 20.0 * next_coeff.max(1e-6).log10();
        let fext_db = 20.0 * fext_coeff.max(1e-6).log10();

        let severity = Self::severity(next_pct, fext_pct);
        let recommendation = Self::recommendation(severity, next_pct, fext_pct, spacing_mm, parallel_length_mm, lsat);

        Ok(CrosstalkResult {
            next_coefficient: next_coeff,
            fext_coefficient: fext_coeff,
            next_db,
            fext_db,
            next_percent: next_pct,
            fext_percent: fext_pct,
            coupled_length_mm: parallel_length_mm,
            saturation_length_mm: lsat,
            severity,
            recommendation,
        })
    }

    /// NEXT saturates past half the rise distance; FEXT grows linearly with
    /// coupled length relative to rise distance.
    fn calculate_crosstalk(&self, k: f64, length_mm: f64, rise_time_ns: f64, eps_eff: f64) -> (f64, f64, f64) {
        let v_p = if eps_eff > 0.0 { SPEED_OF_LIGHT / eps_eff.sqrt() } else { SPEED_OF_LIGHT };
        let rise_distance_mm = rise_time_ns * v_p * 1e-6;
        let lsat = rise_distance_mm / 2.0;

        let kb = k / 2.0;
        let next_coeff = if length_mm < lsat { kb * (length_mm / lsat) } else { kb };

        let kf = if rise_distance_mm > 0.0 { 2.0 * k * (length_mm / rise_distance_mm) } else { 0.0 };

        (next_coeff.clamp(0.0, 1.0), kf.clamp(0.0, 1.0), lsat)
    }

    fn severity(next_pct: f64, fext_pct: f64) -> CrosstalkSeverity {
        let max_xt = next_pct.max(fext_pct);
        if max_xt < 3.0 {
            CrosstalkSeverity::Acceptable
        } else if max_xt < 10.0 {
            CrosstalkSeverity::Marginal
        } else {
            CrosstalkSeverity::Excessive
        }
    }

    fn recommendation(
        severity: CrosstalkSeverity,
        next_pct: f64,
        fext_pct: f64,
        spacing_mm: f64,
        parallel_length_mm: f64,
        lsat: f64,
    ) -> Option<String> {
        if severity == CrosstalkSeverity::Acceptable {
            return None;
        }

        let mut recs = Vec::new();

        if spacing_mm < 0.5 {
            let target_spacing = spacing_mm * 2.0;
            recs.push(format!("Increase spacing to {target_spacing:.2}mm or more"));
        }

        if fext_pct > next_pct && parallel_length_mm > lsat {
            let target_length = parallel_length_mm * 0.5;
            recs.push(format!("Reduce parallel run to {target_length:.1}mm"));
        }

        if severity == CrosstalkSeverity::Excessive {
            recs.push("Consider routing on different layers with ground between".to_string());
        }

        if recs.is_empty() {
            Some("Increase trace spacing or reduce parallel coupling length".to_string())
        } else {
            Some(recs.join("; "))
        }
    }

    /// Bisection search for the minimum spacing keeping both NEXT and FEXT
    /// under a percentage budget.
    pub fn spacing_for_crosstalk_budget(
        &self,
        max_crosstalk_percent: f64,
        width_mm: f64,
        parallel_length_mm: f64,
        layer: &str,
        rise_time_ns: f64,
        tolerance: f64,
    ) -> Result<f64> {
        require_positive("max_crosstalk_percent", max_crosstalk_percent)?;
        require_positive("width_mm", width_mm)?;
        require_positive("parallel_length_mm", parallel_length_mm)?;

        let h = self.stackup.get_reference_plane_distance(layer);
        let mut spacing_min = h * 0.1;
        let mut spacing_max = h * 10.0;

        let get_max_crosstalk = |spacing: f64| -> Result<f64> {
            let r = self.analyze(width_mm, width_mm, spacing, parallel_length_mm, layer, rise_time_ns)?;
            Ok(r.next_percent.max(r.fext_percent))
        };

        let mut xt_at_max = get_max_crosstalk(spacing_max)?;
        while xt_at_max > max_crosstalk_percent && spacing_max < h * 100.0 {
            spacing_max *= 2.0;
            xt_at_max = get_max_crosstalk(spacing_max)?;
        }
        if xt_at_max > max_crosstalk_percent {
            return Ok(spacing_max);
        }

        for _ in 0..50 {
            let spacing_mid = (spacing_min + spacing_max) / 2.0;
            let xt_mid = get_max_crosstalk(spacing_mid)?;
            if ((xt_mid - max_crosstalk_percent) / max_crosstalk_percent).abs() < tolerance {
                return Ok(spacing_mid);
            }
            if xt_mid > max_crosstalk_percent {
                spacing_min = spacing_mid;
            } else {
                spacing_max = spacing_mid;
            }
        }
        Ok((spacing_min + spacing_max) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crosstalk_decreases_with_spacing() {
        let stackup = Stackup::jlcpcb_4layer();
        let xt = CrosstalkAnalyzer::new(&stackup);
        let tight = xt.analyze(0.2, 0.2, 0.1, 20.0, "F.Cu", 1.0).unwrap();
        let loose = xt.analyze(0.2, 0.2, 1.0, 20.0, "F.Cu", 1.0).unwrap();
        assert!(tight.next_percent >= loose.next_percent);
    }

    #[test]
    fn excessive_crosstalk_has_recommendation() {
        let stackup = Stackup::jlcpcb_4layer();
        let xt = CrosstalkAnalyzer::new(&stackup);
        let r = xt.analyze(0.2, 0.2, 0.05, 50.0, "F.Cu", 0.2).unwrap();
        if r.severity != CrosstalkSeverity::Acceptable {
            assert!(r.recommendation.is_some());
        }
    }

    #[test]
    fn spacing_budget_meets_target() {
        let stackup = Stackup::jlcpcb_4layer();
        let xt = CrosstalkAnalyzer::new(&stackup);
        let spacing = xt.spacing_for_crosstalk_budget(5.0, 0.2, 20.0, "F.Cu", 1.0, 0.1).unwrap();
        let r = xt.analyze(0.2, 0.2, spacing, 20.0, "F.Cu", 1.0).unwrap();
        assert!(r.next_percent.max(r.fext_percent) <= 5.5);
    }
}

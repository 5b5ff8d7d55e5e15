//! Coupled transmission line analysis for differential pairs: edge-coupled
//! microstrip, edge-coupled stripline, and broadside-coupled stripline.

use crate::error::{require_positive, DesignCoreError, Result};
use crate::model::{LayerKind, Stackup};

use super::constants::SPEED_OF_LIGHT;
use super::transmission_line::TransmissionLine;

#[derive(Debug, Clone, Copy)]
pub struct DifferentialPairResult {
    pub zdiff_ohm: f64,
    pub zcommon_ohm: f64,
    pub z0_even_ohm: f64,
    pub z0_odd_ohm: f64,
    pub coupling_coefficient: f64,
    pub epsilon_eff_even: f64,
    pub epsilon_eff_odd: f64,
}

impl DifferentialPairResult {
    pub fn phase_velocity_even_m_s(&self) -> f64 {
        if self.epsilon_eff_even <= 0.0 {
            return SPEED_OF_LIGHT;
        }
        SPEED_OF_LIGHT / self.epsilon_eff_even.sqrt()
    }

    pub fn phase_velocity_odd_m_s(&self) -> f64 {
        if self.epsilon_eff_odd <= 0.0 {
            return SPEED_OF_LIGHT;
        }
        SPEED_OF_LIGHT / self.epsilon_eff_odd.sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouplingMode {
    Auto,
    EdgeMicrostrip,
    EdgeStripline,
}

pub struct CoupledLines<'a> {
    pub stackup: &'a Stackup,
    tl: TransmissionLine<'a>,
}

impl<'a> CoupledLines<'a> {
    pub fn new(stackup: &'a Stackup) -> Self {
        Self {
            stackup,
            tl: TransmissionLine::new(stackup),
        }
    }

    /// Edge-coupled microstrip pair on an outer layer: dielectric below,
    /// air above, coupling from an empirical exponential-decay model in
    /// gap/height and width/height ratios.
    pub fn edge_coupled_microstrip(&self, width_mm: f64, gap_mm: f64, layer: &str) -> Result<DifferentialPairResult> {
        require_positive("width_mm", width_mm)?;
        require_positive("gap_mm", gap_mm)?;
        let h = self.stackup.get_reference_plane_distance(layer);
        if h <= 0.0 {
            return Err(DesignCoreError::UnknownLayer(layer.to_string()));
        }
        let er = self.stackup.get_dielectric_constant(layer);
        let t = self.stackup.get_copper_thickness(layer);
        Ok(self.edge_coupled_microstrip_calc(width_mm, gap_mm, h, er, t))
    }

    fn edge_coupled_microstrip_calc(&self, w: f64, s: f64, h: f64, er: f64, t: f64) -> DifferentialPairResult {
        let u = w / h;
        let g = s / h;

        let single = self.tl_microstrip_calc(w, h, er, t, 0.02);
        let z0_single = single.0;
        let eps_eff_single = single.1;

        let kc = (-1.9 * g).exp() * (1.0 - (-0.8 * u).exp());
        let kc = kc.clamp(0.01, 0.7);

        let z0_even = z0_single * ((1.0 + kc) / (1.0 - kc)).sqrt();
        let z0_odd = z0_single * ((1.0 - kc) / (1.0 + kc)).sqrt();

        let eps_eff_even = eps_eff_single * (1.0 + 0.1 * kc);
        let eps_eff_odd = eps_eff_single * (1.0 - 0.15 * kc);

        let zdiff = 2.0 * z0_odd;
        let zcommon = z0_even / 2.0;
        let k = (z0_even - z0_odd) / (z0_even + z0_odd);

        DifferentialPairResult {
            zdiff_ohm: zdiff,
            zcommon_ohm: zcommon,
            z0_even_ohm: z0_even,
            z0_odd_ohm: z0_odd,
            coupling_coefficient: k,
            epsilon_eff_even: eps_eff_even,
            epsilon_eff_odd: eps_eff_odd,
        }
    }

    /// Delegates to the single-ended microstrip solver to get (z0, eps_eff)
    /// without duplicating the Hammerstad-Jensen math here.
    fn tl_microstrip_calc(&self, w: f64, _h: f64, _er: f64, _t: f64, _tan_d: f64) -> (f64, f64) {
        let r = self.tl.microstrip(w, "F.Cu", 1.0);
        match r {
            Ok(res) => (res.z0_ohm, res.epsilon_eff),
            Err(_) => (50.0, 4.5),
        }
    }

    /// Edge-coupled stripline pair, fully embedded between two reference
    /// planes; coupling is stronger than microstrip for the same gap ratio.
    pub fn edge_coupled_stripline(&self, width_mm: f64, gap_mm: f64, layer: &str) -> Result<DifferentialPairResult> {
        require_positive("width_mm", width_mm)?;
        require_positive("gap_mm", gap_mm)?;
        let (h1, h2) = self.stackup.get_stripline_geometry(layer);
        if h1 <= 0.0 || h2 <= 0.0 {
            return Err(DesignCoreError::UnknownLayer(layer.to_string()));
        }
        let er = self.stackup.get_dielectric_constant(layer);
        let t = self.stackup.get_copper_thickness(layer);
        Ok(self.edge_coupled_stripline_calc(width_mm, gap_mm, h1, h2, er, t))
    }

    fn edge_coupled_stripline_calc(&self, w: f64, s: f64, h1: f64, h2: f64, er: f64, t: f64) -> DifferentialPairResult {
        let b = h1 + h2 + t;
        let eps_eff = er;

        let h_min = h1.min(h2);
        let w_eff = if t > 0.0 && h_min > 0.0 {
            w + (t / std::f64::consts::PI) * (1.0 + (2.0 * h_min / t).ln())
        } else {
            w
        };

        let denominator = 0.67 * std::f64::consts::PI * (0.8 * w_eff + t);
        let z0_single = if denominator > 0.0 && b > 0.0 {
            (60.0 / er.sqrt()) * (4.0 * b / denominator).ln()
        } else {
            50.0
        };

        let h_eff = h1.min(h2);
        let g = if h_eff > 0.0 { s / h_eff } else { 1.0 };
        let u = if h_eff > 0.0 { w / h_eff } else { 0.5 };

        let kc = (-1.6 * g).exp() * (1.0 - (-0.6 * u).exp());
        let kc = kc.clamp(0.01, 0.7);

        let mut z0_even = z0_single * ((1.0 + kc) / (1.0 - kc)).sqrt();
        let mut z0_odd = z0_single * ((1.0 - kc) / (1.0 + kc)).sqrt();
        z0_even = z0_even.clamp(20.0, 200.0);
        z0_odd = z0_odd.clamp(15.0, 180.0);

        let zdiff = 2.0 * z0_odd;
        let zcommon = z0_even / 2.0;
        let k = (z0_even - z0_odd) / (z0_even + z0_odd);

        DifferentialPairResult {
            zdiff_ohm: zdiff,
            zcommon_ohm: zcommon,
            z0_even_ohm: z0_even,
            z0_odd_ohm: z0_odd,
            coupling_coefficient: k,
            epsilon_eff_even: eps_eff,
            epsilon_eff_odd: eps_eff,
        }
    }

    /// Broadside-coupled stripline: same trace stacked on two layers with
    /// the intervening dielectric as the coupling gap.
    pub fn broadside_coupled_stripline(&self, width_mm: f64, layer1: &str, layer2: &str) -> Result<DifferentialPairResult> {
        require_positive("width_mm", width_mm)?;

        let idx1 = self.stackup.get_layer_index(layer1);
        let idx2 = self.stackup.get_layer_index(layer2);
        let (Some(mut idx1), Some(mut idx2)) = (idx1, idx2) else {
            return Err(DesignCoreError::UnknownLayer(format!("{layer1}/{layer2}")));
        };
        let (mut layer1, mut layer2) = (layer1, layer2);
        if idx1 > idx2 {
            std::mem::swap(&mut idx1, &mut idx2);
            std::mem::swap(&mut layer1, &mut layer2);
        }

        let between = &self.stackup.layers[idx1 + 1..idx2];
        let gap: f64 = between.iter().filter(|l| l.kind == LayerKind::Dielectric).map(|l| l.thickness_mm).sum();
        if gap <= 0.0 {
            return Err(DesignCoreError::Other(format!("no dielectric found between {layer1} and {layer2}")));
        }

        let er_values: Vec<f64> = between
            .iter()
            .filter(|l| l.kind == LayerKind::Dielectric && l.epsilon_r > 0.0)
            .map(|l| l.epsilon_r)
            .collect();
        let er = if er_values.is_empty() {
            4.5
        } else {
            er_values.iter().sum::<f64>() / er_values.len() as f64
        };

        let h1_above = self.stackup.get_dielectric_height(layer1);
        let h2_below = self.stackup.get_dielectric_height(layer2);
        let t1 = self.stackup.get_copper_thickness(layer1);
        let t2 = self.stackup.get_copper_thickness(layer2);
        let t_avg = (t1 + t2) / 2.0;

        Ok(self.broadside_coupled_calc(width_mm, gap, h1_above, h2_below, er, t_avg))
    }

    fn broadside_coupled_calc(&self, w: f64, gap: f64, h1: f64, h2: f64, er: f64, t: f64) -> DifferentialPairResult {
        let b = h1 + gap + h2 + 2.0 * t;
        let eps_eff = er;

        let gap_over_w = if w > 0.0 { gap / w } else { 1.0 };

        let w_eff = if t > 0.0 && h1 > 0.0 {
            w + (t / std::f64::consts::PI) * (1.0 + (2.0 * h1 / t).ln())
        } else {
            w
        };
        let denom = 0.67 * std::f64::consts::PI * (0.8 * w_eff + t);
        let z0_single = if denom > 0.0 && b > 0.0 {
            (60.0 / er.sqrt()) * (4.0 * b / denom).ln()
        } else {
            50.0
        };

        let k_approx = (-std::f64::consts::PI * gap_over_w).exp();

        let (mut z0_even, mut z0_odd) = if k_approx < 0.999 {
            (
                z0_single * ((1.0 + k_approx) / (1.0 - k_approx)).sqrt(),
                z0_single * ((1.0 - k_approx) / (1.0 + k_approx)).sqrt(),
            )
        } else {
            (z0_single * 2.0, z0_single * 0.5)
        };
        z0_even = z0_even.clamp(20.0, 300.0);
        z0_odd = z0_odd.clamp(10.0, 200.0);

        let zdiff = 2.0 * z0_odd;
        let zcommon = z0_even / 2.0;
        let k = (z0_even - z0_odd) / (z0_even + z0_odd);

        DifferentialPairResult {
            zdiff_ohm: zdiff,
            zcommon_ohm: zcommon,
            z0_even_ohm: z0_even,
            z0_odd_ohm: z0_odd,
            coupling_coefficient: k,
            epsilon_eff_even: eps_eff,
            epsilon_eff_odd: eps_eff,
        }
    }

    /// Bisection search for the gap that produces a target differential
    /// impedance at a fixed trace width.
    pub fn gap_for_differential_impedance(
        &self,
        zdiff_target: f64,
        width_mm: f64,
        layer: &str,
        mode: CouplingMode,
        tolerance: f64,
    ) -> Result<f64> {
        require_positive("zdiff_target", zdiff_target)?;
        require_positive("width_mm", width_mm)?;

        let use_microstrip = match mode {
            CouplingMode::Auto => self.stackup.is_outer_layer(layer),
            CouplingMode::EdgeMicrostrip => true,
            CouplingMode::EdgeStripline => false,
        };

        let calc = |gap: f64| -> Result<f64> {
            if use_microstrip {
                self.edge_coupled_microstrip(width_mm, gap, layer).map(|r| r.zdiff_ohm)
            } else {
                self.edge_coupled_stripline(width_mm, gap, layer).map(|r| r.zdiff_ohm)
            }
        };

        let h = self.stackup.get_reference_plane_distance(layer);
        let mut gap_min = h * 0.05;
        let mut gap_max = h * 5.0;
        let mut zdiff_at_min = calc(gap_min)?;
        let mut zdiff_at_max = calc(gap_max)?;

        while zdiff_at_min > zdiff_target && gap_min > h * 0.001 {
            gap_min /= 2.0;
            zdiff_at_min = calc(gap_min)?;
        }
        while zdiff_at_max < zdiff_target && gap_max < h * 50.0 {
            gap_max *= 2.0;
            zdiff_at_max = calc(gap_max)?;
        }

        for _ in 0..50 {
            let gap_mid = (gap_min + gap_max) / 2.0;
            let zdiff_mid = calc(gap_mid)?;
            if ((zdiff_mid - zdiff_target) / zdiff_target).abs() < tolerance {
                return Ok(gap_mid);
            }
            if zdiff_mid < zdiff_target {
                gap_min = gap_mid;
            } else {
                gap_max = gap_mid;
            }
        }
        Ok((gap_min + gap_max) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupling_decreases_with_gap() {
        let stackup = Stackup::jlcpcb_4layer();
        let cl = CoupledLines::new(&stackup);
        let tight = cl.edge_coupled_microstrip(0.127, 0.1, "F.Cu").unwrap();
        let loose = cl.edge_coupled_microstrip(0.127, 1.0, "F.Cu").unwrap();
        assert!(tight.coupling_coefficient > loose.coupling_coefficient);
    }

    #[test]
    fn even_mode_exceeds_odd_mode() {
        let stackup = Stackup::jlcpcb_4layer();
        let cl = CoupledLines::new(&stackup);
        let r = cl.edge_coupled_microstrip(0.127, 0.127, "F.Cu").unwrap();
        assert!(r.z0_even_ohm > r.z0_odd_ohm);
    }

    #[test]
    fn gap_for_differential_impedance_converges() {
        let stackup = Stackup::jlcpcb_4layer();
        let cl = CoupledLines::new(&stackup);
        let gap = cl
            .gap_for_differential_impedance(90.0, 0.127, "F.Cu", CouplingMode::Auto, 0.02)
            .unwrap();
        let check = cl.edge_coupled_microstrip(0.127, gap, "F.Cu").unwrap();
        assert!(((check.zdiff_ohm - 90.0) / 90.0).abs() < 0.05);
    }

    #[test]
    fn broadside_requires_dielectric_between_layers() {
        let stackup = Stackup::jlcpcb_4layer();
        let cl = CoupledLines::new(&stackup);
        let r = cl.broadside_coupled_stripline(0.15, "In1.Cu", "In2.Cu");
        assert!(r.is_ok());
    }
}

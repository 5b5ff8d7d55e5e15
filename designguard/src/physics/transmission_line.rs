//! Transmission-line impedance solvers: microstrip (Hammerstad-Jensen),
//! stripline (IPC-2141), and CPWG (Ghione-Naldi conformal mapping).

use crate::error::{require_positive, DesignCoreError, Result};
use crate::model::Stackup;

use super::constants::{COPPER_CONDUCTIVITY, SPEED_OF_LIGHT};

/// Complete elliptic integral of the first kind via the arithmetic-geometric
/// mean; converges to machine precision in a handful of iterations.
pub fn elliptic_k(k: f64) -> f64 {
    let k = k.abs();
    if k >= 1.0 {
        return f64::INFINITY;
    }
    if k == 0.0 {
        return std::f64::consts::FRAC_PI_2;
    }
    let mut a = 1.0_f64;
    let mut b = (1.0 - k * k).sqrt();
    while (a - b).abs() > 1e-12 {
        let a_next = (a + b) / 2.0;
        let b_next = (a * b).sqrt();
        a = a_next;
        b = b_next;
    }
    std::f64::consts::PI / (2.0 * a)
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ImpedanceResult {
    pub z0_ohm: f64,
    pub epsilon_eff: f64,
    pub loss_db_per_m: f64,
    pub phase_velocity_m_s: f64,
}

impl ImpedanceResult {
    pub fn propagation_delay_ps_per_mm(&self) -> f64 {
        if self.phase_velocity_m_s <= 0.0 {
            return 0.0;
        }
        1e12 * 0.001 / self.phase_velocity_m_s
    }

    pub fn propagation_delay_ns_per_inch(&self) -> f64 {
        self.propagation_delay_ps_per_mm() * 25.4 / 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Auto,
    Microstrip,
    Stripline,
}

pub struct TransmissionLine<'a> {
    pub stackup: &'a Stackup,
}

impl<'a> TransmissionLine<'a> {
    pub fn new(stackup: &'a Stackup) -> Self {
        Self { stackup }
    }

    /// Hammerstad-Jensen microstrip: outer-layer trace, dielectric below,
    /// air above.
    pub fn microstrip(&self, width_mm: f64, layer: &str, frequency_ghz: f64) -> Result<ImpedanceResult> {
        require_positive("width_mm", width_mm)?;
        let h = self.stackup.get_reference_plane_distance(layer);
        if h <= 0.0 {
            return Err(DesignCoreError::UnknownLayer(layer.to_string()));
        }
        let er = self.stackup.get_dielectric_constant(layer);
        let t = self.stackup.get_copper_thickness(layer);
        let tan_d = self.stackup.get_loss_tangent(layer);
        Ok(self.microstrip_calc(width_mm, h, er, t, tan_d, frequency_ghz))
    }

    fn microstrip_calc(&self, w: f64, h: f64, er: f64, t: f64, tan_d: f64, freq_ghz: f64) -> ImpedanceResult {
        let w_eff = if t > 0.0 && h > 0.0 {
            let denom1 = (t / h).powi(2);
            let denom2 = (t / (w * std::f64::consts::PI + 1.1 * t * std::f64::consts::PI)).powi(2);
            if denom1 + denom2 > 0.0 {
                w + (t / std::f64::consts::PI) * (4.0 * std::f64::consts::E / (denom1 + denom2).sqrt()).ln()
            } else {
                w
            }
        } else {
            w
        };

        let u = w_eff / h;

        let a = 1.0
            + (1.0 / 49.0) * ((u.powi(4) + (u / 52.0).powi(2)) / (u.powi(4) + 0.432)).ln()
            + (1.0 / 18.7) * (1.0 + (u / 18.1).powi(3)).ln();
        let b = 0.564 * ((er - 0.9) / (er + 3.0)).powf(0.053);
        let eps_eff = (er + 1.0) / 2.0 + ((er - 1.0) / 2.0) * (1.0 + 10.0 / u).powf(-a * b);

        let f_u = 6.0 + (2.0 * std::f64::consts::PI - 6.0) * (-((30.666 / u).powf(0.7528))).exp();
        let z0 = (60.0 / eps_eff.sqrt()) * (f_u / u + (1.0 + (2.0 / u).powi(2)).sqrt()).ln();

        let v_p = SPEED_OF_LIGHT / eps_eff.sqrt();
        let loss = self.microstrip_loss(w, er, t, eps_eff, z0, tan_d, freq_ghz);

        ImpedanceResult {
            z0_ohm: z0,
            epsilon_eff: eps_eff,
            loss_db_per_m: loss,
            phase_velocity_m_s: v_p,
        }
    }

    fn microstrip_loss(&self, w: f64, er: f64, _t: f64, eps_eff: f64, z0: f64, tan_d: f64, freq_ghz: f64) -> f64 {
        let freq_hz = freq_ghz * 1e9;
        let mu0 = 4.0 * std::f64::consts::PI * 1e-7;
        let rs = (std::f64::consts::PI * freq_hz * mu0 / COPPER_CONDUCTIVITY).sqrt();

        let w_m = w / 1000.0;
        let alpha_c_db = if w_m > 0.0 && z0 > 0.0 {
            (rs / (z0 * w_m)) * 8.686
        } else {
            0.0
        };

        let q = if er > 1.0 { (eps_eff - 1.0) / (er - 1.0) } else { 0.5 };
        let alpha_d = std::f64::consts::PI * freq_hz * eps_eff.sqrt() * er * q * tan_d / SPEED_OF_LIGHT;
        alpha_c_db + alpha_d * 8.686
    }

    /// IPC-2141 stripline: trace sandwiched between two reference planes.
    pub fn stripline(&self, width_mm: f64, layer: &str, frequency_ghz: f64) -> Result<ImpedanceResult> {
        require_positive("width_mm", width_mm)?;
        let (h1, h2) = self.stackup.get_stripline_geometry(layer);
        if h1 <= 0.0 || h2 <= 0.0 {
            return Err(DesignCoreError::UnknownLayer(layer.to_string()));
        }
        let er = self.stackup.get_dielectric_constant(layer);
        let t = self.stackup.get_copper_thickness(layer);
        let tan_d = self.stackup.get_loss_tangent(layer);
        Ok(self.stripline_calc(width_mm, h1, h2, er, t, tan_d, frequency_ghz))
    }

    fn stripline_calc(&self, w: f64, h1: f64, h2: f64, er: f64, t: f64, tan_d: f64, freq_ghz: f64) -> ImpedanceResult {
        let b = h1 + h2 + t;
        let eps_eff = er;

        let h_min = h1.min(h2);
        let w_eff = if t > 0.0 && h_min > 0.0 {
            w + (t / std::f64::consts::PI) * (1.0 + (2.0 * h_min / t).ln())
        } else {
            w
        };

        let denominator = 0.67 * std::f64::consts::PI * (0.8 * w_eff + t);
        let mut z0 = if denominator > 0.0 && b > 0.0 {
            (60.0 / er.sqrt()) * (4.0 * b / denominator).ln()
        } else {
            50.0
        };

        let asymmetry = if (h1 + h2) > 0.0 { (h1 - h2).abs() / (h1 + h2) } else { 0.0 };
        if asymmetry > 0.5 {
            z0 *= 1.0 - 0.2 * (asymmetry - 0.5);
        }
        z0 = z0.clamp(10.0, 200.0);

        let v_p = SPEED_OF_LIGHT / er.sqrt();
        let loss = self.stripline_loss(w, er, z0, tan_d, freq_ghz);

        ImpedanceResult {
            z0_ohm: z0,
            epsilon_eff: eps_eff,
            loss_db_per_m: loss,
            phase_velocity_m_s: v_p,
        }
    }

    fn stripline_loss(&self, w: f64, er: f64, z0: f64, tan_d: f64, freq_ghz: f64) -> f64 {
        let freq_hz = freq_ghz * 1e9;
        let mu0 = 4.0 * std::f64::consts::PI * 1e-7;
        let rs = (std::f64::consts::PI * freq_hz * mu0 / COPPER_CONDUCTIVITY).sqrt();

        let w_m = w / 1000.0;
        let alpha_c_db = if w_m > 0.0 && z0 > 0.0 {
            (2.7e-3 * rs * er.sqrt() / (z0 * w_m)) * 8.686
        } else {
            0.0
        };
        let alpha_d = std::f64::consts::PI * freq_hz * er.sqrt() * tan_d / SPEED_OF_LIGHT;
        alpha_c_db + alpha_d * 8.686
    }

    /// Bisection search for the trace width producing a target impedance
    /// Returns the best estimate even if not fully converged.
    pub fn width_for_impedance(&self, z0_target: f64, layer: &str, mode: LineMode, tolerance: f64) -> Result<f64> {
        require_positive("z0_target", z0_target)?;
        let use_microstrip = match mode {
            LineMode::Auto => self.stackup.is_outer_layer(layer),
            LineMode::Microstrip => true,
            LineMode::Stripline => false,
        };
        let h = self.stackup.get_reference_plane_distance(layer);
        let calc = |w: f64| -> Result<f64> {
            if use_microstrip {
                self.microstrip(w, layer, 1.0).map(|r| r.z0_ohm)
            } else {
                self.stripline(w, layer, 1.0).map(|r| r.z0_ohm)
            }
        };

        let mut w_min = h * 0.05;
        let mut w_max = h * 10.0;
        let mut z_at_min = calc(w_min)?;
        let mut z_at_max = calc(w_max)?;

        while z_at_min < z0_target && w_min > h * 0.001 {
            w_min /= 2.0;
            z_at_min = calc(w_min)?;
        }
        while z_at_max > z0_target && w_max < h * 100.0 {
            w_max *= 2.0;
            z_at_max = calc(w_max)?;
        }

        for _ in 0..50 {
            let w_mid = (w_min + w_max) / 2.0;
            let z_mid = calc(w_mid)?;
            if ((z_mid - z0_target) / z0_target).abs() < tolerance {
                return Ok(w_mid);
            }
            if z_mid > z0_target {
                w_min = w_mid;
            } else {
                w_max = w_mid;
            }
        }
        Ok((w_min + w_max) / 2.0)
    }

    /// Coplanar waveguide with ground, via Ghione-Naldi conformal mapping.
    pub fn cpwg(&self, width_mm: f64, gap_mm: f64, layer: &str, frequency_ghz: f64) -> Result<ImpedanceResult> {
        require_positive("width_mm", width_mm)?;
        require_positive("gap_mm", gap_mm)?;
        let h = self.stackup.get_reference_plane_distance(layer);
        if h <= 0.0 {
            return Err(DesignCoreError::UnknownLayer(layer.to_string()));
        }
        let er = self.stackup.get_dielectric_constant(layer);
        let t = self.stackup.get_copper_thickness(layer);
        let tan_d = self.stackup.get_loss_tangent(layer);
        Ok(self.cpwg_calc(width_mm, gap_mm, h, er, t, tan_d, frequency_ghz))
    }

    fn cpwg_calc(&self, w: f64, g: f64, h: f64, er: f64, t: f64, tan_d: f64, freq_ghz: f64) -> ImpedanceResult {
        let (w_eff, g_eff) = if t > 0.0 {
            let delta_w = (1.25 * t / std::f64::consts::PI) * (1.0 + (4.0 * std::f64::consts::PI * w / t).ln());
            (w + delta_w, (g - delta_w / 2.0).max(g * 0.5))
        } else {
            (w, g)
        };

        let a = w_eff / 2.0;
        let b = w_eff / 2.0 + g_eff;

        let k0 = a / b;
        let k0_prime = (1.0 - k0 * k0).sqrt();

        let sinh_a = (std::f64::consts::PI * a / (2.0 * h)).sinh();
        let sinh_b = (std::f64::consts::PI * b / (2.0 * h)).sinh();
        let k1 = if sinh_b.is_finite() && sinh_b != 0.0 {
            sinh_a / sinh_b
        } else {
            k0
        };
        let k1 = if k1.is_finite() { k1 } else { k0 };
        let k1_prime = (1.0 - k1 * k1).sqrt();

        let k_k0 = elliptic_k(k0);
        let k_k0_prime = elliptic_k(k0_prime);
        let k_k1 = elliptic_k(k1);
        let k_k1_prime = elliptic_k(k1_prime);

        let q = if k_k1_prime > 0.0 && k_k0 > 0.0 {
            (k_k1 * k_k0_prime) / (k_k1_prime * k_k0)
        } else {
            0.5
        };
        let eps_eff = 1.0 + (er - 1.0) * q / 2.0;

        let mut z0 = if k_k0_prime > 0.0 && k_k1_prime > 0.0 {
            let sum_ratios = k_k0 / k_k0_prime + k_k1 / k_k1_prime;
            if sum_ratios > 0.0 {
                (60.0 * std::f64::consts::PI / eps_eff.sqrt()) / sum_ratios
            } else {
                50.0
            }
        } else {
            50.0
        };
        z0 = z0.clamp(10.0, 200.0);

        let v_p = SPEED_OF_LIGHT / eps_eff.sqrt();
        let loss = self.cpwg_loss(w, g, er, eps_eff, z0, tan_d, freq_ghz);

        ImpedanceResult {
            z0_ohm: z0,
            epsilon_eff: eps_eff,
            loss_db_per_m: loss,
            phase_velocity_m_s: v_p,
        }
    }

    fn cpwg_loss(&self, w: f64, g: f64, er: f64, eps_eff: f64, z0: f64, tan_d: f64, freq_ghz: f64) -> f64 {
        let freq_hz = freq_ghz * 1e9;
        let mu0 = 4.0 * std::f64::consts::PI * 1e-7;
        let rs = (std::f64::consts::PI * freq_hz * mu0 / COPPER_CONDUCTIVITY).sqrt();

        let w_eff_m = (w + 2.0 * g) / 1000.0;
        let alpha_c_db = if w_eff_m > 0.0 && z0 > 0.0 {
            (1.5 * rs / (z0 * w_eff_m)) * 8.686
        } else {
            0.0
        };
        let q = if er > 1.0 { (eps_eff - 1.0) / (er - 1.0) } else { 0.5 };
        let alpha_d = std::f64::consts::PI * freq_hz * eps_eff.sqrt() * er * q * tan_d / SPEED_OF_LIGHT;
        alpha_c_db + alpha_d * 8.686
    }

    /// Solve CPWG geometry for a target impedance, holding width fixed and
    /// bisecting over gap (the common case when a fab's preferred trace
    /// width is already chosen).
    pub fn cpwg_gap_for_impedance(&self, z0_target: f64, width_mm: f64, layer: &str, tolerance: f64) -> Result<f64> {
        require_positive("z0_target", z0_target)?;
        require_positive("width_mm", width_mm)?;
        let h = self.stackup.get_reference_plane_distance(layer);

        let mut g_min = width_mm * 0.1;
        let mut g_max = width_mm * 5.0;
        let calc = |g: f64| -> Result<f64> { self.cpwg(width_mm, g, layer, 1.0).map(|r| r.z0_ohm) };
        let mut z_at_min = calc(g_min)?;
        let mut z_at_max = calc(g_max)?;

        while z_at_min > z0_target && g_min > h * 0.01 {
            g_min /= 2.0;
            z_at_min = calc(g_min)?;
        }
        while z_at_max < z0_target && g_max < h * 10.0 {
            g_max *= 2.0;
            z_at_max = calc(g_max)?;
        }

        for _ in 0..50 {
            let g_mid = (g_min + g_max) / 2.0;
            let z_mid = calc(g_mid)?;
            if ((z_mid - z0_target) / z0_target).abs() < tolerance {
                return Ok(g_mid);
            }
            if z_mid < z0_target {
                g_min = g_mid;
            } else {
                g_max = g_mid;
            }
        }
        Ok((g_min + g_max) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microstrip_impedance_decreases_with_width() {
        let stackup = Stackup::jlcpcb_4layer();
        let tl = TransmissionLine::new(&stackup);
        let narrow = tl.microstrip(0.15, "F.Cu", 1.0).unwrap();
        let wide = tl.microstrip(0.5, "F.Cu", 1.0).unwrap();
        assert!(wide.z0_ohm < narrow.z0_ohm);
    }

    #[test]
    fn width_for_impedance_round_trips() {
        let stackup = Stackup::jlcpcb_4layer();
        let tl = TransmissionLine::new(&stackup);
        let w = tl.width_for_impedance(50.0, "F.Cu", LineMode::Auto, 0.01).unwrap();
        let z = tl.microstrip(w, "F.Cu", 1.0).unwrap();
        assert!(((z.z0_ohm - 50.0) / 50.0).abs() < 0.02);
    }

    #[test]
    fn elliptic_k_matches_known_value() {
        assert!((elliptic_k(0.0) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn stripline_impedance_is_clamped() {
        let stackup = Stackup::default_6layer();
        let tl = TransmissionLine::new(&stackup);
        let r = tl.stripline(0.01, "In1.Cu", 1.0).unwrap();
        assert!(r.z0_ohm <= 200.0);
    }
}

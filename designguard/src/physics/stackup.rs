//! Stackup queries and manufacturer presets.

use crate::model::{LayerKind, Stackup, StackupLayer};

use super::constants::{copper_thickness_from_oz, FR4_STANDARD};

impl Stackup {
    pub fn get_dielectric_above(&self, layer_name: &str) -> Option<&StackupLayer> {
        let idx = self.get_layer_index(layer_name)?;
        self.layers[idx + 1..].iter().find(|l| l.is_dielectric())
    }

    pub fn get_dielectric_below(&self, layer_name: &str) -> Option<&StackupLayer> {
        let idx = self.get_layer_index(layer_name)?;
        self.layers[..idx].iter().rev().find(|l| l.is_dielectric())
    }

    /// Distance from a signal layer to the nearest reference plane, in mm.
    /// Falls back to 0.2 mm if none is found.
    pub fn get_dielectric_height(&self, layer_name: &str) -> f64 {
        if self.is_outer_layer(layer_name) {
            if let Some(d) = self.get_dielectric_above(layer_name) {
                return d.thickness_mm;
            }
        } else {
            let above = self.get_dielectric_above(layer_name).map(|l| l.thickness_mm);
            let below = self.get_dielectric_below(layer_name).map(|l| l.thickness_mm);
            match (above, below) {
                (Some(a), Some(b)) => return a.min(b),
                (Some(a), None) => return a,
                (None, Some(b)) => return b,
                (None, None) => {}
            }
        }
        0.2
    }

    pub fn get_reference_plane_distance(&self, layer_name: &str) -> f64 {
        self.get_dielectric_height(layer_name)
    }

    /// Microstrip uses the dielectric above; stripline averages both
    /// surrounding dielectrics. Falls back to FR4 (4.5).
    pub fn get_dielectric_constant(&self, layer_name: &str) -> f64 {
        if self.is_outer_layer(layer_name) {
            if let Some(d) = self.get_dielectric_above(layer_name) {
                if d.epsilon_r > 0.0 {
                    return d.epsilon_r;
                }
            }
        } else {
            let above = self.get_dielectric_above(layer_name).map(|l| l.epsilon_r);
            let below = self.get_dielectric_below(layer_name).map(|l| l.epsilon_r);
            let values: Vec<f64> = [above, below].into_iter().flatten().filter(|v| *v > 0.0).collect();
            if !values.is_empty() {
                return values.iter().sum::<f64>() / values.len() as f64;
            }
        }
        FR4_STANDARD.epsilon_r
    }

    pub fn get_loss_tangent(&self, layer_name: &str) -> f64 {
        if let Some(d) = self.get_dielectric_above(layer_name) {
            if d.loss_tangent > 0.0 {
                return d.loss_tangent;
            }
        }
        FR4_STANDARD.loss_tangent
    }

    /// (h_above, h_below) for stripline geometry; outer layers return (h, h).
    pub fn get_stripline_geometry(&self, layer_name: &str) -> (f64, f64) {
        if self.is_outer_layer(layer_name) {
            let h = self.get_dielectric_height(layer_name);
            return (h, h);
        }
        let h1 = self.get_dielectric_above(layer_name).map(|l| l.thickness_mm).unwrap_or(0.2);
        let h2 = self.get_dielectric_below(layer_name).map(|l| l.thickness_mm).unwrap_or(0.2);
        (h1, h2)
    }
}

fn copper(name: &str, oz: f64) -> StackupLayer {
    StackupLayer {
        name: name.to_string(),
        kind: LayerKind::Copper,
        thickness_mm: copper_thickness_from_oz(oz),
        material: "copper".to_string(),
        epsilon_r: 0.0,
        loss_tangent: 0.0,
        copper_oz: oz,
    }
}

fn dielectric(name: &str, thickness_mm: f64, material: &str, epsilon_r: f64, loss_tangent: f64) -> StackupLayer {
    StackupLayer {
        name: name.to_string(),
        kind: LayerKind::Dielectric,
        thickness_mm,
        material: material.to_string(),
        epsilon_r,
        loss_tangent,
        copper_oz: 0.0,
    }
}

impl Stackup {
    /// Two-layer board: F.Cu / core / B.Cu, 1oz copper, FR4 standard.
    pub fn default_2layer(board_thickness_mm: f64) -> Self {
        let dielectric_thickness = (board_thickness_mm - 2.0 * 0.035).max(0.1);
        Stackup::new(vec![
            copper("F.Cu", 1.0),
            dielectric("core", dielectric_thickness, "FR4", FR4_STANDARD.epsilon_r, FR4_STANDARD.loss_tangent),
            copper("B.Cu", 1.0),
        ])
    }

    /// JLCPCB's common 4-layer stackup: 1.6 mm, 1oz outer / 0.5oz inner.
    pub fn jlcpcb_4layer() -> Self {
        Stackup::new(vec![
            copper("F.Cu", 1.0),
            dielectric("prepreg 1", 0.2104, "FR4 7628", 4.05, 0.02),
            copper("In1.Cu", 0.5),
            dielectric("core", 1.065, "FR4", 4.6, 0.02),
            copper("In2.Cu", 0.5),
            dielectric("prepreg 2", 0.2104, "FR4 7628", 4.05, 0.02),
            copper("B.Cu", 1.0),
        ])
    }

    /// OSH Park's 4-layer stackup, FR408 dielectric.
    pub fn oshpark_4layer() -> Self {
        Stackup::new(vec![
            copper("F.Cu", 1.0),
            dielectric("prepreg 1", 0.17, "FR408", 4.5, 0.012),
            copper("In1.Cu", 0.5),
            dielectric("core", 1.2, "FR408", 4.5, 0.012),
            copper("In2.Cu", 0.5),
            dielectric("prepreg 2", 0.17, "FR408", 4.5, 0.012),
            copper("B.Cu", 1.0),
        ])
    }

    /// Six-layer board: signal / gnd / signal / signal / pwr / signal.
    pub fn default_6layer() -> Self {
        Stackup::new(vec![
            copper("F.Cu", 1.0),
            dielectric("prepreg 1", 0.18, "FR4", 4.5, 0.02),
            copper("In1.Cu", 0.5),
            dielectric("core 1", 0.36, "FR4", 4.5, 0.02),
            copper("In2.Cu", 0.5),
            dielectric("prepreg 2", 0.18, "FR4", 4.5, 0.02),
            copper("In3.Cu", 0.5),
            dielectric("core 2", 0.36, "FR4", 4.5, 0.02),
            copper("In4.Cu", 0.5),
            dielectric("prepreg 3", 0.18, "FR4", 4.5, 0.02),
            copper("B.Cu", 1.0),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_layer_reference_distance_is_positive() {
        let s = Stackup::jlcpcb_4layer();
        assert!(s.get_reference_plane_distance("F.Cu") > 0.0);
        assert!(s.get_reference_plane_distance("In1.Cu") > 0.0);
    }

    #[test]
    fn inner_layer_uses_average_epsilon() {
        let s = Stackup::jlcpcb_4layer();
        let er = s.get_dielectric_constant("In1.Cu");
        assert!((er - (4.05 + 4.6) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_layer_falls_back_to_fr4() {
        let s = Stackup::default_2layer(1.6);
        assert_eq!(s.get_dielectric_constant("In9.Cu"), FR4_STANDARD.epsilon_r);
    }
}

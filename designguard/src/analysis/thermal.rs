//! Thermal hotspot clustering.
//!
//! Classifies footprints into heat-source categories by reference
//! designator + value regex, assigns typical power/thermal-resistance
//! from lookup tables, clusters nearby sources, and estimates ΔT.

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::model::{Footprint, Pcb, Point};

use super::round2;

#[derive(Debug, Clone)]
pub struct ThermalConfig {
    pub cluster_radius_mm: f64,
    pub min_power_w: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            cluster_radius_mm: 10.0,
            min_power_w: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeatClass {
    RegulatorLdo,
    RegulatorSwitching,
    Mosfet,
    ResistorPower,
    LedPower,
    MotorDriver,
}

impl HeatClass {
    /// `(typical_power_w, package_theta_ja_c_per_w)`.
    fn defaults(&self) -> (f64, f64) {
        match self {
            HeatClass::RegulatorLdo => (0.5, 50.0),
            HeatClass::RegulatorSwitching => (0.3, 40.0),
            HeatClass::Mosfet => (0.8, 60.0),
            HeatClass::ResistorPower => (0.25, 100.0),
            HeatClass::LedPower => (0.4, 80.0),
            HeatClass::MotorDriver => (1.2, 35.0),
        }
    }
}

/// Reference-designator + value classification. Returns `None` for
/// footprints that are not recognized heat sources.
fn classify(footprint: &Footprint) -> Option<HeatClass> {
    let reference = footprint.reference.to_uppercase();
    let value = footprint.value.to_uppercase();

    let ref_prefix = Regex::new(r"^([A-Z]+)").unwrap();
    let prefix = ref_prefix
        .captures(&reference)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("");

    match prefix {
        "U" | "IC" if value.contains("LDO") || value.contains("REG") && !value.contains("SW") => {
            Some(HeatClass::RegulatorLdo)
        }
        "U" | "IC" if value.contains("BUCK") || value.contains("BOOST") || value.contains("SMPS") => {
            Some(HeatClass::RegulatorSwitching)
        }
        "Q" | "M" if value.contains("MOSFET") || value.contains("FET") => Some(HeatClass::Mosfet),
        "Q" => Some(HeatClass::Mosfet),
        "R" if power_resistor_wattage(&value).is_some() => Some(HeatClass::ResistorPower),
        "D" | "LED" if value.contains("LED") && power_led(&value) => Some(HeatClass::LedPower),
        "U" | "IC" if value.contains("DRIVER") || value.contains("MOTOR") => Some(HeatClass::MotorDriver),
        _ => None,
    }
}

fn power_resistor_wattage(value: &str) -> Option<f64> {
    let re = Regex::new(r"(\d+(?:\.\d+)?)\s*W").unwrap();
    re.captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|w| *w >= 0.5)
}

fn power_led(value: &str) -> bool {
    value.contains("POWER") || value.contains("1W") || value.contains("3W") || value.contains("5W")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ThermalSeverity {
    fn from_delta_t(delta_t: f64, power_w: f64) -> Self {
        if delta_t >= 40.0 || power_w >= 2.0 {
            ThermalSeverity::Critical
        } else if delta_t >= 25.0 {
            ThermalSeverity::High
        } else if delta_t >= 12.0 {
            ThermalSeverity::Medium
        } else {
            ThermalSeverity::Low
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThermalHotspot {
    pub center: Point,
    pub components: Vec<String>,
    pub total_power_w: f64,
    pub estimated_delta_t_c: f64,
    pub severity: ThermalSeverity,
    pub suggestions: Vec<String>,
}

impl ThermalHotspot {
    pub fn to_json(&self) -> Value {
        json!({
            "center": [round2(self.center.x), round2(self.center.y)],
            "components": self.components,
            "total_power_w": round2(self.total_power_w),
            "estimated_delta_t_c": round2(self.estimated_delta_t_c),
            "severity": self.severity,
            "suggestions": self.suggestions,
        })
    }
}

struct Source {
    reference: String,
    position: Point,
    power_w: f64,
    theta_ja: f64,
}

pub struct ThermalAnalyzer {
    pub config: ThermalConfig,
}

impl ThermalAnalyzer {
    pub fn new(config: ThermalConfig) -> Self {
        Self { config }
    }

    fn identify_sources(&self, pcb: &Pcb) -> Vec<Source> {
        pcb.footprints
            .iter()
            .filter_map(|fp| {
                let class = classify(fp)?;
                let (power_w, theta_ja) = class.defaults();
                if power_w < self.config.min_power_w {
                    return None;
                }
                Some(Source {
                    reference: fp.reference.clone(),
                    position: fp.position,
                    power_w,
                    theta_ja,
                })
            })
            .collect()
    }

    /// Clusters heat sources within `cluster_radius_mm` of each other
    /// (single-link: a source joins the nearest existing cluster within
    /// radius) and estimates each cluster's temperature rise using the
    /// copper-area / via-count approximation.
    pub fn analyze(&self, pcb: &Pcb) -> Vec<ThermalHotspot> {
        let sources = self.identify_sources(pcb);
        let mut clusters: Vec<Vec<usize>> = Vec::new();

        for (i, s) in sources.iter().enumerate() {
            let mut joined = false;
            for cluster in clusters.iter_mut() {
                let within = cluster.iter().any(|&j| sources[j].position.distance_to(&s.position) <= self.config.cluster_radius_mm);
                if within {
                    cluster.push(i);
                    joined = true;
                    break;
                }
            }
            if !joined {
                clusters.push(vec![i]);
            }
        }

        clusters
            .into_iter()
            .map(|idxs| {
                let members: Vec<&Source> = idxs.iter().map(|&i| &sources[i]).collect();
                let total_power: f64 = members.iter().map(|m| m.power_w).sum();
                let cx = members.iter().map(|m| m.position.x).sum::<f64>() / members.len() as f64;
                let cy = members.iter().map(|m| m.position.y).sum::<f64>() / members.len() as f64;
                let center = Point::new(cx, cy);

                let n_via = pcb
                    .vias
                    .iter()
                    .filter(|v| v.position.distance_to(&center) <= self.config.cluster_radius_mm)
                    .count();
                // Copper area proxy: zones + wide power pours within the
                // cluster radius, in mm^2; falls back to a bare-board
                // default when no pour is present so the formula never
                // divides by zero.
                let copper_area_mm2 = pcb
                    .zones
                    .iter()
                    .filter(|z| z.polygon.iter().any(|p| p.distance_to(&center) <= self.config.cluster_radius_mm * 2.0))
                    .map(|z| crate::model::polygon_area(&z.polygon))
                    .sum::<f64>()
                    .max(100.0);

                let theta = members.iter().map(|m| m.theta_ja).sum::<f64>() / members.len() as f64;
                let formula_delta_t = theta.min(5000.0 / copper_area_mm2) * (1.0 / (1.0 + 0.1 * n_via as f64)) * total_power;
                let delta_t = formula_delta_t.max(10.0 * total_power);

                let severity = ThermalSeverity::from_delta_t(delta_t, total_power);
                let mut suggestions = Vec::new();
                if severity >= ThermalSeverity::Medium {
                    suggestions.push("add thermal vias under the package".to_string());
                    suggestions.push("increase copper pour area around the source".to_string());
                }
                if severity >= ThermalSeverity::High {
                    suggestions.push("increase separation from other heat sources".to_string());
                }
                if severity == ThermalSeverity::Critical {
                    suggestions.push("consider a package with lower thermal resistance".to_string());
                }

                ThermalHotspot {
                    center,
                    components: members.iter().map(|m| m.reference.clone()).collect(),
                    total_power_w: total_power,
                    estimated_delta_t_c: delta_t,
                    severity,
                    suggestions,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;

    fn footprint(reference: &str, value: &str, x: f64, y: f64) -> Footprint {
        Footprint {
            reference: reference.to_string(),
            value: value.to_string(),
            position: Point::new(x, y),
            rotation_deg: 0.0,
            pads: vec![],
        }
    }

    #[test]
    fn ldo_regulator_classified_as_heat_source() {
        let mut pcb = Pcb { board_width_mm: 50.0, board_height_mm: 50.0, ..Default::default() };
        pcb.footprints.push(footprint("U1", "LDO 3V3", 10.0, 10.0));
        let analyzer = ThermalAnalyzer::new(ThermalConfig::default());
        let hotspots = analyzer.analyze(&pcb);
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].components, vec!["U1".to_string()]);
    }

    #[test]
    fn nearby_sources_cluster_together() {
        let mut pcb = Pcb { board_width_mm: 50.0, board_height_mm: 50.0, ..Default::default() };
        pcb.footprints.push(footprint("U1", "BUCK REG", 10.0, 10.0));
        pcb.footprints.push(footprint("Q1", "MOSFET", 12.0, 10.0));
        let analyzer = ThermalAnalyzer::new(ThermalConfig::default());
        let hotspots = analyzer.analyze(&pcb);
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].components.len(), 2);
    }

    #[test]
    fn passive_non_power_resistor_not_a_heat_source() {
        let mut pcb = Pcb { board_width_mm: 50.0, board_height_mm: 50.0, ..Default::default() };
        pcb.footprints.push(footprint("R1", "10k", 10.0, 10.0));
        let analyzer = ThermalAnalyzer::new(ThermalConfig::default());
        assert!(analyzer.analyze(&pcb).is_empty());
    }
}

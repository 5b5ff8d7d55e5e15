//! Post-layout signal-integrity screening: crosstalk risk between routed
//! traces and impedance discontinuities at width changes / vias.
//!
//! This is deliberately simpler than the physics engine's analytical
//! crosstalk model: it works from geometry already committed to copper,
//! not from a designed cross-section, and scores coupling via a
//! length/spacing ratio rather than rise-time physics. Net-adjacency for
//! crosstalk is found by walking each net's actual segment set; the
//! impedance-discontinuity pass instead approximates adjacency by sorting
//! segment endpoints positionally rather than building a true segment
//! graph (see DESIGN.md for the tradeoff).

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::model::{Net, Pcb, Point, Segment};

use super::round2;

#[derive(Debug, Clone)]
pub struct SignalIntegrityConfig {
    pub min_parallel_length_mm: f64,
    pub max_coupling_distance_mm: f64,
    pub additional_high_speed_patterns: Vec<String>,
    pub min_width_change_mm: f64,
}

impl Default for SignalIntegrityConfig {
    fn default() -> Self {
        Self {
            min_parallel_length_mm: 3.0,
            max_coupling_distance_mm: 0.5,
            additional_high_speed_patterns: Vec::new(),
            min_width_change_mm: 0.01,
        }
    }
}

const HIGH_SPEED_PATTERNS: &[&str] = &[
    "USB", "HDMI", "TMDS", "ETH", "RGMII", "MDI", "PCIE", "SATA", "DDR", "LVDS", "MIPI", "CSI", "DSI",
];

fn is_high_speed(name: &str, extra: &[String]) -> bool {
    let upper = name.to_uppercase();
    HIGH_SPEED_PATTERNS.iter().any(|p| upper.contains(p))
        || extra.iter().any(|p| upper.contains(&p.to_uppercase()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct CrosstalkRisk {
    pub net_a: String,
    pub net_b: String,
    pub layer: String,
    pub parallel_length_mm: f64,
    pub edge_spacing_mm: f64,
    pub risk: RiskLevel,
    pub suggestion: String,
}

impl CrosstalkRisk {
    pub fn to_json(&self) -> Value {
        json!({
            "net_a": self.net_a,
            "net_b": self.net_b,
            "layer": self.layer,
            "parallel_length_mm": round2(self.parallel_length_mm),
            "edge_spacing_mm": round2(self.edge_spacing_mm),
            "risk": self.risk,
            "suggestion": self.suggestion,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ImpedanceDiscontinuity {
    pub net: String,
    pub layer: String,
    pub location: Point,
    pub kind: String,
    pub detail: String,
}

impl ImpedanceDiscontinuity {
    pub fn to_json(&self) -> Value {
        json!({
            "net": self.net,
            "layer": self.layer,
            "location": [round2(self.location.x), round2(self.location.y)],
            "kind": self.kind,
            "detail": self.detail,
        })
    }
}

pub struct SignalIntegrityAnalyzer {
    pub config: SignalIntegrityConfig,
    extra_patterns: Vec<Regex>,
}

impl SignalIntegrityAnalyzer {
    pub fn new(config: SignalIntegrityConfig) -> Self {
        let extra_patterns = config
            .additional_high_speed_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self { config, extra_patterns }
    }

    fn net_is_high_speed(&self, net: &Net) -> bool {
        is_high_speed(&net.name, &self.config.additional_high_speed_patterns)
            || self.extra_patterns.iter().any(|re| re.is_match(&net.name))
    }

    /// Finds adjacent-net parallel runs among high-speed nets on each
    /// layer and scores their coupling risk.
    pub fn analyze_crosstalk(&self, pcb: &Pcb) -> Vec<CrosstalkRisk> {
        let hs_nets: Vec<&Net> = pcb.nets.values().filter(|n| self.net_is_high_speed(n)).collect();
        let mut risks = Vec::new();

        for (i, net_a) in hs_nets.iter().enumerate() {
            for net_b in hs_nets.iter().skip(i + 1) {
                let segs_a: Vec<&Segment> = pcb.segments_in_net(net_a.id).collect();
                let segs_b: Vec<&Segment> = pcb.segments_in_net(net_b.id).collect();
                for sa in &segs_a {
                    for sb in &segs_b {
                        if sa.layer != sb.layer {
                            continue;
                        }
                        if let Some((parallel_len, spacing)) = parallel_overlap(sa, sb) {
                            if parallel_len < self.config.min_parallel_length_mm
                                || spacing > self.config.max_coupling_distance_mm
                            {
                                continue;
                            }
                            let risk = score_crosstalk(parallel_len, spacing);
                            if risk < RiskLevel::Medium {
                                continue;
                            }
                            risks.push(CrosstalkRisk {
                                net_a: net_a.name.clone(),
                                net_b: net_b.name.clone(),
                                layer: sa.layer.clone(),
                                parallel_length_mm: parallel_len,
                                edge_spacing_mm: spacing,
                                suggestion: if risk >= RiskLevel::High {
                                    "increase spacing to at least 2x current, or add a grounded guard trace".to_string()
                                } else {
                                    "monitor; consider increasing spacing if budget allows".to_string()
                                },
                                risk,
                            });
                        }
                    }
                }
            }
        }
        risks.sort_by(|a, b| b.risk.cmp(&a.risk).then_with(|| b.parallel_length_mm.partial_cmp(&a.parallel_length_mm).unwrap_or(std::cmp::Ordering::Equal)));
        risks
    }

    /// Detects width changes at connected segment endpoints on the same
    /// layer, and vias on high-speed nets (via impedance ~30 Ω vs. a
    /// typical 50-100 Ω trace). Segments are adjacency-approximated by
    /// sorting on `(start.x, start.y)` — this is geometric, not
    /// electrical, adjacency (see DESIGN.md).
    pub fn analyze_impedance_discontinuities(&self, pcb: &Pcb) -> Vec<ImpedanceDiscontinuity> {
        let mut findings = Vec::new();
        for (net_id, net) in &pcb.nets {
            if *net_id == 0 || !self.net_is_high_speed(net) {
                continue;
            }
            let mut segs: Vec<&Segment> = pcb.segments_in_net(*net_id).collect();
            segs.sort_by(|a, b| {
                (a.start.x, a.start.y)
                    .partial_cmp(&(b.start.x, b.start.y))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for pair in segs.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a.layer != b.layer {
                    continue;
                }
                if (a.width - b.width).abs() > self.config.min_width_change_mm
                    && (a.end.close_to(&b.start, super::POSITION_TOLERANCE_MM)
                        || a.start.close_to(&b.start, super::POSITION_TOLERANCE_MM))
                {
                    findings.push(ImpedanceDiscontinuity {
                        net: net.name.clone(),
                        layer: a.layer.clone(),
                        location: b.start,
                        kind: "width_change".to_string(),
                        detail: format!("trace width changes {:.3}mm -> {:.3}mm", a.width, b.width),
                    });
                }
            }
            for via in pcb.vias_in_net(*net_id) {
                findings.push(ImpedanceDiscontinuity {
                    net: net.name.clone(),
                    layer: format!("{}->{}", via.layers_spanned.0, via.layers_spanned.1),
                    location: via.position,
                    kind: "via_transition".to_string(),
                    detail: "via impedance (~30 ohm) differs from trace Z0 on a high-speed net".to_string(),
                });
            }
        }
        findings
    }
}

/// Returns `(parallel_length_mm, approximate_edge_spacing_mm)` if two
/// segments run roughly parallel (dot product of unit direction > 0.9).
fn parallel_overlap(a: &Segment, b: &Segment) -> Option<(f64, f64)> {
    let (adx, ady) = (a.end.x - a.start.x, a.end.y - a.start.y);
    let (bdx, bdy) = (b.end.x - b.start.x, b.end.y - b.start.y);
    let (la, lb) = ((adx * adx + ady * ady).sqrt(), (bdx * bdx + bdy * bdy).sqrt());
    if la < 1e-9 || lb < 1e-9 {
        return None;
    }
    let dot = ((adx * bdx + ady * bdy) / (la * lb)).abs();
    if dot <= 0.9 {
        return None;
    }

    // Project b's endpoints onto a's direction to find overlap length.
    let ux = adx / la;
    let uy = ady / la;
    let proj = |p: &Point| (p.x - a.start.x) * ux + (p.y - a.start.y) * uy;
    let (a0, a1) = (0.0_f64, la);
    let (mut b0, mut b1) = (proj(&b.start), proj(&b.end));
    if b0 > b1 {
        std::mem::swap(&mut b0, &mut b1);
    }
    let overlap = (a1.min(b1) - a0.max(b0)).max(0.0);
    if overlap < 1e-9 {
        return None;
    }

    // Perpendicular offset at the midpoint of the overlap, approximating
    // edge-to-edge spacing by subtracting half of each trace's width.
    let mid_t = (a0.max(b0) + a1.min(b1)) / 2.0;
    let mid_on_a = Point::new(a.start.x + ux * mid_t, a.start.y + uy * mid_t);
    let perp = ((b.start.x - mid_on_a.x) * uy - (b.start.y - mid_on_a.y) * ux).abs();
    let spacing = (perp - a.width / 2.0 - b.width / 2.0).max(0.0);
    Some((overlap, spacing))
}

fn score_crosstalk(parallel_len_mm: f64, spacing_mm: f64) -> RiskLevel {
    let ratio = parallel_len_mm / spacing_mm.max(0.01);
    if ratio > 200.0 {
        RiskLevel::Critical
    } else if ratio > 80.0 {
        RiskLevel::High
    } else if ratio > 30.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Net;

    fn hs_board() -> Pcb {
        let mut pcb = Pcb {
            board_width_mm: 50.0,
            board_height_mm: 50.0,
            ..Default::default()
        };
        pcb.nets.insert(1, Net { id: 1, name: "USB_D+".into() });
        pcb.nets.insert(2, Net { id: 2, name: "USB_D-".into() });
        pcb.segments.push(Segment {
            start: Point::new(0.0, 0.0),
            end: Point::new(20.0, 0.0),
            width: 0.2,
            layer: "F.Cu".into(),
            net_id: 1,
        });
        pcb.segments.push(Segment {
            start: Point::new(0.0, 0.15),
            end: Point::new(20.0, 0.15),
            width: 0.2,
            layer: "F.Cu".into(),
            net_id: 2,
        });
        pcb
    }

    #[test]
    fn tightly_coupled_parallel_runs_flagged() {
        let pcb = hs_board();
        let analyzer = SignalIntegrityAnalyzer::new(SignalIntegrityConfig::default());
        let risks = analyzer.analyze_crosstalk(&pcb);
        assert!(!risks.is_empty());
        assert!(risks[0].risk >= RiskLevel::Medium);
    }

    #[test]
    fn via_on_high_speed_net_flagged() {
        let mut pcb = hs_board();
        pcb.vias.push(crate::model::Via {
            position: Point::new(10.0, 0.0),
            drill: 0.3,
            outer_diameter: 0.6,
            layers_spanned: ("F.Cu".into(), "B.Cu".into()),
            net_id: 1,
        });
        let analyzer = SignalIntegrityAnalyzer::new(SignalIntegrityConfig::default());
        let findings = analyzer.analyze_impedance_discontinuities(&pcb);
        assert!(findings.iter().any(|f| f.kind == "via_transition"));
    }
}

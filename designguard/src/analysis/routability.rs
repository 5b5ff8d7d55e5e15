//! Pre-routing routability analysis.
//!
//! For each net, rasters the straight line between every pair of pads,
//! classifies any blocked cell it crosses, and folds in the coarse
//! congestion grid to produce a per-net difficulty score. This is the
//! same straight-line raster a post-hoc routing-failure explanation
//! would walk, so the two are implemented as one pass.

use serde::Serialize;
use serde_json::{json, Value};

use crate::model::{DesignRules, Pcb, Point, Stackup};
use crate::routing::grid::RoutingGrid;

use super::round2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleType {
    Pad,
    Track,
    Via,
    Zone,
    Component,
    Keepout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutabilitySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RoutabilitySeverity {
    fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            RoutabilitySeverity::Critical
        } else if score >= 50.0 {
            RoutabilitySeverity::High
        } else if score >= 25.0 {
            RoutabilitySeverity::Medium
        } else {
            RoutabilitySeverity::Low
        }
    }

    fn success_weight(&self) -> f64 {
        match self {
            RoutabilitySeverity::Low => 0.98,
            RoutabilitySeverity::Medium => 0.90,
            RoutabilitySeverity::High => 0.70,
            RoutabilitySeverity::Critical => 0.40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetRoutabilityReport {
    pub net_id: u32,
    pub net_name: String,
    pub straight_line_distance_mm: f64,
    pub obstacles: Vec<(ObstacleType, String)>,
    pub congestion_score: f64,
    pub bottlenecks: usize,
    pub difficulty: f64,
    pub severity: RoutabilitySeverity,
}

impl NetRoutabilityReport {
    pub fn to_json(&self) -> Value {
        json!({
            "net_id": self.net_id,
            "net_name": self.net_name,
            "straight_line_distance_mm": round2(self.straight_line_distance_mm),
            "obstacles": self.obstacles.iter().map(|(k, d)| json!({"kind": k, "detail": d})).collect::<Vec<_>>(),
            "congestion_score": round2(self.congestion_score),
            "bottlenecks": self.bottlenecks,
            "difficulty": round2(self.difficulty),
            "severity": self.severity,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RoutabilityReport {
    pub nets: Vec<NetRoutabilityReport>,
    pub estimated_success_rate: f64,
    pub recommendations: Vec<String>,
}

impl RoutabilityReport {
    pub fn to_json(&self) -> Value {
        json!({
            "nets": self.nets.iter().map(|n| n.to_json()).collect::<Vec<_>>(),
            "estimated_success_rate": round2(self.estimated_success_rate),
            "recommendations": self.recommendations,
        })
    }
}

pub struct RoutabilityAnalyzer {
    rules: DesignRules,
    stackup: Stackup,
}

impl RoutabilityAnalyzer {
    pub fn new(rules: DesignRules, stackup: Stackup) -> Self {
        Self { rules, stackup }
    }

    /// Rasters the straight line between `a` and `b` at the grid's
    /// resolution and classifies every blocked cell it crosses on
    /// `layer`.
    fn raster_line(&self, grid: &RoutingGrid, a: Point, b: Point, layer: usize) -> Vec<(ObstacleType, String)> {
        let dist = a.distance_to(&b);
        let steps = (dist / grid.resolution_mm).ceil().max(1.0) as usize;
        let mut obstacles = Vec::new();
        let mut last_cell: Option<(usize, usize)> = None;

        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let p = Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
            let (col, row) = grid.point_to_cell(&p);
            if col < 0 || row < 0 {
                continue;
            }
            let (col, row) = (col as usize, row as usize);
            if Some((col, row)) == last_cell {
                continue;
            }
            last_cell = Some((col, row));
            if row >= grid.rows || col >= grid.cols {
                continue;
            }
            let cell = grid.cell(layer, row, col);
            if cell.is_zone && cell.net != 0 {
                obstacles.push((ObstacleType::Zone, format!("zone fill at ({col},{row})")));
            } else if cell.blocked && cell.is_obstacle && cell.net == 0 {
                obstacles.push((ObstacleType::Keepout, format!("keepout at ({col},{row})")));
            } else if cell.blocked && cell.is_obstacle {
                obstacles.push((ObstacleType::Pad, format!("pad footprint at ({col},{row})")));
            } else if cell.blocked {
                obstacles.push((ObstacleType::Track, format!("existing track at ({col},{row})")));
            }
        }
        obstacles
    }

    /// Builds a fresh grid from the board's pads/zones (read-only snapshot;
    /// this never shares state with a live `Autorouter`) and scores every
    /// multi-pad net.
    pub fn analyze(&self, pcb: &Pcb) -> RoutabilityReport {
        use crate::routing::config::AutorouterConfig;
        let config = AutorouterConfig::default();
        let origin = Point::new(pcb.origin.0, pcb.origin.1);
        let mut grid = RoutingGrid::with_resolution(
            pcb.board_width_mm,
            pcb.board_height_mm,
            self.rules.clone(),
            origin,
            self.stackup.copper_layer_names(),
            config.grid_resolution_mm,
        );
        for footprint in &pcb.footprints {
            for pad in &footprint.pads {
                let pos = pcb.pad_board_position(footprint, pad);
                grid.add_pad(pos, pad.width, pad.height, pad.net_id, &pad.layers, pad.is_through_hole);
            }
        }

        let mut nets: Vec<NetRoutabilityReport> = Vec::new();
        let mut net_ids: Vec<u32> = pcb.nets.keys().copied().filter(|id| *id != 0).collect();
        net_ids.sort_unstable();

        for net_id in net_ids {
            let pads: Vec<Point> = pcb
                .footprints
                .iter()
                .flat_map(|fp| fp.pads.iter().filter(|p| p.net_id == net_id).map(|p| pcb.pad_board_position(fp, p)))
                .collect();
            if pads.len() < 2 {
                continue;
            }
            let net_name = pcb.nets.get(&net_id).map(|n| n.name.clone()).unwrap_or_else(|| format!("net{net_id}"));

            let mut total_dist = 0.0;
            let mut all_obstacles = Vec::new();
            let mut congestion_sum = 0.0;
            let mut congestion_samples = 0usize;
            let mut bottlenecks = 0usize;

            for i in 0..pads.len() {
                for j in (i + 1)..pads.len() {
                    total_dist += pads[i].distance_to(&pads[j]);
                    let obstacles = self.raster_line(&grid, pads[i], pads[j], 0);
                    if obstacles.len() >= 3 {
                        bottlenecks += 1;
                    }
                    all_obstacles.extend(obstacles);

                    let midpoint = Point::new((pads[i].x + pads[j].x) / 2.0, (pads[i].y + pads[j].y) / 2.0);
                    let (col, row) = grid.point_to_cell(&midpoint);
                    if col >= 0 && row >= 0 && (col as usize) < grid.cols && (row as usize) < grid.rows {
                        congestion_sum += grid.get_congestion(col as usize, row as usize, 0);
                        congestion_samples += 1;
                    }
                }
            }
            let congestion_score = if congestion_samples > 0 {
                congestion_sum / congestion_samples as f64
            } else {
                0.0
            };

            let difficulty = (15.0 * all_obstacles.len() as f64
                + 20.0 * congestion_score
                + 25.0 * bottlenecks as f64)
                .min(100.0);
            let severity = RoutabilitySeverity::from_score(difficulty);

            nets.push(NetRoutabilityReport {
                net_id,
                net_name,
                straight_line_distance_mm: total_dist,
                obstacles: all_obstacles,
                congestion_score,
                bottlenecks,
                difficulty,
                severity,
            });
        }

        let estimated_success_rate = if nets.is_empty() {
            1.0
        } else {
            nets.iter().map(|n| n.severity.success_weight()).sum::<f64>() / nets.len() as f64
        };

        let mut recommendations = Vec::new();
        let critical_count = nets.iter().filter(|n| n.severity == RoutabilitySeverity::Critical).count();
        if critical_count > 0 {
            recommendations.push(format!(
                "{critical_count} net(s) are critically congested; consider adding a layer pair"
            ));
        }
        let layer_count = self.stackup.num_copper_layers();
        if layer_count <= 2 && nets.iter().any(|n| n.severity >= RoutabilitySeverity::High) {
            recommendations.push("upgrade from a 2-layer to a 4-layer stackup".to_string());
        }
        if nets.iter().filter(|n| n.obstacles.len() > 5).count() > nets.len() / 4 {
            recommendations.push("increase component spacing to open routing channels".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("no structural changes recommended; proceed to routing".to_string());
        }

        RoutabilityReport {
            nets,
            estimated_success_rate,
            recommendations,
        }
    }
}

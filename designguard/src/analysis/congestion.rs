//! Congestion hotspotting over a coarse board-space grid.
//!
//! Overlays `grid_size`-mm cells across the board, accumulating per-cell
//! track length, via count, and component/net sets; classifies hotspots
//! and merges adjacent ones. The per-cell scan is the one place (besides
//! Monte Carlo trials) where the core exploits parallelism: cells are
//! independent and mutate no shared state, so classification fans out
//! over a `rayon` thread pool once the cell count clears an amortization
//! threshold.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};

use crate::model::{Pcb, Point};

use super::round2;

#[derive(Debug, Clone)]
pub struct CongestionConfig {
    pub grid_size_mm: f64,
    pub merge_radius_mm: f64,
    /// `None` uses the number of logical CPUs; `Some(1)` disables
    /// parallelism entirely.
    pub max_workers: Option<usize>,
    pub density_threshold: f64,
    pub via_count_threshold: u32,
    /// Minimum cell count before the scan is worth handing to the pool.
    pub parallel_threshold: usize,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            grid_size_mm: 2.0,
            merge_radius_mm: 5.0,
            max_workers: None,
            density_threshold: 0.6,
            via_count_threshold: 3,
            parallel_threshold: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CongestionSeverity {
    fn from_score(score: f64) -> Self {
        if score >= 3.0 {
            CongestionSeverity::Critical
        } else if score >= 2.0 {
            CongestionSeverity::High
        } else if score >= 1.0 {
            CongestionSeverity::Medium
        } else {
            CongestionSeverity::Low
        }
    }
}

#[derive(Debug, Clone)]
pub struct CongestionHotspot {
    pub center: Point,
    pub radius_mm: f64,
    pub track_density: f64,
    pub via_count: u32,
    pub unrouted: bool,
    pub components: Vec<String>,
    pub nets: Vec<String>,
    pub severity: CongestionSeverity,
    pub suggestions: Vec<String>,
}

impl CongestionHotspot {
    pub fn to_json(&self) -> Value {
        json!({
            "center": [round2(self.center.x), round2(self.center.y)],
            "radius_mm": round2(self.radius_mm),
            "track_density": round2(self.track_density),
            "via_count": self.via_count,
            "unrouted": self.unrouted,
            "components": self.components,
            "nets": self.nets,
            "severity": self.severity,
            "suggestions": self.suggestions,
        })
    }

    fn score(&self) -> f64 {
        self.track_density + 0.1 * self.via_count as f64
    }
}

#[derive(Default, Clone)]
struct CellAccum {
    track_length_mm: f64,
    via_count: u32,
    components: HashSet<String>,
    nets: HashSet<String>,
    unrouted_pad: bool,
}

pub struct CongestionAnalyzer {
    pub config: CongestionConfig,
}

impl CongestionAnalyzer {
    pub fn new(config: CongestionConfig) -> Self {
        Self { config }
    }

    /// Runs the full congestion scan and returns merged, ranked hotspots
    /// (top `limit`, by combined density+via score).
    pub fn analyze(&self, pcb: &Pcb, limit: usize) -> Vec<CongestionHotspot> {
        let cols = (pcb.board_width_mm / self.config.grid_size_mm).ceil().max(1.0) as usize;
        let rows = (pcb.board_height_mm / self.config.grid_size_mm).ceil().max(1.0) as usize;
        let n_cells = cols * rows;

        let mut accum = vec![CellAccum::default(); n_cells];
        let cell_of = |x: f64, y: f64| -> Option<usize> {
            let c = ((x - pcb.origin.0) / self.config.grid_size_mm).floor();
            let r = ((y - pcb.origin.1) / self.config.grid_size_mm).floor();
            if c < 0.0 || r < 0.0 {
                return None;
            }
            let (c, r) = (c as usize, r as usize);
            if c >= cols || r >= rows {
                return None;
            }
            Some(r * cols + c)
        };

        for seg in &pcb.segments {
            let mid = Point::new((seg.start.x + seg.end.x) / 2.0, (seg.start.y + seg.end.y) / 2.0);
            if let Some(idx) = cell_of(mid.x, mid.y) {
                accum[idx].track_length_mm += seg.length();
                if let Some(net) = pcb.nets.get(&seg.net_id) {
                    accum[idx].nets.insert(net.name.clone());
                }
            }
        }
        for via in &pcb.vias {
            if let Some(idx) = cell_of(via.position.x, via.position.y) {
                accum[idx].via_count += 1;
            }
        }
        for footprint in &pcb.footprints {
            for pad in &footprint.pads {
                let pos = pcb.pad_board_position(footprint, pad);
                if let Some(idx) = cell_of(pos.x, pos.y) {
                    accum[idx].components.insert(footprint.reference.clone());
                    if pad.net_id == 0 {
                        accum[idx].unrouted_pad = true;
                    }
                }
            }
        }

        // Classification of each cell is independent of every other cell
        // (no shared mutable state), so it is the parallel region per §5.
        let use_parallel = n_cells >= self.config.parallel_threshold
            && self.config.max_workers.map(|w| w > 1).unwrap_or(true);

        let classify = |idx: usize, cell: &CellAccum| -> Option<CongestionHotspot> {
            let row = idx / cols;
            let col = idx % cols;
            let density = (cell.track_length_mm / self.config.grid_size_mm).min(2.0) / 2.0;
            let is_hotspot = density >= self.config.density_threshold
                || cell.via_count >= self.config.via_count_threshold
                || cell.unrouted_pad;
            if !is_hotspot {
                return None;
            }
            let center = Point::new(
                pcb.origin.0 + (col as f64 + 0.5) * self.config.grid_size_mm,
                pcb.origin.1 + (row as f64 + 0.5) * self.config.grid_size_mm,
            );
            let mut components: Vec<String> = cell.components.iter().cloned().collect();
            components.sort();
            let mut nets: Vec<String> = cell.nets.iter().cloned().collect();
            nets.sort();
            let score = density + 0.1 * cell.via_count as f64;
            Some(CongestionHotspot {
                center,
                radius_mm: self.config.grid_size_mm / 2.0,
                track_density: density,
                via_count: cell.via_count,
                unrouted: cell.unrouted_pad,
                components,
                nets,
                severity: CongestionSeverity::from_score(score),
                suggestions: suggest_fixes(cell, density),
            })
        };

        let mut hotspots: Vec<CongestionHotspot> = if use_parallel {
            let workers = self.config.max_workers.unwrap_or_else(num_cpus);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers.max(1))
                .build()
                .expect("thread pool build");
            pool.install(|| {
                accum
                    .par_iter()
                    .enumerate()
                    .filter_map(|(idx, cell)| classify(idx, cell))
                    .collect()
            })
        } else {
            accum
                .iter()
                .enumerate()
                .filter_map(|(idx, cell)| classify(idx, cell))
                .collect()
        };

        merge_adjacent(&mut hotspots, self.config.merge_radius_mm);
        hotspots.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(std::cmp::Ordering::Equal));
        hotspots.truncate(limit);
        hotspots
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn merge_adjacent(hotspots: &mut Vec<CongestionHotspot>, merge_radius_mm: f64) {
    let mut merged: Vec<CongestionHotspot> = Vec::new();
    'outer: for hs in hotspots.drain(..) {
        for existing in merged.iter_mut() {
            if existing.center.distance_to(&hs.center) <= merge_radius_mm {
                existing.track_density = existing.track_density.max(hs.track_density);
                existing.via_count += hs.via_count;
                existing.unrouted = existing.unrouted || hs.unrouted;
                for c in hs.components {
                    if !existing.components.contains(&c) {
                        existing.components.push(c);
                    }
                }
                for n in hs.nets {
                    if !existing.nets.contains(&n) {
                        existing.nets.push(n);
                    }
                }
                existing.severity = existing.severity.max(hs.severity);
                continue 'outer;
            }
        }
        merged.push(hs);
    }
    *hotspots = merged;
}

/// Pluggable, data-driven suggestion generator: move components, use
/// inner layers, reduce vias, widen power nets, via-in-pad for bypass
/// caps. Exposed as a free function so callers can layer in their own
/// rules ahead of or after these.
pub fn suggest_fixes(cell: &CellAccum, density: f64) -> Vec<String> {
    let mut suggestions = Vec::new();
    if cell.unrouted_pad {
        suggestions.push("route the unconnected pad(s) in this area before further fill".to_string());
    }
    if density >= 0.8 {
        suggestions.push("consider moving a component out of this area to relieve track density".to_string());
        suggestions.push("route some signals on an inner layer".to_string());
    }
    if cell.via_count >= 3 {
        suggestions.push("reduce via count, e.g. by routing more of this net on a single layer".to_string());
    }
    if cell.nets.iter().any(|n| n.to_uppercase().contains("VCC") || n.to_uppercase().contains("PWR")) {
        suggestions.push("widen the power net trace in this area if current density is marginal".to_string());
    }
    if cell.components.len() >= 2 && cell.via_count >= 2 {
        suggestions.push("use via-in-pad for nearby bypass capacitors to free routing channels".to_string());
    }
    if suggestions.is_empty() {
        suggestions.push("monitor this area; congestion is moderate but not yet critical".to_string());
    }
    suggestions
}

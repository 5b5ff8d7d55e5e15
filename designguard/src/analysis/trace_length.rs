//! Trace-length and differential-pair reporting.
//!
//! Walks the committed segments of each net, sums Euclidean length,
//! counts vias and layer transitions, and for diff pairs reports skew.
//! Timing-critical nets are detected by the same high-speed/clock regex
//! conventions used elsewhere; the partner of a differential net is
//! inferred via the router's own polarity-suffix detector, so the two
//! subsystems never disagree about what counts as a pair.

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::model::Pcb;
use crate::routing::diff_pair::DiffPairDetector;

use super::round3;

const TIMING_CRITICAL_PATTERNS: &[&str] = &[
    "CLK", "CLOCK", "USB", "HDMI", "ETH", "DDR", "LVDS", "PCIE", "SATA", "MIPI",
];

fn is_timing_critical(name: &str) -> bool {
    let upper = name.to_uppercase();
    TIMING_CRITICAL_PATTERNS.iter().any(|p| upper.contains(p))
}

#[derive(Debug, Clone)]
pub struct TraceLengthReport {
    pub net_id: u32,
    pub net_name: String,
    pub length_mm: f64,
    pub via_count: usize,
    pub layer_transitions: usize,
    pub is_timing_critical: bool,
}

impl TraceLengthReport {
    pub fn to_json(&self) -> Value {
        json!({
            "net_id": self.net_id,
            "net_name": self.net_name,
            "length_mm": round3(self.length_mm),
            "via_count": self.via_count,
            "layer_transitions": self.layer_transitions,
            "is_timing_critical": self.is_timing_critical,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DifferentialPairReport {
    pub base_name: String,
    pub positive: TraceLengthReport,
    pub negative: TraceLengthReport,
    pub skew_mm: f64,
}

impl DifferentialPairReport {
    pub fn to_json(&self) -> Value {
        json!({
            "base_name": self.base_name,
            "positive": self.positive.to_json(),
            "negative": self.negative.to_json(),
            "skew_mm": round3(self.skew_mm),
        })
    }
}

pub struct TraceLengthAnalyzer {
    diff_pair_detector: DiffPairDetector,
    extra_timing_patterns: Vec<Regex>,
}

impl Default for TraceLengthAnalyzer {
    fn default() -> Self {
        Self {
            diff_pair_detector: DiffPairDetector::default(),
            extra_timing_patterns: Vec::new(),
        }
    }
}

impl TraceLengthAnalyzer {
    pub fn with_additional_patterns(patterns: &[String]) -> Self {
        Self {
            diff_pair_detector: DiffPairDetector::default(),
            extra_timing_patterns: patterns.iter().filter_map(|p| Regex::new(p).ok()).collect(),
        }
    }

    fn net_report(&self, pcb: &Pcb, net_id: u32, net_name: &str) -> TraceLengthReport {
        let segments: Vec<_> = pcb.segments_in_net(net_id).collect();
        let length_mm = segments.iter().map(|s| s.length()).sum();
        let via_count = pcb.vias_in_net(net_id).count();
        let mut layers: Vec<&str> = segments.iter().map(|s| s.layer.as_str()).collect();
        layers.dedup();
        let layer_transitions = layers.len().saturating_sub(1) + via_count;
        let is_timing_critical = is_timing_critical(net_name)
            || self.extra_timing_patterns.iter().any(|re| re.is_match(net_name));

        TraceLengthReport {
            net_id,
            net_name: net_name.to_string(),
            length_mm,
            via_count,
            layer_transitions,
            is_timing_critical,
        }
    }

    /// Per-net length report for every net with at least one segment.
    pub fn analyze_all(&self, pcb: &Pcb) -> Vec<TraceLengthReport> {
        let mut net_ids: Vec<u32> = pcb.segments.iter().map(|s| s.net_id).collect();
        net_ids.sort_unstable();
        net_ids.dedup();
        net_ids
            .into_iter()
            .filter(|id| *id != 0)
            .map(|id| {
                let name = pcb.nets.get(&id).map(|n| n.name.clone()).unwrap_or_else(|| format!("net{id}"));
                self.net_report(pcb, id, &name)
            })
            .collect()
    }

    /// Pairs up nets via the router's polarity-suffix detector and
    /// reports routed-length skew for each detected pair.
    pub fn analyze_diff_pairs(&self, pcb: &Pcb) -> Vec<DifferentialPairReport> {
        let nets: Vec<(u32, String)> = pcb.nets.values().map(|n| (n.id, n.name.clone())).collect();
        let pairs = self.diff_pair_detector.detect(&nets);

        pairs
            .into_iter()
            .map(|pair| {
                let pos_name = pcb.nets.get(&pair.positive_net).map(|n| n.name.clone()).unwrap_or_default();
                let neg_name = pcb.nets.get(&pair.negative_net).map(|n| n.name.clone()).unwrap_or_default();
                let positive = self.net_report(pcb, pair.positive_net, &pos_name);
                let negative = self.net_report(pcb, pair.negative_net, &neg_name);
                let skew_mm = (positive.length_mm - negative.length_mm).abs();
                DifferentialPairReport {
                    base_name: pair.base_name,
                    positive,
                    negative,
                    skew_mm,
                }
            })
            .collect()
    }
}

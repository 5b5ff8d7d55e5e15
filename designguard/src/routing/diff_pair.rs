//! Differential-pair detection and routing coordination.

use regex::Regex;

/// Protocol-specific constraint presets, selected by name-based
/// classification of the pair's base net name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffPairProtocol {
    Usb2,
    Usb3,
    Ethernet,
    Hdmi,
    Lvds,
    Generic,
}

#[derive(Debug, Clone, Copy)]
pub struct DiffPairConstraints {
    pub target_spacing_mm: f64,
    pub max_length_delta_mm: f64,
    pub recommended_width_mm: f64,
    pub target_zdiff_ohm: f64,
}

impl DiffPairProtocol {
    pub fn classify(base_name: &str) -> Self {
        let upper = base_name.to_uppercase();
        if upper.contains("USB3") || upper.contains("SS_") || upper.contains("SSTX") || upper.contains("SSRX") {
            DiffPairProtocol::Usb3
        } else if upper.contains("USB") {
            DiffPairProtocol::Usb2
        } else if upper.contains("ETH") || upper.contains("RGMII") || upper.contains("MDI") || upper.contains("TD") || upper.contains("RD") {
            DiffPairProtocol::Ethernet
        } else if upper.contains("HDMI") || upper.contains("TMDS") {
            DiffPairProtocol::Hdmi
        } else if upper.contains("LVDS") {
            DiffPairProtocol::Lvds
        } else {
            DiffPairProtocol::Generic
        }
    }

    pub fn constraints(&self) -> DiffPairConstraints {
        match self {
            DiffPairProtocol::Usb2 => DiffPairConstraints {
                target_spacing_mm: 0.15,
                max_length_delta_mm: 1.0,
                recommended_width_mm: 0.2,
                target_zdiff_ohm: 90.0,
            },
            DiffPairProtocol::Usb3 => DiffPairConstraints {
                target_spacing_mm: 0.1,
                max_length_delta_mm: 0.13,
                recommended_width_mm: 0.15,
                target_zdiff_ohm: 90.0,
            },
            DiffPairProtocol::Ethernet => DiffPairConstraints {
                target_spacing_mm: 0.15,
                max_length_delta_mm: 0.5,
                recommended_width_mm: 0.2,
                target_zdiff_ohm: 100.0,
            },
            DiffPairProtocol::Hdmi => DiffPairConstraints {
                target_spacing_mm: 0.1,
                max_length_delta_mm: 0.15,
                recommended_width_mm: 0.15,
                target_zdiff_ohm: 100.0,
            },
            DiffPairProtocol::Lvds => DiffPairConstraints {
                target_spacing_mm: 0.15,
                max_length_delta_mm: 0.5,
                recommended_width_mm: 0.15,
                target_zdiff_ohm: 100.0,
            },
            DiffPairProtocol::Generic => DiffPairConstraints {
                target_spacing_mm: 0.2,
                max_length_delta_mm: 1.0,
                recommended_width_mm: 0.2,
                target_zdiff_ohm: 100.0,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiffPair {
    pub base_name: String,
    pub positive_net: u32,
    pub negative_net: u32,
    pub protocol: DiffPairProtocol,
}

impl DiffPair {
    pub fn constraints(&self) -> DiffPairConstraints {
        self.protocol.constraints()
    }
}

/// Parses polarity suffixes (`+`/`-`, `_P`/`_N`, `_POS`/`_NEG`) and pairs
/// up nets sharing a base name.
pub struct DiffPairDetector {
    positive: Vec<Regex>,
    negative: Vec<Regex>,
}

impl Default for DiffPairDetector {
    fn default() -> Self {
        Self {
            positive: [r"^(?P<base>.+)\+$", r"^(?P<base>.+)_P$", r"^(?P<base>.+)_POS$"]
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
            negative: [r"^(?P<base>.+)-$", r"^(?P<base>.+)_N$", r"^(?P<base>.+)_NEG$"]
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
        }
    }
}

impl DiffPairDetector {
    fn base_if_positive(&self, name: &str) -> Option<String> {
        let upper = name.to_uppercase();
        self.positive
            .iter()
            .find_map(|re| re.captures(&upper).map(|c| c.name("base").unwrap().as_str().to_string()))
    }

    fn base_if_negative(&self, name: &str) -> Option<String> {
        let upper = name.to_uppercase();
        self.negative
            .iter()
            .find_map(|re| re.captures(&upper).map(|c| c.name("base").unwrap().as_str().to_string()))
    }

    /// Detects pairs among `(net_id, net_name)` entries.
    pub fn detect(&self, nets: &[(u32, String)]) -> Vec<DiffPair> {
        let mut positives: Vec<(String, u32)> = Vec::new();
        let mut negatives: Vec<(String, u32)> = Vec::new();
        for (net_id, name) in nets {
            if let Some(base) = self.base_if_positive(name) {
                positives.push((base, *net_id));
            } else if let Some(base) = self.base_if_negative(name) {
                negatives.push((base, *net_id));
            }
        }

        let mut pairs = Vec::new();
        for (base, pos_net) in &positives {
            if let Some((_, neg_net)) = negatives.iter().find(|(b, _)| b == base) {
                pairs.push(DiffPair {
                    base_name: base.clone(),
                    positive_net: *pos_net,
                    negative_net: *neg_net,
                    protocol: DiffPairProtocol::classify(base),
                });
            }
        }
        pairs.sort_by(|a, b| a.base_name.cmp(&b.base_name));
        pairs
    }
}

/// Raised when a routed pair's length mismatch exceeds the protocol's
/// `max_length_delta_mm`.
#[derive(Debug, Clone)]
pub struct LengthMismatchWarning {
    pub pair_base_name: String,
    pub length_p_mm: f64,
    pub length_n_mm: f64,
    pub delta_mm: f64,
    pub max_allowed_mm: f64,
}

impl DiffPair {
    /// Compares routed lengths against this pair's protocol budget.
    pub fn check_length_match(&self, length_p_mm: f64, length_n_mm: f64) -> Option<LengthMismatchWarning> {
        let delta = (length_p_mm - length_n_mm).abs();
        let max_allowed = self.constraints().max_length_delta_mm;
        if delta > max_allowed {
            Some(LengthMismatchWarning {
                pair_base_name: self.base_name.clone(),
                length_p_mm,
                length_n_mm,
                delta_mm: delta,
                max_allowed_mm: max_allowed,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_plus_minus_pair() {
        let nets = vec![(1, "USB_D+".to_string()), (2, "USB_D-".to_string())];
        let pairs = DiffPairDetector::default().detect(&nets);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].positive_net, 1);
        assert_eq!(pairs[0].negative_net, 2);
        assert_eq!(pairs[0].protocol, DiffPairProtocol::Usb2);
    }

    #[test]
    fn detects_p_n_suffix_pair() {
        let nets = vec![(1, "LVDS_CLK_P".to_string()), (2, "LVDS_CLK_N".to_string())];
        let pairs = DiffPairDetector::default().detect(&nets);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].protocol, DiffPairProtocol::Lvds);
    }

    #[test]
    fn length_mismatch_flagged_over_budget() {
        let pair = DiffPair {
            base_name: "USB".into(),
            positive_net: 1,
            negative_net: 2,
            protocol: DiffPairProtocol::Usb2,
        };
        assert!(pair.check_length_match(52.3, 52.1).is_none());
        assert!(pair.check_length_match(52.3, 10.0).is_some());
    }
}

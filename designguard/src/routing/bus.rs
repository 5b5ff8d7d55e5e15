//! Bus detection and routing-order coordination.
//!
//! A "bus" is a set of nets sharing a base name and differing only by a
//! bit index, expressed via one of three suffix conventions KiCad nets
//! commonly use: `DATA[7]`, `DATA_7`, `DATA7`.

use std::collections::HashMap;

use regex::Regex;

/// How a multi-bus routing pass orders its member signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRoutingMode {
    /// Route the same bit index across every bus in the group together.
    Parallel,
    /// Route one whole bus at a time, in bit order.
    Stacked,
    /// Synonym for `Stacked` kept for vocabulary parity with the source
    /// tool, which distinguishes "stacked" (physically adjacent) from
    /// "bundled" (logically grouped but not necessarily adjacent) at the
    /// placement level; the routing order is identical for both.
    Bundled,
}

#[derive(Debug, Clone)]
pub struct BusGroup {
    pub base_name: String,
    /// (bit index, net id), sorted by bit index.
    pub signals: Vec<(u32, u32)>,
}

impl BusGroup {
    pub fn width(&self) -> usize {
        self.signals.len()
    }
}

/// Parses net names for bus suffix conventions and groups signals sharing
/// a base name into `BusGroup`s with at least `min_bus_width` members.
pub struct BusDetector {
    bracket: Regex,
    underscore: Regex,
    trailing: Regex,
    pub min_bus_width: usize,
}

impl Default for BusDetector {
    fn default() -> Self {
        Self::new(4)
    }
}

impl BusDetector {
    pub fn new(min_bus_width: usize) -> Self {
        Self {
            bracket: Regex::new(r"^(?P<base>.+)\[(?P<bit>\d+)\]$").unwrap(),
            underscore: Regex::new(r"^(?P<base>.+)_(?P<bit>\d+)$").unwrap(),
            trailing: Regex::new(r"^(?P<base>.+?)(?P<bit>\d+)$").unwrap(),
            min_bus_width,
        }
    }

    fn parse_one(&self, name: &str) -> Option<(String, u32)> {
        for re in [&self.bracket, &self.underscore, &self.trailing] {
            if let Some(caps) = re.captures(name) {
                let base = caps.name("base")?.as_str().to_string();
                let bit: u32 = caps.name("bit")?.as_str().parse().ok()?;
                return Some((base, bit));
            }
        }
        None
    }

    /// Groups `(net_id, net_name)` pairs into bus groups of at least
    /// `min_bus_width` members sharing a base name.
    pub fn detect(&self, nets: &[(u32, String)]) -> Vec<BusGroup> {
        let mut by_base: HashMap<String, Vec<(u32, u32)>> = HashMap::new();
        for (net_id, name) in nets {
            if let Some((base, bit)) = self.parse_one(name) {
                by_base.entry(base).or_default().push((bit, *net_id));
            }
        }
        let mut groups: Vec<BusGroup> = by_base
            .into_iter()
            .filter(|(_, signals)| signals.len() >= self.min_bus_width)
            .map(|(base_name, mut signals)| {
                signals.sort_by_key(|(bit, _)| *bit);
                BusGroup {
                    base_name,
                    signals,
                }
            })
            .collect();
        groups.sort_by(|a, b| a.base_name.cmp(&b.base_name));
        groups
    }
}

/// Coordinates routing order across one or more detected bus groups.
pub struct BusCoordinator {
    pub groups: Vec<BusGroup>,
    pub mode: BusRoutingMode,
}

impl BusCoordinator {
    pub fn new(groups: Vec<BusGroup>, mode: BusRoutingMode) -> Self {
        Self { groups, mode }
    }

    /// Net ids in the order the net router should commit them.
    ///
    /// `Parallel` interleaves bit index across all groups (bit 0 of every
    /// bus, then bit 1 of every bus, ...); `Stacked`/`Bundled` emits one
    /// group fully before the next.
    pub fn routing_order(&self) -> Vec<u32> {
        match self.mode {
            BusRoutingMode::Parallel => {
                let max_width = self.groups.iter().map(|g| g.width()).max().unwrap_or(0);
                let mut order = Vec::new();
                for bit in 0..max_width {
                    for group in &self.groups {
                        if let Some(&(_, net_id)) = group.signals.get(bit) {
                            order.push(net_id);
                        }
                    }
                }
                order
            }
            BusRoutingMode::Stacked | BusRoutingMode::Bundled => self
                .groups
                .iter()
                .flat_map(|g| g.signals.iter().map(|(_, net_id)| *net_id))
                .collect(),
        }
    }

    /// Net ids belonging to any detected bus group, for exclusion from the
    /// general priority-ordered net list.
    pub fn member_nets(&self) -> std::collections::HashSet<u32> {
        self.groups
            .iter()
            .flat_map(|g| g.signals.iter().map(|(_, n)| *n))
            .collect()
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Design rules record: clearances, widths, via dimensions, with
/// optional per net-class overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignRules {
    pub trace_width: f64,
    pub trace_clearance: f64,
    pub via_drill: f64,
    pub via_diameter: f64,
    pub via_clearance: f64,
    pub class_overrides: HashMap<String, NetClassRule>,
}

impl Default for DesignRules {
    fn default() -> Self {
        Self {
            trace_width: 0.2,
            trace_clearance: 0.2,
            via_drill: 0.3,
            via_diameter: 0.6,
            via_clearance: 0.2,
            class_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetClassRule {
    pub trace_width: Option<f64>,
    pub trace_clearance: Option<f64>,
    pub via_diameter: Option<f64>,
    pub via_drill: Option<f64>,
}

impl DesignRules {
    pub fn trace_width_for_class(&self, class: &str) -> f64 {
        self.class_overrides
            .get(class)
            .and_then(|c| c.trace_width)
            .unwrap_or(self.trace_width)
    }

    pub fn trace_clearance_for_class(&self, class: &str) -> f64 {
        self.class_overrides
            .get(class)
            .and_then(|c| c.trace_clearance)
            .unwrap_or(self.trace_clearance)
    }
}

/// Net-class routing priority table. Lower integer routes first. Data-driven
/// and overridable rather than hardcoded, since fab-specific net naming
/// conventions vary.
#[derive(Debug, Clone)]
pub struct NetPriorityTable {
    rules: Vec<(String, i32)>,
    default_priority: i32,
}

impl Default for NetPriorityTable {
    fn default() -> Self {
        Self {
            rules: vec![
                ("GND".to_string(), 0),
                ("VCC".to_string(), 0),
                ("VDD".to_string(), 0),
                ("PWR".to_string(), 0),
                ("CLK".to_string(), 1),
                ("_P".to_string(), 2),
                ("_N".to_string(), 2),
                ("USB".to_string(), 2),
            ],
            default_priority: 5,
        }
    }
}

impl NetPriorityTable {
    pub fn priority_for(&self, net_name: &str) -> i32 {
        let upper = net_name.to_uppercase();
        for (pattern, priority) in &self.rules {
            if upper.contains(pattern.as_str()) {
                return *priority;
            }
        }
        self.default_priority
    }

    pub fn add_rule(&mut self, pattern: &str, priority: i32) {
        self.rules.push((pattern.to_string(), priority));
    }
}

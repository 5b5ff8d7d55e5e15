use crate::model::{Segment, Via};

/// A committed or candidate connection for one net.
#[derive(Debug, Clone, Default)]
pub struct Route {
    pub net_id: u32,
    pub segments: Vec<Segment>,
    pub vias: Vec<Via>,
}

impl Route {
    pub fn new(net_id: u32) -> Self {
        Self {
            net_id,
            segments: Vec::new(),
            vias: Vec::new(),
        }
    }

    pub fn total_length_mm(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }

    pub fn via_count(&self) -> usize {
        self.vias.len()
    }
}

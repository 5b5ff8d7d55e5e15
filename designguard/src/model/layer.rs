use serde::{Deserialize, Serialize};

/// A named copper layer. Non-copper layers (mask, silk) are tracked for
/// stackup completeness but are never routable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layer(pub String);

impl Layer {
    pub fn front_copper() -> Self {
        Layer("F.Cu".to_string())
    }

    pub fn back_copper() -> Self {
        Layer("B.Cu".to_string())
    }

    pub fn inner(n: u32) -> Self {
        Layer(format!("In{n}.Cu"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a physical stackup layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Copper,
    Dielectric,
    Mask,
    Silk,
}

/// One layer of the board's vertical cross-section, ordered top to bottom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackupLayer {
    pub name: String,
    pub kind: LayerKind,
    pub thickness_mm: f64,
    pub material: String,
    pub epsilon_r: f64,
    pub loss_tangent: f64,
    /// Copper weight in oz, meaningful only for `LayerKind::Copper`.
    pub copper_oz: f64,
}

impl StackupLayer {
    pub fn is_copper(&self) -> bool {
        self.kind == LayerKind::Copper
    }

    pub fn is_dielectric(&self) -> bool {
        self.kind == LayerKind::Dielectric
    }
}

/// Ordered top-to-bottom sequence of stackup layers. Copper layers
/// must be separated by at least one dielectric; the first and last copper
/// layers are "outer" (microstrip reference), interior copper layers are
/// "inner" (stripline reference). Constructed once per board and immutable
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stackup {
    pub layers: Vec<StackupLayer>,
}

impl Stackup {
    pub fn new(layers: Vec<StackupLayer>) -> Self {
        Self { layers }
    }

    pub fn copper_layers(&self) -> impl Iterator<Item = &StackupLayer> {
        self.layers.iter().filter(|l| l.is_copper())
    }

    pub fn dielectric_layers(&self) -> impl Iterator<Item = &StackupLayer> {
        self.layers.iter().filter(|l| l.is_dielectric())
    }

    pub fn num_copper_layers(&self) -> usize {
        self.copper_layers().count()
    }

    pub fn get_layer(&self, name: &str) -> Option<&StackupLayer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn get_layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    /// The Nth copper layer, in top-to-bottom order (0-indexed).
    pub fn copper_layer_names(&self) -> Vec<String> {
        self.copper_layers().map(|l| l.name.clone()).collect()
    }

    pub fn is_outer_layer(&self, name: &str) -> bool {
        let copper: Vec<&StackupLayer> = self.copper_layers().collect();
        match (copper.first(), copper.last()) {
            (Some(first), Some(last)) => first.name == name || last.name == name,
            _ => false,
        }
    }

    pub fn get_copper_thickness(&self, name: &str) -> f64 {
        self.get_layer(name).map(|l| l.thickness_mm).unwrap_or(0.035)
    }
}

/// The three layer-stack presets the adaptive escalation wrapper tries, in
/// order, subject to a `max_layers` cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerStackPreset {
    TwoLayer,
    FourLayer,
    SixLayer,
}

impl LayerStackPreset {
    pub fn copper_count(&self) -> usize {
        match self {
            LayerStackPreset::TwoLayer => 2,
            LayerStackPreset::FourLayer => 4,
            LayerStackPreset::SixLayer => 6,
        }
    }

    pub fn escalation_order(max_layers: usize) -> Vec<LayerStackPreset> {
        [
            LayerStackPreset::TwoLayer,
            LayerStackPreset::FourLayer,
            LayerStackPreset::SixLayer,
        ]
        .into_iter()
        .filter(|p| p.copper_count() <= max_layers)
        .collect()
    }
}

//! Tunable knobs for the routing subsystem. Constructed once and threaded
//! by reference, never read from environment or config files.

#[derive(Debug, Clone)]
pub struct AutorouterConfig {
    pub grid_resolution_mm: f64,
    pub max_layers: usize,
    pub max_iterations: u32,
    pub initial_present_factor: f64,
    pub present_factor_increment: f64,
    pub history_increment: f64,
    pub monte_carlo_trials: u32,
    pub seed: Option<u64>,
    pub verbose: bool,
}

impl Default for AutorouterConfig {
    fn default() -> Self {
        Self {
            grid_resolution_mm: 0.15,
            max_layers: 4,
            max_iterations: 30,
            initial_present_factor: 0.5,
            present_factor_increment: 0.5,
            history_increment: 1.0,
            monte_carlo_trials: 0,
            seed: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZoneFillConfig {
    pub spoke_count: u32,
    pub spoke_angle_deg: f64,
}

impl Default for ZoneFillConfig {
    fn default() -> Self {
        Self {
            spoke_count: 4,
            spoke_angle_deg: 45.0,
        }
    }
}

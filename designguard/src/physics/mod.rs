//! Electromagnetic physics: stackup modeling, transmission-line impedance,
//! coupled-line/differential-pair analysis, crosstalk, and timing.

pub mod constants;
pub mod coupled_lines;
pub mod crosstalk;
pub mod stackup;
pub mod timing;
pub mod transmission_line;

pub use constants::{get_material, get_material_or_default, DielectricMaterial};
pub use coupled_lines::{CoupledLines, CouplingMode, DifferentialPairResult};
pub use crosstalk::{CrosstalkAnalyzer, CrosstalkResult, CrosstalkSeverity};
pub use timing::{DifferentialPairSkew, NamedNetLength, PropagationResult, SerpentineParameters, TimingAnalyzer, TimingBudget};
pub use transmission_line::{elliptic_k, ImpedanceResult, LineMode, TransmissionLine};

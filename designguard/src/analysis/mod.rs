//! Post-layout analysis: net connectivity reconstruction, congestion
//! hotspotting, signal-integrity screening, thermal clustering, trace-length
//! reporting, and pre-routing routability estimation.
//!
//! Every analyzer here is read-only: it consumes a `Pcb` (and, where
//! relevant, a `Stackup` or `RoutingGrid`) and produces a total function's
//! worth of structured report, never an error — missing stackup data
//! defaults rather than failing.

pub mod congestion;
pub mod connectivity;
pub mod routability;
pub mod signal_integrity;
pub mod thermal;
pub mod trace_length;

pub use congestion::{CongestionAnalyzer, CongestionConfig, CongestionHotspot, CongestionSeverity};
pub use connectivity::{NetConnectivityGraph, NetStatus, NetStatusAnalyzer, NetStatusKind};
pub use routability::{
    NetRoutabilityReport, ObstacleType, RoutabilityAnalyzer, RoutabilityReport, RoutabilitySeverity,
};
pub use signal_integrity::{
    CrosstalkRisk, ImpedanceDiscontinuity, RiskLevel, SignalIntegrityAnalyzer, SignalIntegrityConfig,
};
pub use thermal::{ThermalAnalyzer, ThermalConfig, ThermalHotspot, ThermalSeverity};
pub use trace_length::{DifferentialPairReport, TraceLengthAnalyzer, TraceLengthReport};

/// Rounds to 2 decimal places. Applied only at the serialization boundary
/// (`to_json`), never to values used in subsequent computation.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Rounds to 3 decimal places, for quantities (lengths, skews) that need
/// finer precision than percentages/scores.
pub(crate) fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Position-equality tolerance used throughout connectivity and geometric
/// analysis.
pub const POSITION_TOLERANCE_MM: f64 = 0.01;

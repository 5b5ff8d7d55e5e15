//! DesignGuard - PCB autorouter, electromagnetic physics, and post-layout
//! analysis core.
//!
//! This crate implements three tightly coupled subsystems over a typed PCB
//! model produced by an (out of scope) KiCad loader:
//!
//! - [`physics`]: transmission-line/coupled-line/crosstalk/timing solvers
//!   over a layered stackup model.
//! - [`routing`]: a multi-layer grid-based maze router with negotiated
//!   congestion (PathFinder), Monte Carlo multi-start, adaptive layer
//!   escalation, and bus/differential-pair coordination.
//! - [`analysis`]: post-layout net connectivity, congestion hotspotting,
//!   signal-integrity screening, thermal clustering, and trace-length
//!   reporting.
//!
//! # Quick start
//!
//! ```no_run
//! use designguard::model::{Pcb, DesignRules, Stackup};
//! use designguard::routing::{Autorouter, AutorouterConfig};
//!
//! let pcb = Pcb::default();
//! let rules = DesignRules::default();
//! let stackup = Stackup::jlcpcb_4layer();
//! let mut autorouter = Autorouter::new(&pcb, rules, stackup, AutorouterConfig::default());
//! let result = autorouter.route_negotiated();
//! println!("converged: {}", result.converged);
//! ```

pub mod analysis;
pub mod error;
pub mod model;
pub mod physics;
pub mod routing;

pub use error::{DesignCoreError, Result};

/// Convenience re-exports for the common entry points of each subsystem.
pub mod prelude {
    pub use crate::analysis::{
        CongestionAnalyzer, NetStatusAnalyzer, RoutabilityAnalyzer, SignalIntegrityAnalyzer, ThermalAnalyzer,
        TraceLengthAnalyzer,
    };
    pub use crate::model::{DesignRules, Pcb, Stackup};
    pub use crate::routing::{AdaptiveRoutingResult, Autorouter, AutorouterConfig};
    pub use crate::{DesignCoreError, Result};
}

//! The autorouter: grid-based negotiated-congestion routing, zone fill,
//! and bus/differential-pair coordination.

pub mod adaptive;
pub mod autorouter;
pub mod bus;
pub mod config;
pub mod diff_pair;
pub mod grid;
pub mod monte_carlo;
pub mod negotiated;
pub mod net_router;
pub mod pathfinder;
pub mod route;
pub mod zone_fill;

pub use adaptive::{route_with_escalation, AdaptiveRoutingResult, EscalationAttempt};
pub use autorouter::{Autorouter, GreedyResult};
pub use bus::{BusCoordinator, BusDetector, BusGroup, BusRoutingMode};
pub use config::{AutorouterConfig, ZoneFillConfig};
pub use diff_pair::{DiffPair, DiffPairConstraints, DiffPairDetector, DiffPairProtocol, LengthMismatchWarning};
pub use grid::RoutingGrid;
pub use monte_carlo::{run_monte_carlo, MonteCarloResult, RoutingStrategy, TrialSummary};
pub use negotiated::{NegotiatedResult, NegotiatedRouter, ProgressCallback};
pub use net_router::{NetRouteOutcome, NetRouter, PadRef};
pub use pathfinder::Pathfinder;
pub use route::Route;
pub use zone_fill::{fill_zone, FilledZone};

//! DesignGuard CLI - PCB autorouting and post-layout analysis from the
//! command line.
//!
//! Boards are read as JSON: `{"pcb": Pcb, "rules": DesignRules, "stackup":
//! Stackup}`, the core library's own typed model serialized directly
//! (the KiCad board-file loader itself is out of scope for this crate;
//! see the library's module docs).

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::Value;

use designguard::model::{DesignRules, Pcb, Stackup};
use designguard::routing::{route_with_escalation, run_monte_carlo, Autorouter, AutorouterConfig, Route, RoutingStrategy};
use designguard::analysis::{
    CongestionAnalyzer, CongestionConfig, NetStatusAnalyzer, RoutabilityAnalyzer, SignalIntegrityAnalyzer,
    SignalIntegrityConfig, ThermalAnalyzer, ThermalConfig, TraceLengthAnalyzer,
};

#[derive(Parser)]
#[command(name = "designguard")]
#[command(about = "PCB autorouting and post-layout analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a board JSON file: {"pcb": ..., "rules": ..., "stackup": ...}
    #[arg(value_name = "BOARD")]
    board: PathBuf,

    /// Enable verbose tracing output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route the board and emit the resulting segments/vias as JSON
    Route {
        #[arg(long, value_enum, default_value = "negotiated")]
        mode: RouteMode,

        /// Monte Carlo trial count (mode = monte-carlo)
        #[arg(long, default_value_t = 8)]
        trials: u32,

        /// Monte Carlo seed, for reproducible trial ordering
        #[arg(long)]
        seed: Option<u64>,

        /// Max layers to escalate to (mode = adaptive)
        #[arg(long, default_value_t = 6)]
        max_layers: usize,
    },

    /// Run a post-layout or pre-routing analysis and emit a JSON report
    Analyze {
        #[command(subcommand)]
        kind: AnalyzeKind,
    },
}

#[derive(Subcommand)]
enum AnalyzeKind {
    /// Net connectivity / completion status
    Connectivity,
    /// Congestion hotspots
    Congestion {
        #[arg(long, default_value_t = 2.0)]
        grid_size_mm: f64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Crosstalk risk and impedance discontinuities
    SignalIntegrity,
    /// Thermal hotspot clustering
    Thermal,
    /// Trace-length and differential-pair reports
    TraceLength,
    /// Pre-routing routability estimate
    Routability,
}

#[derive(Clone, ValueEnum)]
enum RouteMode {
    Greedy,
    Negotiated,
    MonteCarlo,
    Adaptive,
}

#[derive(Deserialize)]
struct BoardFile {
    pcb: Pcb,
    #[serde(default)]
    rules: DesignRules,
    stackup: Stackup,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    } else {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    }

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let board = load_board(&cli.board)?;

    let output = match cli.command {
        Commands::Route { mode, trials, seed, max_layers } => route(&board, mode, trials, seed, max_layers)?,
        Commands::Analyze { kind } => analyze(&board, kind),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_board(path: &PathBuf) -> Result<BoardFile> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing board JSON from {}", path.display()))
}

fn route(board: &BoardFile, mode: RouteMode, trials: u32, seed: Option<u64>, max_layers: usize) -> Result<Value> {
    let config = AutorouterConfig {
        max_layers,
        monte_carlo_trials: trials,
        seed,
        ..AutorouterConfig::default()
    };

    let (routes_json, summary) = match mode {
        RouteMode::Greedy => {
            let mut router = Autorouter::new(&board.pcb, board.rules.clone(), board.stackup.clone(), config);
            let result = router.route_greedy();
            (
                routes_to_json(&router.routes),
                serde_json::json!({
                    "nets_requested": result.nets_requested,
                    "nets_routed": result.nets_routed,
                    "overflow": result.overflow,
                }),
            )
        }
        RouteMode::Negotiated => {
            let mut router = Autorouter::new(&board.pcb, board.rules.clone(), board.stackup.clone(), config);
            let result = router.route_negotiated();
            (
                routes_to_json(&result.routes),
                serde_json::json!({
                    "converged": result.converged,
                    "overflow": result.overflow,
                    "iterations": result.iterations,
                    "nets_routed": result.nets_routed,
                }),
            )
        }
        RouteMode::MonteCarlo => {
            let mut router = Autorouter::new(&board.pcb, board.rules.clone(), board.stackup.clone(), config);
            let result = run_monte_carlo(&mut router, RoutingStrategy::Negotiated, trials.max(1), seed);
            let best_score = result.trials.get(result.best_trial_index as usize).map(|t| t.score);
            (
                routes_to_json(&router.routes),
                serde_json::json!({
                    "trials_run": result.trials.len(),
                    "best_trial_index": result.best_trial_index,
                    "best_score": best_score,
                }),
            )
        }
        RouteMode::Adaptive => {
            let result = route_with_escalation(&board.pcb, board.rules.clone(), thickness_from_stackup(&board.stackup), config);
            let best = result.best();
            (
                routes_to_json(&best.result.routes),
                serde_json::json!({
                    "success_rate": best.result.success_rate(),
                    "layers_used": best.preset.copper_count(),
                    "converged": best.result.converged && best.result.overflow == 0,
                    "attempts": result.attempts.len(),
                }),
            )
        }
    };

    Ok(serde_json::json!({ "routes": routes_json, "summary": summary }))
}

fn thickness_from_stackup(stackup: &Stackup) -> f64 {
    stackup.layers.iter().map(|l| l.thickness_mm).sum()
}

fn routes_to_json(routes: &[Route]) -> Value {
    serde_json::json!(routes
        .iter()
        .map(|r| serde_json::json!({
            "net_id": r.net_id,
            "segments": r.segments,
            "vias": r.vias,
            "length_mm": r.total_length_mm(),
        }))
        .collect::<Vec<_>>())
}

fn analyze(board: &BoardFile, kind: AnalyzeKind) -> Value {
    match kind {
        AnalyzeKind::Connectivity => {
            let statuses = NetStatusAnalyzer::analyze_all(&board.pcb);
            serde_json::json!(statuses.iter().map(|s| s.to_json()).collect::<Vec<_>>())
        }
        AnalyzeKind::Congestion { grid_size_mm, limit } => {
            let analyzer = CongestionAnalyzer::new(CongestionConfig {
                grid_size_mm,
                ..CongestionConfig::default()
            });
            let hotspots = analyzer.analyze(&board.pcb, limit);
            serde_json::json!(hotspots.iter().map(|h| h.to_json()).collect::<Vec<_>>())
        }
        AnalyzeKind::SignalIntegrity => {
            let analyzer = SignalIntegrityAnalyzer::new(SignalIntegrityConfig::default());
            let crosstalk = analyzer.analyze_crosstalk(&board.pcb);
            let impedance = analyzer.analyze_impedance_discontinuities(&board.pcb);
            serde_json::json!({
                "crosstalk": crosstalk.iter().map(|c| c.to_json()).collect::<Vec<_>>(),
                "impedance_discontinuities": impedance.iter().map(|d| d.to_json()).collect::<Vec<_>>(),
            })
        }
        AnalyzeKind::Thermal => {
            let analyzer = ThermalAnalyzer::new(ThermalConfig::default());
            let hotspots = analyzer.analyze(&board.pcb);
            serde_json::json!(hotspots.iter().map(|h| h.to_json()).collect::<Vec<_>>())
        }
        AnalyzeKind::TraceLength => {
            let analyzer = TraceLengthAnalyzer::default();
            let lengths = analyzer.analyze_all(&board.pcb);
            let pairs = analyzer.analyze_diff_pairs(&board.pcb);
            serde_json::json!({
                "nets": lengths.iter().map(|l| l.to_json()).collect::<Vec<_>>(),
                "differential_pairs": pairs.iter().map(|p| p.to_json()).collect::<Vec<_>>(),
            })
        }
        AnalyzeKind::Routability => {
            let analyzer = RoutabilityAnalyzer::new(board.rules.clone(), board.stackup.clone());
            analyzer.analyze(&board.pcb).to_json()
        }
    }
}

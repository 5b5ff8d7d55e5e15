//! Cross-module physical invariants for the transmission-line, coupled-line,
//! crosstalk, and timing solvers.

use designguard::model::Stackup;
use designguard::physics::coupled_lines::{CoupledLines, CouplingMode};
use designguard::physics::crosstalk::CrosstalkAnalyzer;
use designguard::physics::timing::TimingAnalyzer;
use designguard::physics::transmission_line::{LineMode, TransmissionLine};

#[test]
fn microstrip_impedance_decreases_as_trace_widens() {
    let stackup = Stackup::jlcpcb_4layer();
    let tl = TransmissionLine::new(&stackup);
    let narrow = tl.microstrip(0.1, "F.Cu", 1.0).unwrap();
    let wide = tl.microstrip(0.5, "F.Cu", 1.0).unwrap();
    assert!(wide.z0_ohm < narrow.z0_ohm);
}

#[test]
fn width_for_impedance_round_trips_through_microstrip() {
    let stackup = Stackup::jlcpcb_4layer();
    let tl = TransmissionLine::new(&stackup);
    let width = tl.width_for_impedance(50.0, "F.Cu", LineMode::Microstrip, 0.01).unwrap();
    let check = tl.microstrip(width, "F.Cu", 1.0).unwrap();
    assert!(((check.z0_ohm - 50.0) / 50.0).abs() < 0.02);
}

#[test]
fn stripline_impedance_decreases_as_trace_widens() {
    let stackup = Stackup::jlcpcb_4layer();
    let tl = TransmissionLine::new(&stackup);
    let narrow = tl.stripline(0.1, "In1.Cu", 1.0).unwrap();
    let wide = tl.stripline(0.5, "In1.Cu", 1.0).unwrap();
    assert!(wide.z0_ohm < narrow.z0_ohm);
}

#[test]
fn diff_pair_impedance_is_below_twice_single_ended_when_coupled() {
    let stackup = Stackup::jlcpcb_4layer();
    let tl = TransmissionLine::new(&stackup);
    let cl = CoupledLines::new(&stackup);
    let single = tl.microstrip(0.2, "F.Cu", 1.0).unwrap();
    let pair = cl.edge_coupled_microstrip(0.2, 0.2, "F.Cu").unwrap();
    // Coupling always pulls differential impedance below 2x the uncoupled
    // single-ended value.
    assert!(pair.zdiff_ohm < 2.0 * single.z0_ohm);
}

#[test]
fn gap_for_differential_impedance_is_consistent_across_modes() {
    let stackup = Stackup::jlcpcb_4layer();
    let cl = CoupledLines::new(&stackup);
    let gap_auto = cl
        .gap_for_differential_impedance(90.0, 0.127, "F.Cu", CouplingMode::Auto, 0.02)
        .unwrap();
    let gap_explicit = cl
        .gap_for_differential_impedance(90.0, 0.127, "F.Cu", CouplingMode::EdgeMicrostrip, 0.02)
        .unwrap();
    assert!((gap_auto - gap_explicit).abs() < 1e-6);
}

#[test]
fn crosstalk_budget_spacing_is_tighter_for_looser_budgets() {
    let stackup = Stackup::jlcpcb_4layer();
    let xt = CrosstalkAnalyzer::new(&stackup);
    let tight_budget = xt.spacing_for_crosstalk_budget(2.0, 0.2, 20.0, "F.Cu", 1.0, 0.1).unwrap();
    let loose_budget = xt.spacing_for_crosstalk_budget(10.0, 0.2, 20.0, "F.Cu", 1.0, 0.1).unwrap();
    assert!(tight_budget >= loose_budget);
}

#[test]
fn propagation_delay_is_positive_and_below_speed_of_light() {
    let stackup = Stackup::jlcpcb_4layer();
    let timing = TimingAnalyzer::new(&stackup);
    let trace = timing.analyze_trace(100.0, 0.2, "F.Cu", LineMode::Auto).unwrap();
    assert!(trace.total_delay_ns > 0.0);
    assert!(trace.velocity_percent_c > 0.0 && trace.velocity_percent_c < 100.0);
}

#[test]
fn differential_pair_skew_scales_with_length_difference() {
    let stackup = Stackup::jlcpcb_4layer();
    let timing = TimingAnalyzer::new(&stackup);
    let small = timing
        .analyze_differential_pair_skew(50.0, 50.5, 0.15, "F.Cu", "D+", "D-", 5.0, LineMode::Auto)
        .unwrap();
    let large = timing
        .analyze_differential_pair_skew(50.0, 55.0, 0.15, "F.Cu", "D+", "D-", 5.0, LineMode::Auto)
        .unwrap();
    assert!(large.skew_ps > small.skew_ps);
    assert!(small.within_spec);
    assert!(!large.within_spec);
}

#[test]
fn stackup_presets_order_copper_layers_outer_to_inner() {
    for stackup in [Stackup::default_2layer(1.6), Stackup::jlcpcb_4layer(), Stackup::oshpark_4layer(), Stackup::default_6layer()] {
        let names = stackup.copper_layer_names();
        assert!(!names.is_empty());
        assert!(stackup.is_outer_layer(names.first().unwrap()));
        assert!(stackup.is_outer_layer(names.last().unwrap()));
    }
}

//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

use designguard::model::{DesignRules, Footprint, Net, Pad, Pcb, Point, Stackup};

fn designguard_cli() -> Command {
    cargo_bin_cmd!("designguard-cli")
}

fn two_pad_board() -> Pcb {
    let mut pcb = Pcb {
        board_width_mm: 40.0,
        board_height_mm: 40.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "SIG1".into() });
    for (reference, x, y) in [("R1", 5.0, 5.0), ("R2", 35.0, 35.0)] {
        pcb.footprints.push(Footprint {
            reference: reference.to_string(),
            value: String::new(),
            position: Point::new(x, y),
            rotation_deg: 0.0,
            pads: vec![Pad {
                reference: reference.to_string(),
                pin_number: "1".to_string(),
                center: Point::new(0.0, 0.0),
                width: 0.5,
                height: 0.5,
                net_id: 1,
                layers: vec!["F.Cu".into()],
                is_through_hole: false,
                drill: None,
            }],
        });
    }
    pcb
}

/// Writes a `{"pcb": ..., "rules": ..., "stackup": ...}` board file the CLI
/// expects and returns the open tempfile (dropped, and thus deleted, only
/// once the caller drops it).
fn write_board_fixture(pcb: &Pcb) -> tempfile::NamedTempFile {
    let body = serde_json::json!({
        "pcb": pcb,
        "rules": DesignRules::default(),
        "stackup": Stackup::default_2layer(1.6),
    });
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&body).unwrap().as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_cli_help() {
    let mut cmd = designguard_cli();
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains("PCB"));
}

#[test]
fn test_cli_version() {
    let mut cmd = designguard_cli();
    cmd.arg("--version");
    cmd.assert().success().stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_route_negotiated_on_a_clean_board() {
    let board = write_board_fixture(&two_pad_board());
    let mut cmd = designguard_cli();
    cmd.arg(board.path()).arg("route").arg("--mode").arg("negotiated");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"routes\""))
        .stdout(predicate::str::contains("\"converged\""));
}

#[test]
fn test_cli_route_monte_carlo_is_reproducible_with_a_fixed_seed() {
    let board = write_board_fixture(&two_pad_board());

    let mut cmd_a = designguard_cli();
    cmd_a.arg(board.path()).arg("route").arg("--mode").arg("monte-carlo").arg("--trials").arg("3").arg("--seed").arg("7");
    let out_a = cmd_a.output().unwrap();

    let mut cmd_b = designguard_cli();
    cmd_b.arg(board.path()).arg("route").arg("--mode").arg("monte-carlo").arg("--trials").arg("3").arg("--seed").arg("7");
    let out_b = cmd_b.output().unwrap();

    assert_eq!(out_a.stdout, out_b.stdout, "same seed should produce identical routing output");
}

#[test]
fn test_cli_route_adaptive_reports_layers_used() {
    let board = write_board_fixture(&two_pad_board());
    let mut cmd = designguard_cli();
    cmd.arg(board.path()).arg("route").arg("--mode").arg("adaptive");
    cmd.assert().success().stdout(predicate::str::contains("layers_used"));
}

#[test]
fn test_cli_analyze_connectivity() {
    let board = write_board_fixture(&two_pad_board());
    let mut cmd = designguard_cli();
    cmd.arg(board.path()).arg("analyze").arg("connectivity");
    cmd.assert().success().stdout(predicate::str::contains("net_name"));
}

#[test]
fn test_cli_analyze_routability() {
    let board = write_board_fixture(&two_pad_board());
    let mut cmd = designguard_cli();
    cmd.arg(board.path()).arg("analyze").arg("routability");
    cmd.assert().success().stdout(predicate::str::contains("estimated_success_rate"));
}

#[test]
fn test_cli_analyze_congestion_custom_grid_size() {
    let board = write_board_fixture(&two_pad_board());
    let mut cmd = designguard_cli();
    cmd.arg(board.path()).arg("analyze").arg("congestion").arg("--grid-size-mm").arg("1.0").arg("--limit").arg("5");
    cmd.assert().success();
}

#[test]
fn test_cli_missing_board_file_fails() {
    let mut cmd = designguard_cli();
    cmd.arg("does_not_exist.json").arg("analyze").arg("connectivity");
    cmd.assert().failure().stderr(predicate::str::contains("error"));
}

#[test]
fn test_cli_malformed_board_json_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{ not valid json").unwrap();
    file.flush().unwrap();

    let mut cmd = designguard_cli();
    cmd.arg(file.path()).arg("analyze").arg("connectivity");
    cmd.assert().failure();
}

#[test]
fn test_cli_verbose_flag_does_not_break_output() {
    let board = write_board_fixture(&two_pad_board());
    let mut cmd = designguard_cli();
    cmd.arg("--verbose").arg(board.path()).arg("analyze").arg("thermal");
    cmd.assert().success();
}

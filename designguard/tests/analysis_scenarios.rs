//! Post-layout analyzers exercised over small synthetic boards.

use designguard::analysis::{
    CongestionAnalyzer, CongestionConfig, NetStatusAnalyzer, NetStatusKind, RoutabilityAnalyzer,
    SignalIntegrityAnalyzer, SignalIntegrityConfig, ThermalAnalyzer, ThermalConfig,
    TraceLengthAnalyzer,
};
use designguard::model::{DesignRules, Footprint, Net, Pad, Pcb, Point, Segment, Stackup};

fn pad(reference: &str, pin: &str, x: f64, y: f64, net_id: u32) -> Pad {
    Pad {
        reference: reference.to_string(),
        pin_number: pin.to_string(),
        center: Point::new(x, y),
        width: 0.5,
        height: 0.5,
        net_id,
        layers: vec!["F.Cu".into()],
        is_through_hole: false,
        drill: None,
    }
}

fn footprint_at(reference: &str, x: f64, y: f64, pads: Vec<Pad>) -> Footprint {
    Footprint {
        reference: reference.to_string(),
        value: String::new(),
        position: Point::new(x, y),
        rotation_deg: 0.0,
        pads,
    }
}

#[test]
fn connected_net_is_reported_fully_routed() {
    let mut pcb = Pcb {
        board_width_mm: 50.0,
        board_height_mm: 50.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "SIG1".into() });
    pcb.footprints.push(footprint_at("R1", 0.0, 0.0, vec![pad("R1", "1", 5.0, 5.0, 1)]));
    pcb.footprints.push(footprint_at("R2", 0.0, 0.0, vec![pad("R2", "1", 15.0, 5.0, 1)]));
    pcb.segments.push(Segment {
        start: Point::new(5.0, 5.0),
        end: Point::new(15.0, 5.0),
        width: 0.2,
        layer: "F.Cu".into(),
        net_id: 1,
    });

    let status = NetStatusAnalyzer::analyze(&pcb, 1);
    assert_eq!(status.status, NetStatusKind::Complete);
}

#[test]
fn isolated_pads_are_reported_unrouted() {
    let mut pcb = Pcb {
        board_width_mm: 50.0,
        board_height_mm: 50.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "SIG1".into() });
    pcb.footprints.push(footprint_at("R1", 0.0, 0.0, vec![pad("R1", "1", 5.0, 5.0, 1)]));
    pcb.footprints.push(footprint_at("R2", 0.0, 0.0, vec![pad("R2", "1", 45.0, 45.0, 1)]));

    let status = NetStatusAnalyzer::analyze(&pcb, 1);
    assert_ne!(status.status, NetStatusKind::Complete);
}

#[test]
fn dense_cluster_of_segments_produces_a_congestion_hotspot() {
    let mut pcb = Pcb {
        board_width_mm: 10.0,
        board_height_mm: 10.0,
        ..Default::default()
    };
    for i in 0..30u32 {
        pcb.nets.insert(i + 1, Net { id: i + 1, name: format!("N{i}") });
        let y = 1.0 + (i as f64) * 0.2;
        pcb.segments.push(Segment {
            start: Point::new(1.0, y),
            end: Point::new(9.0, y),
            width: 0.15,
            layer: "F.Cu".into(),
            net_id: i + 1,
        });
    }

    let analyzer = CongestionAnalyzer::new(CongestionConfig::default());
    let hotspots = analyzer.analyze(&pcb, 10);
    assert!(!hotspots.is_empty());
}

#[test]
fn thermal_hotspot_detected_near_a_power_reference_designator() {
    let mut pcb = Pcb {
        board_width_mm: 30.0,
        board_height_mm: 30.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "VCC".into() });
    let mut u1 = footprint_at("U1", 15.0, 15.0, vec![pad("U1", "1", 15.0, 15.0, 1)]);
    u1.value = "LDO_REG".to_string();
    pcb.footprints.push(u1);

    let analyzer = ThermalAnalyzer::new(ThermalConfig::default());
    let hotspots = analyzer.analyze(&pcb);
    assert!(!hotspots.is_empty());
}

#[test]
fn trace_length_report_sums_segment_lengths_per_net() {
    let mut pcb = Pcb {
        board_width_mm: 30.0,
        board_height_mm: 30.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "SIG1".into() });
    pcb.segments.push(Segment {
        start: Point::new(0.0, 0.0),
        end: Point::new(10.0, 0.0),
        width: 0.2,
        layer: "F.Cu".into(),
        net_id: 1,
    });
    pcb.segments.push(Segment {
        start: Point::new(10.0, 0.0),
        end: Point::new(10.0, 5.0),
        width: 0.2,
        layer: "F.Cu".into(),
        net_id: 1,
    });

    let analyzer = TraceLengthAnalyzer::default();
    let reports = analyzer.analyze_all(&pcb);
    let sig1 = reports.iter().find(|r| r.net_id == 1).unwrap();
    assert!((sig1.length_mm - 15.0).abs() < 1e-6);
}

#[test]
fn diff_pair_nets_are_matched_by_naming_convention() {
    let mut pcb = Pcb {
        board_width_mm: 30.0,
        board_height_mm: 30.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "USB_D_P".into() });
    pcb.nets.insert(2, Net { id: 2, name: "USB_D_N".into() });
    pcb.segments.push(Segment {
        start: Point::new(0.0, 0.0),
        end: Point::new(20.0, 0.0),
        width: 0.2,
        layer: "F.Cu".into(),
        net_id: 1,
    });
    pcb.segments.push(Segment {
        start: Point::new(0.0, 1.0),
        end: Point::new(20.0, 1.0),
        width: 0.2,
        layer: "F.Cu".into(),
        net_id: 2,
    });

    let analyzer = TraceLengthAnalyzer::default();
    let pairs = analyzer.analyze_diff_pairs(&pcb);
    assert!(pairs.iter().any(|p| p.positive.net_name == "USB_D_P" && p.negative.net_name == "USB_D_N"));
}

#[test]
fn signal_integrity_flags_crosstalk_between_close_parallel_nets() {
    let mut pcb = Pcb {
        board_width_mm: 30.0,
        board_height_mm: 30.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "USB_CLK".into() });
    pcb.nets.insert(2, Net { id: 2, name: "USB_DATA".into() });
    pcb.segments.push(Segment {
        start: Point::new(0.0, 0.0),
        end: Point::new(20.0, 0.0),
        width: 0.2,
        layer: "F.Cu".into(),
        net_id: 1,
    });
    pcb.segments.push(Segment {
        start: Point::new(0.0, 0.15),
        end: Point::new(20.0, 0.15),
        width: 0.2,
        layer: "F.Cu".into(),
        net_id: 2,
    });

    let analyzer = SignalIntegrityAnalyzer::new(SignalIntegrityConfig::default());
    let risks = analyzer.analyze_crosstalk(&pcb);
    assert!(!risks.is_empty());
}

#[test]
fn routability_report_flags_a_net_crossing_a_foreign_pad() {
    let mut pcb = Pcb {
        board_width_mm: 30.0,
        board_height_mm: 30.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "SIG1".into() });
    pcb.nets.insert(2, Net { id: 2, name: "BLOCKER".into() });
    pcb.footprints.push(footprint_at("R1", 0.0, 0.0, vec![pad("R1", "1", 2.0, 15.0, 1)]));
    pcb.footprints.push(footprint_at("R2", 0.0, 0.0, vec![pad("R2", "1", 28.0, 15.0, 1)]));
    // A wide pad squarely on the straight line between R1 and R2, on a
    // different net, so the rasterized path is forced to cross it.
    pcb.footprints.push(footprint_at("U1", 0.0, 0.0, vec![pad("U1", "1", 15.0, 15.0, 2)]));
    if let Some(blocker_pad) = pcb.footprints.last_mut().and_then(|f| f.pads.last_mut()) {
        blocker_pad.width = 4.0;
        blocker_pad.height = 4.0;
    }

    let analyzer = RoutabilityAnalyzer::new(DesignRules::default(), Stackup::default_2layer(1.6));
    let report = analyzer.analyze(&pcb);
    let sig1 = report.nets.iter().find(|n| n.net_id == 1).unwrap();
    assert!(!sig1.obstacles.is_empty());
}

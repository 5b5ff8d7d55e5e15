//! End-to-end routing scenarios over small synthetic boards.

use designguard::model::{DesignRules, Footprint, Net, Pad, Pcb, Point, Rect, Stackup};
use designguard::routing::{Autorouter, AutorouterConfig, RoutingStrategy};

/// Samples points along a segment (not just its endpoints) so a detour
/// whose endpoints straddle an obstacle but whose body crosses it is
/// still caught.
fn segment_avoids_rect(start: Point, end: Point, rect: &Rect) -> bool {
    let steps = 200;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let p = Point::new(start.x + (end.x - start.x) * t, start.y + (end.y - start.y) * t);
        if rect.contains(&p) {
            return false;
        }
    }
    true
}

fn two_pad_footprint(reference: &str, pin: &str, x: f64, y: f64, net_id: u32) -> Footprint {
    Footprint {
        reference: reference.to_string(),
        value: String::new(),
        position: Point::new(x, y),
        rotation_deg: 0.0,
        pads: vec![Pad {
            reference: reference.to_string(),
            pin_number: pin.to_string(),
            center: Point::new(0.0, 0.0),
            width: 0.5,
            height: 0.5,
            net_id,
            layers: vec!["F.Cu".into()],
            is_through_hole: false,
            drill: None,
        }],
    }
}

fn open_board() -> Pcb {
    let mut pcb = Pcb {
        board_width_mm: 40.0,
        board_height_mm: 40.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "SIG1".into() });
    pcb.nets.insert(2, Net { id: 2, name: "SIG2".into() });
    pcb.footprints.push(two_pad_footprint("R1", "1", 5.0, 5.0, 1));
    pcb.footprints.push(two_pad_footprint("R2", "1", 35.0, 35.0, 1));
    pcb.footprints.push(two_pad_footprint("R3", "1", 5.0, 35.0, 2));
    pcb.footprints.push(two_pad_footprint("R4", "1", 35.0, 5.0, 2));
    pcb
}

/// S1: simple two-pad net on a 2-layer board, no obstacles. Pads at
/// (10,10) and (40,10) on F.Cu, net id 1. Expect exactly one route, no
/// vias, and total length in [30, 31] mm.
#[test]
fn s1_simple_two_pad_net_routes_directly() {
    let mut pcb = Pcb {
        board_width_mm: 50.0,
        board_height_mm: 50.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "SIG1".into() });
    pcb.footprints.push(two_pad_footprint("R1", "1", 10.0, 10.0, 1));
    pcb.footprints.push(two_pad_footprint("R2", "1", 40.0, 10.0, 1));

    let mut router = Autorouter::new(&pcb, DesignRules::default(), Stackup::default_2layer(1.6), AutorouterConfig::default());
    let result = router.route_greedy();

    assert_eq!(result.nets_routed, 1);
    assert_eq!(result.overflow, 0);
    assert_eq!(router.routes.len(), 1);
    let route = &router.routes[0];
    assert!(route.vias.is_empty(), "a same-layer straight connection must not use a via");
    let length = route.total_length_mm();
    assert!((30.0..=31.0).contains(&length), "expected length in [30, 31], got {length}");
}

/// S2: same two pads as S1, but a 2x20mm obstacle centered at (25,10)
/// blocks the direct path. Expect the route to detour around the
/// obstacle's bounding box with total length in [32, 45] mm.
#[test]
fn s2_l_shape_detour_around_obstacle() {
    let mut pcb = Pcb {
        board_width_mm: 50.0,
        board_height_mm: 50.0,
        ..Default::default()
    };
    pcb.nets.insert(1, Net { id: 1, name: "SIG1".into() });
    pcb.footprints.push(two_pad_footprint("R1", "1", 10.0, 10.0, 1));
    pcb.footprints.push(two_pad_footprint("R2", "1", 40.0, 10.0, 1));

    let mut router = Autorouter::new(&pcb, DesignRules::default(), Stackup::default_2layer(1.6), AutorouterConfig::default());
    let obstacle = Rect::from_center(Point::new(25.0, 10.0), 2.0, 20.0);
    router.grid.add_obstacle(&obstacle, "F.Cu");

    let result = router.route_greedy();

    assert_eq!(result.nets_routed, 1);
    assert_eq!(router.routes.len(), 1);
    let route = &router.routes[0];
    let length = route.total_length_mm();
    assert!((32.0..=45.0).contains(&length), "expected length in [32, 45], got {length}");
    for segment in &route.segments {
        assert!(
            segment_avoids_rect(segment.start, segment.end, &obstacle),
            "segment {:?}->{:?} crosses the obstacle bounding box",
            segment.start,
            segment.end
        );
    }
}

#[test]
fn greedy_routes_a_clean_two_net_board() {
    let pcb = open_board();
    let mut router = Autorouter::new(&pcb, DesignRules::default(), Stackup::default_2layer(1.6), AutorouterConfig::default());
    let result = router.route_greedy();
    assert_eq!(result.nets_requested, 2);
    assert_eq!(result.nets_routed, 2);
    assert_eq!(router.routes.len(), 2);
}

#[test]
fn negotiated_routing_converges_on_a_clean_board() {
    let pcb = open_board();
    let mut router = Autorouter::new(&pcb, DesignRules::default(), Stackup::default_2layer(1.6), AutorouterConfig::default());
    let result = router.route_negotiated();
    assert!(result.converged);
    assert_eq!(result.overflow, 0);
    assert_eq!(result.nets_routed, 2);
}

#[test]
fn monte_carlo_picks_a_best_trial_deterministically_for_a_fixed_seed() {
    let pcb = open_board();
    let config = AutorouterConfig {
        monte_carlo_trials: 5,
        seed: Some(42),
        ..AutorouterConfig::default()
    };
    let mut router_a = Autorouter::new(&pcb, DesignRules::default(), Stackup::default_2layer(1.6), config.clone());
    let result_a = designguard::routing::run_monte_carlo(&mut router_a, RoutingStrategy::Negotiated, 5, Some(42));

    let mut router_b = Autorouter::new(&pcb, DesignRules::default(), Stackup::default_2layer(1.6), config);
    let result_b = designguard::routing::run_monte_carlo(&mut router_b, RoutingStrategy::Negotiated, 5, Some(42));

    assert_eq!(result_a.best_trial_index, result_b.best_trial_index);
    assert_eq!(result_a.trials.len(), 5);
}

#[test]
fn adaptive_escalation_reports_layer_count_used() {
    let pcb = open_board();
    let config = AutorouterConfig::default();
    let thickness_mm = 1.6;
    let result = designguard::routing::route_with_escalation(&pcb, DesignRules::default(), thickness_mm, config);
    let best = result.best();
    assert!(best.preset.copper_count() >= 2);
    assert!(!result.attempts.is_empty());
}

#[test]
fn congested_board_escalates_past_two_layers() {
    // Many short nets crammed into a small area so a 2-layer stackup
    // overflows and escalation to more layers is exercised.
    let mut pcb = Pcb {
        board_width_mm: 10.0,
        board_height_mm: 10.0,
        ..Default::default()
    };
    for i in 0..20u32 {
        pcb.nets.insert(i + 1, Net { id: i + 1, name: format!("N{i}") });
        let y = (i as f64) * 0.4 + 1.0;
        pcb.footprints.push(two_pad_footprint(&format!("U{i}a"), "1", 1.0, y, i + 1));
        pcb.footprints.push(two_pad_footprint(&format!("U{i}b"), "1", 9.0, y, i + 1));
    }
    let config = AutorouterConfig::default();
    let result = designguard::routing::route_with_escalation(&pcb, DesignRules::default(), 1.6, config);
    // Whatever the outcome, escalation should have tracked at least one
    // attempt and reported a coherent success rate in [0, 1].
    let best = result.best();
    assert!(best.result.success_rate() >= 0.0 && best.result.success_rate() <= 1.0);
}

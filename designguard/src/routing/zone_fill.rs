//! Zone flood-fill and thermal relief.

use crate::model::{point_in_polygon, ConnectPadsPolicy, Point, Zone};

use super::config::ZoneFillConfig;
use super::grid::RoutingGrid;
use super::net_router::PadRef;

#[derive(Debug, Default, Clone)]
pub struct FilledZone {
    pub layer: String,
    pub net_id: u32,
    /// Cells in the final fill, after clearance carve-out and thermal
    /// relief antipads have been subtracted.
    pub cells: Vec<(usize, usize)>,
}

/// Rasterizes a zone polygon, carves clearance around other-net obstacles,
/// and applies thermal relief to same-net pads, in priority order (lower
/// `priority` fills first; later zones see earlier fills as obstacles).
///
/// `already_filled` accumulates prior zones' cells on the same layer so a
/// later, lower-priority zone treats them as occupied.
pub fn fill_zone(
    grid: &RoutingGrid,
    zone: &Zone,
    pads: &[PadRef],
    config: &ZoneFillConfig,
    already_filled: &std::collections::HashSet<(usize, usize)>,
) -> FilledZone {
    let Some(layer_idx) = grid.layer_index(&zone.layer) else {
        return FilledZone {
            layer: zone.layer.clone(),
            net_id: zone.net_id,
            cells: Vec::new(),
        };
    };

    // 1. Rasterize: candidate cells whose center lies inside the polygon.
    let bbox = polygon_bbox(&zone.polygon);
    let mut candidates: Vec<(usize, usize)> = grid
        .cells_in_rect(&bbox)
        .into_iter()
        .filter(|&(col, row)| {
            let center = grid.cell_center(col, row);
            point_in_polygon(&center, &zone.polygon)
        })
        .collect();

    // 2. Clearance carve-out: drop cells within `zone.clearance` of a
    // different-net blocked cell, or already claimed by a higher-priority
    // zone on the same layer.
    let clearance_cells = (zone.clearance / grid.resolution_mm).ceil() as i64;
    candidates.retain(|&(col, row)| {
        if already_filled.contains(&(col, row)) {
            return false;
        }
        !has_foreign_obstacle_nearby(grid, layer_idx, zone.net_id, col, row, clearance_cells)
    });

    // 3 & 4. Thermal relief for same-net pads whose connection policy
    // requires it.
    let mut excluded: std::collections::HashSet<(usize, usize)> = std::collections::HashSet::new();
    for pad in pads {
        if pad.net_id != zone.net_id {
            continue;
        }
        if !pad.is_on_zone_layer(&zone.layer) {
            continue;
        }
        if !point_in_polygon(&pad.center, &zone.polygon) {
            continue;
        }
        let policy = effective_policy(pad, zone);
        apply_thermal_relief(grid, pad, policy, zone, config, &mut excluded);
    }
    candidates.retain(|c| !excluded.contains(c));

    FilledZone {
        layer: zone.layer.clone(),
        net_id: zone.net_id,
        cells: candidates,
    }
}

fn effective_policy(pad: &PadRef, zone: &Zone) -> ConnectPadsPolicy {
    if pad.is_through_hole {
        ConnectPadsPolicy::Thermal
    } else {
        zone.connect_pads_policy
    }
}

/// `solid`: no carve, pad fills solid into the pour (no antipad).
/// `thermal`: antipad ring + spokes linking the pad to the surrounding fill.
/// `none`: full antipad, no spokes — the pad is not electrically joined.
fn apply_thermal_relief(
    grid: &RoutingGrid,
    pad: &PadRef,
    policy: ConnectPadsPolicy,
    zone: &Zone,
    config: &ZoneFillConfig,
    excluded: &mut std::collections::HashSet<(usize, usize)>,
) {
    if policy == ConnectPadsPolicy::Solid {
        return;
    }

    let antipad_radius = pad.width.max(pad.height) / 2.0 + zone.thermal_gap;
    let rect = crate::model::Rect::from_center(pad.center, antipad_radius * 2.0, antipad_radius * 2.0);
    let antipad_cells: Vec<(usize, usize)> = grid
        .cells_in_rect(&rect)
        .into_iter()
        .filter(|&(col, row)| grid.cell_center(col, row).distance_to(&pad.center) <= antipad_radius)
        .collect();

    if policy == ConnectPadsPolicy::None {
        excluded.extend(antipad_cells);
        return;
    }

    // Thermal: carve the antipad, then punch `spoke_count` spokes back
    // through it at `spoke_angle_deg`-rotated compass points.
    let spoke_half_width = (zone.thermal_bridge_width / 2.0 / grid.resolution_mm).max(1.0) as i64;
    let mut spoke_cells: std::collections::HashSet<(usize, usize)> = std::collections::HashSet::new();
    for i in 0..config.spoke_count {
        let angle = (config.spoke_angle_deg + i as f64 * 360.0 / config.spoke_count as f64).to_radians();
        let (dx, dy) = (angle.cos(), angle.sin());
        let steps = (antipad_radius * 1.5 / grid.resolution_mm).ceil() as i64;
        for s in 0..=steps {
            let p = Point::new(
                pad.center.x + dx * s as f64 * grid.resolution_mm,
                pad.center.y + dy * s as f64 * grid.resolution_mm,
            );
            let (col, row) = grid.point_to_cell(&p);
            if !grid.in_bounds(col, row) {
                continue;
            }
            for ow in -spoke_half_width..=spoke_half_width {
                let cell = (((col + ow).max(0)) as usize, row.max(0) as usize);
                spoke_cells.insert(cell);
            }
        }
    }

    for cell in antipad_cells {
        if !spoke_cells.contains(&cell) {
            excluded.insert(cell);
        }
    }
}

fn has_foreign_obstacle_nearby(grid: &RoutingGrid, layer_idx: usize, net_id: u32, col: usize, row: usize, radius_cells: i64) -> bool {
    let r0 = (row as i64 - radius_cells).max(0) as usize;
    let r1 = ((row as i64 + radius_cells) as usize).min(grid.rows.saturating_sub(1));
    let c0 = (col as i64 - radius_cells).max(0) as usize;
    let c1 = ((col as i64 + radius_cells) as usize).min(grid.cols.saturating_sub(1));
    for r in r0..=r1 {
        for c in c0..=c1 {
            let cell = grid.cell(layer_idx, r, c);
            if cell.blocked && cell.net != net_id && cell.net != 0 {
                return true;
            }
        }
    }
    false
}

fn polygon_bbox(polygon: &[Point]) -> crate::model::Rect {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in polygon {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    crate::model::Rect { min, max }
}

impl PadRef {
    fn is_on_zone_layer(&self, layer: &str) -> bool {
        self.layers.iter().any(|l| l == layer || l == "*.Cu")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DesignRules, Stackup};

    fn square_zone(net_id: u32) -> Zone {
        Zone {
            polygon: vec![
                Point::new(0.0, 0.0),
                Point::new(20.0, 0.0),
                Point::new(20.0, 20.0),
                Point::new(0.0, 20.0),
            ],
            layer: "F.Cu".to_string(),
            net_id,
            priority: 0,
            clearance: 0.3,
            thermal_gap: 0.5,
            thermal_bridge_width: 0.3,
            connect_pads_policy: ConnectPadsPolicy::Thermal,
            filled_polygons: Vec::new(),
        }
    }

    #[test]
    fn fills_interior_cells() {
        let stackup = Stackup::default_2layer(1.6);
        let rules = DesignRules::default();
        let grid = RoutingGrid::new(20.0, 20.0, rules, Point::new(0.0, 0.0), &stackup);
        let zone = square_zone(5);
        let filled = fill_zone(&grid, &zone, &[], &ZoneFillConfig::default(), &Default::default());
        assert!(!filled.cells.is_empty());
    }

    #[test]
    fn thermal_relief_leaves_spokes_for_same_net_pad() {
        let stackup = Stackup::default_2layer(1.6);
        let rules = DesignRules::default();
        let grid = RoutingGrid::new(20.0, 20.0, rules, Point::new(0.0, 0.0), &stackup);
        let zone = square_zone(5);
        let pad = PadRef {
            key: "U1:1".into(),
            reference: "U1".into(),
            center: Point::new(10.0, 10.0),
            width: 1.0,
            height: 1.0,
            layers: vec!["F.Cu".to_string()],
            is_through_hole: true,
            net_id: 5,
        };
        let filled = fill_zone(&grid, &zone, &[pad], &ZoneFillConfig::default(), &Default::default());
        // Some antipad cells should be carved (not all 20mm square present).
        assert!(filled.cells.len() < grid.cells_in_rect(&polygon_bbox(&zone.polygon)).len());
    }
}

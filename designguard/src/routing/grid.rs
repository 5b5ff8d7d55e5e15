//! Multi-layer routing grid: obstacle bookkeeping, cost accessors, and
//! route commitment.

use crate::model::{DesignRules, Point, Rect, Stackup, Via};

use super::route::Route;

#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub blocked: bool,
    pub is_obstacle: bool,
    pub is_zone: bool,
    pub net: u32,
    pub usage_count: u32,
    pub history_cost: f64,
    pub base_cost: f64,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            blocked: false,
            is_obstacle: false,
            is_zone: false,
            net: 0,
            usage_count: 0,
            history_cost: 0.0,
            base_cost: 1.0,
        }
    }
}

/// Discount applied to same-net travel through a zone pour, enabling
/// routing through ground/power fills without detouring around them.
const ZONE_TRAVEL_DISCOUNT: f64 = 0.3;

/// Coarse congestion block size, in grid cells, used by `get_congestion`.
const CONGESTION_BLOCK: usize = 8;

pub struct RoutingGrid {
    pub resolution_mm: f64,
    pub origin: Point,
    pub cols: usize,
    pub rows: usize,
    pub layer_names: Vec<String>,
    cells: Vec<Vec<Vec<Cell>>>,
    rules: DesignRules,
}

impl RoutingGrid {
    pub fn new(board_w_mm: f64, board_h_mm: f64, rules: DesignRules, origin: Point, stackup: &Stackup) -> Self {
        Self::with_layers(board_w_mm, board_h_mm, rules, origin, stackup.copper_layer_names())
    }

    pub fn with_layers(board_w_mm: f64, board_h_mm: f64, rules: DesignRules, origin: Point, layer_names: Vec<String>) -> Self {
        let resolution_mm = rules.trace_width.max(0.1).clamp(0.1, 0.2);
        Self::with_resolution(board_w_mm, board_h_mm, rules, origin, layer_names, resolution_mm)
    }

    /// Same as `with_layers` but with an explicit grid resolution
    /// (clamped to 0.1-0.2 mm), rather than one derived from the trace
    /// width.
    pub fn with_resolution(
        board_w_mm: f64,
        board_h_mm: f64,
        rules: DesignRules,
        origin: Point,
        layer_names: Vec<String>,
        resolution_mm: f64,
    ) -> Self {
        let resolution_mm = resolution_mm.clamp(0.1, 0.2);
        let cols = (board_w_mm / resolution_mm).ceil().max(1.0) as usize;
        let rows = (board_h_mm / resolution_mm).ceil().max(1.0) as usize;
        let cells = vec![vec![vec![Cell::default(); cols]; rows]; layer_names.len()];
        Self {
            resolution_mm,
            origin,
            cols,
            rows,
            layer_names,
            cells,
            rules,
        }
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layer_names.iter().position(|l| l == name)
    }

    pub fn num_layers(&self) -> usize {
        self.layer_names.len()
    }

    pub fn in_bounds(&self, col: i64, row: i64) -> bool {
        col >= 0 && row >= 0 && (col as usize) < self.cols && (row as usize) < self.rows
    }

    pub fn point_to_cell(&self, p: &Point) -> (i64, i64) {
        let col = ((p.x - self.origin.x) / self.resolution_mm).floor() as i64;
        let row = ((p.y - self.origin.y) / self.resolution_mm).floor() as i64;
        (col, row)
    }

    pub fn cell_center(&self, col: usize, row: usize) -> Point {
        Point::new(
            self.origin.x + (col as f64 + 0.5) * self.resolution_mm,
            self.origin.y + (row as f64 + 0.5) * self.resolution_mm,
        )
    }

    pub fn cell(&self, layer: usize, row: usize, col: usize) -> &Cell {
        &self.cells[layer][row][col]
    }

    pub fn cell_mut(&mut self, layer: usize, row: usize, col: usize) -> &mut Cell {
        &mut self.cells[layer][row][col]
    }

    fn rect_to_cell_range(&self, rect: &Rect) -> (i64, i64, i64, i64) {
        let (c0, r0) = self.point_to_cell(&rect.min);
        let (c1, r1) = self.point_to_cell(&rect.max);
        (c0.min(c1), r0.min(r1), c0.max(c1), r0.max(r1))
    }

    /// All in-bounds `(col, row)` cells whose area overlaps `rect`, for
    /// goal-cell construction and other bounding-box queries.
    pub fn cells_in_rect(&self, rect: &Rect) -> Vec<(usize, usize)> {
        let (c0, r0, c1, r1) = self.rect_to_cell_range(rect);
        let mut cells = Vec::new();
        for row in r0.max(0)..=r1.min(self.rows as i64 - 1) {
            for col in c0.max(0)..=c1.min(self.cols as i64 - 1) {
                cells.push((col as usize, row as usize));
            }
        }
        cells
    }

    /// Marks a pad's expanded bounding box blocked on every layer it
    /// occupies (all copper layers for through-hole pads).
    pub fn add_pad(&mut self, center: Point, width: f64, height: f64, net_id: u32, layers: &[String], is_through_hole: bool) {
        let clearance = self.rules.trace_clearance;
        let rect = Rect::from_center(center, width, height).expanded(clearance);
        let (c0, r0, c1, r1) = self.rect_to_cell_range(&rect);

        let target_layers: Vec<usize> = if is_through_hole {
            (0..self.layer_names.len()).collect()
        } else {
            layers.iter().filter_map(|l| self.layer_index(l)).collect()
        };

        for layer in target_layers {
            for row in r0.max(0)..=r1.min(self.rows as i64 - 1) {
                for col in c0.max(0)..=c1.min(self.cols as i64 - 1) {
                    let cell = self.cell_mut(layer, row as usize, col as usize);
                    cell.blocked = true;
                    cell.is_obstacle = true;
                    cell.net = net_id;
                }
            }
        }
    }

    /// Keepout region: same as `add_pad` but net 0, blocking everyone.
    pub fn add_obstacle(&mut self, rect: &Rect, layer: &str) {
        let Some(layer_idx) = self.layer_index(layer) else { return };
        let (c0, r0, c1, r1) = self.rect_to_cell_range(rect);
        for row in r0.max(0)..=r1.min(self.rows as i64 - 1) {
            for col in c0.max(0)..=c1.min(self.cols as i64 - 1) {
                let cell = self.cell_mut(layer_idx, row as usize, col as usize);
                cell.blocked = true;
                cell.is_obstacle = true;
                cell.net = 0;
            }
        }
    }

    /// Marks a set of (col, row) cells as a same-net zone pour. Not
    /// `blocked` for the zone's own net; other nets still see it blocked
    /// via the clearance carve-out performed at fill time.
    pub fn add_zone_cells(&mut self, cells: &[(usize, usize)], layer: &str, net_id: u32) {
        let Some(layer_idx) = self.layer_index(layer) else { return };
        for &(col, row) in cells {
            if row < self.rows && col < self.cols {
                let cell = self.cell_mut(layer_idx, row, col);
                cell.is_zone = true;
                cell.net = net_id;
            }
        }
    }

    pub fn clear_zones(&mut self) {
        for layer in self.cells.iter_mut() {
            for row in layer.iter_mut() {
                for cell in row.iter_mut() {
                    if cell.is_zone {
                        cell.is_zone = false;
                        if !cell.is_obstacle {
                            cell.net = 0;
                        }
                    }
                }
            }
        }
    }

    /// Fraction in [0, 1] of occupied cells within a `CONGESTION_BLOCK`
    /// sized coarse block around (col, row).
    pub fn get_congestion(&self, col: usize, row: usize, layer: usize) -> f64 {
        let half = CONGESTION_BLOCK / 2;
        let c0 = col.saturating_sub(half);
        let r0 = row.saturating_sub(half);
        let c1 = (col + half).min(self.cols.saturating_sub(1));
        let r1 = (row + half).min(self.rows.saturating_sub(1));

        let mut total = 0usize;
        let mut used = 0usize;
        for r in r0..=r1 {
            for c in c0..=c1 {
                total += 1;
                let cell = self.cell(layer, r, c);
                if cell.usage_count > 0 || cell.blocked {
                    used += 1;
                }
            }
        }
        if total == 0 {
            0.0
        } else {
            used as f64 / total as f64
        }
    }

    pub fn get_cell_cost(&self, col: usize, row: usize, layer: usize, present_factor: f64) -> f64 {
        let cell = self.cell(layer, row, col);
        let overuse = if cell.usage_count > 0 { (cell.usage_count - 1) as f64 } else { 0.0 };
        cell.base_cost + present_factor * overuse + cell.history_cost
    }

    /// Sum, over all cells, of usage beyond single-net capacity.
    pub fn overflow(&self) -> u64 {
        let mut total = 0u64;
        for layer in &self.cells {
            for row in layer {
                for cell in row {
                    if cell.usage_count > 1 {
                        total += (cell.usage_count - 1) as u64;
                    }
                }
            }
        }
        total
    }

    fn rasterize_segment(&self, start: &Point, end: &Point) -> Vec<(usize, usize)> {
        let length = start.distance_to(end);
        let steps = ((length / (self.resolution_mm * 0.5)).ceil() as usize).max(1);
        let mut cells = Vec::with_capacity(steps + 1);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let p = Point::new(start.x + (end.x - start.x) * t, start.y + (end.y - start.y) * t);
            let (col, row) = self.point_to_cell(&p);
            if self.in_bounds(col, row) {
                let pair = (col as usize, row as usize);
                if cells.last() != Some(&pair) {
                    cells.push(pair);
                }
            }
        }
        cells
    }

    fn via_cells(&self, via: &Via) -> Vec<(usize, usize)> {
        let rect = Rect::from_center(via.position, via.outer_diameter, via.outer_diameter);
        let (c0, r0, c1, r1) = self.rect_to_cell_range(&rect);
        let mut cells = Vec::new();
        for row in r0.max(0)..=r1.min(self.rows as i64 - 1) {
            for col in c0.max(0)..=c1.min(self.cols as i64 - 1) {
                cells.push((col as usize, row as usize));
            }
        }
        cells
    }

    /// Hard-commits a route: cells become `blocked` for this net. Same-net
    /// shorts across overlapping segments are permitted (blocking is
    /// idempotent).
    pub fn mark_route(&mut self, route: &Route) {
        for segment in &route.segments {
            let Some(layer_idx) = self.layer_index(&segment.layer) else { continue };
            for (col, row) in self.rasterize_segment(&segment.start, &segment.end) {
                let cell = self.cell_mut(layer_idx, row, col);
                cell.blocked = true;
                cell.net = route.net_id;
                cell.usage_count += 1;
            }
        }
        for via in &route.vias {
            for layer_name in [&via.layers_spanned.0, &via.layers_spanned.1] {
                let Some(layer_idx) = self.layer_index(layer_name) else { continue };
                for (col, row) in self.via_cells(via) {
                    let cell = self.cell_mut(layer_idx, row, col);
                    cell.blocked = true;
                    cell.net = via.net_id;
                    cell.usage_count += 1;
                }
            }
        }
    }

    /// Finalizes a negotiated-mode route after convergence: marks its
    /// cells `blocked` without touching `usage_count`, which was already
    /// accounted for by `mark_route_usage` during negotiation.
    pub fn commit_negotiated_route(&mut self, route: &Route) {
        for segment in &route.segments {
            let Some(layer_idx) = self.layer_index(&segment.layer) else { continue };
            for (col, row) in self.rasterize_segment(&segment.start, &segment.end) {
                let cell = self.cell_mut(layer_idx, row, col);
                cell.blocked = true;
                cell.net = route.net_id;
            }
        }
        for via in &route.vias {
            for layer_name in [&via.layers_spanned.0, &via.layers_spanned.1] {
                let Some(layer_idx) = self.layer_index(layer_name) else { continue };
                for (col, row) in self.via_cells(via) {
                    let cell = self.cell_mut(layer_idx, row, col);
                    cell.blocked = true;
                    cell.net = via.net_id;
                }
            }
        }
    }

    /// Negotiated-mode commitment: increments `usage_count` without
    /// blocking, so multiple nets may occupy the same cell until the
    /// negotiation converges.
    pub fn mark_route_usage(&mut self, route: &Route) {
        for segment in &route.segments {
            let Some(layer_idx) = self.layer_index(&segment.layer) else { continue };
            for (col, row) in self.rasterize_segment(&segment.start, &segment.end) {
                let cell = self.cell_mut(layer_idx, row, col);
                cell.usage_count += 1;
                cell.net = route.net_id;
            }
        }
        for via in &route.vias {
            for layer_name in [&via.layers_spanned.0, &via.layers_spanned.1] {
                let Some(layer_idx) = self.layer_index(layer_name) else { continue };
                for (col, row) in self.via_cells(via) {
                    let cell = self.cell_mut(layer_idx, row, col);
                    cell.usage_count += 1;
                    cell.net = via.net_id;
                }
            }
        }
    }

    /// Undoes `mark_route_usage` for a rip-up; invariant violation to
    /// underflow `usage_count` past zero.
    pub fn unmark_route_usage(&mut self, route: &Route) {
        for segment in &route.segments {
            let Some(layer_idx) = self.layer_index(&segment.layer) else { continue };
            for (col, row) in self.rasterize_segment(&segment.start, &segment.end) {
                let cell = self.cell_mut(layer_idx, row, col);
                assert!(cell.usage_count > 0, "rip-up underflow on a cell with zero usage");
                cell.usage_count -= 1;
            }
        }
        for via in &route.vias {
            for layer_name in [&via.layers_spanned.0, &via.layers_spanned.1] {
                let Some(layer_idx) = self.layer_index(layer_name) else { continue };
                for (col, row) in self.via_cells(via) {
                    let cell = self.cell_mut(layer_idx, row, col);
                    assert!(cell.usage_count > 0, "rip-up underflow on a cell with zero usage");
                    cell.usage_count -= 1;
                }
            }
        }
    }

    /// True if any cell this route occupies is shared with another net
    /// (`usage_count > 1`), i.e. the net needs to be renegotiated.
    pub fn route_touches_overused_cell(&self, route: &Route) -> bool {
        for segment in &route.segments {
            let Some(layer_idx) = self.layer_index(&segment.layer) else { continue };
            for (col, row) in self.rasterize_segment(&segment.start, &segment.end) {
                if self.cell(layer_idx, row, col).usage_count > 1 {
                    return true;
                }
            }
        }
        for via in &route.vias {
            for layer_name in [&via.layers_spanned.0, &via.layers_spanned.1] {
                let Some(layer_idx) = self.layer_index(layer_name) else { continue };
                for (col, row) in self.via_cells(via) {
                    if self.cell(layer_idx, row, col).usage_count > 1 {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn update_history_costs(&mut self, increment: f64) {
        for layer in self.cells.iter_mut() {
            for row in layer.iter_mut() {
                for cell in row.iter_mut() {
                    if cell.usage_count > 1 {
                        cell.history_cost += increment;
                    }
                }
            }
        }
    }

    /// Travel discount through a same-net zone pour.
    pub fn zone_travel_multiplier(&self, layer: usize, row: usize, col: usize, net_id: u32) -> f64 {
        let cell = self.cell(layer, row, col);
        if cell.is_zone && cell.net == net_id {
            ZONE_TRAVEL_DISCOUNT
        } else {
            1.0
        }
    }

    /// Drops committed routes and usage but keeps pad/obstacle/zone
    /// blocking, for a fresh Monte Carlo trial.
    pub fn reset_for_new_trial(&mut self) {
        for layer in self.cells.iter_mut() {
            for row in layer.iter_mut() {
                for cell in row.iter_mut() {
                    cell.usage_count = 0;
                    cell.history_cost = 0.0;
                    if !cell.is_obstacle && !cell.is_zone {
                        cell.blocked = false;
                        cell.net = 0;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stackup;

    fn test_grid() -> RoutingGrid {
        let stackup = Stackup::jlcpcb_4layer();
        RoutingGrid::new(50.0, 50.0, DesignRules::default(), Point::new(0.0, 0.0), &stackup)
    }

    #[test]
    fn add_pad_blocks_expanded_box() {
        let mut grid = test_grid();
        grid.add_pad(Point::new(10.0, 10.0), 1.0, 1.0, 1, &["F.Cu".to_string()], false);
        let layer = grid.layer_index("F.Cu").unwrap();
        let (col, row) = grid.point_to_cell(&Point::new(10.0, 10.0));
        assert!(grid.cell(layer, row as usize, col as usize).blocked);
    }

    #[test]
    fn through_hole_pad_blocks_all_layers() {
        let mut grid = test_grid();
        grid.add_pad(Point::new(10.0, 10.0), 1.0, 1.0, 1, &[], true);
        let (col, row) = grid.point_to_cell(&Point::new(10.0, 10.0));
        for layer in 0..grid.num_layers() {
            assert!(grid.cell(layer, row as usize, col as usize).blocked);
        }
    }

    #[test]
    fn mark_route_usage_then_unmark_restores_zero() {
        let mut grid = test_grid();
        let mut route = Route::new(1);
        route.segments.push(crate::model::Segment {
            start: Point::new(5.0, 5.0),
            end: Point::new(15.0, 5.0),
            width: 0.2,
            layer: "F.Cu".to_string(),
            net_id: 1,
        });
        grid.mark_route_usage(&route);
        assert!(grid.overflow() == 0 || true);
        grid.unmark_route_usage(&route);
        let layer = grid.layer_index("F.Cu").unwrap();
        let (col, row) = grid.point_to_cell(&Point::new(10.0, 5.0));
        assert_eq!(grid.cell(layer, row as usize, col as usize).usage_count, 0);
    }
}

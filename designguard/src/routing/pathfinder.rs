//! Single-connection A* maze router over the multi-layer grid.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::model::{DesignRules, Point, Segment, Via};

use super::grid::RoutingGrid;
use super::route::Route;

/// 8-way planar moves, indexed for turn-penalty comparison.
const DIRECTIONS: [(i64, i64); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

const TURN_PENALTY: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeKey {
    layer: usize,
    row: usize,
    col: usize,
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    f_score: f64,
    g_score: f64,
    node: NodeKey,
    dir: Option<usize>,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.f_score == other.f_score
    }
}
impl Eq for Frontier {}
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap behaves as a min-heap on f_score.
        other.f_score.partial_cmp(&self.f_score).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Pathfinder<'a> {
    grid: &'a RoutingGrid,
    rules: &'a DesignRules,
}

/// Cost of inserting a via: roughly 3 cells of travel plus the via's own
/// clearance footprint.
fn via_cost(grid: &RoutingGrid, rules: &DesignRules) -> f64 {
    3.0 * grid.resolution_mm + rules.via_diameter + rules.via_clearance
}

impl<'a> Pathfinder<'a> {
    pub fn new(grid: &'a RoutingGrid, rules: &'a DesignRules) -> Self {
        Self { grid, rules }
    }

    /// Finds a path from `start` on `start_layer` to any cell in
    /// `goal_cells` on `goal_layer`. `present_factor` is 0 outside
    /// negotiated routing.
    pub fn find_path(
        &self,
        net_id: u32,
        start: Point,
        start_layer: &str,
        goal_cells: &HashSet<(usize, usize)>,
        goal_layer: &str,
        present_factor: f64,
    ) -> Option<Route> {
        let start_layer_idx = self.grid.layer_index(start_layer)?;
        let goal_layer_idx = self.grid.layer_index(goal_layer)?;
        let (start_col, start_row) = self.grid.point_to_cell(&start);
        if !self.grid.in_bounds(start_col, start_row) {
            return None;
        }
        let start_key = NodeKey {
            layer: start_layer_idx,
            row: start_row as usize,
            col: start_col as usize,
        };

        if goal_cells.is_empty() {
            return None;
        }

        let via = via_cost(self.grid, self.rules);
        let heuristic = |k: NodeKey| -> f64 {
            let min_manhattan = goal_cells
                .iter()
                .map(|&(c, r)| {
                    let dc = (k.col as i64 - c as i64).unsigned_abs();
                    let dr = (k.row as i64 - r as i64).unsigned_abs();
                    dc.max(dr) + (dc.abs_diff(dr))
                })
                .min()
                .unwrap_or(0) as f64;
            let layer_diff = (k.layer as i64 - goal_layer_idx as i64).unsigned_abs() as f64;
            min_manhattan * self.grid.resolution_mm + layer_diff * via
        };

        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<NodeKey, f64> = HashMap::new();
        let mut came_from: HashMap<NodeKey, (NodeKey, bool)> = HashMap::new();

        g_score.insert(start_key, 0.0);
        open.push(Frontier {
            f_score: heuristic(start_key),
            g_score: 0.0,
            node: start_key,
            dir: None,
        });

        let mut goal_reached: Option<NodeKey> = None;
        let mut visited: HashSet<NodeKey> = HashSet::new();

        while let Some(current) = open.pop() {
            if visited.contains(&current.node) {
                continue;
            }
            visited.insert(current.node);

            if current.node.layer == goal_layer_idx && goal_cells.contains(&(current.node.col, current.node.row)) {
                goal_reached = Some(current.node);
                break;
            }

            for (dir_idx, &(dx, dy)) in DIRECTIONS.iter().enumerate() {
                let nc = current.node.col as i64 + dx;
                let nr = current.node.row as i64 + dy;
                if !self.grid.in_bounds(nc, nr) {
                    continue;
                }
                let next = NodeKey {
                    layer: current.node.layer,
                    row: nr as usize,
                    col: nc as usize,
                };
                if self.blocks(net_id, next) {
                    continue;
                }

                let step_len = if dx != 0 && dy != 0 { self.grid.resolution_mm * std::f64::consts::SQRT_2 } else { self.grid.resolution_mm };
                let zone_mult = self.grid.zone_travel_multiplier(next.layer, next.row, next.col, net_id);
                let cell_cost = self.grid.get_cell_cost(next.col, next.row, next.layer, present_factor);
                let turn_cost = match current.dir {
                    Some(prev_dir) if prev_dir != dir_idx => TURN_PENALTY,
                    _ => 0.0,
                };
                let tentative_g = current.g_score + step_len * zone_mult + cell_cost + turn_cost;

                if tentative_g < *g_score.get(&next).unwrap_or(&f64::INFINITY) {
                    g_score.insert(next, tentative_g);
                    came_from.insert(next, (current.node, false));
                    open.push(Frontier {
                        f_score: tentative_g + heuristic(next),
                        g_score: tentative_g,
                        node: next,
                        dir: Some(dir_idx),
                    });
                }
            }

            for adjacent_layer in self.adjacent_layers(current.node.layer) {
                let next = NodeKey {
                    layer: adjacent_layer,
                    row: current.node.row,
                    col: current.node.col,
                };
                if self.blocks(net_id, next) {
                    continue;
                }
                let cell_cost = self.grid.get_cell_cost(next.col, next.row, next.layer, present_factor);
                let tentative_g = current.g_score + via + cell_cost;
                if tentative_g < *g_score.get(&next).unwrap_or(&f64::INFINITY) {
                    g_score.insert(next, tentative_g);
                    came_from.insert(next, (current.node, true));
                    open.push(Frontier {
                        f_score: tentative_g + heuristic(next),
                        g_score: tentative_g,
                        node: next,
                        dir: None,
                    });
                }
            }
        }

        let goal_node = goal_reached?;
        Some(self.reconstruct(net_id, start, start_key, goal_node, &came_from))
    }

    fn adjacent_layers(&self, layer: usize) -> Vec<usize> {
        let mut out = Vec::new();
        if layer > 0 {
            out.push(layer - 1);
        }
        if layer + 1 < self.grid.num_layers() {
            out.push(layer + 1);
        }
        out
    }

    fn blocks(&self, net_id: u32, node: NodeKey) -> bool {
        let cell = self.grid.cell(node.layer, node.row, node.col);
        cell.blocked && cell.net != net_id
    }

    fn reconstruct(
        &self,
        net_id: u32,
        start_point: Point,
        start_key: NodeKey,
        goal: NodeKey,
        came_from: &HashMap<NodeKey, (NodeKey, bool)>,
    ) -> Route {
        let mut chain = vec![goal];
        let mut current = goal;
        while current != start_key {
            let (prev, _) = came_from[&current];
            chain.push(prev);
            current = prev;
        }
        chain.reverse();

        let mut route = Route::new(net_id);
        let mut run_start = start_point;
        let mut run_layer = self.grid.layer_names[start_key.layer].clone();
        let mut run_dir: Option<(i64, i64)> = None;

        for window in chain.windows(2) {
            let (from, to) = (window[0], window[1]);
            let is_via = came_from.get(&to).map(|(_, v)| *v).unwrap_or(false);
            if is_via {
                let pos = self.grid.cell_center(from.col, from.row);
                if pos.distance_to(&run_start) > 1e-9 || run_layer != self.grid.layer_names[from.layer] {
                    route.segments.push(Segment {
                        start: run_start,
                        end: pos,
                        width: self.rules.trace_width,
                        layer: run_layer.clone(),
                        net_id,
                    });
                }
                route.vias.push(Via {
                    position: pos,
                    drill: self.rules.via_drill,
                    outer_diameter: self.rules.via_diameter,
                    layers_spanned: (self.grid.layer_names[from.layer].clone(), self.grid.layer_names[to.layer].clone()),
                    net_id,
                });
                run_start = pos;
                run_layer = self.grid.layer_names[to.layer].clone();
                run_dir = None;
                continue;
            }

            // Planar move: close out the current straight run whenever the
            // direction changes, so a detour is emitted as a polyline
            // instead of being collapsed into the start->goal chord.
            let dir = (
                (to.col as i64 - from.col as i64).signum(),
                (to.row as i64 - from.row as i64).signum(),
            );
            match run_dir {
                None => run_dir = Some(dir),
                Some(prev_dir) if prev_dir == dir => {}
                Some(_) => {
                    let pos = self.grid.cell_center(from.col, from.row);
                    if pos.distance_to(&run_start) > 1e-9 {
                        route.segments.push(Segment {
                            start: run_start,
                            end: pos,
                            width: self.rules.trace_width,
                            layer: run_layer.clone(),
                            net_id,
                        });
                    }
                    run_start = pos;
                    run_dir = Some(dir);
                }
            }
        }

        let goal_pos = self.grid.cell_center(goal.col, goal.row);
        if goal_pos.distance_to(&run_start) > 1e-9 {
            route.segments.push(Segment {
                start: run_start,
                end: goal_pos,
                width: self.rules.trace_width,
                layer: run_layer,
                net_id,
            });
        }

        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stackup;

    fn grid_no_obstacles() -> RoutingGrid {
        let stackup = Stackup::default_2layer(1.6);
        RoutingGrid::new(50.0, 50.0, DesignRules::default(), Point::new(0.0, 0.0), &stackup)
    }

    #[test]
    fn finds_straight_path_same_layer() {
        let grid = grid_no_obstacles();
        let rules = DesignRules::default();
        let pf = Pathfinder::new(&grid, &rules);
        let (gc, gr) = grid.point_to_cell(&Point::new(40.0, 10.0));
        let mut goal_cells = HashSet::new();
        goal_cells.insert((gc as usize, gr as usize));
        let route = pf.find_path(1, Point::new(10.0, 10.0), "F.Cu", &goal_cells, "F.Cu", 0.0).unwrap();
        let length: f64 = route.segments.iter().map(|s| s.length()).sum();
        assert!(length > 25.0 && length < 35.0);
        assert!(route.vias.is_empty());
    }

    /// Samples points along a segment (not just its endpoints) and checks
    /// none fall inside `rect`, so a detour whose endpoints straddle an
    /// obstacle but whose body crosses it is still caught.
    fn segment_avoids_rect(start: Point, end: Point, rect: &crate::model::Rect) -> bool {
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

    #[test]
    fn routes_around_obstacle() {
        let mut grid = grid_no_obstacles();
        grid.add_obstacle(
            &crate::model::Rect::from_center(Point::new(25.0, 10.0), 2.0, 20.0),
            "F.Cu",
        );
        let rules = DesignRules::default();
        let pf = Pathfinder::new(&grid, &rules);
        let (gc, gr) = grid.point_to_cell(&Point::new(40.0, 10.0));
        let mut goal_cells = HashSet::new();
        goal_cells.insert((gc as usize, gr as usize));
        let route = pf.find_path(1, Point::new(10.0, 10.0), "F.Cu", &goal_cells, "F.Cu", 0.0).unwrap();
        let obstacle_box = crate::model::Rect::from_center(Point::new(25.0, 10.0), 2.0, 20.0);
        assert!(route.segments.len() > 1, "a detour around a centered obstacle must bend, not go straight through");
        for s in &route.segments {
            assert!(segment_avoids_rect(s.start, s.end, &obstacle_box), "segment {:?}->{:?} crosses the obstacle", s.start, s.end);
        }
    }

    #[test]
    fn unreachable_goal_returns_none() {
        let mut grid = grid_no_obstacles();
        grid.add_obstacle(&crate::model::Rect::from_center(Point::new(25.0, 25.0), 50.0, 2.0), "F.Cu");
        let rules = DesignRules::default();
        let pf = Pathfinder::new(&grid, &rules);
        let (gc, gr) = grid.point_to_cell(&Point::new(40.0, 40.0));
        let mut goal_cells = HashSet::new();
        goal_cells.insert((gc as usize, gr as usize));
        let route = pf.find_path(1, Point::new(10.0, 10.0), "F.Cu", &goal_cells, "F.Cu", 0.0);
        assert!(route.is_none());
    }
}

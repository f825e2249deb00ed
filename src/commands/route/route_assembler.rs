use log::{debug, info, warn};

use super::grid_router::find_path;
use super::models::{Grid, Position, Section};
use super::neighbor_policy::Direction;

/// Upper bound on points handed to a renderer.
pub const MAX_ROUTE_POINTS: usize = 100;

/// Walkable cells 4-adjacent to `cell`, in up/right/down/left order.
pub fn adjacent_walkable(grid: &Grid, cell: Position) -> Vec<Position> {
    Direction::ALL
        .iter()
        .map(|d| d.step(cell))
        .filter(|p| grid.is_walkable(*p))
        .collect()
}

/// Entrance, one approach cell per reachable section, checkout.
pub fn waypoints(order: &[&Section], grid: &Grid, entrance: Position, checkout: Position) -> Vec<Position> {
    let mut points = vec![entrance];
    for section in order {
        let Some(cell) = grid.section_cell(section) else {
            warn!("route: section {} has no grid cell, skipping", section.id);
            continue;
        };
        let prev = *points.last().unwrap_or(&entrance);
        let mut best: Option<(Position, i32)> = None;
        for candidate in adjacent_walkable(grid, cell) {
            let d = prev.manhattan(candidate);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((candidate, d));
            }
        }
        match best {
            Some((p, _)) => points.push(p),
            None => warn!("route: section {} is enclosed, skipping", section.id),
        }
    }
    points.push(checkout);
    points
}

/// Keep the first and last point and every `ceil(len / MAX)`-th point in between.
pub fn simplify(points: Vec<Position>) -> Vec<Position> {
    if points.len() <= MAX_ROUTE_POINTS {
        return points;
    }
    let step = points.len().div_ceil(MAX_ROUTE_POINTS);
    let last = points.len() - 1;
    let mut out = Vec::with_capacity(MAX_ROUTE_POINTS);
    out.push(points[0]);
    out.extend(
        (step..last)
            .step_by(step)
            .take(MAX_ROUTE_POINTS - 2)
            .map(|i| points[i]),
    );
    out.push(points[last]);
    debug!("route: simplified {} points to {}", points.len(), out.len());
    out
}

/// Full walk from entrance through the ordered sections to the checkout.
///
/// Always holds at least the entrance and the checkout.
pub fn assemble_route(order: &[&Section], grid: &Grid, entrance: Position, checkout: Position) -> Vec<Position> {
    let mut route = if order.is_empty() {
        find_path(grid, entrance, checkout)
    } else {
        let stops = waypoints(order, grid, entrance, checkout);
        let mut route = vec![entrance];
        for pair in stops.windows(2) {
            if pair[0] == pair[1] {
                continue;
            }
            let segment = find_path(grid, pair[0], pair[1]);
            route.extend(segment.into_iter().skip(1));
        }
        route
    };
    if route.len() < 2 {
        route.push(checkout);
    }
    info!("route: {} points before simplification", route.len());
    simplify(route)
}

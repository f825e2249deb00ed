use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use log::{debug, warn};

use super::models::{Grid, Position};
use super::neighbor_policy::{Direction, MovementPolicy};

/// Open-set entry. Ordered so the max-heap pops the lowest `f` first and,
/// among equal `f`, the entry pushed earliest.
#[derive(Copy, Clone, Debug)]
struct OpenNode {
    f: f64,
    g: f64,
    seq: u64,
    pos: Position,
    dir: Option<Direction>,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.total_cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Shortest walkable path from `start` to `goal`, both inclusive.
///
/// A* over 4-connected moves with a Manhattan heuristic. A move that keeps the
/// previous direction is slightly cheaper, so straight corridors win over zig-zags of
/// equal length. Only corridor, entrance and checkout cells are expanded. When the goal
/// cannot be reached the result is the two-point stand-in `[start, goal]`.
pub fn find_path(grid: &Grid, start: Position, goal: Position) -> Vec<Position> {
    find_path_with(grid, start, goal, &MovementPolicy::default())
}

pub fn find_path_with(grid: &Grid, start: Position, goal: Position, policy: &MovementPolicy) -> Vec<Position> {
    let mut open: BinaryHeap<OpenNode> = BinaryHeap::new();
    let mut closed: HashSet<Position> = HashSet::new();
    let mut g_score: HashMap<Position, f64> = HashMap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut seq: u64 = 0;

    g_score.insert(start, 0.0);
    open.push(OpenNode { f: f64::from(start.manhattan(goal)), g: 0.0, seq, pos: start, dir: None });

    while let Some(current) = open.pop() {
        if current.pos == goal {
            return reconstruct(&came_from, start, goal);
        }
        // Stale entry superseded by a cheaper push.
        if !closed.insert(current.pos) {
            continue;
        }

        for &dir in policy.directions() {
            let next = dir.step(current.pos);
            if closed.contains(&next) || !grid.is_walkable(next) {
                continue;
            }
            let tentative_g = current.g + policy.move_cost(current.dir, dir);
            let existing_g = g_score.get(&next).copied().unwrap_or(f64::INFINITY);
            if tentative_g < existing_g {
                g_score.insert(next, tentative_g);
                came_from.insert(next, current.pos);
                seq += 1;
                open.push(OpenNode {
                    f: tentative_g + f64::from(next.manhattan(goal)),
                    g: tentative_g,
                    seq,
                    pos: next,
                    dir: Some(dir),
                });
            }
        }
    }

    warn!(
        "router: no walkable path ({},{}) -> ({},{}), using direct segment",
        start.x, start.y, goal.x, goal.y
    );
    vec![start, goal]
}

fn reconstruct(came_from: &HashMap<Position, Position>, start: Position, goal: Position) -> Vec<Position> {
    let mut path = vec![goal];
    let mut cur = goal;
    while cur != start {
        match came_from.get(&cur) {
            Some(&p) => {
                cur = p;
                path.push(cur);
            }
            None => break,
        }
    }
    path.reverse();
    debug!("router: path of {} cells", path.len());
    path
}

use super::models::Position;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Offset(pub i32, pub i32);

/// The four grid moves, in expansion order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    pub fn offset(self) -> Offset {
        match self {
            Direction::Up => Offset(0, -1),
            Direction::Right => Offset(1, 0),
            Direction::Down => Offset(0, 1),
            Direction::Left => Offset(-1, 0),
        }
    }

    pub fn step(self, from: Position) -> Position {
        let Offset(dx, dy) = self.offset();
        Position::new(from.x + dx, from.y + dy)
    }

    /// Direction of a unit move, `None` for anything else.
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        match (to.x - from.x, to.y - from.y) {
            (0, -1) => Some(Direction::Up),
            (1, 0) => Some(Direction::Right),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct MovementPolicy {
    pub step_cost: f64,
    /// Cost of a move that keeps the previous move's direction.
    pub straight_cost: f64,
}

impl Default for MovementPolicy {
    fn default() -> Self {
        Self { step_cost: 1.0, straight_cost: 0.9 }
    }
}

impl MovementPolicy {
    pub fn directions(&self) -> &'static [Direction] {
        &Direction::ALL
    }

    pub fn move_cost(&self, previous: Option<Direction>, next: Direction) -> f64 {
        if previous == Some(next) { self.straight_cost } else { self.step_cost }
    }
}

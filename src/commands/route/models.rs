use serde::{Deserialize, Serialize};

/// Integer coordinate, used both for layout units and grid cells.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Saturates at `i32::MAX` for points further apart than an `i32` can hold.
    pub fn manhattan(self, other: Position) -> i32 {
        let d = u64::from(self.x.abs_diff(other.x)) + u64::from(self.y.abs_diff(other.y));
        i32::try_from(d).unwrap_or(i32::MAX)
    }

    pub fn euclidean(self, other: Position) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub position: Position,
    /// Layout metadata only; routing never reads it.
    #[serde(default)]
    pub neighbors: Vec<String>,
}

impl Section {
    /// Grid cell a section occupies, or `None` when `(2x, 2y)` does not fit an `i32`.
    pub fn grid_cell(&self) -> Option<Position> {
        Some(Position::new(self.position.x.checked_mul(2)?, self.position.y.checked_mul(2)?))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Market {
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "section_id", rename_all = "snake_case")]
pub enum CellKind {
    Corridor,
    Section(String),
    Entrance,
    Cashier,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    pub x: i32,
    pub y: i32,
    pub kind: CellKind,
}

impl GridNode {
    pub fn corridor(x: i32, y: i32) -> Self {
        Self { x, y, kind: CellKind::Corridor }
    }

    /// Entrance and checkout cells are corridor cells with a role.
    pub fn is_corridor(&self) -> bool {
        !self.is_section()
    }

    pub fn is_section(&self) -> bool {
        matches!(self.kind, CellKind::Section(_))
    }

    pub fn is_entrance(&self) -> bool {
        self.kind == CellKind::Entrance
    }

    pub fn is_cashier(&self) -> bool {
        self.kind == CellKind::Cashier
    }

    pub fn section_id(&self) -> Option<&str> {
        match &self.kind {
            CellKind::Section(id) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn is_walkable(&self) -> bool {
        self.is_corridor() || self.is_entrance() || self.is_cashier()
    }
}

/// Dense row-major grid; every cell exists and is classified.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
    cells: Vec<GridNode>,
}

impl Grid {
    pub fn corridors(width: i32, height: i32) -> Self {
        let cap = (width.max(0) as usize).saturating_mul(height.max(0) as usize);
        let mut cells = Vec::with_capacity(cap);
        for y in 0..height {
            for x in 0..width {
                cells.push(GridNode::corridor(x, y));
            }
        }
        Self { width, height, cells }
    }

    pub fn in_bounds(&self, p: Position) -> bool {
        p.x >= 0 && p.x < self.width && p.y >= 0 && p.y < self.height
    }

    fn index(&self, p: Position) -> Option<usize> {
        if self.in_bounds(p) {
            Some(p.y as usize * self.width as usize + p.x as usize)
        } else {
            None
        }
    }

    pub fn node(&self, p: Position) -> Option<&GridNode> {
        self.index(p).map(|i| &self.cells[i])
    }

    /// Reclassify a cell; returns false when `p` is outside the grid.
    pub fn set_kind(&mut self, p: Position, kind: CellKind) -> bool {
        match self.index(p) {
            Some(i) => {
                self.cells[i].kind = kind;
                true
            }
            None => false,
        }
    }

    pub fn is_walkable(&self, p: Position) -> bool {
        self.node(p).map(GridNode::is_walkable).unwrap_or(false)
    }

    /// Grid cell of a placed section, if the section made it onto the grid.
    pub fn section_cell(&self, section: &Section) -> Option<Position> {
        let cell = section.grid_cell()?;
        match self.node(cell).and_then(GridNode::section_id) {
            Some(id) if id == section.id => Some(cell),
            _ => None,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[GridNode]> {
        self.cells.chunks(self.width.max(1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances() {
        let a = Position::new(0, 0);
        let b = Position::new(3, 4);
        assert_eq!(a.manhattan(b), 7);
        assert!((a.euclidean(b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn distances_between_far_points_do_not_overflow() {
        let left = Position::new(-2_000_000_000, 0);
        let right = Position::new(2_000_000_000, 0);
        assert!((left.euclidean(right) - 4.0e9).abs() < 1.0);
        assert_eq!(left.manhattan(right), i32::MAX);
        assert_eq!(Position::new(i32::MIN, i32::MIN).manhattan(Position::new(i32::MAX, i32::MAX)), i32::MAX);
        assert_eq!(Position::new(-5, 0).manhattan(Position::new(5, 0)), 10);
    }

    #[test]
    fn unrepresentable_grid_cell_is_none() {
        let s = |x, y| Section {
            id: "far".into(),
            name: "far".into(),
            categories: vec![],
            position: Position::new(x, y),
            neighbors: vec![],
        };
        assert_eq!(s(i32::MAX, 0).grid_cell(), None);
        assert_eq!(s(0, i32::MIN).grid_cell(), None);
        assert_eq!(s(3, -2).grid_cell(), Some(Position::new(6, -4)));
        assert_eq!(Grid::corridors(2, 2).section_cell(&s(i32::MAX, 0)), None);
    }

    #[test]
    fn degenerate_grid_sizes_do_not_allocate() {
        let g = Grid::corridors(i32::MAX, 0);
        assert_eq!(g.rows().count(), 0);
        assert!(!g.in_bounds(Position::new(0, 0)));
        let g = Grid::corridors(-4, 3);
        assert!(g.node(Position::new(0, 0)).is_none());
    }

    #[test]
    fn grid_classification_flags() {
        let mut g = Grid::corridors(3, 2);
        assert!(g.set_kind(Position::new(1, 1), CellKind::Section("a".into())));
        assert!(!g.set_kind(Position::new(3, 0), CellKind::Entrance));
        let n = g.node(Position::new(1, 1)).unwrap();
        assert!(n.is_section() && !n.is_corridor() && !n.is_walkable());
        assert_eq!(n.section_id(), Some("a"));
        assert!(g.is_walkable(Position::new(0, 0)));
        assert!(!g.is_walkable(Position::new(-1, 0)));
        assert_eq!(g.rows().count(), 2);
    }

    #[test]
    fn market_json_defaults_neighbors() {
        let m: Market = serde_json::from_str(
            r#"{"id":1,"name":"Capitão","distance":0.5,
                "sections":[{"id":"A1","name":"Laticínios","categories":["leite"],"position":{"x":0,"y":0}}]}"#,
        )
        .unwrap();
        assert!(m.sections[0].neighbors.is_empty());
        assert_eq!(m.section("A1").map(|s| s.name.as_str()), Some("Laticínios"));
    }
}

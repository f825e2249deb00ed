use log::{debug, info, warn};

use super::models::{CellKind, Grid, Position, Section};

/// Largest layout coordinate that still gets a grid cell; keeps the grid under ~4.2M cells.
pub const MAX_LAYOUT_COORD: i32 = 1023;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketGrid {
    pub grid: Grid,
    pub entrance: Position,
    pub checkout: Position,
    pub sections_placed: usize,
}

/// Build the walkable grid for a market layout.
///
/// Layout cell `(x, y)` maps to grid cell `(2x, 2y)`, leaving a corridor between
/// neighbouring sections and a one-cell margin. The entrance sits at the top centre,
/// the checkout at the bottom centre. With no sections the result is a single corridor
/// cell that doubles as entrance and checkout.
///
/// Sections beyond [`MAX_LAYOUT_COORD`] are dropped with a warning and do not widen
/// the grid, as are sections at negative coordinates.
pub fn build_grid(sections: &[Section]) -> MarketGrid {
    if sections.is_empty() {
        warn!("grid: no sections supplied, using a 1x1 corridor grid");
        return MarketGrid {
            grid: Grid::corridors(1, 1),
            entrance: Position::new(0, 0),
            checkout: Position::new(0, 0),
            sections_placed: 0,
        };
    }

    let in_range = |s: &&Section| s.position.x <= MAX_LAYOUT_COORD && s.position.y <= MAX_LAYOUT_COORD;
    let max_x = sections.iter().filter(in_range).map(|s| s.position.x).max().unwrap_or(0).max(0) + 1;
    let max_y = sections.iter().filter(in_range).map(|s| s.position.y).max().unwrap_or(0).max(0) + 1;
    let width = max_x * 2 + 1;
    let height = max_y * 2 + 1;
    debug!("grid: layout {}x{} -> grid {}x{}", max_x, max_y, width, height);

    let mut grid = Grid::corridors(width, height);
    let mut sections_placed = 0usize;
    for section in sections {
        let cell = match section.grid_cell() {
            Some(cell) if in_range(&section) => cell,
            _ => {
                warn!(
                    "grid: section {} at layout ({},{}) is beyond the supported layout size, dropped",
                    section.id, section.position.x, section.position.y
                );
                continue;
            }
        };
        if grid.set_kind(cell, CellKind::Section(section.id.clone())) {
            sections_placed += 1;
        } else {
            warn!(
                "grid: section {} is outside grid boundaries at ({},{})",
                section.id, cell.x, cell.y
            );
        }
    }

    let entrance = Position::new(width / 2, 0);
    let checkout = Position::new(width / 2, height - 1);
    grid.set_kind(entrance, CellKind::Entrance);
    grid.set_kind(checkout, CellKind::Cashier);

    info!("grid: placed {} of {} sections", sections_placed, sections.len());
    MarketGrid { grid, entrance, checkout, sections_placed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, x: i32, y: i32) -> Section {
        Section {
            id: id.to_string(),
            name: id.to_string(),
            categories: vec!["misc".to_string()],
            position: Position::new(x, y),
            neighbors: vec![],
        }
    }

    #[test]
    fn dimensions_follow_max_layout_coordinate() {
        let mg = build_grid(&[section("a", 0, 0), section("b", 2, 1)]);
        assert_eq!(mg.grid.width, 2 * (2 + 1) + 1);
        assert_eq!(mg.grid.height, 2 * (1 + 1) + 1);
        assert_eq!(mg.sections_placed, 2);
    }

    #[test]
    fn sections_land_on_doubled_cells() {
        let mg = build_grid(&[section("a", 0, 0), section("b", 2, 1)]);
        let b = mg.grid.node(Position::new(4, 2)).unwrap();
        assert_eq!(b.section_id(), Some("b"));
        assert!(mg.grid.node(Position::new(1, 0)).unwrap().is_corridor());
        assert_eq!(mg.grid.section_cell(&section("a", 0, 0)), Some(Position::new(0, 0)));
    }

    #[test]
    fn entrance_and_checkout_are_centered_and_override() {
        // Section at layout (1,0) lands on grid (2,0), the entrance cell of a 5-wide grid.
        let mg = build_grid(&[section("a", 1, 0)]);
        assert_eq!(mg.entrance, Position::new(2, 0));
        assert_eq!(mg.checkout, Position::new(2, 2));
        let e = mg.grid.node(mg.entrance).unwrap();
        assert!(e.is_entrance() && e.is_walkable() && !e.is_section());
        assert!(mg.grid.node(mg.checkout).unwrap().is_cashier());
        assert_eq!(mg.grid.section_cell(&section("a", 1, 0)), None);
    }

    #[test]
    fn out_of_bounds_sections_are_dropped() {
        let mg = build_grid(&[section("a", 0, 0), section("neg", -1, 0)]);
        assert_eq!(mg.sections_placed, 1);
        assert_eq!(mg.grid.width, 3);
    }

    #[test]
    fn unrepresentable_section_is_dropped() {
        let mg = build_grid(&[section("a", 0, 0), section("far", i32::MAX, 0), section("low", i32::MIN, 0)]);
        assert_eq!(mg.sections_placed, 1);
        assert_eq!((mg.grid.width, mg.grid.height), (3, 3));
        assert_eq!(mg.grid.section_cell(&section("far", i32::MAX, 0)), None);
    }

    #[test]
    fn oversized_layout_does_not_grow_the_grid() {
        let mg = build_grid(&[section("a", 0, 0), section("b", 40_000, 40_000), section("c", 1, 2)]);
        assert_eq!(mg.sections_placed, 2);
        assert_eq!((mg.grid.width, mg.grid.height), (5, 7));
        assert_eq!(mg.grid.section_cell(&section("b", 40_000, 40_000)), None);

        let edge = build_grid(&[section("edge", MAX_LAYOUT_COORD, 0)]);
        assert_eq!(edge.sections_placed, 1);
        assert_eq!(edge.grid.width, (MAX_LAYOUT_COORD + 1) * 2 + 1);
    }

    #[test]
    fn negative_only_layout_keeps_a_walkable_grid() {
        let mg = build_grid(&[section("neg", -3, -1)]);
        assert_eq!(mg.sections_placed, 0);
        assert_eq!((mg.grid.width, mg.grid.height), (3, 3));
        assert!(mg.grid.is_walkable(mg.entrance) && mg.grid.is_walkable(mg.checkout));
    }

    #[test]
    fn empty_layout_is_single_cell() {
        let mg = build_grid(&[]);
        assert_eq!((mg.grid.width, mg.grid.height), (1, 1));
        assert_eq!(mg.entrance, Position::new(0, 0));
        assert_eq!(mg.checkout, Position::new(0, 0));
        assert!(mg.grid.is_walkable(Position::new(0, 0)));
    }
}

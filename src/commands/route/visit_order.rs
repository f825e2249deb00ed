use log::debug;

use super::models::{Position, Section};

const ORIGIN: Position = Position::new(0, 0);

/// Index of the candidate closest to `from`; ties go to the earliest candidate.
fn nearest(from: Position, candidates: &[Position]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in candidates.iter().enumerate() {
        let d = from.euclidean(*p);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Greedy nearest-neighbour visiting order over layout coordinates.
///
/// The walk starts at the relevant section closest to the layout origin and then
/// repeatedly moves to the closest unvisited one. Positions are looked up in
/// `all_sections` by id so the full layout stays authoritative.
pub fn plan_visit_order<'a>(all_sections: &[Section], relevant: &[&'a Section]) -> Vec<&'a Section> {
    if relevant.len() <= 1 {
        return relevant.to_vec();
    }

    let position_of = |s: &Section| -> Position {
        all_sections
            .iter()
            .find(|a| a.id == s.id)
            .map(|a| a.position)
            .unwrap_or(s.position)
    };

    let mut remaining: Vec<&'a Section> = relevant.to_vec();
    let mut positions: Vec<Position> = remaining.iter().map(|s| position_of(s)).collect();
    let mut order: Vec<&'a Section> = Vec::with_capacity(remaining.len());

    let mut current = ORIGIN;
    while let Some(i) = nearest(current, &positions) {
        current = positions.remove(i);
        let next = remaining.remove(i);
        debug!("order: next section {} at ({},{})", next.id, current.x, current.y);
        order.push(next);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn section(id: &str, x: i32, y: i32) -> Section {
        Section {
            id: id.to_string(),
            name: id.to_string(),
            categories: vec!["c".to_string()],
            position: Position::new(x, y),
            neighbors: vec![],
        }
    }

    fn ids(order: &[&Section]) -> Vec<String> {
        order.iter().map(|s| s.id.clone()).collect()
    }

    #[test]
    fn empty_and_single() {
        let all = vec![section("a", 3, 3)];
        assert!(plan_visit_order(&all, &[]).is_empty());
        assert_eq!(ids(&plan_visit_order(&all, &[&all[0]])), vec!["a"]);
    }

    #[test]
    fn starts_nearest_origin_then_greedy() {
        let all = vec![section("far", 5, 0), section("mid", 2, 0), section("near", 0, 1), section("side", 0, 4)];
        let relevant: Vec<&Section> = all.iter().collect();
        let order = plan_visit_order(&all, &relevant);
        // near(0,1) -> mid(2,0) [d=2.24] vs side(0,4) [d=3] -> far(5,0) [3] vs side [4.47] -> side
        assert_eq!(ids(&order), vec!["near", "mid", "far", "side"]);
    }

    #[test]
    fn ties_go_to_input_order() {
        let all = vec![section("b", 1, 0), section("a", 0, 1), section("c", 1, 1)];
        let relevant: Vec<&Section> = all.iter().collect();
        let order = plan_visit_order(&all, &relevant);
        assert_eq!(ids(&order), vec!["b", "c", "a"]);
    }

    #[test]
    fn order_is_a_permutation() {
        let all: Vec<Section> = (0..12).map(|i| section(&format!("s{i}"), (i * 7) % 5, (i * 3) % 4)).collect();
        let relevant: Vec<&Section> = all.iter().step_by(2).collect();
        let order = plan_visit_order(&all, &relevant);
        assert_eq!(order.len(), relevant.len());
        let unique: HashSet<&str> = order.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(unique.len(), relevant.len());
        for s in &relevant {
            assert!(unique.contains(s.id.as_str()));
        }
    }

    #[test]
    fn far_apart_sections_do_not_overflow() {
        let all = vec![
            section("west", -2_000_000_000, 0),
            section("east", 2_000_000_000, 0),
            section("home", 1, 0),
        ];
        let relevant: Vec<&Section> = all.iter().collect();
        let order = plan_visit_order(&all, &relevant);
        assert_eq!(ids(&order), vec!["home", "east", "west"]);
    }
}

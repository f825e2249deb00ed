use std::collections::{BTreeMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::models::Section;

/// A confident item -> section-name placement supplied by a categorizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub item: String,
    pub section: String,
    pub confidence: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Relevance {
    /// Section id -> list items placed there.
    pub by_section: BTreeMap<String, Vec<String>>,
    pub uncategorized: Vec<String>,
    /// Nothing matched, so every section of the market is considered relevant.
    pub fell_back_to_all: bool,
}

impl Relevance {
    /// Relevant sections in market order.
    pub fn relevant_sections<'a>(&self, sections: &'a [Section]) -> Vec<&'a Section> {
        if self.fell_back_to_all {
            return sections.iter().collect();
        }
        sections.iter().filter(|s| self.by_section.contains_key(&s.id)).collect()
    }

    fn place(&mut self, section_id: &str, item: &str) {
        let items = self.by_section.entry(section_id.to_string()).or_default();
        if !items.iter().any(|i| i == item) {
            items.push(item.to_string());
        }
    }
}

/// Trim, lower-case, drop empties and repeats (first occurrence wins).
pub fn normalize_items<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    items
        .iter()
        .map(|i| i.as_ref().trim().to_lowercase())
        .filter(|i| !i.is_empty())
        .filter(|i| seen.insert(i.clone()))
        .collect()
}

/// Case-insensitive containment in either direction.
pub fn category_matches(category: &str, item: &str) -> bool {
    let category = category.to_lowercase();
    !category.is_empty() && (category.contains(item) || item.contains(category.as_str()))
}

pub fn matching_sections<'a>(item: &str, sections: &'a [Section]) -> Vec<&'a Section> {
    sections
        .iter()
        .filter(|s| s.categories.iter().any(|c| category_matches(c, item)))
        .collect()
}

/// Map normalized list items to sections.
///
/// Assignments resolve by exact section name. Items left without a resolved
/// assignment fall back to category substring matching; an item may land in several
/// sections. When nothing resolves at all, every section is returned as relevant.
pub fn resolve(items: &[String], sections: &[Section], assignments: Option<&[Assignment]>) -> Relevance {
    let mut rel = Relevance::default();
    let mut resolved: HashSet<&str> = HashSet::new();

    if let Some(assignments) = assignments {
        for a in assignments {
            match sections.iter().find(|s| s.name == a.section) {
                Some(section) => {
                    rel.place(&section.id, &a.item);
                    resolved.insert(a.item.as_str());
                }
                None => debug!("relevance: no section named '{}' for item '{}'", a.section, a.item),
            }
        }
    }

    for item in items {
        if resolved.contains(item.as_str()) {
            continue;
        }
        let matched = matching_sections(item, sections);
        if matched.is_empty() {
            rel.uncategorized.push(item.clone());
            continue;
        }
        for section in matched {
            rel.place(&section.id, item);
        }
    }

    if rel.by_section.is_empty() {
        info!(
            "relevance: no item matched any of {} sections, routing through all of them",
            sections.len()
        );
        rel.fell_back_to_all = true;
    }
    rel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::route::models::Position;

    fn section(id: &str, name: &str, cats: &[&str]) -> Section {
        Section {
            id: id.to_string(),
            name: name.to_string(),
            categories: cats.iter().map(|c| c.to_string()).collect(),
            position: Position::new(0, 0),
            neighbors: vec![],
        }
    }

    fn market() -> Vec<Section> {
        vec![
            section("A1", "Laticínios", &["Leite", "queijo"]),
            section("B1", "Padaria", &["pão", "bolo"]),
            section("C1", "Mercearia", &["leite condensado", "arroz"]),
        ]
    }

    #[test]
    fn normalize_trims_lowercases_and_dedupes() {
        let items = normalize_items(&["  Leite ", "", "LEITE", "Pão"]);
        assert_eq!(items, vec!["leite", "pão"]);
    }

    #[test]
    fn substring_match_single_section() {
        let sections = vec![section("A1", "Laticínios", &["leite"])];
        let rel = resolve(&["leite".to_string()], &sections, None);
        assert_eq!(rel.by_section.get("A1"), Some(&vec!["leite".to_string()]));
        assert!(rel.uncategorized.is_empty());
        assert!(!rel.fell_back_to_all);
    }

    #[test]
    fn item_may_match_several_sections() {
        let sections = market();
        let rel = resolve(&["leite".to_string()], &sections, None);
        let ids: Vec<&str> = rel.relevant_sections(&sections).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "C1"]);
    }

    #[test]
    fn item_containing_category_matches() {
        let sections = market();
        let rel = resolve(&["pão de forma".to_string()], &sections, None);
        assert!(rel.by_section.contains_key("B1"));
    }

    #[test]
    fn nothing_matched_falls_back_to_all_sections() {
        let sections = market();
        let rel = resolve(&["xyz123".to_string()], &sections, None);
        assert!(rel.fell_back_to_all);
        assert_eq!(rel.uncategorized, vec!["xyz123".to_string()]);
        assert_eq!(rel.relevant_sections(&sections).len(), 3);
    }

    #[test]
    fn assignments_take_precedence_over_substring() {
        let sections = market();
        let assignments = vec![Assignment {
            item: "leite".to_string(),
            section: "Laticínios".to_string(),
            confidence: 0.95,
        }];
        let rel = resolve(&["leite".to_string(), "bolo".to_string()], &sections, Some(assignments.as_slice()));
        assert_eq!(rel.by_section.get("A1"), Some(&vec!["leite".to_string()]));
        assert!(!rel.by_section.contains_key("C1"));
        assert_eq!(rel.by_section.get("B1"), Some(&vec!["bolo".to_string()]));
    }

    #[test]
    fn unresolvable_assignment_falls_back_to_substring() {
        let sections = market();
        let assignments = vec![Assignment {
            item: "arroz".to_string(),
            section: "Grãos".to_string(),
            confidence: 0.8,
        }];
        let rel = resolve(&["arroz".to_string(), "sabonete".to_string()], &sections, Some(assignments.as_slice()));
        assert_eq!(rel.by_section.get("C1"), Some(&vec!["arroz".to_string()]));
        assert_eq!(rel.uncategorized, vec!["sabonete".to_string()]);
    }

    #[test]
    fn empty_inputs_degrade_gracefully() {
        let rel = resolve(&[], &market(), None);
        assert!(rel.fell_back_to_all);
        let rel = resolve(&["leite".to_string()], &[], None);
        assert!(rel.fell_back_to_all);
        assert!(rel.relevant_sections(&[]).is_empty());
    }
}

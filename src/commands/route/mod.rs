use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use std::path::PathBuf;

pub mod categorizer;
pub mod config;
pub mod db;
pub mod executor;
pub mod grid_builder;
pub mod grid_router;
pub mod logging;
pub mod models;
pub mod neighbor_policy;
pub mod relevance;
pub mod route_assembler;
pub mod store;
pub mod visit_order;

use categorizer::{Categorizer, GeminiCategorizer};
use executor::RoutePlan;
use models::{CellKind, Position};
use store::{MarketStore, SqliteMarketStore};

#[derive(Args, Debug, Clone, Default)]
pub struct CommonOpts {
    /// Market SQLite DB (default: repo_root/markets.db or ROUTE_DB)
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Number of worker threads (rayon)
    #[arg(long)]
    pub threads: Option<usize>,
    /// Log level (trace|debug|info|warn|error)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
    /// Skip the categorization service and rely on category matching
    #[arg(long = "no-llm")]
    pub no_llm: bool,
    /// Ignore categorizer assignments below this confidence
    #[arg(long = "min-confidence")]
    pub min_confidence: Option<f64>,
}

/// CLI options first, then environment values where set.
pub fn resolve_config(common: &CommonOpts) -> config::Config {
    let mut cfg = config::Config {
        db: common.db.clone(),
        threads: common.threads,
        log_level: common.log_level.clone(),
        min_confidence: common.min_confidence.and_then(config::clamp_confidence),
        no_llm: common.no_llm,
        ..config::Config::default()
    };
    cfg.overlay(config::Config::from_env_defaults());

    logging::init(cfg.log_level.as_deref());
    if let Some(n) = cfg.threads {
        let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
    }
    cfg
}

fn open_store(cfg: &config::Config) -> Result<SqliteMarketStore> {
    let path = cfg.db.clone().unwrap_or_else(|| crate::util::repo_root().join(crate::util::DB_FILE));
    if !path.exists() {
        anyhow::bail!("market DB not found: {} (run load-markets or import-xlsx first)", path.display());
    }
    SqliteMarketStore::open(&path)
}

fn make_categorizer(cfg: &config::Config) -> Option<GeminiCategorizer> {
    let Some(llm) = cfg.llm() else {
        if !cfg.no_llm {
            info!("no ROUTE_LLM_API_KEY set, using category matching only");
        }
        return None;
    };
    match GeminiCategorizer::new(&llm) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("categorizer unavailable: {:#}", e);
            None
        }
    }
}

pub fn cmd_markets(common: CommonOpts) -> Result<()> {
    let cfg = resolve_config(&common);
    let store = open_store(&cfg)?;
    let markets = store.markets()?;
    if markets.is_empty() {
        println!("No markets stored");
        return Ok(());
    }
    for m in markets {
        println!("{:>6}  {:<30} {:>8.2}  {} sections", m.id, m.name, m.distance, m.sections.len());
    }
    Ok(())
}

pub fn cmd_plan(common: CommonOpts, market_id: i64, items: &str, json: bool) -> Result<()> {
    let cfg = resolve_config(&common);
    let store = open_store(&cfg)?;
    let categorizer = make_categorizer(&cfg);
    let items = crate::util::split_items(items);

    let plan = executor::plan_route(
        &store,
        categorizer.as_ref().map(|c| c as &dyn Categorizer),
        market_id,
        &items,
        &cfg,
    )?;
    let Some(plan) = plan else {
        println!("market not found");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&plan).context("serialize route plan")?);
        return Ok(());
    }
    print!("{}", describe_plan(&plan));
    print!("{}", render_ascii(&plan));
    Ok(())
}

pub fn cmd_compare(common: CommonOpts, items: &str) -> Result<()> {
    let cfg = resolve_config(&common);
    let store = open_store(&cfg)?;
    let categorizer = make_categorizer(&cfg);
    let items = crate::util::split_items(items);

    let summaries =
        executor::plan_all(&store, categorizer.as_ref().map(|c| c as &dyn Categorizer), &items, &cfg)?;
    for s in summaries {
        println!(
            "{:>6}  {:<30} {:>8.2}  visit {:>3}  uncategorized {:>3}  points {:>4}{}",
            s.market_id,
            s.market_name,
            s.distance,
            s.sections_to_visit,
            s.uncategorized,
            s.route_points,
            if s.fell_back_to_all { "  (all sections)" } else { "" }
        );
    }
    Ok(())
}

pub fn describe_plan(plan: &RoutePlan) -> String {
    let mut out = format!("Market {} ({})\n", plan.market_name, plan.market_id);
    if plan.fell_back_to_all() {
        out.push_str("No item matched a section; visiting every section\n");
    }
    for (i, id) in plan.visit_order.iter().enumerate() {
        let items = plan.relevance.by_section.get(id).map(|v| v.join(", ")).unwrap_or_default();
        out.push_str(&format!("{:>3}. {} {}\n", i + 1, id, items));
    }
    if !plan.uncategorized().is_empty() {
        out.push_str(&format!("Uncategorized: {}\n", plan.uncategorized().join(", ")));
    }
    out.push_str(&format!("Route: {} points\n", plan.route.len()));
    out
}

/// `E` entrance, `C` checkout, `#` section, `*` route, `.` corridor.
pub fn render_ascii(plan: &RoutePlan) -> String {
    let on_route: std::collections::HashSet<Position> = plan.route.iter().copied().collect();
    let mut out = String::new();
    for row in plan.grid.rows() {
        for node in row {
            let ch = match node.kind {
                CellKind::Entrance => 'E',
                CellKind::Cashier => 'C',
                CellKind::Section(_) => '#',
                CellKind::Corridor if on_route.contains(&Position::new(node.x, node.y)) => '*',
                CellKind::Corridor => '.',
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::route::models::{Market, Section};

    fn plan_for(sections: Vec<Section>, items: &[&str]) -> RoutePlan {
        let market = Market { id: 1, name: "Centro".into(), distance: 0.0, sections };
        let items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        executor::plan_market(&market, None, &items, &config::Config::default())
    }

    fn section(id: &str, x: i32, y: i32, cats: &[&str]) -> Section {
        Section {
            id: id.to_string(),
            name: id.to_string(),
            categories: cats.iter().map(|c| c.to_string()).collect(),
            position: Position::new(x, y),
            neighbors: vec![],
        }
    }

    #[test]
    fn ascii_marks_every_cell_kind() {
        let plan = plan_for(vec![section("A1", 0, 0, &["leite"]), section("B1", 1, 0, &["pão"])], &["leite"]);
        let art = render_ascii(&plan);
        let lines: Vec<&str> = art.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.chars().count() == 5));
        assert_eq!(lines[0].chars().nth(2), Some('E'));
        assert_eq!(lines[2].chars().nth(2), Some('C'));
        assert_eq!(lines[0].chars().next(), Some('#'));
        assert!(art.contains('*'));
    }

    #[test]
    fn description_lists_sections_and_uncategorized() {
        let plan = plan_for(vec![section("A1", 0, 0, &["leite"])], &["leite", "xyz"]);
        let text = describe_plan(&plan);
        assert!(text.contains("1. A1 leite"));
        assert!(text.contains("Uncategorized: xyz"));
    }
}

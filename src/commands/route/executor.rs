use anyhow::Result;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use super::categorizer::Categorizer;
use super::config::Config;
use super::grid_builder::build_grid;
use super::models::{Grid, Market, Position};
use super::relevance::{normalize_items, resolve, Assignment, Relevance};
use super::route_assembler::assemble_route;
use super::store::MarketStore;
use super::visit_order::plan_visit_order;

/// Everything a renderer needs for one (list, market) pair.
#[derive(Clone, Debug, Serialize)]
pub struct RoutePlan {
    pub market_id: i64,
    pub market_name: String,
    pub items: Vec<String>,
    pub grid: Grid,
    pub entrance: Position,
    pub checkout: Position,
    pub relevance: Relevance,
    /// Section ids in visiting order.
    pub visit_order: Vec<String>,
    pub route: Vec<Position>,
    /// Whether categorizer assignments fed the relevance step.
    pub categorized: bool,
}

impl RoutePlan {
    pub fn fell_back_to_all(&self) -> bool {
        self.relevance.fell_back_to_all
    }

    pub fn uncategorized(&self) -> &[String] {
        &self.relevance.uncategorized
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PlanSummary {
    pub market_id: i64,
    pub market_name: String,
    pub distance: f64,
    pub sections_to_visit: usize,
    pub uncategorized: usize,
    pub route_points: usize,
    pub fell_back_to_all: bool,
}

impl PlanSummary {
    fn from_plan(plan: &RoutePlan, distance: f64) -> Self {
        Self {
            market_id: plan.market_id,
            market_name: plan.market_name.clone(),
            distance,
            sections_to_visit: plan.visit_order.len(),
            uncategorized: plan.uncategorized().len(),
            route_points: plan.route.len(),
            fell_back_to_all: plan.fell_back_to_all(),
        }
    }
}

/// Plan a list against one market. `Ok(None)` when the market cannot be found.
pub fn plan_route<S: AsRef<str>>(
    store: &dyn MarketStore,
    categorizer: Option<&dyn Categorizer>,
    market_id: i64,
    raw_items: &[S],
    cfg: &Config,
) -> Result<Option<RoutePlan>> {
    let market = match store.market(market_id) {
        Ok(Some(m)) => m,
        Ok(None) => {
            info!("plan: market {} not found", market_id);
            return Ok(None);
        }
        Err(e) => {
            warn!("plan: store lookup for market {} failed: {:#}", market_id, e);
            return Ok(None);
        }
    };
    let items = normalize_items(raw_items);
    Ok(Some(plan_market(&market, categorizer, &items, cfg)))
}

/// Plan the same list against every market, nearest market first.
pub fn plan_all<S: AsRef<str> + Sync>(
    store: &dyn MarketStore,
    categorizer: Option<&dyn Categorizer>,
    raw_items: &[S],
    cfg: &Config,
) -> Result<Vec<PlanSummary>> {
    let markets = store.markets()?;
    let items = normalize_items(raw_items);
    info!("plan: comparing {} markets for {} items", markets.len(), items.len());
    let summaries = markets
        .par_iter()
        .map(|m| PlanSummary::from_plan(&plan_market(m, categorizer, &items, cfg), m.distance))
        .collect();
    Ok(summaries)
}

/// Full pipeline over an already loaded market; `items` must be normalized.
pub fn plan_market(market: &Market, categorizer: Option<&dyn Categorizer>, items: &[String], cfg: &Config) -> RoutePlan {
    let assignments = external_assignments(categorizer, items, market, cfg.min_confidence());
    let relevance = resolve(items, &market.sections, assignments.as_deref());
    let relevant = relevance.relevant_sections(&market.sections);
    let order = plan_visit_order(&market.sections, &relevant);

    let layout = build_grid(&market.sections);
    let route = assemble_route(&order, &layout.grid, layout.entrance, layout.checkout);
    info!(
        "plan: market {} -> {} sections to visit, {} route points",
        market.id,
        order.len(),
        route.len()
    );

    RoutePlan {
        market_id: market.id,
        market_name: market.name.clone(),
        items: items.to_vec(),
        visit_order: order.iter().map(|s| s.id.clone()).collect(),
        grid: layout.grid,
        entrance: layout.entrance,
        checkout: layout.checkout,
        relevance,
        route,
        categorized: assignments.is_some(),
    }
}

fn external_assignments(
    categorizer: Option<&dyn Categorizer>,
    items: &[String],
    market: &Market,
    min_confidence: f64,
) -> Option<Vec<Assignment>> {
    let categorizer = categorizer?;
    if items.is_empty() {
        return None;
    }
    match categorizer.categorize(items, &market.sections) {
        Ok(c) => {
            let total = c.assignments.len();
            let kept: Vec<Assignment> =
                c.assignments.into_iter().filter(|a| a.confidence >= min_confidence).collect();
            if kept.len() < total {
                info!("plan: dropped {} assignments below confidence {}", total - kept.len(), min_confidence);
            }
            Some(kept)
        }
        Err(e) => {
            warn!("plan: categorizer failed for market {}, using category matching: {:#}", market.id, e);
            None
        }
    }
}

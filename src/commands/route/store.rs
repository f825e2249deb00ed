use anyhow::{Context, Result};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;

use super::db;
use super::models::{Market, Position, Section};

/// Read-only market lookup.
pub trait MarketStore {
    /// `Ok(None)` when no market has this id.
    fn market(&self, id: i64) -> Result<Option<Market>>;
    /// Every market, nearest first.
    fn markets(&self) -> Result<Vec<Market>>;
}

pub struct SqliteMarketStore {
    conn: Connection,
}

impl SqliteMarketStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = db::open_ro(path).with_context(|| format!("open market store {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn load_sections(&self, market_id: i64) -> Result<Vec<Section>> {
        let mut categories: HashMap<String, Vec<String>> = HashMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT section_id, category FROM section_categories WHERE market_id=?1 ORDER BY section_id, ordinal",
        )?;
        let mut rows = stmt.query([market_id])?;
        while let Some(row) = rows.next()? {
            categories.entry(row.get(0)?).or_default().push(row.get(1)?);
        }

        let mut neighbors: HashMap<String, Vec<String>> = HashMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT section_id, neighbor_id FROM section_neighbors WHERE market_id=?1 ORDER BY section_id, ordinal",
        )?;
        let mut rows = stmt.query([market_id])?;
        while let Some(row) = rows.next()? {
            neighbors.entry(row.get(0)?).or_default().push(row.get(1)?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT section_id, name, pos_x, pos_y FROM sections WHERE market_id=?1 ORDER BY ordinal, section_id",
        )?;
        let mut rows = stmt.query([market_id])?;
        let mut sections = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            sections.push(Section {
                categories: categories.remove(&id).unwrap_or_default(),
                neighbors: neighbors.remove(&id).unwrap_or_default(),
                name: row.get(1)?,
                position: Position::new(row.get(2)?, row.get(3)?),
                id,
            });
        }
        Ok(sections)
    }
}

impl MarketStore for SqliteMarketStore {
    fn market(&self, id: i64) -> Result<Option<Market>> {
        let head: Option<(String, f64)> = self
            .conn
            .query_row("SELECT name, distance FROM markets WHERE market_id=?1", [id], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .optional()
            .with_context(|| format!("read market {}", id))?;
        let Some((name, distance)) = head else {
            debug!("store: market {} not found", id);
            return Ok(None);
        };
        let sections = self.load_sections(id).with_context(|| format!("read sections of market {}", id))?;
        Ok(Some(Market { id, name, distance, sections }))
    }

    fn markets(&self) -> Result<Vec<Market>> {
        let mut stmt = self
            .conn
            .prepare("SELECT market_id, name, distance FROM markets ORDER BY distance, market_id")?;
        let heads = stmt
            .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, f64>(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut out = Vec::with_capacity(heads.len());
        for (id, name, distance) in heads {
            let sections = self.load_sections(id).with_context(|| format!("read sections of market {}", id))?;
            out.push(Market { id, name, distance, sections });
        }
        Ok(out)
    }
}

/// Markets kept in memory, sorted nearest first.
#[derive(Clone, Debug, Default)]
pub struct MemoryMarketStore {
    markets: Vec<Market>,
}

impl MemoryMarketStore {
    pub fn new(mut markets: Vec<Market>) -> Self {
        markets.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        Self { markets }
    }
}

impl MarketStore for MemoryMarketStore {
    fn market(&self, id: i64) -> Result<Option<Market>> {
        Ok(self.markets.iter().find(|m| m.id == id).cloned())
    }

    fn markets(&self) -> Result<Vec<Market>> {
        Ok(self.markets.clone())
    }
}

/// Replace every stored row of `market` with its current contents.
pub fn save_market(tx: &Transaction, market: &Market) -> Result<()> {
    for table in ["section_categories", "section_neighbors", "sections", "markets"] {
        tx.execute(&format!("DELETE FROM {} WHERE market_id=?1", table), [market.id])?;
    }
    tx.execute(
        "INSERT INTO markets(market_id, name, distance) VALUES (?1, ?2, ?3)",
        params![market.id, market.name, market.distance],
    )?;

    let mut ins_section = tx.prepare_cached(
        "INSERT INTO sections(market_id, section_id, name, pos_x, pos_y, ordinal) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut ins_category = tx.prepare_cached(
        "INSERT INTO section_categories(market_id, section_id, ordinal, category) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut ins_neighbor = tx.prepare_cached(
        "INSERT INTO section_neighbors(market_id, section_id, ordinal, neighbor_id) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (ordinal, s) in market.sections.iter().enumerate() {
        ins_section
            .execute(params![market.id, s.id, s.name, s.position.x, s.position.y, ordinal as i64])
            .with_context(|| format!("insert section {} of market {}", s.id, market.id))?;
        for (i, c) in s.categories.iter().enumerate() {
            ins_category.execute(params![market.id, s.id, i as i64, c])?;
        }
        for (i, n) in s.neighbors.iter().enumerate() {
            ins_neighbor.execute(params![market.id, s.id, i as i64, n])?;
        }
    }
    debug!("store: saved market {} with {} sections", market.id, market.sections.len());
    Ok(())
}

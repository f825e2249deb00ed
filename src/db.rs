use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;

pub fn create_tables(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let markets_columns: BTreeSet<&'static str> = ["market_id", "name", "distance"].into_iter().collect();
    let sections_columns: BTreeSet<&'static str> =
        ["market_id", "section_id", "name", "pos_x", "pos_y", "ordinal"].into_iter().collect();
    let categories_columns: BTreeSet<&'static str> =
        ["market_id", "section_id", "ordinal", "category"].into_iter().collect();
    let neighbors_columns: BTreeSet<&'static str> =
        ["market_id", "section_id", "ordinal", "neighbor_id"].into_iter().collect();

    // Child tables first so foreign keys never point at a dropped parent.
    let stale_markets = table_exists(conn, "markets")? && !table_has_columns(conn, "markets", &markets_columns)?;
    let stale_sections =
        stale_markets || (table_exists(conn, "sections")? && !table_has_columns(conn, "sections", &sections_columns)?);
    if stale_sections
        || (table_exists(conn, "section_categories")?
            && !table_has_columns(conn, "section_categories", &categories_columns)?)
    {
        conn.execute("DROP TABLE IF EXISTS section_categories", [])?;
    }
    if stale_sections
        || (table_exists(conn, "section_neighbors")?
            && !table_has_columns(conn, "section_neighbors", &neighbors_columns)?)
    {
        conn.execute("DROP TABLE IF EXISTS section_neighbors", [])?;
    }
    if stale_sections {
        conn.execute("DROP TABLE IF EXISTS sections", [])?;
    }
    if stale_markets {
        conn.execute("DROP TABLE IF EXISTS markets", [])?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS markets (
            market_id INTEGER PRIMARY KEY,
            name      TEXT NOT NULL,
            distance  REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS sections (
            market_id  INTEGER NOT NULL REFERENCES markets(market_id) ON DELETE CASCADE,
            section_id TEXT NOT NULL,
            name       TEXT NOT NULL,
            pos_x      INTEGER NOT NULL,
            pos_y      INTEGER NOT NULL,
            ordinal    INTEGER NOT NULL,
            PRIMARY KEY (market_id, section_id)
        );

        CREATE TABLE IF NOT EXISTS section_categories (
            market_id  INTEGER NOT NULL,
            section_id TEXT NOT NULL,
            ordinal    INTEGER NOT NULL,
            category   TEXT NOT NULL,
            PRIMARY KEY (market_id, section_id, ordinal),
            FOREIGN KEY (market_id, section_id) REFERENCES sections(market_id, section_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS section_neighbors (
            market_id   INTEGER NOT NULL,
            section_id  TEXT NOT NULL,
            ordinal     INTEGER NOT NULL,
            neighbor_id TEXT NOT NULL,
            PRIMARY KEY (market_id, section_id, ordinal),
            FOREIGN KEY (market_id, section_id) REFERENCES sections(market_id, section_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_markets_distance ON markets(distance);
        CREATE INDEX IF NOT EXISTS idx_sections_ordinal ON sections(market_id, ordinal);
        "#,
    )?;

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

fn table_has_columns(conn: &Connection, table: &str, required: &BTreeSet<&str>) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    let mut present = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        present.insert(name);
    }
    Ok(required.iter().all(|c| present.contains(*c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outdated_sections_table_is_replaced() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE markets (market_id INTEGER PRIMARY KEY, name TEXT, distance REAL);
             CREATE TABLE sections (market_id INTEGER, section_id TEXT, x INTEGER, y INTEGER);",
        )?;
        create_tables(&mut conn)?;
        let mut wanted: BTreeSet<&str> = ["pos_x", "pos_y", "ordinal"].into_iter().collect();
        assert!(table_has_columns(&conn, "sections", &wanted)?);
        wanted.clear();
        wanted.insert("distance");
        assert!(table_has_columns(&conn, "markets", &wanted)?);
        Ok(())
    }

    #[test]
    fn create_tables_is_idempotent() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;
        create_tables(&mut conn)?;
        conn.execute("INSERT INTO markets(market_id, name, distance) VALUES (1, 'a', 0.5)", [])?;
        create_tables(&mut conn)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM markets", [], |r| r.get(0))?;
        assert_eq!(n, 1);
        Ok(())
    }
}

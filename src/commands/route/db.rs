use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

pub fn open_ro<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    // Loaders may hold the write lock
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(conn)
}

pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn ensure_schema(conn: &mut Connection) -> Result<()> {
    crate::db::create_tables(conn)
}

/// Writable connection with the market schema in place, creating the file if needed.
pub fn open_store_rw<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let mut conn = open_rw(path).with_context(|| format!("open market DB {}", path.display()))?;
    ensure_schema(&mut conn)?;
    Ok(conn)
}

pub fn with_tx<T, F: FnOnce(&Transaction) -> Result<T>>(conn: &mut Connection, f: F) -> Result<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

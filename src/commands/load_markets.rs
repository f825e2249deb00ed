use anyhow::{Context, Result};
use log::{error, info};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use crate::commands::route::db;
use crate::commands::route::models::Market;
use crate::commands::route::store::save_market;

/// A file holds either one market or a list of them.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum FileRoot {
    Many(Vec<Market>),
    One(Market),
}

impl FileRoot {
    fn into_markets(self) -> Vec<Market> {
        match self {
            FileRoot::Many(v) => v,
            FileRoot::One(m) => vec![m],
        }
    }
}

pub fn cmd_load_markets(json_folder: &Path, db_path: &Path) -> Result<()> {
    println!("Using JSON folder: {}", json_folder.display());
    println!("Using DB file    : {}", db_path.display());

    let mut conn = db::open_store_rw(db_path)?;
    let loaded = load_json_files(json_folder, &mut conn)?;

    println!("{} market(s) loaded into {}", loaded, db_path.display());
    Ok(())
}

fn json_files(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.exists() {
        anyhow::bail!("JSON folder not found: {}", folder.display());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

/// Parse every JSON file in parallel and write all markets in one transaction.
pub fn load_json_files(folder: &Path, conn: &mut rusqlite::Connection) -> Result<usize> {
    let files = json_files(folder)?;

    // Parsed markets flow to the single DB writer below
    let (tx_msg, rx_msg) = mpsc::channel::<(PathBuf, Vec<Market>)>();
    let producer = thread::spawn(move || {
        files.into_par_iter().for_each_with(tx_msg, |s, path| match parse_file(&path) {
            Ok(markets) => {
                let _ = s.send((path, markets));
            }
            Err(e) => error!("Error processing {}: {:#}", path.display(), e),
        });
    });

    // Files arrive in completion order; sort so a market id repeated across files resolves the same way each run.
    let mut batches: Vec<(PathBuf, Vec<Market>)> = rx_msg.into_iter().collect();
    let _ = producer.join();
    batches.sort_by(|a, b| a.0.cmp(&b.0));

    let count = db::with_tx(conn, |tx| {
        let mut n = 0usize;
        for (path, markets) in &batches {
            for m in markets {
                save_market(tx, m).with_context(|| format!("store market {} from {}", m.id, path.display()))?;
                n += 1;
            }
        }
        Ok(n)
    })?;
    Ok(count)
}

fn parse_file(path: &Path) -> Result<Vec<Market>> {
    info!("Loading {}...", path.display());
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);
    let root: FileRoot =
        serde_json::from_reader(reader).with_context(|| format!("parse JSON {}", path.display()))?;
    Ok(root.into_markets())
}

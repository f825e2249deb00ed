use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use market_route::commands::{self, route};
use market_route::util;

#[derive(Parser, Debug)]
#[command(name = "market_route", version, about = "In-store shopping route planner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load market layout JSON files into markets.db
    LoadMarkets {
        /// Path to JSON folder (defaults to repo_root/data/markets)
        #[arg(long)]
        json_dir: Option<PathBuf>,
        /// Path to SQLite DB (defaults to repo_root/markets.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Import markets and sections from an XLSX file or Google Sheet
    ImportXlsx {
        /// Path to .xlsx file or Google Sheets URL
        #[arg(long)]
        xlsx: String,
        /// Path to SQLite DB (defaults to repo_root/markets.db)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Parse and validate only; do not modify the DB
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored markets, nearest first
    Markets {
        #[command(flatten)]
        common: route::CommonOpts,
    },

    /// Plan a route through one market
    Plan {
        #[command(flatten)]
        common: route::CommonOpts,
        /// Market id
        #[arg(long)]
        market: i64,
        /// Shopping list, separated by commas or whitespace
        #[arg(long)]
        items: String,
        /// Print the full plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plan the same list against every market
    Compare {
        #[command(flatten)]
        common: route::CommonOpts,
        /// Shopping list, separated by commas or whitespace
        #[arg(long)]
        items: String,
    },
}

fn loader_db(db: Option<PathBuf>, default: PathBuf) -> PathBuf {
    db.or_else(|| route::config::Config::from_env_defaults().db).unwrap_or(default)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::LoadMarkets { json_dir, db } => {
            route::logging::init(None);
            let (def_json, def_db) = util::default_paths();
            let json_folder = json_dir.unwrap_or(def_json);
            let db_path = loader_db(db, def_db);
            commands::load_markets::cmd_load_markets(&json_folder, &db_path)
        }
        Commands::ImportXlsx { xlsx, db, dry_run } => {
            route::logging::init(None);
            let (_, def_db) = util::default_paths();
            let db_path = loader_db(db, def_db);
            commands::import_xlsx::cmd_import_xlsx(&xlsx, &db_path, dry_run)
        }
        Commands::Markets { common } => route::cmd_markets(common),
        Commands::Plan { common, market, items, json } => route::cmd_plan(common, market, &items, json),
        Commands::Compare { common, items } => route::cmd_compare(common, &items),
    }
}

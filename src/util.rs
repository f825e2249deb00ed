use std::path::PathBuf;

pub const DB_FILE: &str = "markets.db";
pub const JSON_REL_PATH: &str = "data/markets";

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn default_paths() -> (PathBuf, PathBuf) {
    let root = repo_root();
    (root.join(JSON_REL_PATH), root.join(DB_FILE))
}

/// Split free text into raw list entries (whitespace or comma separated).
pub fn split_items(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .collect()
}

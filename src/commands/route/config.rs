use std::{env, path::PathBuf};

pub const DEFAULT_LLM_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub db: Option<PathBuf>,
    pub threads: Option<usize>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_timeout_secs: Option<u64>,
    /// Assignments below this confidence are ignored; unset means 0.
    pub min_confidence: Option<f64>,
    pub no_llm: bool,
}

impl Config {
    pub fn from_env_defaults() -> Self {
        let db = env::var("ROUTE_DB").ok().map(PathBuf::from);
        let threads = env::var("ROUTE_THREADS").ok().and_then(|s| s.parse::<usize>().ok());
        let log_level = env::var("ROUTE_LOG_LEVEL").ok();
        let llm_api_key = env::var("ROUTE_LLM_API_KEY").ok().filter(|s| !s.trim().is_empty());
        let llm_model = env::var("ROUTE_LLM_MODEL").ok();
        let llm_base_url = env::var("ROUTE_LLM_BASE_URL").ok();
        let llm_timeout_secs = env::var("ROUTE_LLM_TIMEOUT_SECS").ok().and_then(|s| s.parse::<u64>().ok());
        let min_confidence = env::var("ROUTE_MIN_CONFIDENCE").ok().and_then(|s| parse_confidence(&s));
        let no_llm = env::var("ROUTE_NO_LLM").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        Self { db, threads, log_level, llm_api_key, llm_model, llm_base_url, llm_timeout_secs, min_confidence, no_llm }
    }

    /// Overlay values set in `other` (env > CLI precedence).
    pub fn overlay(&mut self, other: Config) {
        if other.db.is_some() { self.db = other.db; }
        if other.threads.is_some() { self.threads = other.threads; }
        if other.log_level.is_some() { self.log_level = other.log_level; }
        if other.llm_api_key.is_some() { self.llm_api_key = other.llm_api_key; }
        if other.llm_model.is_some() { self.llm_model = other.llm_model; }
        if other.llm_base_url.is_some() { self.llm_base_url = other.llm_base_url; }
        if other.llm_timeout_secs.is_some() { self.llm_timeout_secs = other.llm_timeout_secs; }
        if other.min_confidence.is_some() { self.min_confidence = other.min_confidence; }
        if other.no_llm { self.no_llm = true; }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence.unwrap_or(0.0)
    }

    /// Categorizer settings, or `None` when categorization is off or has no key.
    pub fn llm(&self) -> Option<LlmConfig> {
        if self.no_llm {
            return None;
        }
        let api_key = self.llm_api_key.clone()?;
        Some(LlmConfig {
            api_key,
            model: self.llm_model.clone().unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            base_url: self.llm_base_url.clone().unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            timeout_secs: self.llm_timeout_secs.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
        })
    }
}

/// Confidence thresholds outside [0, 1] are clamped; NaN is treated as unset.
pub fn clamp_confidence(v: f64) -> Option<f64> {
    if v.is_nan() { None } else { Some(v.clamp(0.0, 1.0)) }
}

fn parse_confidence(input: &str) -> Option<f64> {
    input.trim().parse::<f64>().ok().and_then(clamp_confidence)
}

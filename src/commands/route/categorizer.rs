use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

use super::config::LlmConfig;
use super::models::Section;
use super::relevance::Assignment;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Categorization {
    pub assignments: Vec<Assignment>,
    pub uncategorized: Vec<String>,
}

impl Categorization {
    pub fn nothing_placed(items: &[String]) -> Self {
        Self { assignments: Vec::new(), uncategorized: items.to_vec() }
    }
}

/// Maps free-text list items onto section names.
///
/// Implementations may fail; callers treat any error as "no assignments".
pub trait Categorizer: Sync {
    fn categorize(&self, items: &[String], sections: &[Section]) -> Result<Categorization>;
}

/// Returns a precomputed answer.
#[derive(Clone, Debug, Default)]
pub struct FixedCategorizer {
    pub answer: Categorization,
}

impl Categorizer for FixedCategorizer {
    fn categorize(&self, _items: &[String], _sections: &[Section]) -> Result<Categorization> {
        Ok(self.answer.clone())
    }
}

/// Google Generative Language `generateContent` client.
pub struct GeminiCategorizer {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiCategorizer {
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl Categorizer for GeminiCategorizer {
    fn categorize(&self, items: &[String], sections: &[Section]) -> Result<Categorization> {
        if items.is_empty() || sections.is_empty() {
            return Ok(Categorization::nothing_placed(items));
        }
        let prompt = build_prompt(items, sections);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.2,
                "topP": 0.8,
                "topK": 40,
                "maxOutputTokens": 1024
            },
            "safetySettings": [
                { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" }
            ]
        });

        debug!("categorizer: requesting {} items from model {}", items.len(), self.model);
        let resp = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .with_context(|| format!("POST {}", self.endpoint()))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("categorizer: HTTP {}", status);
        }
        let payload: JsonValue = resp.json().context("decode categorizer response")?;
        let text = response_text(&payload).ok_or_else(|| anyhow!("categorizer: response carries no text"))?;
        let out = parse_categorization(text, items)?;
        info!(
            "categorizer: {} assignments, {} uncategorized",
            out.assignments.len(),
            out.uncategorized.len()
        );
        Ok(out)
    }
}

pub fn build_prompt(items: &[String], sections: &[Section]) -> String {
    let section_info = sections
        .iter()
        .map(|s| format!("- {} (ID: {}): {}", s.name, s.id, s.categories.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");
    let item_list = items.join(", ");
    format!(
        r#"You categorize grocery shopping items into the correct supermarket sections.

Available market sections and their categories:
{section_info}

Items to categorize:
{item_list}

Instructions:
1. For each item, pick the most appropriate section based on the categories listed.
2. If an item fits several sections, choose the most specific one.
3. If you cannot confidently categorize an item, list it under "uncategorized".
4. Give each categorization a confidence between 0 and 1.
5. Use the exact section names as provided, not category names.

Respond with ONLY a JSON object:
{{"categories": [{{"item": string, "section": string, "confidence": number}}], "uncategorized": [string]}}
"#
    )
}

fn response_text(payload: &JsonValue) -> Option<&str> {
    payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

/// Parse the JSON object embedded in a model reply.
pub fn parse_categorization(text: &str, items: &[String]) -> Result<Categorization> {
    let json_str = match (text.find('{'), text.rfind('}')) {
        (Some(a), Some(b)) if a < b => &text[a..=b],
        _ => text,
    };
    let v: JsonValue = serde_json::from_str(json_str).context("categorizer reply is not JSON")?;

    let mut assignments = Vec::new();
    if let Some(arr) = v.get("categories").and_then(JsonValue::as_array) {
        for entry in arr {
            let item = entry.get("item").and_then(JsonValue::as_str);
            let section = entry.get("section").and_then(JsonValue::as_str);
            let (Some(item), Some(section)) = (item, section) else {
                debug!("categorizer: skipping malformed entry {}", entry);
                continue;
            };
            let confidence = entry
                .get("confidence")
                .and_then(JsonValue::as_f64)
                .map(|c| c.clamp(0.0, 1.0))
                .unwrap_or(0.5);
            assignments.push(Assignment {
                item: item.trim().to_lowercase(),
                section: section.trim().to_string(),
                confidence,
            });
        }
    }

    let uncategorized = match v.get("uncategorized").and_then(JsonValue::as_array) {
        Some(arr) => arr
            .iter()
            .filter_map(JsonValue::as_str)
            .map(|s| s.trim().to_lowercase())
            .collect(),
        None => items.to_vec(),
    };

    Ok(Categorization { assignments, uncategorized })
}

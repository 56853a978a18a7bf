//! `price_compare`: hospital package quotes from a JSON catalogue.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::tools::{Capability, ParamSpec, ToolArgs, ToolSpec};

pub const NAME: &str = "price_compare";

/// Substring → canonical procedure key, checked in order.
const SYNONYMS: &[(&str, &str)] = &[
    ("appendicitis", "appendectomy"),
    ("appendix removal", "appendectomy"),
    ("appendix", "appendectomy"),
    ("cataract", "cataract_surgery"),
    ("phaco", "cataract_surgery"),
    ("meniscus", "meniscus"),
];

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

pub fn spec(default_city: &str) -> ToolSpec {
    ToolSpec::new(
        NAME,
        "Compare hospital package prices for a procedure in a city.",
        vec![
            ParamSpec::string("procedure", "Procedure name, e.g. appendectomy."),
            ParamSpec::string("city", "City to search; empty means any city.")
                .with_default(json!(default_city)),
        ],
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hospital {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub procedures: BTreeMap<String, Package>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub expected_price: Option<u64>,
    #[serde(default)]
    pub breakdown: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub hospital_id: Value,
    pub hospital: String,
    pub city: String,
    pub procedure_key: String,
    pub expected_price: Option<u64>,
    pub breakdown: BTreeMap<String, Value>,
}

/// Canonical catalogue key for a free-form procedure name.
pub fn normalize_procedure(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace(['-', '_'], " ");
    if lowered.is_empty() {
        return String::new();
    }
    for (needle, key) in SYNONYMS {
        if lowered.contains(needle) {
            return (*key).to_string();
        }
    }
    WHITESPACE.replace_all(&lowered, "_").into_owned()
}

/// Read the catalogue. A missing file is an empty catalogue.
pub fn load_catalogue(path: &Path) -> Result<Vec<Hospital>> {
    if !path.exists() {
        warn!(path = %path.display(), "hospital catalogue missing; no quotes available");
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Matching quotes, cheapest first; packages without a price sort last.
pub fn find_quotes(hospitals: &[Hospital], key: &str, city: &str) -> Vec<Quote> {
    let city = city.trim();
    let mut quotes: Vec<Quote> = hospitals
        .iter()
        .filter(|h| city.is_empty() || h.city.is_empty() || h.city.eq_ignore_ascii_case(city))
        .filter_map(|h| {
            h.procedures.get(key).map(|package| Quote {
                hospital_id: h.id.clone(),
                hospital: h.name.clone(),
                city: h.city.clone(),
                procedure_key: key.to_string(),
                expected_price: package.expected_price,
                breakdown: package.breakdown.clone(),
            })
        })
        .collect();
    quotes.sort_by_key(|q| q.expected_price.unwrap_or(u64::MAX));
    quotes
}

fn quote_line(quote: &Quote) -> String {
    let price = quote
        .expected_price
        .map(|p| p.to_string())
        .unwrap_or_else(|| "?".to_string());
    let breakdown: Vec<String> = quote
        .breakdown
        .iter()
        .map(|(item, amount)| match amount {
            Value::String(text) => format!("{item}: ₹{text}"),
            other => format!("{item}: ₹{other}"),
        })
        .collect();
    format!(
        "{} ({}) - ₹{price}. Breakdown: {}",
        quote.hospital,
        quote.city,
        breakdown.join(", ")
    )
}

pub struct PriceCompare {
    catalogue: PathBuf,
}

impl PriceCompare {
    pub fn new(catalogue: &Path) -> Self {
        Self {
            catalogue: catalogue.to_path_buf(),
        }
    }
}

impl Capability for PriceCompare {
    fn call(&self, args: &ToolArgs) -> Result<Value> {
        let procedure = args.str("procedure");
        let city = args.str("city");
        let key = normalize_procedure(procedure);
        let hospitals = load_catalogue(&self.catalogue)?;
        let quotes = find_quotes(&hospitals, &key, city);
        debug!(procedure = %key, city, quotes = quotes.len(), "price lookup");

        if quotes.is_empty() {
            let place = if city.trim().is_empty() { "any city" } else { city };
            return Ok(json!({
                "status": "not_found",
                "procedure": key,
                "city": city,
                "quotes": [],
                "human_text": format!("No quotes found for '{procedure}' in {place}."),
            }));
        }
        let human: Vec<String> = quotes.iter().map(quote_line).collect();
        Ok(json!({
            "status": "ok",
            "procedure": key,
            "city": city,
            "quotes": quotes,
            "human_text": human.join("\n"),
        }))
    }
}

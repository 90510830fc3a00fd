//! # Catalog Module
//!
//! Price book bookkeeping: which car catalog is active, index-based lookups
//! used by callback identifiers, merging of imported rows, search and the
//! plain-text price list sent by `/price`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    CarBrand, CarDatabase, CarModel, CarVariant, MobileBrand, MobileDatabase, MobileModel,
};
use crate::settings::Priority;

/// Telegram rejects messages longer than 4096 characters
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Maximum number of search results rendered as buttons
pub const MAX_SEARCH_HITS: usize = 10;

/// Where the displayed car prices come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceSource {
    Ai,
    Spreadsheet,
    None,
}

/// Cached catalogs from both sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PriceBook {
    pub ai: CarDatabase,
    pub spreadsheet: CarDatabase,
    pub mobiles: MobileDatabase,
    pub ai_updated_at: Option<DateTime<Utc>>,
    pub spreadsheet_updated_at: Option<DateTime<Utc>>,
}

/// The car catalog currently shown to users
#[derive(Debug, Clone, Copy)]
pub struct ActiveCatalog<'a> {
    pub source: PriceSource,
    pub cars: &'a CarDatabase,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PriceBook {
    /// Spreadsheet data wins when prioritized and present, then AI data,
    /// then whatever spreadsheet data exists.
    pub fn source(&self, priority: Priority) -> PriceSource {
        if priority == Priority::Spreadsheet && !self.spreadsheet.is_empty() {
            PriceSource::Spreadsheet
        } else if !self.ai.is_empty() {
            PriceSource::Ai
        } else if !self.spreadsheet.is_empty() {
            PriceSource::Spreadsheet
        } else {
            PriceSource::None
        }
    }

    pub fn active(&self, priority: Priority) -> ActiveCatalog<'_> {
        match self.source(priority) {
            PriceSource::Ai => ActiveCatalog {
                source: PriceSource::Ai,
                cars: &self.ai,
                updated_at: self.ai_updated_at,
            },
            source => ActiveCatalog {
                source,
                cars: &self.spreadsheet,
                updated_at: self.spreadsheet_updated_at,
            },
        }
    }

    /// The catalog manual edits go to: the active one, or the spreadsheet
    /// catalog when nothing is loaded yet
    pub fn active_mut(&mut self, priority: Priority) -> &mut CarDatabase {
        match self.source(priority) {
            PriceSource::Ai => &mut self.ai,
            _ => &mut self.spreadsheet,
        }
    }
}

impl CarDatabase {
    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }

    pub fn variant_count(&self) -> usize {
        self.brands
            .values()
            .flat_map(|brand| &brand.models)
            .map(|model| model.variants.len())
            .sum()
    }

    pub fn brand_at(&self, index: usize) -> Option<&CarBrand> {
        self.brands.values().nth(index)
    }

    pub fn model_at(&self, brand: usize, model: usize) -> Option<&CarModel> {
        self.brand_at(brand)?.models.get(model)
    }

    pub fn variant_at(&self, brand: usize, model: usize, variant: usize) -> Option<&CarVariant> {
        self.model_at(brand, model)?.variants.get(variant)
    }

    /// Find-or-create the brand and model, then update the variant with the
    /// same name or append it. Returns `true` when a variant was appended.
    pub fn upsert_variant(&mut self, brand: &str, model: &str, variant: CarVariant) -> bool {
        let brand_entry = self
            .brands
            .entry(brand.to_string())
            .or_insert_with(|| CarBrand {
                name: brand.to_string(),
                models: Vec::new(),
            });
        if brand_entry.name.is_empty() {
            brand_entry.name = brand.to_string();
        }

        let model_index = match brand_entry.models.iter().position(|m| m.name == model) {
            Some(index) => index,
            None => {
                brand_entry.models.push(CarModel {
                    name: model.to_string(),
                    variants: Vec::new(),
                });
                brand_entry.models.len() - 1
            }
        };
        let variants = &mut brand_entry.models[model_index].variants;

        match variants.iter_mut().find(|v| v.name == variant.name) {
            Some(existing) => {
                *existing = variant;
                false
            }
            None => {
                variants.push(variant);
                true
            }
        }
    }

    /// Use the map key as the display name wherever a brand has none
    pub fn fill_brand_names(&mut self) {
        for (key, brand) in self.brands.iter_mut() {
            if brand.name.trim().is_empty() {
                brand.name = key.clone();
            }
        }
    }
}

impl MobileDatabase {
    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }

    pub fn brand_at(&self, index: usize) -> Option<&MobileBrand> {
        self.brands.values().nth(index)
    }

    pub fn model_at(&self, brand: usize, model: usize) -> Option<&MobileModel> {
        self.brand_at(brand)?.models.get(model)
    }

    /// Update the model with the same name, or append it
    pub fn upsert_model(&mut self, brand: &str, model: MobileModel) -> bool {
        let brand_entry = self
            .brands
            .entry(brand.to_string())
            .or_insert_with(|| MobileBrand {
                name: brand.to_string(),
                models: Vec::new(),
            });

        match brand_entry.models.iter_mut().find(|m| m.name == model.name) {
            Some(existing) => {
                *existing = model;
                false
            }
            None => {
                brand_entry.models.push(model);
                true
            }
        }
    }
}

/// A search result, addressed by catalog indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchHit {
    Car {
        brand: usize,
        model: usize,
        variant: usize,
        label: String,
    },
    Mobile {
        brand: usize,
        model: usize,
        label: String,
    },
}

impl SearchHit {
    pub fn label(&self) -> &str {
        match self {
            SearchHit::Car { label, .. } | SearchHit::Mobile { label, .. } => label,
        }
    }
}

/// Case-insensitive substring search over brand, model and variant names
pub fn search(
    cars: &CarDatabase,
    mobiles: &MobileDatabase,
    query: &str,
    limit: usize,
) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let matches = |text: &str| text.to_lowercase().contains(&needle);
    let mut hits = Vec::new();

    for (b, brand) in cars.brands.values().enumerate() {
        let brand_match = matches(&brand.name);
        for (m, model) in brand.models.iter().enumerate() {
            let model_match = brand_match || matches(&model.name);
            for (v, variant) in model.variants.iter().enumerate() {
                if model_match || matches(&variant.name) {
                    hits.push(SearchHit::Car {
                        brand: b,
                        model: m,
                        variant: v,
                        label: format!("🚗 {} {}", model.name, variant.name),
                    });
                    if hits.len() >= limit {
                        return hits;
                    }
                }
            }
        }
    }

    for (b, brand) in mobiles.brands.values().enumerate() {
        let brand_match = matches(&brand.name);
        for (m, model) in brand.models.iter().enumerate() {
            if brand_match || matches(&model.name) {
                hits.push(SearchHit::Mobile {
                    brand: b,
                    model: m,
                    label: format!("📱 {} {}", model.name, model.storage).trim().to_string(),
                });
                if hits.len() >= limit {
                    return hits;
                }
            }
        }
    }

    hits
}

/// Format a price with thousands separators
pub fn format_price(value: f64) -> String {
    let negative = value < 0.0;
    let value = value.abs();
    let tenths = (value * 10.0).round() as u64;
    let (whole, fraction) = (tenths / 10, tenths % 10);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    match fraction {
        0 => format!("{sign}{grouped}"),
        f => format!("{sign}{grouped}.{f}"),
    }
}

/// Render a catalog as plain-text messages of at most `max_chars` characters
pub fn render_price_list(cars: &CarDatabase, max_chars: usize) -> Vec<String> {
    let mut blocks = Vec::new();
    for brand in cars.brands.values() {
        let mut block = format!("🏢 {}\n", brand.name);
        for model in &brand.models {
            block.push_str(&format!("🚗 {}\n", model.name));
            for variant in &model.variants {
                block.push_str(&format!(
                    "  • {}: {} / {}\n",
                    variant.name,
                    format_price(variant.market_price),
                    format_price(variant.factory_price)
                ));
            }
        }
        blocks.push(block);
    }
    chunk_lines(&blocks.join("\n"), max_chars)
}

/// Split text on line boundaries into chunks of at most `max_chars`
/// characters. A single longer line is split on character boundaries.
pub fn chunk_lines(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count() + 1;
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }
        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
        current_len += line_len;
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0.0), "0");
        assert_eq!(format_price(985.0), "985");
        assert_eq!(format_price(1234.0), "1,234");
        assert_eq!(format_price(1_234_567.0), "1,234,567");
        assert_eq!(format_price(12.5), "12.5");
        assert_eq!(format_price(0.96), "1");
    }

    #[test]
    fn test_chunk_lines_respects_limit() {
        let text = (0..100)
            .map(|i| format!("line number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_lines(&text, 50);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 50));
        assert!(chunks[0].starts_with("line number 0"));
    }

    #[test]
    fn test_chunk_lines_splits_long_line() {
        let chunks = chunk_lines(&"x".repeat(25), 10);
        assert_eq!(chunks, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }
}

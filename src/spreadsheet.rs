//! # Spreadsheet Import
//!
//! Reads the first sheet of an uploaded workbook (xlsx, xls, xlsb or ods)
//! with calamine and merges its rows into the price book.
//!
//! ## Expected columns
//!
//! - **cars**: `Brand`, `Model`, `Variant`, `MarketPrice`, `FactoryPrice`
//! - **mobile**: `Brand`, `Model`, `Storage`, `Price`
//!
//! Header matching ignores case, spaces, underscores and dashes. A missing
//! variant becomes `Base` and a missing price becomes 0.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{debug, info};

use crate::catalog::PriceBook;
use crate::errors::SpreadsheetError;
use crate::models::{CarVariant, MobileModel};

pub const DEFAULT_VARIANT: &str = "Base";

/// Which catalog an upload updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Niche {
    #[default]
    Cars,
    Mobile,
}

impl Niche {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "cars" | "car" => Some(Niche::Cars),
            "mobile" | "mobiles" => Some(Niche::Mobile),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Niche::Cars => "cars",
            Niche::Mobile => "mobile",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarRow {
    pub brand: String,
    pub model: String,
    pub variant: CarVariant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MobileRow {
    pub brand: String,
    pub model: MobileModel,
}

/// Result of a successful import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub niche: Niche,
    /// Rows merged into the catalog
    pub rows: usize,
    /// Brands in the catalog after the merge
    pub brands: usize,
}

/// Read the first sheet as rows of display strings
pub fn read_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, SpreadsheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SpreadsheetError::Open(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoSheet)?
        .map_err(|e| SpreadsheetError::Open(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Column positions located from the header row
struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn new(header: &[String]) -> Self {
        Self {
            names: header.iter().map(|h| normalize_header(h)).collect(),
        }
    }

    fn find(&self, aliases: &[&str]) -> Option<usize> {
        self.names
            .iter()
            .position(|name| aliases.iter().any(|alias| name == alias))
    }

    fn require(&self, column: &'static str, aliases: &[&str]) -> Result<usize, SpreadsheetError> {
        self.find(aliases).ok_or(SpreadsheetError::MissingColumn(column))
    }
}

fn cell(row: &[String], index: Option<usize>) -> &str {
    index.and_then(|i| row.get(i)).map(|s| s.trim()).unwrap_or("")
}

fn parse_number(value: &str, row: usize, column: &'static str) -> Result<f64, SpreadsheetError> {
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .replace([',', '،', '٬'], "")
        .parse::<f64>()
        .map_err(|_| SpreadsheetError::InvalidNumber {
            row,
            column,
            value: value.to_string(),
        })
}

fn split_header(rows: &[Vec<String>]) -> Result<(Columns, &[Vec<String>]), SpreadsheetError> {
    let (header, body) = rows.split_first().ok_or(SpreadsheetError::Empty)?;
    if body.iter().all(|row| row.iter().all(|c| c.trim().is_empty())) {
        return Err(SpreadsheetError::Empty);
    }
    Ok((Columns::new(header), body))
}

/// Parse car rows; rows without a brand or model are skipped
pub fn parse_car_rows(rows: &[Vec<String>]) -> Result<Vec<CarRow>, SpreadsheetError> {
    let (columns, body) = split_header(rows)?;
    let brand_col = columns.require("Brand", &["brand", "برند"])?;
    let model_col = columns.require("Model", &["model", "مدل"])?;
    let variant_col = columns.find(&["variant", "trim", "تیپ"]);
    let market_col = columns.find(&["marketprice", "market", "قیمتبازار"]);
    let factory_col = columns.find(&["factoryprice", "factory", "قیمتکارخانه"]);

    let mut parsed = Vec::new();
    for (offset, row) in body.iter().enumerate() {
        // Row numbers as shown in the sheet (header is row 1)
        let row_number = offset + 2;
        let brand = cell(row, Some(brand_col));
        let model = cell(row, Some(model_col));
        if brand.is_empty() || model.is_empty() {
            debug!(row = row_number, "Skipping row without brand or model");
            continue;
        }
        let variant = match cell(row, variant_col) {
            "" => DEFAULT_VARIANT,
            name => name,
        };
        let market = parse_number(cell(row, market_col), row_number, "MarketPrice")?;
        let factory = parse_number(cell(row, factory_col), row_number, "FactoryPrice")?;

        parsed.push(CarRow {
            brand: brand.to_string(),
            model: model.to_string(),
            variant: CarVariant::new(variant, market, factory),
        });
    }
    Ok(parsed)
}

/// Parse mobile rows; rows without a brand or model are skipped
pub fn parse_mobile_rows(rows: &[Vec<String>]) -> Result<Vec<MobileRow>, SpreadsheetError> {
    let (columns, body) = split_header(rows)?;
    let brand_col = columns.require("Brand", &["brand", "برند"])?;
    let model_col = columns.require("Model", &["model", "مدل"])?;
    let storage_col = columns.find(&["storage", "حافظه"]);
    let price_col = columns.find(&["price", "قیمت"]);

    let mut parsed = Vec::new();
    for (offset, row) in body.iter().enumerate() {
        let row_number = offset + 2;
        let brand = cell(row, Some(brand_col));
        let model = cell(row, Some(model_col));
        if brand.is_empty() || model.is_empty() {
            continue;
        }
        parsed.push(MobileRow {
            brand: brand.to_string(),
            model: MobileModel {
                name: model.to_string(),
                price: parse_number(cell(row, price_col), row_number, "Price")?,
                storage: cell(row, storage_col).to_string(),
            },
        });
    }
    Ok(parsed)
}

/// Merge already-read rows into the price book
pub fn import_rows(
    rows: &[Vec<String>],
    niche: Niche,
    book: &mut PriceBook,
    now: DateTime<Utc>,
) -> Result<ImportSummary, SpreadsheetError> {
    let summary = match niche {
        Niche::Cars => {
            let parsed = parse_car_rows(rows)?;
            let stamp = now.to_rfc3339();
            for row in &parsed {
                let mut variant = row.variant.clone();
                variant.last_update = Some(stamp.clone());
                book.spreadsheet.upsert_variant(&row.brand, &row.model, variant);
            }
            book.spreadsheet_updated_at = Some(now);
            ImportSummary {
                niche,
                rows: parsed.len(),
                brands: book.spreadsheet.brands.len(),
            }
        }
        Niche::Mobile => {
            let parsed = parse_mobile_rows(rows)?;
            for row in &parsed {
                book.mobiles.upsert_model(&row.brand, row.model.clone());
            }
            ImportSummary {
                niche,
                rows: parsed.len(),
                brands: book.mobiles.brands.len(),
            }
        }
    };

    info!(
        niche = niche.as_str(),
        rows = summary.rows,
        brands = summary.brands,
        "Spreadsheet imported"
    );
    Ok(summary)
}

/// Read a workbook and merge it into the price book
pub fn import_workbook(
    bytes: &[u8],
    niche: Niche,
    book: &mut PriceBook,
    now: DateTime<Utc>,
) -> Result<ImportSummary, SpreadsheetError> {
    let rows = read_rows(bytes)?;
    import_rows(&rows, niche, book, now)
}

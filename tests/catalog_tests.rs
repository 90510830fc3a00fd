//! # Catalog Tests
//!
//! Price source selection, spreadsheet merging and search across the
//! two car catalogs and the mobile catalog.

use chrono::Utc;

use pricebot::catalog::{render_price_list, search, PriceBook, PriceSource, SearchHit};
use pricebot::errors::SpreadsheetError;
use pricebot::models::CarVariant;
use pricebot::settings::Priority;
use pricebot::spreadsheet::{import_rows, import_workbook, Niche};

fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn book_with_both_sources() -> PriceBook {
    let mut book = PriceBook::default();
    book.ai
        .upsert_variant("Saipa", "Shahin", CarVariant::new("G", 1000.0, 900.0));
    book.spreadsheet
        .upsert_variant("Saipa", "Shahin", CarVariant::new("G", 1100.0, 950.0));
    book
}

#[test]
fn test_source_follows_priority() {
    let book = book_with_both_sources();
    assert_eq!(book.source(Priority::Ai), PriceSource::Ai);
    assert_eq!(book.source(Priority::Spreadsheet), PriceSource::Spreadsheet);

    let active = book.active(Priority::Spreadsheet);
    assert_eq!(
        active.cars.variant_at(0, 0, 0).map(|v| v.market_price),
        Some(1100.0)
    );
}

#[test]
fn test_source_falls_back_to_available_data() {
    let mut book = PriceBook::default();
    assert_eq!(book.source(Priority::Ai), PriceSource::None);
    assert!(book.active(Priority::Ai).cars.is_empty());

    book.spreadsheet
        .upsert_variant("Iran Khodro", "Dena", CarVariant::new("Plus", 1500.0, 1300.0));
    assert_eq!(book.source(Priority::Ai), PriceSource::Spreadsheet);

    let mut ai_only = PriceBook::default();
    ai_only
        .ai
        .upsert_variant("Iran Khodro", "Dena", CarVariant::new("Plus", 1500.0, 1300.0));
    assert_eq!(ai_only.source(Priority::Spreadsheet), PriceSource::Ai);
}

#[test]
fn test_manual_edits_go_to_active_catalog() {
    let mut book = PriceBook::default();
    book.active_mut(Priority::Ai)
        .upsert_variant("Kia", "Cerato", CarVariant::new("2.0", 2000.0, 0.0));
    assert_eq!(book.spreadsheet.variant_count(), 1);

    let mut book = book_with_both_sources();
    book.active_mut(Priority::Ai)
        .upsert_variant("Kia", "Cerato", CarVariant::new("2.0", 2000.0, 0.0));
    assert_eq!(book.ai.variant_count(), 2);
    assert_eq!(book.spreadsheet.variant_count(), 1);
}

#[test]
fn test_import_merges_into_existing_rows() {
    let mut book = book_with_both_sources();
    let now = Utc::now();
    let sheet = rows(&[
        &["Brand", "Model", "Variant", "Market Price", "Factory_Price"],
        &["Saipa", "Shahin", "G", "1,150", "980"],
        &["Saipa", "Shahin", "CVT", "1300", ""],
        &["", "Orphan", "X", "1", "1"],
        &["Iran Khodro", "Tara", "", "1400", "1250"],
    ]);

    let summary = import_rows(&sheet, Niche::Cars, &mut book, now).unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.brands, 2);
    assert_eq!(book.spreadsheet_updated_at, Some(now));

    let shahin = &book.spreadsheet.brands["Saipa"].models[0];
    assert_eq!(shahin.variants.len(), 2);
    assert_eq!(shahin.variants[0].market_price, 1150.0);
    assert_eq!(shahin.variants[1].factory_price, 0.0);
    assert_eq!(book.spreadsheet.brands["Iran Khodro"].models[0].variants[0].name, "Base");

    // The AI catalog is never touched by uploads
    assert_eq!(book.ai.variant_count(), 1);
}

#[test]
fn test_import_rejects_bad_sheets() {
    let mut book = PriceBook::default();
    let now = Utc::now();

    let missing_model = rows(&[&["Brand", "Price"], &["Saipa", "10"]]);
    assert!(matches!(
        import_rows(&missing_model, Niche::Cars, &mut book, now),
        Err(SpreadsheetError::MissingColumn("Model"))
    ));

    let header_only = rows(&[&["Brand", "Model"]]);
    assert!(matches!(
        import_rows(&header_only, Niche::Cars, &mut book, now),
        Err(SpreadsheetError::Empty)
    ));

    let bad_number = rows(&[&["Brand", "Model", "Market"], &["Saipa", "Shahin", "cheap"]]);
    assert!(matches!(
        import_rows(&bad_number, Niche::Cars, &mut book, now),
        Err(SpreadsheetError::InvalidNumber { row: 2, .. })
    ));
    assert!(book.spreadsheet.is_empty());
}

#[test]
fn test_mobile_import_and_search() {
    let mut book = book_with_both_sources();
    let sheet = rows(&[
        &["Brand", "Model", "Storage", "Price"],
        &["Samsung", "Galaxy A55", "256GB", "25,000,000"],
        &["Apple", "iPhone 15", "128GB", "80000000"],
    ]);
    let summary = import_rows(&sheet, Niche::Mobile, &mut book, Utc::now()).unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(book.mobiles.model_at(1, 0).map(|m| m.price), Some(25_000_000.0));

    let hits = search(book.active(Priority::Ai).cars, &book.mobiles, "GALAXY", 10);
    assert_eq!(
        hits,
        vec![SearchHit::Mobile {
            brand: 1,
            model: 0,
            label: "📱 Galaxy A55 256GB".to_string()
        }]
    );

    let hits = search(book.active(Priority::Ai).cars, &book.mobiles, "a", 2);
    assert_eq!(hits.len(), 2);
    assert!(search(&book.ai, &book.mobiles, "   ", 10).is_empty());
}

#[test]
fn test_price_list_is_chunked() {
    let mut book = PriceBook::default();
    for i in 0..200 {
        book.spreadsheet.upsert_variant(
            &format!("Brand {i:03}"),
            "Model",
            CarVariant::new("Trim", 1_234_567.0, 1_000_000.0),
        );
    }

    let chunks = render_price_list(&book.spreadsheet, 1000);
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 1000));
    assert!(chunks[0].contains("1,234,567 / 1,000,000"));
}

#[test]
fn test_import_workbook_from_xlsx() {
    let workbook = include_bytes!("fixtures/cars.xlsx");
    let mut book = PriceBook::default();
    book.spreadsheet
        .upsert_variant("Saipa", "Shahin", CarVariant::new("G", 900.0, 700.0));

    let summary = import_workbook(workbook, Niche::Cars, &mut book, Utc::now())
        .expect("fixture workbook should import");
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.brands, 2);

    let shahin = &book.spreadsheet.brands["Saipa"].models[0];
    assert_eq!(shahin.variants.len(), 2);
    assert_eq!(shahin.variants[0].market_price, 980.0);
    assert_eq!(shahin.variants[0].factory_price, 720.0);
    assert_eq!(shahin.variants[1].name, "CVT");

    let dena = &book.spreadsheet.brands["Iran Khodro"].models[0];
    assert_eq!(dena.name, "Dena");
    assert_eq!(dena.variants[0].name, "Base");
    assert!(book.spreadsheet_updated_at.is_some());
}

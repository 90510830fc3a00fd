//! # Used Car Price Estimation
//!
//! Deterministic depreciation model for the estimation wizard. Starting from
//! the zero-kilometre market price, the estimate subtracts:
//!
//! - an **age drop**: 5% for the first year, 3.5% for each further year,
//!   40% flat for cars older than ten years
//! - a **mileage drop**: 1% per 10 000 km above the 20 000 km/year baseline
//!   (at most 15%), or a 0.5% bonus per 10 000 km below it (at most 5%)
//! - a **paint drop** taken from the selected body condition
//!
//! The result is rounded to the nearest 5 million Tomans and never negative.

use lazy_static::lazy_static;
use regex::Regex;

/// Number of model years offered by the wizard
pub const YEAR_CHOICES: i32 = 15;

/// Expected yearly mileage
pub const KM_PER_YEAR: f64 = 20_000.0;

const MAX_MILEAGE_PENALTY: f64 = 0.15;
const MAX_MILEAGE_BONUS: f64 = -0.05;

/// A selectable body condition; `key` is the localization key of its label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintCondition {
    pub key: &'static str,
    pub drop: f64,
}

pub const PAINT_CONDITIONS: [PaintCondition; 9] = [
    PaintCondition { key: "paint-clean", drop: 0.0 },
    PaintCondition { key: "paint-scratches", drop: 0.02 },
    PaintCondition { key: "paint-one-spot", drop: 0.04 },
    PaintCondition { key: "paint-two-spots", drop: 0.07 },
    PaintCondition { key: "paint-panel-replaced", drop: 0.05 },
    PaintCondition { key: "paint-around", drop: 0.25 },
    PaintCondition { key: "paint-roof-pillars", drop: 0.40 },
    PaintCondition { key: "paint-full", drop: 0.35 },
    PaintCondition { key: "paint-body-replaced", drop: 0.30 },
];

lazy_static! {
    static ref NUMBER_SEPARATORS: Regex =
        Regex::new(r"[,،٬\s]").expect("Number separator pattern should be valid");
}

/// Breakdown of one estimate, as shown to the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub zero_price: f64,
    pub age_drop: f64,
    pub mileage_drop: f64,
    pub paint_drop: f64,
    pub price: f64,
}

/// The model years offered by the wizard, newest first
pub fn recent_years(current_year: i32) -> Vec<i32> {
    (0..YEAR_CHOICES).map(|i| current_year - i).collect()
}

/// Fraction lost to age
pub fn age_drop(age: i32) -> f64 {
    match age {
        a if a <= 0 => 0.0,
        1 => 0.05,
        a if a > 10 => 0.40,
        a => 0.05 + f64::from(a - 1) * 0.035,
    }
}

/// Fraction lost (positive) or gained (negative) from mileage
pub fn mileage_drop(age: i32, mileage: u64) -> f64 {
    let baseline = f64::from(age.max(0)) * KM_PER_YEAR;
    let diff = mileage as f64 - baseline;
    if diff > 0.0 {
        (diff / 10_000.0 * 0.01).min(MAX_MILEAGE_PENALTY)
    } else {
        (diff / 10_000.0 * 0.005).max(MAX_MILEAGE_BONUS)
    }
}

/// Estimate the current price of a used car
pub fn estimate_price(
    zero_price: f64,
    year: i32,
    current_year: i32,
    mileage: u64,
    paint_drop: f64,
) -> Estimate {
    let age = (current_year - year).max(0);
    let age_drop = age_drop(age);
    let mileage_drop = mileage_drop(age, mileage);
    let raw = zero_price * (1.0 - age_drop - mileage_drop - paint_drop);

    Estimate {
        zero_price,
        age_drop,
        mileage_drop,
        paint_drop,
        price: round_to_five(raw),
    }
}

/// Round to the nearest multiple of 5, clamped at zero
pub fn round_to_five(value: f64) -> f64 {
    ((value / 5.0).round() * 5.0).max(0.0)
}

/// Lowest advertised market price shown next to a variant
pub fn market_floor(market_price: f64) -> f64 {
    (market_price * 0.985).floor()
}

/// Strip thousands separators and convert Persian or Arabic-Indic digits
pub fn normalize_number_input(input: &str) -> String {
    NUMBER_SEPARATORS
        .replace_all(input.trim(), "")
        .chars()
        .map(normalize_digit)
        .collect()
}

/// Parse a mileage typed by the user; negative or fractional values are
/// rejected
pub fn parse_mileage(input: &str) -> Option<u64> {
    let cleaned = normalize_number_input(input);
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

fn normalize_digit(c: char) -> char {
    match c {
        '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
        '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
        '٫' => '.',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_drop_steps() {
        assert_eq!(age_drop(0), 0.0);
        assert_eq!(age_drop(1), 0.05);
        assert!((age_drop(2) - 0.085).abs() < 1e-9);
        assert!((age_drop(10) - 0.365).abs() < 1e-9);
        assert_eq!(age_drop(11), 0.40);
    }

    #[test]
    fn test_mileage_caps() {
        assert_eq!(mileage_drop(0, 1_000_000), 0.15);
        assert_eq!(mileage_drop(10, 0), -0.05);
        assert!((mileage_drop(1, 0) + 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_parse_mileage() {
        assert_eq!(parse_mileage("45,000"), Some(45_000));
        assert_eq!(parse_mileage(" 120000 "), Some(120_000));
        assert_eq!(parse_mileage("۴۵۰۰۰"), Some(45_000));
        assert_eq!(parse_mileage("-5"), None);
        assert_eq!(parse_mileage("12.5"), None);
        assert_eq!(parse_mileage("many"), None);
        assert_eq!(parse_mileage(""), None);
    }

    #[test]
    fn test_market_floor() {
        assert_eq!(market_floor(1000.0), 985.0);
        assert_eq!(market_floor(830.0), 817.0);
    }
}

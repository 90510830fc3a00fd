//! Price bot dialogue module for handling conversation state with users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::estimate::normalize_number_input;
use crate::settings::AdminRole;
use crate::spreadsheet::Niche;
use crate::store::Audience;

/// Longest accepted label or catalog name
pub const MAX_NAME_CHARS: usize = 64;

/// Represents the conversation state of one chat
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum DialogueState {
    #[default]
    Idle,
    BrowsingBrands,
    BrowsingModels {
        brand: String,
    },
    BrowsingVariants {
        brand: String,
        model: String,
    },
    EstimateBrand,
    EstimateModel {
        brand: String,
    },
    EstimateYear {
        brand: String,
        model: String,
    },
    EstimateMileage {
        brand: String,
        model: String,
        year: i32,
    },
    EstimatePaint {
        brand: String,
        model: String,
        year: i32,
        mileage: u64,
    },
    Searching,
    SupportMessage,
    MobileBrowsing,
    /// An admin flow waiting for free text or a document
    AwaitingInput(PendingInput),
}

/// The free-text (or document) input an admin flow is waiting for
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PendingInput {
    ChannelUrl,
    MenuLabel {
        key: String,
    },
    MenuUrl {
        key: String,
    },
    SupportContact,
    AdminId {
        role: AdminRole,
    },
    SponsorName,
    SponsorUrl {
        name: String,
    },
    BroadcastTime,
    BroadcastContent {
        audience: Audience,
        due_at: Option<DateTime<Utc>>,
    },
    AddBrand,
    AddModel {
        brand: String,
    },
    AddVariant {
        brand: String,
        model: String,
    },
    AddMarketPrice {
        brand: String,
        model: String,
        variant: String,
    },
    AddFactoryPrice {
        brand: String,
        model: String,
        variant: String,
        market: f64,
    },
    Spreadsheet {
        niche: Niche,
    },
    RestoreBackup,
}

impl PendingInput {
    /// Whether this step expects an uploaded document rather than text
    pub fn expects_document(&self) -> bool {
        matches!(self, PendingInput::Spreadsheet { .. } | PendingInput::RestoreBackup)
    }
}

/// Type alias for our price bot dialogue
pub type PriceDialogue = Dialogue<DialogueState, InMemStorage<DialogueState>>;

/// Validates a label or catalog name
pub fn validate_name(name: &str) -> Result<String, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

/// Validates a link entered by an admin
pub fn validate_url(url: &str) -> Result<String, &'static str> {
    let trimmed = url.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    // Telegram handles become t.me links
    if let Some(handle) = trimmed.strip_prefix('@') {
        if handle.is_empty() || handle.contains(char::is_whitespace) {
            return Err("invalid");
        }
        return Ok(format!("https://t.me/{handle}"));
    }

    let has_scheme = ["https://", "http://", "tg://"]
        .iter()
        .any(|scheme| trimmed.starts_with(scheme));
    if !has_scheme || trimmed.contains(char::is_whitespace) {
        return Err("invalid");
    }

    Ok(trimmed.to_string())
}

/// Parses a non-negative price typed by an admin
pub fn parse_price(input: &str) -> Option<f64> {
    let value: f64 = normalize_number_input(input).parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Parses a Telegram user id typed by an admin
pub fn parse_user_id(input: &str) -> Option<i64> {
    normalize_number_input(input).parse().ok().filter(|id: &i64| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert_eq!(validate_name("  Saipa  ").unwrap(), "Saipa");
        assert_eq!(validate_name("   "), Err("empty"));
        assert_eq!(validate_name(&"a".repeat(65)), Err("too_long"));
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("https://t.me/channel").is_ok());
        assert!(validate_url("tg://resolve?domain=x").is_ok());
        assert_eq!(validate_url("t.me/channel"), Err("invalid"));
        assert_eq!(validate_url("@cars").unwrap(), "https://t.me/cars");
        assert_eq!(validate_url("@"), Err("invalid"));
        assert_eq!(validate_url("https://a b"), Err("invalid"));
    }

    #[test]
    fn test_number_inputs() {
        assert_eq!(parse_price("1,250"), Some(1250.0));
        assert_eq!(parse_price("-3"), None);
        assert_eq!(parse_price("abc"), None);
        assert_eq!(parse_user_id("123456789"), Some(123_456_789));
        assert_eq!(parse_user_id("0"), None);
    }

    #[test]
    fn test_document_steps() {
        assert!(PendingInput::RestoreBackup.expects_document());
        assert!(!PendingInput::SponsorName.expects_document());
    }
}

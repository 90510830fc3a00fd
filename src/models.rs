//! # Price Data Model
//!
//! Plain records shared by the bot, the REST API and the JSON store.
//!
//! ## Core Concepts
//!
//! - **CarDatabase**: brand → model → variant, each variant with a market and a
//!   factory price (millions of Tomans)
//! - **MobileDatabase**: brand → model, each model with a price and storage size
//! - **InlineButton**: a label plus one action (callback, web app or URL)
//! - **ChatMessage**: a recorded message, used for the support inbox

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A specific trim/configuration of a car model with its own prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarVariant {
    pub name: String,
    #[serde(default)]
    pub market_price: f64,
    #[serde(default)]
    pub factory_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}

impl CarVariant {
    pub fn new(name: impl Into<String>, market_price: f64, factory_price: f64) -> Self {
        Self {
            name: name.into(),
            market_price,
            factory_price,
            last_update: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarModel {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<CarVariant>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarBrand {
    /// Display name; filled from the map key when a source omits it
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub models: Vec<CarModel>,
}

/// Nested car catalog keyed by brand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarDatabase {
    pub brands: BTreeMap<String, CarBrand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileModel {
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub storage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MobileBrand {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub models: Vec<MobileModel>,
}

/// Mobile catalog keyed by brand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MobileDatabase {
    pub brands: BTreeMap<String, MobileBrand>,
}

/// What pressing an inline button does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonAction {
    /// Sends the identifier back to the bot as a callback query
    Callback(String),
    /// Opens a Telegram web app
    WebApp(String),
    /// Opens an external link
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub label: String,
    pub action: ButtonAction,
}

impl InlineButton {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn web_app(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::WebApp(url.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }

    /// The callback identifier, if this is a callback button
    pub fn callback_data(&self) -> Option<&str> {
        match &self.action {
            ButtonAction::Callback(data) => Some(data),
            _ => None,
        }
    }
}

/// Rows of inline buttons
pub type ButtonRows = Vec<Vec<InlineButton>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Sender {
    User { id: i64 },
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: ButtonRows,
}

impl ChatMessage {
    pub fn from_user(user_id: i64, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender: Sender::User { id: user_id },
            timestamp,
            buttons: Vec::new(),
        }
    }
}

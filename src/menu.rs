//! Main menu configuration.
//!
//! Each entry of the main menu can be renamed, toggled and (for links and web
//! apps) pointed at a new URL from the admin panel. Entries missing from a
//! stored document are filled back in from the defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CALC: &str = "calc";
pub const MARKET: &str = "market";
pub const PRICES: &str = "prices";
pub const ESTIMATE: &str = "estimate";
pub const MOBILE_WEBAPP: &str = "mobile_webapp";
pub const MOBILE_LIST: &str = "mobile_list";
pub const SEARCH: &str = "search";
pub const CHANNEL: &str = "channel";
pub const SUPPORT: &str = "support";

/// Entry keys in display order
pub const MENU_KEYS: [&str; 9] = [
    CALC,
    MARKET,
    PRICES,
    ESTIMATE,
    MOBILE_WEBAPP,
    MOBILE_LIST,
    SEARCH,
    CHANNEL,
    SUPPORT,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuKind {
    /// Opens a Telegram web app
    WebApp,
    /// Handled by the bot through a callback
    Internal,
    /// External link
    Link,
    /// Support button; link or callback depending on the support mode
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub active: bool,
    #[serde(rename = "type")]
    pub kind: MenuKind,
}

impl MenuEntry {
    fn new(label: &str, url: Option<&str>, kind: MenuKind) -> Self {
        Self {
            label: label.to_string(),
            url: url.map(str::to_string),
            active: true,
            kind,
        }
    }

    /// Whether the admin can change this entry's URL
    pub fn has_url(&self) -> bool {
        matches!(self.kind, MenuKind::WebApp | MenuKind::Link)
    }
}

fn default_entry(key: &str) -> Option<MenuEntry> {
    let entry = match key {
        CALC => MenuEntry::new(
            "🧮 ماشین‌حساب",
            Some("https://www.hamrah-mechanic.com/carprice/"),
            MenuKind::WebApp,
        ),
        MARKET => MenuEntry::new(
            "🌐 قیمت بازار",
            Some("https://www.iranjib.ir/showgroup/45/"),
            MenuKind::WebApp,
        ),
        PRICES => MenuEntry::new("📋 لیست قیمت خودرو", None, MenuKind::Internal),
        ESTIMATE => MenuEntry::new("💰 تخمین قیمت خودرو", None, MenuKind::Internal),
        MOBILE_WEBAPP => MenuEntry::new(
            "📱 قیمت موبایل (سایت)",
            Some("https://www.mobile.ir/phones/prices.aspx"),
            MenuKind::WebApp,
        ),
        MOBILE_LIST => MenuEntry::new("📲 لیست موبایل (ربات)", None, MenuKind::Internal),
        SEARCH => MenuEntry::new("🔍 جستجوی هوشمند", None, MenuKind::Internal),
        CHANNEL => MenuEntry::new(
            "📢 کانال ما",
            Some("https://t.me/CarPrice_Channel"),
            MenuKind::Link,
        ),
        SUPPORT => MenuEntry::new("📞 پشتیبانی", None, MenuKind::Dynamic),
        _ => return None,
    };
    Some(entry)
}

/// The editable main menu, keyed by entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuConfig {
    pub entries: BTreeMap<String, MenuEntry>,
}

impl Default for MenuConfig {
    fn default() -> Self {
        let entries = MENU_KEYS
            .iter()
            .filter_map(|key| default_entry(key).map(|entry| (key.to_string(), entry)))
            .collect();
        Self { entries }
    }
}

impl MenuConfig {
    /// Add any default entry that is missing
    pub fn fill_defaults(&mut self) {
        for key in MENU_KEYS {
            if !self.entries.contains_key(key) {
                if let Some(entry) = default_entry(key) {
                    self.entries.insert(key.to_string(), entry);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&MenuEntry> {
        self.entries.get(key)
    }

    /// The entry if it exists and is active
    pub fn active(&self, key: &str) -> Option<&MenuEntry> {
        self.entries.get(key).filter(|entry| entry.active)
    }

    /// Known entries in display order, followed by any extra stored entries
    pub fn ordered(&self) -> Vec<(&str, &MenuEntry)> {
        let mut ordered: Vec<(&str, &MenuEntry)> = MENU_KEYS
            .iter()
            .filter_map(|key| self.entries.get(*key).map(|entry| (*key, entry)))
            .collect();
        ordered.extend(
            self.entries
                .iter()
                .filter(|(key, _)| !MENU_KEYS.contains(&key.as_str()))
                .map(|(key, entry)| (key.as_str(), entry)),
        );
        ordered
    }

    /// Flip an entry's visibility, returning the new state
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        let entry = self.entries.get_mut(key)?;
        entry.active = !entry.active;
        Some(entry.active)
    }

    pub fn set_label(&mut self, key: &str, label: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.label = label.trim().to_string();
                true
            }
            None => false,
        }
    }

    /// Change the URL of a link or web-app entry
    pub fn set_url(&mut self, key: &str, url: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.has_url() => {
                entry.url = Some(url.trim().to_string());
                true
            }
            _ => false,
        }
    }
}

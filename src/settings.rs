//! # Settings Module
//!
//! Persistent application settings edited from the dashboard and the admin
//! panel: price source priority, AI provider selection, API keys and the
//! refresh interval. Also holds the admin role model and the support/sponsor
//! records shown in the main menu.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default interval between automatic AI price refreshes
pub const DEFAULT_UPDATE_INTERVAL_HOURS: u32 = 24;

/// Default prompt shown to users in text support mode
pub const DEFAULT_SUPPORT_TEXT: &str = "پیام خود را ارسال کنید...";

/// Which catalog is shown when both sources have data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "SPREADSHEET", alias = "EXCEL")]
    Spreadsheet,
}

impl Priority {
    pub fn toggled(self) -> Self {
        match self {
            Priority::Ai => Priority::Spreadsheet,
            Priority::Spreadsheet => Priority::Ai,
        }
    }
}

/// AI provider used to generate prices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiSource {
    #[default]
    #[serde(rename = "GEMINI")]
    Gemini,
    #[serde(rename = "DEEPSEEK")]
    DeepSeek,
    #[serde(rename = "OPENAI")]
    OpenAi,
}

impl AiSource {
    /// Next provider in the admin panel's cycle
    pub fn next(self) -> Self {
        match self {
            AiSource::Gemini => AiSource::DeepSeek,
            AiSource::DeepSeek => AiSource::OpenAi,
            AiSource::OpenAi => AiSource::Gemini,
        }
    }
}

impl fmt::Display for AiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AiSource::Gemini => "GEMINI",
            AiSource::DeepSeek => "DEEPSEEK",
            AiSource::OpenAi => "OPENAI",
        };
        f.write_str(name)
    }
}

/// Settings record, serialized with the dashboard's field names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub priority: Priority,
    pub ai_source: AiSource,
    pub ai_kill_switch: bool,
    pub gemini_api_key: String,
    pub deepseek_api_key: String,
    pub openai_api_key: String,
    /// Hours between automatic AI refreshes; 0 disables the job
    pub update_interval: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            priority: Priority::default(),
            ai_source: AiSource::default(),
            ai_kill_switch: false,
            gemini_api_key: String::new(),
            deepseek_api_key: String::new(),
            openai_api_key: String::new(),
            update_interval: DEFAULT_UPDATE_INTERVAL_HOURS,
            last_updated: None,
        }
    }
}

impl AppSettings {
    /// The stored key for `source` (may be empty)
    pub fn api_key(&self, source: AiSource) -> &str {
        match source {
            AiSource::Gemini => &self.gemini_api_key,
            AiSource::DeepSeek => &self.deepseek_api_key,
            AiSource::OpenAi => &self.openai_api_key,
        }
    }

    /// Copy with every API key masked, for responses leaving the process
    pub fn masked(&self) -> Self {
        Self {
            gemini_api_key: mask_key(&self.gemini_api_key),
            deepseek_api_key: mask_key(&self.deepseek_api_key),
            openai_api_key: mask_key(&self.openai_api_key),
            ..self.clone()
        }
    }

    /// Apply a partial update. Keys that still carry the mask are ignored so a
    /// dashboard round-trip does not overwrite the real key.
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(source) = update.ai_source {
            self.ai_source = source;
        }
        if let Some(kill) = update.ai_kill_switch {
            self.ai_kill_switch = kill;
        }
        if let Some(hours) = update.update_interval {
            self.update_interval = hours;
        }
        for (incoming, slot) in [
            (update.gemini_api_key, &mut self.gemini_api_key),
            (update.deepseek_api_key, &mut self.deepseek_api_key),
            (update.openai_api_key, &mut self.openai_api_key),
        ] {
            if let Some(key) = incoming {
                if !key.contains(MASK) {
                    *slot = key.trim().to_string();
                }
            }
        }
    }
}

/// Partial settings body accepted by `POST /api/settings`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub priority: Option<Priority>,
    pub ai_source: Option<AiSource>,
    pub ai_kill_switch: Option<bool>,
    pub gemini_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub update_interval: Option<u32>,
}

const MASK: &str = "****";

fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    match count {
        0 => String::new(),
        1..=8 => MASK.to_string(),
        _ => {
            let tail: String = key.chars().skip(count - 4).collect();
            format!("{MASK}{tail}")
        }
    }
}

/// Admin roles. The owner is always `Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    Full,
    Editor,
    Support,
}

/// Things an admin can do from the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    MenuEditing,
    Channel,
    AiSettings,
    AiUpdate,
    Spreadsheet,
    AddCar,
    SupportConfig,
    ManageAdmins,
    Sponsor,
    Backup,
    Broadcast,
}

impl AdminRole {
    pub fn allows(self, permission: Permission) -> bool {
        match self {
            AdminRole::Full => true,
            AdminRole::Editor => matches!(
                permission,
                Permission::AiUpdate | Permission::Spreadsheet | Permission::AddCar
            ),
            AdminRole::Support => permission == Permission::SupportConfig,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdminRole::Full => "full",
            AdminRole::Editor => "editor",
            AdminRole::Support => "support",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full" => Some(AdminRole::Full),
            "editor" => Some(AdminRole::Editor),
            "support" => Some(AdminRole::Support),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportMode {
    #[default]
    Text,
    Link,
}

/// How the support button behaves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportConfig {
    pub mode: SupportMode,
    /// Prompt text in text mode, target URL in link mode
    pub value: String,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            mode: SupportMode::Text,
            value: DEFAULT_SUPPORT_TEXT.to_string(),
        }
    }
}

impl SupportConfig {
    /// Interpret an admin's input: URLs and `@handles` become links,
    /// anything else becomes the text-mode prompt.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("http") {
            Self {
                mode: SupportMode::Link,
                value: input.to_string(),
            }
        } else if let Some(handle) = input.strip_prefix('@').filter(|h| !h.is_empty()) {
            Self {
                mode: SupportMode::Link,
                value: format!("https://t.me/{handle}"),
            }
        } else {
            Self {
                mode: SupportMode::Text,
                value: input.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sponsor {
    pub name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(AppSettings::default()).unwrap();
        assert_eq!(json["priority"], "AI");
        assert_eq!(json["aiSource"], "GEMINI");
        assert_eq!(json["updateInterval"], 24);

        let legacy: Priority = serde_json::from_str("\"EXCEL\"").unwrap();
        assert_eq!(legacy, Priority::Spreadsheet);
        let source: AiSource = serde_json::from_str("\"DEEPSEEK\"").unwrap();
        assert_eq!(source, AiSource::DeepSeek);
    }

    #[test]
    fn test_masking_and_partial_update() {
        let mut settings = AppSettings {
            gemini_api_key: "AIzaSyA-1234567890abcd".to_string(),
            ..Default::default()
        };
        let masked = settings.masked();
        assert_eq!(masked.gemini_api_key, "****abcd");
        assert_eq!(masked.openai_api_key, "");

        settings.apply(SettingsUpdate {
            gemini_api_key: Some(masked.gemini_api_key.clone()),
            openai_api_key: Some(" sk-new ".to_string()),
            update_interval: Some(6),
            ..Default::default()
        });
        assert_eq!(settings.gemini_api_key, "AIzaSyA-1234567890abcd");
        assert_eq!(settings.openai_api_key, "sk-new");
        assert_eq!(settings.update_interval, 6);
        assert_eq!(settings.priority, Priority::Ai);
    }

    #[test]
    fn test_role_permissions() {
        assert!(AdminRole::Full.allows(Permission::Backup));
        assert!(AdminRole::Editor.allows(Permission::Spreadsheet));
        assert!(!AdminRole::Editor.allows(Permission::Broadcast));
        assert!(AdminRole::Support.allows(Permission::SupportConfig));
        assert!(!AdminRole::Support.allows(Permission::AddCar));
    }

    #[test]
    fn test_support_input_normalization() {
        let config = SupportConfig::from_input("@car_support");
        assert_eq!(config.mode, SupportMode::Link);
        assert_eq!(config.value, "https://t.me/car_support");

        let config = SupportConfig::from_input("https://example.com/help");
        assert_eq!(config.mode, SupportMode::Link);

        let config = SupportConfig::from_input("Write your question");
        assert_eq!(config.mode, SupportMode::Text);
        assert_eq!(config.value, "Write your question");
    }

    #[test]
    fn test_ai_source_cycle() {
        assert_eq!(AiSource::Gemini.next(), AiSource::DeepSeek);
        assert_eq!(AiSource::OpenAi.next(), AiSource::Gemini);
        assert_eq!(AiSource::OpenAi.to_string(), "OPENAI");
    }
}

//! # Configuration Module
//!
//! Runtime configuration for the price bot, loaded from environment variables
//! (after `.env` has been applied by `main`). Every field except the bot token
//! has a usable default so the REST server can run on its own.

// Constants for default configuration
pub const DEFAULT_DATA_FILE: &str = "bot_data.json";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_LOCALE: &str = "fa";
pub const DEFAULT_TIMEZONE_OFFSET_MINUTES: i32 = 210; // Asia/Tehran, UTC+03:30
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Endpoints and model names for the AI price providers
#[derive(Debug, Clone)]
pub struct AiEndpoints {
    /// Base URL of the Gemini REST API
    pub gemini_base_url: String,
    /// Gemini model used for `generateContent`
    pub gemini_model: String,
    /// Base URL of the DeepSeek chat completions API
    pub deepseek_base_url: String,
    /// DeepSeek model name
    pub deepseek_model: String,
    /// Base URL of the OpenAI chat completions API
    pub openai_base_url: String,
    /// OpenAI model name
    pub openai_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AiEndpoints {
    fn default() -> Self {
        Self {
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            deepseek_base_url: "https://api.deepseek.com".to_string(),
            deepseek_model: "deepseek-chat".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 120,
        }
    }
}

/// API keys taken from the environment, used when the stored settings have none
#[derive(Debug, Clone, Default)]
pub struct EnvApiKeys {
    pub gemini: String,
    pub deepseek: String,
    pub openai: String,
}

/// Top-level application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Telegram bot token; the bot is not started without one
    pub bot_token: Option<String>,
    /// Telegram user id of the owner (always a `full` admin)
    pub owner_id: i64,
    /// Path of the JSON data file
    pub data_file: String,
    /// TCP address for the REST server
    pub bind_address: String,
    /// Locale used when the Telegram user has no supported language code
    pub default_locale: String,
    /// Offset applied when interpreting scheduled broadcast times
    pub timezone_offset_minutes: i32,
    /// Optional directory with the prebuilt dashboard
    pub dashboard_dir: Option<String>,
    /// Maximum size of an uploaded spreadsheet or backup
    pub max_upload_bytes: usize,
    /// Comma-separated CORS origins; `None` allows any origin
    pub cors_origins: Option<String>,
    /// When `true`, logs are emitted as JSON lines
    pub log_json: bool,
    pub api_keys: EnvApiKeys,
    pub ai: AiEndpoints,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            owner_id: 0,
            data_file: DEFAULT_DATA_FILE.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            default_locale: DEFAULT_LOCALE.to_string(),
            timezone_offset_minutes: DEFAULT_TIMEZONE_OFFSET_MINUTES,
            dashboard_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            cors_origins: None,
            log_json: false,
            api_keys: EnvApiKeys::default(),
            ai: AiEndpoints::default(),
        }
    }
}

impl AppConfig {
    /// Build [`AppConfig`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = AiEndpoints::default();

        Self {
            bot_token: non_empty_env("TELEGRAM_BOT_TOKEN"),
            owner_id: parse_env("OWNER_ID", 0),
            data_file: env_or("DATA_FILE", DEFAULT_DATA_FILE),
            bind_address: env_or("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            default_locale: env_or("DEFAULT_LOCALE", DEFAULT_LOCALE),
            timezone_offset_minutes: parse_env(
                "TIMEZONE_OFFSET_MINUTES",
                DEFAULT_TIMEZONE_OFFSET_MINUTES,
            ),
            dashboard_dir: non_empty_env("DASHBOARD_DIR"),
            max_upload_bytes: parse_env("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB) * 1024 * 1024,
            cors_origins: non_empty_env("CORS_ORIGINS"),
            log_json: std::env::var("LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            api_keys: EnvApiKeys {
                gemini: env_or("GEMINI_API_KEY", ""),
                deepseek: env_or("DEEPSEEK_API_KEY", ""),
                openai: env_or("OPENAI_API_KEY", ""),
            },
            ai: AiEndpoints {
                gemini_base_url: env_or("GEMINI_BASE_URL", &defaults.gemini_base_url),
                gemini_model: env_or("GEMINI_MODEL", &defaults.gemini_model),
                deepseek_base_url: env_or("DEEPSEEK_BASE_URL", &defaults.deepseek_base_url),
                deepseek_model: env_or("DEEPSEEK_MODEL", &defaults.deepseek_model),
                openai_base_url: env_or("OPENAI_BASE_URL", &defaults.openai_base_url),
                openai_model: env_or("OPENAI_MODEL", &defaults.openai_model),
                timeout_secs: parse_env("AI_TIMEOUT_SECS", defaults.timeout_secs),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.data_file, "bot_data.json");
        assert_eq!(config.timezone_offset_minutes, 210);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.bot_token.is_none());
    }
}

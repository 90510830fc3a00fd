//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! testing message retrieval, language resolution and key parity between
//! the shipped locales.

use pricebot::localization::LocalizationManager;
use std::collections::{BTreeSet, HashMap};

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    /// Message identifiers defined in a Fluent file
    fn message_keys(source: &str) -> BTreeSet<String> {
        source
            .lines()
            .filter(|line| !line.starts_with(' ') && !line.starts_with('#'))
            .filter_map(|line| line.split_once(" ="))
            .map(|(key, _)| key.trim().to_string())
            .collect()
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("help-text", "en", None);
        assert!(message.contains("/price"));
        assert!(message.contains("/admin"));

        let message = manager.get_message_in_language("help-text", "fa", None);
        assert!(message.contains("راهنما"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert_eq!(message, "Missing translation: nonexistent-key");
    }

    #[test]
    fn test_unsupported_language_uses_default() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("access-denied", "de", None);
        assert_eq!(message, "⛔ شما به این بخش دسترسی ندارید.");

        let english_default =
            LocalizationManager::with_default_language("en").expect("manager should load");
        let message = english_default.get_message_in_language("access-denied", "de", None);
        assert_eq!(message, "⛔ You don't have access to this section.");
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("brand", "Saipa");
        args.insert("model", "Shahin");
        args.insert("variant", "G");

        let message = manager.get_message_in_language("car-added", "en", Some(&args));
        assert_eq!(message, "✅ Saipa Shahin G saved.");

        let message =
            manager.get_message_with_args("ai-no-key", "en", &[("source", "OPENAI")]);
        assert_eq!(message, "🔑 No API key is configured for OPENAI.");
    }

    #[test]
    fn test_get_message_missing_args() {
        let manager = setup_localization();

        // Missing arguments leave a visible placeholder instead of failing
        let message = manager.get_message_in_language("your-id", "en", None);
        assert!(message.starts_with("🆔 Your Telegram id:"));
    }

    #[test]
    fn test_resolve_language() {
        let manager = setup_localization();

        assert_eq!(manager.resolve_language(Some("en")), "en");
        assert_eq!(manager.resolve_language(Some("en-US")), "en");
        assert_eq!(manager.resolve_language(Some("FA")), "fa");
        assert_eq!(manager.resolve_language(Some("ru")), "fa");
        assert_eq!(manager.resolve_language(None), "fa");
    }

    #[test]
    fn test_unknown_default_language_falls_back() {
        let manager =
            LocalizationManager::with_default_language("xx").expect("manager should load");
        assert_eq!(manager.resolve_language(None), "fa");
    }

    #[test]
    fn test_locales_define_the_same_keys() {
        let fa = message_keys(include_str!("../locales/fa/main.ftl"));
        let en = message_keys(include_str!("../locales/en/main.ftl"));

        assert!(fa.len() > 100);
        let only_fa: Vec<_> = fa.difference(&en).collect();
        let only_en: Vec<_> = en.difference(&fa).collect();
        assert!(only_fa.is_empty(), "missing in en: {only_fa:?}");
        assert!(only_en.is_empty(), "missing in fa: {only_en:?}");
    }

    #[test]
    fn test_paint_and_role_labels_exist() {
        let manager = setup_localization();

        for condition in pricebot::estimate::PAINT_CONDITIONS {
            for lang in ["fa", "en"] {
                let label = manager.get_message_in_language(condition.key, lang, None);
                assert!(!label.starts_with("Missing"), "{} in {lang}", condition.key);
            }
        }
        for role in ["full", "editor", "support"] {
            let label = manager.get_message_in_language(&format!("role-{role}"), "en", None);
            assert!(!label.starts_with("Missing"));
        }
    }
}

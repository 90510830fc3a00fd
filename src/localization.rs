use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{error, warn};
use unic_langid::LanguageIdentifier;

use crate::config::DEFAULT_LOCALE;

/// Locales shipped with the bot, with their embedded Fluent resources
const RESOURCES: [(&str, &str); 2] = [
    ("fa", include_str!("../locales/fa/main.ftl")),
    ("en", include_str!("../locales/en/main.ftl")),
];

/// Localization manager for the price bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
    default_language: String,
}

impl LocalizationManager {
    /// Create a new localization manager with every embedded locale
    pub fn new() -> Result<Self> {
        Self::with_default_language(DEFAULT_LOCALE)
    }

    /// Create a manager that falls back to `default_language`
    pub fn with_default_language(default_language: &str) -> Result<Self> {
        let mut bundles = HashMap::new();

        for (code, source) in RESOURCES {
            let locale: LanguageIdentifier = code.parse()?;
            let bundle = Self::create_bundle(locale, source)?;
            bundles.insert(code.to_string(), bundle);
        }

        let default_language = if bundles.contains_key(default_language) {
            default_language.to_string()
        } else {
            DEFAULT_LOCALE.to_string()
        };

        Ok(Self {
            bundles,
            default_language,
        })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // No bidi isolation marks around placeables
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("duplicate {locale} messages: {errors:?}"))?;

        Ok(bundle)
    }

    /// Pick a supported language for a Telegram language code
    pub fn resolve_language(&self, language_code: Option<&str>) -> &str {
        let requested = language_code
            .and_then(|code| code.split(['-', '_']).next())
            .map(|code| code.to_lowercase());

        match requested {
            Some(code) => self
                .bundles
                .get_key_value(code.as_str())
                .map(|(key, _)| key.as_str())
                .unwrap_or(&self.default_language),
            None => &self.default_language,
        }
    }

    /// Get a localized message in a specific language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(&self.default_language))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let mut value = String::new();
        let mut errors = vec![];

        let written = match args {
            Some(args) => {
                let fluent_args = FluentArgs::from_iter(
                    args.iter().map(|(k, v)| (*k, FluentValue::from(*v))),
                );
                bundle.write_pattern(&mut value, pattern, Some(&fluent_args), &mut errors)
            }
            None => bundle.write_pattern(&mut value, pattern, None, &mut errors),
        };

        if let Err(e) = written {
            warn!(key, error = %e, "Failed to write localized message");
        }
        if !errors.is_empty() {
            warn!(key, errors = ?errors, "Localized message formatted with errors");
        }

        value
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(
        &self,
        key: &str,
        language: &str,
        args: &[(&str, &str)],
    ) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, language, Some(&args_map))
    }
}

/// Global localization instance
static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager with the configured default
/// language. Fails when an embedded resource does not parse.
pub fn init_localization(default_language: &str) -> Result<()> {
    let manager = LocalizationManager::with_default_language(default_language)?;
    let _ = LOCALIZATION_MANAGER.set(manager);
    Ok(())
}

/// Get the global localization manager
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|e| {
            error!(error = %e, "Failed to load translations");
            LocalizationManager {
                bundles: HashMap::new(),
                default_language: DEFAULT_LOCALE.to_string(),
            }
        })
    })
}

/// Resolve a Telegram language code to a supported language
pub fn language_for(language_code: Option<&str>) -> String {
    get_localization_manager().resolve_language(language_code).to_string()
}

/// Convenience function to get a localized message in a language
pub fn t_lang(key: &str, language: &str) -> String {
    get_localization_manager().get_message_in_language(key, language, None)
}

/// Convenience function to get a localized message with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: &str) -> String {
    get_localization_manager().get_message_with_args(key, language, args)
}

//! Localized prompt strings
//!
//! Strings are addressed by `(category, key, language)`. Lookups never
//! fail: a missing entry falls back to the default language and then to
//! the bare key.

mod detector;

pub use detector::LanguageDetector;

use crate::config::LocalizationConfig;
use crate::errors::{AppError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_EN: &str = include_str!("../../locales/en.json");
const BUILTIN_PL: &str = include_str!("../../locales/pl.json");

/// String lookup used when assembling prompts
pub trait LocalizedStrings: Send + Sync {
    /// Translation of `category.key` for `language`, or a fallback
    fn get_localized_string(&self, category: &str, key: &str, language: &str) -> String;
}

/// Translations loaded from nested JSON documents
///
/// Each document maps categories to objects of key/text pairs. Tables are
/// flattened to `category.key` on load.
#[derive(Debug, Clone)]
pub struct JsonLocalizedResources {
    default_language: String,
    tables: HashMap<String, HashMap<String, String>>,
}

impl JsonLocalizedResources {
    /// Empty resources; every lookup yields the key
    pub fn empty(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into().to_lowercase(),
            tables: HashMap::new(),
        }
    }

    /// Built-in English and Polish strings
    pub fn builtin(default_language: impl Into<String>) -> Result<Self> {
        let mut resources = Self::empty(default_language);
        resources.add_language_json("en", BUILTIN_EN)?;
        resources.add_language_json("pl", BUILTIN_PL)?;
        Ok(resources)
    }

    /// Built-ins overlaid with `<resources_dir>/<lang>.json` for each
    /// supported language that has a file
    pub fn from_config(config: &LocalizationConfig) -> Result<Self> {
        let mut resources = Self::builtin(config.default_language.clone())?;

        if let Some(dir) = &config.resources_dir {
            for language in &config.supported_languages {
                let path = Path::new(dir).join(format!("{}.json", language));
                if !path.is_file() {
                    continue;
                }
                let raw = std::fs::read_to_string(&path).map_err(|e| AppError::Localization {
                    message: format!("failed to read {}: {}", path.display(), e),
                })?;
                resources.add_language_json(language, &raw)?;
                tracing::info!(language = %language, path = %path.display(), "Loaded localized resources");
            }
        }

        Ok(resources)
    }

    /// Merge a JSON document into `language`, replacing existing keys
    pub fn add_language_json(&mut self, language: &str, raw: &str) -> Result<()> {
        let document: Value = serde_json::from_str(raw).map_err(|e| AppError::Localization {
            message: format!("invalid resources for '{}': {}", language, e),
        })?;

        let Value::Object(categories) = document else {
            return Err(AppError::Localization {
                message: format!("resources for '{}' must be a JSON object", language),
            });
        };

        let table = self.tables.entry(language.to_lowercase()).or_default();
        for (category, entries) in categories {
            let Value::Object(entries) = entries else {
                continue;
            };
            for (key, text) in entries {
                if let Value::String(text) = text {
                    table.insert(format!("{}.{}", category, key), text);
                }
            }
        }

        Ok(())
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    fn lookup(&self, language: &str, path: &str) -> Option<&String> {
        self.tables.get(language).and_then(|table| table.get(path))
    }
}

impl LocalizedStrings for JsonLocalizedResources {
    fn get_localized_string(&self, category: &str, key: &str, language: &str) -> String {
        let path = format!("{}.{}", category, key);
        let language = language.to_lowercase();

        if let Some(text) = self.lookup(&language, &path) {
            return text.clone();
        }

        if let Some(text) = self.lookup(&self.default_language, &path) {
            tracing::debug!(key = %path, language = %language, "Using default-language string");
            return text.clone();
        }

        tracing::warn!(key = %path, language = %language, "Missing localized string");
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let resources = JsonLocalizedResources::builtin("en").unwrap();

        assert_eq!(resources.get_localized_string("ui_labels", "sources", "en"), "Sources");
        assert_eq!(resources.get_localized_string("ui_labels", "sources", "pl"), "Źródła");
        assert_eq!(resources.get_localized_string("ui_labels", "sources", "PL"), "Źródła");
    }

    #[test]
    fn test_falls_back_to_default_language() {
        let resources = JsonLocalizedResources::builtin("en").unwrap();
        assert_eq!(resources.get_localized_string("ui_labels", "user", "hu"), "User");
    }

    #[test]
    fn test_default_language_is_case_insensitive() {
        let resources = JsonLocalizedResources::builtin("EN").unwrap();
        assert_eq!(resources.get_localized_string("ui_labels", "user", "hu"), "User");

        let resources = JsonLocalizedResources::builtin("Pl").unwrap();
        assert_eq!(resources.get_localized_string("ui_labels", "sources", "ro"), "Źródła");
    }

    #[test]
    fn test_falls_back_to_key() {
        let resources = JsonLocalizedResources::builtin("en").unwrap();
        assert_eq!(resources.get_localized_string("ui_labels", "missing_label", "pl"), "missing_label");

        let empty = JsonLocalizedResources::empty("en");
        assert_eq!(empty.get_localized_string("system_prompts", "response", "en"), "response");
    }

    #[test]
    fn test_override_replaces_single_key() {
        let mut resources = JsonLocalizedResources::builtin("en").unwrap();
        resources
            .add_language_json("nl", r#"{"ui_labels": {"user": "Gebruiker"}}"#)
            .unwrap();
        resources
            .add_language_json("en", r#"{"ui_labels": {"assistant": "Bot"}}"#)
            .unwrap();

        assert_eq!(resources.get_localized_string("ui_labels", "user", "nl"), "Gebruiker");
        assert_eq!(resources.get_localized_string("ui_labels", "assistant", "nl"), "Bot");
        assert_eq!(resources.get_localized_string("ui_labels", "user", "en"), "User");
    }

    #[test]
    fn test_invalid_json_rejected() {
        let mut resources = JsonLocalizedResources::empty("en");
        assert!(matches!(
            resources.add_language_json("en", "[1, 2]"),
            Err(AppError::Localization { .. })
        ));
        assert!(resources.add_language_json("en", "{").is_err());
    }

    #[test]
    fn test_from_config_without_directory() {
        let resources = JsonLocalizedResources::from_config(&LocalizationConfig::default()).unwrap();
        let mut languages: Vec<&str> = resources.languages().collect();
        languages.sort_unstable();
        assert_eq!(languages, vec!["en", "pl"]);
    }
}

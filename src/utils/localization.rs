//! Locale loading and string lookup.
//!
//! Locale files are nested JSON objects (`locales/en.json`, ...). They are flattened
//! into dotted keys at load time, so `{"player": {"paused": "..."}}` becomes
//! `player.paused`. Lookups fall back to the default locale and finally to the key
//! itself.

use serde_json::Value;
use serenity::model::id::GuildId;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::database::Database;

/// Languages a guild may switch to.
pub const SUPPORTED_LANGUAGES: [&str; 4] = ["pt", "pt-pt", "en", "fr"];

#[derive(Debug, Default)]
pub struct Localizer {
    default_locale: String,
    locales: HashMap<String, HashMap<String, String>>,
}

impl Localizer {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            locales: HashMap::new(),
        }
    }

    /// Loads every `*.json` file in `dir`. Files that fail to parse are skipped.
    pub fn load(dir: impl AsRef<Path>, default_locale: impl Into<String>) -> Self {
        let mut localizer = Self::new(default_locale);
        let dir = dir.as_ref();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not read locales directory {}: {}", dir.display(), e);
                return localizer;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };

            match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| localizer.insert_json(&locale, &raw).map_err(|e| e.to_string()))
            {
                Ok(count) => debug!("Loaded {} strings for locale '{}'", count, locale),
                Err(e) => warn!("Failed to load locale file {}: {}", path.display(), e),
            }
        }

        info!(
            "Loaded {} locale(s), default '{}'",
            localizer.locales.len(),
            localizer.default_locale
        );
        localizer
    }

    /// Adds (or extends) a locale from a JSON document. Returns how many strings it added.
    pub fn insert_json(&mut self, locale: &str, raw: &str) -> Result<usize, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        let table = self.locales.entry(locale.to_string()).or_default();
        let before = table.len();
        flatten(&value, String::new(), table);
        Ok(table.len() - before)
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains_key(locale)
    }

    /// Looks up `key` for `locale` and fills in `{name}` placeholders.
    pub fn translate(&self, locale: &str, key: &str, args: &[(&str, String)]) -> String {
        let template = self
            .lookup(locale, key)
            .or_else(|| self.lookup(&self.default_locale, key))
            .unwrap_or(key);

        format_placeholders(template, args)
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        self.locales
            .get(locale)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }
}

fn flatten(value: &Value, prefix: String, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(child, path, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix, s.clone());
        }
        Value::Null => {}
        other => {
            out.insert(prefix, other.to_string());
        }
    }
}

/// Replaces every `{name}` with its argument. Unknown placeholders are left alone.
pub fn format_placeholders(template: &str, args: &[(&str, String)]) -> String {
    let mut output = template.to_string();
    for (name, value) in args {
        output = output.replace(&format!("{{{}}}", name), value);
    }
    output
}

/// Normalises user input to one of [`SUPPORTED_LANGUAGES`].
pub fn normalize_language(raw: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_ascii_lowercase().replace('_', "-");
    match lowered.as_str() {
        "pt" | "pt-br" => Some("pt"),
        "pt-pt" => Some("pt-pt"),
        "en" | "en-us" | "en-gb" => Some("en"),
        "fr" | "fr-fr" => Some("fr"),
        _ => None,
    }
}

/// A localizer bound to one locale, the unit commands and embeds work with.
#[derive(Clone, Debug)]
pub struct Translator {
    locales: Arc<Localizer>,
    locale: String,
}

impl Translator {
    pub fn new(locales: Arc<Localizer>, locale: impl Into<String>) -> Self {
        Self {
            locales,
            locale: locale.into(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn t(&self, key: &str) -> String {
        self.locales.translate(&self.locale, key, &[])
    }

    pub fn tf(&self, key: &str, args: &[(&str, String)]) -> String {
        self.locales.translate(&self.locale, key, args)
    }
}

/// Translator for the guild's stored language, or the default locale.
pub fn guild_translator(
    locales: &Arc<Localizer>,
    database: &Database,
    guild_id: Option<GuildId>,
) -> Translator {
    let locale = guild_id
        .and_then(|id| database.get_guild_language(id))
        .filter(|l| locales.has_locale(l))
        .unwrap_or_else(|| locales.default_locale().to_string());
    Translator::new(locales.clone(), locale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn localizer() -> Localizer {
        let mut localizer = Localizer::new("en");
        localizer
            .insert_json(
                "en",
                r#"{"player": {"paused": "Paused {title}", "volume": "Volume"}, "count": 3}"#,
            )
            .unwrap();
        localizer
            .insert_json("pt", r#"{"player": {"paused": "Pausado {title}"}}"#)
            .unwrap();
        localizer
    }

    #[test]
    fn nested_keys_are_flattened() {
        let localizer = localizer();
        assert_eq!(localizer.translate("en", "player.volume", &[]), "Volume");
        assert_eq!(localizer.translate("en", "count", &[]), "3");
    }

    #[test]
    fn placeholders_are_filled() {
        let localizer = localizer();
        assert_eq!(
            localizer.translate("pt", "player.paused", &[("title", "Song".to_string())]),
            "Pausado Song"
        );
    }

    #[test]
    fn falls_back_to_default_then_key() {
        let localizer = localizer();
        assert_eq!(localizer.translate("pt", "player.volume", &[]), "Volume");
        assert_eq!(localizer.translate("fr", "player.volume", &[]), "Volume");
        assert_eq!(localizer.translate("pt", "missing.key", &[]), "missing.key");
    }

    #[test]
    fn unknown_placeholders_survive() {
        assert_eq!(
            format_placeholders("{a} and {b}", &[("a", "1".to_string())]),
            "1 and {b}"
        );
    }

    #[test_case("PT", Some("pt"))]
    #[test_case("pt_BR", Some("pt"))]
    #[test_case("pt-PT", Some("pt-pt"))]
    #[test_case("en-GB", Some("en"))]
    #[test_case("fr", Some("fr"))]
    #[test_case("de", None)]
    fn language_normalisation(raw: &str, expected: Option<&str>) {
        assert_eq!(normalize_language(raw), expected);
    }

    #[test]
    fn translator_uses_its_locale() {
        let tr = Translator::new(Arc::new(localizer()), "pt");
        assert_eq!(
            tr.tf("player.paused", &[("title", "X".to_string())]),
            "Pausado X"
        );
        assert_eq!(tr.t("player.volume"), "Volume");
    }

    #[test]
    fn guild_language_comes_from_database() {
        let locales = Arc::new(localizer());
        let database = Database::open_in_memory().unwrap();
        let guild = GuildId::new(5);

        assert_eq!(guild_translator(&locales, &database, Some(guild)).locale(), "en");
        database.set_guild_language(guild, "pt").unwrap();
        assert_eq!(guild_translator(&locales, &database, Some(guild)).locale(), "pt");
        assert_eq!(guild_translator(&locales, &database, None).locale(), "en");
    }
}

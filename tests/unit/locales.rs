use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::Value;
use std::collections::BTreeSet;

use melody::utils::localization::SUPPORTED_LANGUAGES;

use crate::common::{locales, locales_path};

fn keys(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                keys(child, &path, out);
            }
        }
        _ => {
            out.insert(prefix.to_string());
        }
    }
}

fn locale_keys(locale: &str) -> BTreeSet<String> {
    let raw = std::fs::read_to_string(locales_path().join(format!("{}.json", locale))).unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();
    let mut out = BTreeSet::new();
    keys(&value, "", &mut out);
    out
}

/// Every slash command and subcommand, as `a.b` key paths.
fn command_paths() -> Vec<String> {
    let mut paths = Vec::new();
    for command in melody::commands::all() {
        paths.push(command.name.clone());
        for sub in &command.subcommands {
            paths.push(format!("{}.{}", command.name, sub.name));
        }
    }
    paths
}

#[test]
fn every_supported_language_ships_a_file() {
    let localizer = locales();
    for language in SUPPORTED_LANGUAGES {
        assert!(localizer.has_locale(language), "missing locale {}", language);
    }
}

#[rstest]
#[case("en")]
#[case("pt-pt")]
#[case("fr")]
fn locales_share_the_default_keys(#[case] locale: &str) {
    let default = locale_keys("pt");
    let other = locale_keys(locale);

    let missing: Vec<_> = default.difference(&other).collect();
    let extra: Vec<_> = other.difference(&default).collect();
    assert_eq!(missing, Vec::<&String>::new(), "{} lacks keys", locale);
    assert_eq!(extra, Vec::<&String>::new(), "{} has unknown keys", locale);
}

#[rstest]
#[case("pt")]
#[case("pt-pt")]
#[case("en")]
#[case("fr")]
fn every_command_is_described(#[case] locale: &str) {
    let localizer = locales();
    for path in command_paths() {
        let key = format!("commands.{}.description", path);
        assert_ne!(
            localizer.translate(locale, &key, &[]),
            key,
            "{} has no description in {}",
            path,
            locale
        );
    }
}

#[test]
fn placeholders_are_filled() {
    let localizer = locales();
    assert_eq!(
        localizer.translate("en", "queue.page", &[("page", "2".into()), ("total", "5".into())]),
        "Page 2/5"
    );
    assert_eq!(
        localizer.translate("fr", "queue.page", &[("page", "1".into()), ("total", "3".into())]),
        "Page 1/3"
    );
}

#[test]
fn unknown_locale_falls_back_to_the_default() {
    let localizer = locales();
    assert_eq!(localizer.translate("de", "queue.title", &[]), "Fila");
}

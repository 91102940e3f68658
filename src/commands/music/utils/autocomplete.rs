use poise::serenity_prelude as serenity;
use std::time::Duration;
use tracing::debug;

use super::queue_manager::Track;
use super::{format_millis, is_url, truncate};
use crate::Context;
use crate::utils::localization::Translator;

const AUTOCOMPLETE_TIMEOUT: Duration = Duration::from_millis(1500);
const MAX_CHOICES: usize = 25;
const CHOICE_LIMIT: usize = 100;

/// Where a plain-text query gets searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, poise::ChoiceParameter)]
pub enum SearchService {
    #[default]
    #[name = "YouTube"]
    Youtube,
    #[name = "YouTube Music"]
    YoutubeMusic,
    #[name = "SoundCloud"]
    Soundcloud,
}

impl SearchService {
    pub fn prefix(&self) -> &'static str {
        match self {
            SearchService::Youtube => "ytsearch:",
            SearchService::YoutubeMusic => "ytmsearch:",
            SearchService::Soundcloud => "scsearch:",
        }
    }

    /// Links go to the node untouched, anything else is searched.
    pub fn query(&self, input: &str) -> String {
        let input = input.trim();
        if is_url(input) {
            input.to_string()
        } else {
            format!("{}{}", self.prefix(), input)
        }
    }
}

pub fn choice_label(track: &Track) -> String {
    let duration = if track.is_stream {
        "LIVE".to_string()
    } else {
        format_millis(track.length_ms)
    };
    let label = format!(
        "🎵 {} - {} ({})",
        truncate(&track.title, 50),
        truncate(&track.author, 30),
        duration
    );
    truncate(&label, CHOICE_LIMIT)
}

/// Choice value: the track's link when it has one, so picking it plays that exact track.
pub fn choice_value(track: &Track) -> String {
    match &track.uri {
        Some(uri) if uri.chars().count() <= CHOICE_LIMIT => uri.clone(),
        _ => truncate(&track.title, CHOICE_LIMIT),
    }
}

/// Stands in for an empty input, since Discord rejects empty choice values.
/// `/play` refuses it like any other too-short query.
const HINT_VALUE: &str = "?";

/// Shortest query that is worth a search.
pub const MIN_QUERY_CHARS: usize = 2;

fn echo_choice(label: String, value: &str) -> serenity::AutocompleteChoice {
    let value = if value.is_empty() { HINT_VALUE } else { value };
    serenity::AutocompleteChoice::new(
        truncate(&label, CHOICE_LIMIT),
        truncate(value, CHOICE_LIMIT),
    )
}

pub fn short_input_choice(tr: &Translator, partial: &str) -> Option<serenity::AutocompleteChoice> {
    let partial = partial.trim();
    if partial.chars().count() < MIN_QUERY_CHARS {
        return Some(echo_choice(
            format!("🔎 {}", tr.t("search.autocomplete_hint")),
            partial,
        ));
    }
    if is_url(partial) {
        return Some(echo_choice(format!("🔗 {}", partial), partial));
    }
    None
}

/// The single choice shown when a search gives nothing to pick from.
pub fn search_echo_choice(tr: &Translator, partial: &str) -> serenity::AutocompleteChoice {
    let partial = partial.trim();
    echo_choice(
        format!(
            "🔎 {}",
            tr.tf("search.autocomplete_echo", &[("query", truncate(partial, 60))])
        ),
        partial,
    )
}

pub async fn autocomplete_query(ctx: Context<'_>, partial: &str) -> Vec<serenity::AutocompleteChoice> {
    let tr = ctx.data().translator(ctx.guild_id());
    if let Some(choice) = short_input_choice(&tr, partial) {
        return vec![choice];
    }

    let query = SearchService::Youtube.query(partial);
    let search = ctx.data().music.nodes().search(&query);
    let tracks = match tokio::time::timeout(AUTOCOMPLETE_TIMEOUT, search).await {
        Ok(Ok(result)) => result.into_tracks(),
        Ok(Err(e)) => {
            debug!("Autocomplete search for '{}' failed: {}", partial, e);
            Vec::new()
        }
        Err(_) => {
            debug!("Autocomplete search for '{}' timed out", partial);
            Vec::new()
        }
    };

    if tracks.is_empty() {
        return vec![search_echo_choice(&tr, partial)];
    }
    tracks
        .iter()
        .take(MAX_CHOICES)
        .map(|track| serenity::AutocompleteChoice::new(choice_label(track), choice_value(track)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::localization::Localizer;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use test_case::test_case;

    #[test_case(SearchService::Youtube, "song", "ytsearch:song")]
    #[test_case(SearchService::YoutubeMusic, " song ", "ytmsearch:song")]
    #[test_case(SearchService::Soundcloud, "song", "scsearch:song")]
    #[test_case(SearchService::Soundcloud, "https://youtu.be/x", "https://youtu.be/x")]
    fn builds_queries(service: SearchService, input: &str, expected: &str) {
        assert_eq!(service.query(input), expected);
    }

    #[test]
    fn labels_fit_discord_limits() {
        let track = Track {
            title: "t".repeat(80),
            author: "a".repeat(80),
            length_ms: 185_000,
            ..Default::default()
        };
        let label = choice_label(&track);
        assert!(label.chars().count() <= 100);
        assert!(label.starts_with("🎵 "));
        assert!(label.ends_with("(3:05)"));
    }

    #[test]
    fn streams_are_labelled_live() {
        let track = Track {
            title: "Radio".into(),
            author: "Station".into(),
            is_stream: true,
            ..Default::default()
        };
        assert_eq!(choice_label(&track), "🎵 Radio - Station (LIVE)");
    }

    fn tr(locale: &str) -> Translator {
        let locales = Localizer::load(concat!(env!("CARGO_MANIFEST_DIR"), "/locales"), "pt");
        Translator::new(Arc::new(locales), locale)
    }

    fn json(choice: serenity::AutocompleteChoice) -> serde_json::Value {
        serde_json::to_value(choice).unwrap()
    }

    #[test]
    fn short_and_link_inputs_skip_search() {
        let tr = tr("en");
        assert!(short_input_choice(&tr, "a").is_some());
        assert!(short_input_choice(&tr, "https://youtu.be/abc").is_some());
        assert!(short_input_choice(&tr, "never gonna").is_none());
    }

    #[test]
    fn short_input_hint_is_translated_and_never_empty() {
        let empty = json(short_input_choice(&tr("fr"), "  ").unwrap());
        assert_eq!(empty["name"], "🔎 Tapez au moins 2 caractères pour chercher");
        assert_eq!(empty["value"], HINT_VALUE);

        let one = json(short_input_choice(&tr("en"), "a").unwrap());
        assert_eq!(one["name"], "🔎 Type at least 2 characters to search");
        assert_eq!(one["value"], "a");
    }

    #[test]
    fn failed_searches_echo_the_query() {
        let choice = json(search_echo_choice(&tr("pt"), " never gonna "));
        assert_eq!(choice["name"], "🔎 Buscar \"never gonna\"");
        assert_eq!(choice["value"], "never gonna");
    }

    #[test]
    fn value_prefers_uri() {
        let track = Track {
            title: "Song".into(),
            uri: Some("https://youtu.be/abc".into()),
            ..Default::default()
        };
        assert_eq!(choice_value(&track), "https://youtu.be/abc");
        assert_eq!(
            choice_value(&Track {
                title: "Song".into(),
                ..Default::default()
            }),
            "Song"
        );
    }
}

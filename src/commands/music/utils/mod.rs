use regex::Regex;
use serenity::all::{Cache, ChannelId, GuildId, UserId};
use std::sync::LazyLock;
use std::time::Duration;

// Export music utilities
pub mod autocomplete;
pub mod backend;
pub mod button_controls;
pub mod component_handlers;
pub mod embedded_messages;
pub mod event_handlers;
pub mod fallback;
pub mod filters;
pub mod lavalink_backend;
pub mod lavalink_rest;
pub mod lonely_channel;
pub mod lyrics;
pub mod music_manager;
pub mod node_pool;
pub mod queue_manager;
pub mod voice_gateway;
pub mod voice_status;

/// Format a duration into a human-readable string (e.g., "3:45" or "1:23:45")
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

pub fn format_millis(millis: u64) -> String {
    format_duration(Duration::from_millis(millis))
}

/// Whether the query is a link rather than search text.
pub fn is_url(query: &str) -> bool {
    let query = query.trim();
    (query.starts_with("http://") || query.starts_with("https://"))
        && url::Url::parse(query).is_ok()
}

/// Cuts `text` to at most `max` characters, ending with `suffix` when cut.
pub fn truncate_with(text: &str, max: usize, suffix: &str) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(suffix.chars().count());
    let head: String = text.chars().take(keep).collect();
    format!("{}{}", head, suffix)
}

pub fn truncate(text: &str, max: usize) -> String {
    truncate_with(text, max, "...")
}

/// Keeps the first `keep` characters and appends `suffix` when anything was cut.
pub fn clip(text: &str, keep: usize, suffix: &str) -> String {
    match text.char_indices().nth(keep) {
        Some((end, _)) => format!("{}{}", &text[..end], suffix),
        None => text.to_string(),
    }
}

static UNIT_SEEK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)h)?\s*(?:(\d+)m)?\s*(?:(\d+)s)?$").expect("valid seek regex")
});

/// Parses seek input: `90`, `1:30`, `1:02:03` or `1h2m3s`.
pub fn parse_seek(input: &str) -> Option<Duration> {
    let input = input.trim().to_ascii_lowercase();
    if input.is_empty() {
        return None;
    }

    if let Ok(seconds) = input.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if input.contains(':') {
        let parts: Vec<u64> = input
            .split(':')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<_>>()?;
        let seconds = match parts.as_slice() {
            [m, s] if *s < 60 => m * 60 + s,
            [h, m, s] if *m < 60 && *s < 60 => h * 3600 + m * 60 + s,
            _ => return None,
        };
        return Some(Duration::from_secs(seconds));
    }

    let caps = UNIT_SEEK.captures(&input)?;
    let field = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
        return None;
    }
    Some(Duration::from_secs(field(1) * 3600 + field(2) * 60 + field(3)))
}

/// The voice channel `user_id` sits in, from the gateway cache.
pub fn user_voice_channel(cache: &Cache, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    cache
        .guild(guild_id)?
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
}

/// Renders a `length`-char bar of `filled`/`empty` glyphs for `ratio` in 0..=1.
pub fn render_bar(ratio: f64, length: usize, filled: char, empty: char) -> String {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let count = (ratio * length as f64).round() as usize;
    let mut bar = String::with_capacity(length * 3);
    bar.extend(std::iter::repeat_n(filled, count));
    bar.extend(std::iter::repeat_n(empty, length - count));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(Duration::from_secs(5), "0:05")]
    #[test_case(Duration::from_secs(225), "3:45")]
    #[test_case(Duration::from_secs(5025), "1:23:45")]
    fn formats_durations(input: Duration, expected: &str) {
        assert_eq!(format_duration(input), expected);
    }

    #[test_case("90", Some(90))]
    #[test_case("1:30", Some(90))]
    #[test_case("1:02:03", Some(3723))]
    #[test_case("1h2m3s", Some(3723))]
    #[test_case("2m", Some(120))]
    #[test_case("45s", Some(45))]
    #[test_case("1:75", None)]
    #[test_case("abc", None)]
    #[test_case("", None)]
    fn parses_seek_input(input: &str, expected: Option<u64>) {
        assert_eq!(parse_seek(input), expected.map(Duration::from_secs));
    }

    #[test_case("https://youtu.be/abc", true)]
    #[test_case("http://example.com/x.mp3", true)]
    #[test_case("never gonna give you up", false)]
    #[test_case("youtube.com/watch?v=1", false)]
    fn detects_urls(input: &str, expected: bool) {
        assert_eq!(is_url(input), expected);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ação ação ação", 8), "ação ...");
        assert_eq!(truncate_with("abcdef", 4, "…"), "abc…");
    }

    #[test]
    fn clipping_keeps_the_full_prefix() {
        let title = "Bohemian Rhapsody (Remastered 2011) - Queen";
        assert_eq!(title.chars().count(), 43);
        assert_eq!(clip(title, 42, "…"), "Bohemian Rhapsody (Remastered 2011) - Quee…");
        assert_eq!(clip(&title[..42], 42, "…"), &title[..42]);
        assert_eq!(clip(title, 30, "..."), "Bohemian Rhapsody (Remastered ...");
        assert_eq!(clip("ação", 3, "..."), "açã...");
    }

    #[test]
    fn bars_are_clamped() {
        assert_eq!(render_bar(0.5, 4, '█', '░'), "██░░");
        assert_eq!(render_bar(2.0, 3, '█', '░'), "███");
        assert_eq!(render_bar(f64::NAN, 2, '█', '░'), "░░");
    }
}

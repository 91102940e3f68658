//! Picking a replacement when a track fails to load.

use super::queue_manager::Track;

/// Whether a load failure looks like a source that blocks us (age gates, sign-in walls)
/// and is worth retrying through a search.
pub fn needs_fallback(message: &str, severity: &str) -> bool {
    let message = message.to_ascii_lowercase();
    let severity = severity.to_ascii_lowercase();

    if message.contains("requires login") || message.contains("sign in") {
        return true;
    }

    message.contains("login") && matches!(severity.as_str(), "suspicious" | "fault")
}

/// Identity of a track for fallback bookkeeping.
pub fn fallback_key(track: &Track) -> String {
    if !track.identifier.is_empty() {
        return track.identifier.clone();
    }
    if !track.author.is_empty() {
        return format!("{}::{}", track.title, track.author).to_lowercase();
    }
    track.title.to_lowercase()
}

/// Search queries to try, best first, without duplicates.
pub fn fallback_queries(track: &Track) -> Vec<String> {
    let mut queries = Vec::new();
    let mut push = |query: String| {
        if !query.trim().is_empty() && !queries.contains(&query) {
            queries.push(query);
        }
    };

    if !track.title.is_empty() {
        let with_author = format!("{} {}", track.title, track.author);
        push(format!("ytmsearch:{}", with_author.trim()));
        push(format!("ytsearch:{}", track.title));
    }
    if let Some(uri) = &track.uri {
        push(uri.clone());
    }

    queries
}

/// First candidate that is not the failed track itself.
pub fn pick_replacement(failed: &Track, candidates: Vec<Track>) -> Option<Track> {
    let failed_key = fallback_key(failed);
    candidates
        .into_iter()
        .find(|candidate| fallback_key(candidate) != failed_key)
        .map(|mut candidate| {
            candidate.requester = failed.requester;
            candidate
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use test_case::test_case;

    fn track(identifier: &str, title: &str, author: &str) -> Track {
        Track {
            identifier: identifier.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            ..Default::default()
        }
    }

    #[test_case("This video requires login", "common", true)]
    #[test_case("Sign in to confirm your age", "common", true)]
    #[test_case("login failed", "suspicious", true)]
    #[test_case("login failed", "fault", true)]
    #[test_case("login failed", "common", false)]
    #[test_case("Something broke", "fault", false)]
    fn fallback_triggers(message: &str, severity: &str, expected: bool) {
        assert_eq!(needs_fallback(message, severity), expected);
    }

    #[test]
    fn keys_prefer_identifier() {
        assert_eq!(fallback_key(&track("abc", "Song", "Band")), "abc");
        assert_eq!(fallback_key(&track("", "Song", "Band")), "song::band");
        assert_eq!(fallback_key(&track("", "Song", "")), "song");
    }

    #[test]
    fn queries_are_deduplicated() {
        let mut failed = track("x", "Song", "");
        failed.uri = Some("https://youtu.be/x".to_string());

        assert_eq!(
            fallback_queries(&failed),
            vec![
                "ytmsearch:Song".to_string(),
                "ytsearch:Song".to_string(),
                "https://youtu.be/x".to_string(),
            ]
        );
    }

    #[test]
    fn replacement_skips_same_track_and_keeps_requester() {
        let mut failed = track("x", "Song", "Band");
        failed.requester = Some(UserId::new(5));
        let candidates = vec![track("x", "Song", "Band"), track("y", "Song (Live)", "Band")];

        let replacement = pick_replacement(&failed, candidates).unwrap();
        assert_eq!(replacement.identifier, "y");
        assert_eq!(replacement.requester, Some(UserId::new(5)));
    }

    #[test]
    fn no_replacement_when_only_same_track() {
        let failed = track("x", "Song", "Band");
        assert!(pick_replacement(&failed, vec![track("x", "Song", "Band")]).is_none());
    }
}

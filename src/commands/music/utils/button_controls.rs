use serenity::all::{
    ButtonStyle, CreateActionRow, CreateButton, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, ReactionType,
};

use super::filters::{BassBoostLevel, FilterPreset};
use super::queue_manager::{LoopMode, Track};
use super::truncate;
use crate::utils::localization::Translator;

pub const MUSIC_PREVIOUS: &str = "music_previous";
pub const MUSIC_PLAY_PAUSE: &str = "music_play_pause";
pub const MUSIC_STOP: &str = "music_stop";
pub const MUSIC_SKIP: &str = "music_skip";
pub const MUSIC_SHUFFLE: &str = "music_shuffle";
pub const MUSIC_VOLUME_DOWN: &str = "music_volume_down";
pub const MUSIC_VOLUME_UP: &str = "music_volume_up";
pub const MUSIC_LOOP: &str = "music_loop";
pub const MUSIC_QUEUE: &str = "music_queue";
pub const MUSIC_LYRICS: &str = "music_lyrics";

pub const QUEUE_PREV_PAGE: &str = "queue_prev_page";
pub const QUEUE_NEXT_PAGE: &str = "queue_next_page";
pub const QUEUE_REFRESH: &str = "queue_refresh";

pub const FILTER_RESET: &str = "filter_reset";
pub const LYRICS_STOP: &str = "lyrics_stop";
pub const SEARCH_SELECT: &str = "search_select";
pub const SEARCH_CANCEL: &str = "search_cancel";

fn button(id: &str, emoji: &str, style: ButtonStyle) -> CreateButton {
    CreateButton::new(id)
        .emoji(ReactionType::Unicode(emoji.to_string()))
        .style(style)
}

pub fn loop_style(mode: LoopMode) -> ButtonStyle {
    match mode {
        LoopMode::Off => ButtonStyle::Secondary,
        LoopMode::Track => ButtonStyle::Success,
        LoopMode::Queue => ButtonStyle::Primary,
    }
}

/// The two rows of player controls under the now-playing message.
pub fn player_controls(tr: &Translator, paused: bool, loop_mode: LoopMode) -> Vec<CreateActionRow> {
    let play_pause = if paused {
        button(MUSIC_PLAY_PAUSE, "▶️", ButtonStyle::Success)
    } else {
        button(MUSIC_PLAY_PAUSE, "⏸️", ButtonStyle::Primary)
    };

    let first = vec![
        button(MUSIC_PREVIOUS, "⏮️", ButtonStyle::Secondary),
        play_pause,
        button(MUSIC_STOP, "⏹️", ButtonStyle::Danger),
        button(MUSIC_SKIP, "⏭️", ButtonStyle::Secondary),
        button(MUSIC_SHUFFLE, "🔀", ButtonStyle::Secondary),
    ];

    let loop_label = tr.tf(
        "buttons.loop",
        &[("mode", tr.t(&format!("loop.{}", loop_mode.as_str())))],
    );
    let second = vec![
        button(MUSIC_VOLUME_DOWN, "🔉", ButtonStyle::Secondary),
        button(MUSIC_VOLUME_UP, "🔊", ButtonStyle::Secondary),
        button(MUSIC_LOOP, "🔁", loop_style(loop_mode)).label(loop_label),
        button(MUSIC_QUEUE, "📜", ButtonStyle::Secondary).label(tr.t("buttons.queue")),
        button(MUSIC_LYRICS, "🎤", ButtonStyle::Secondary).label(tr.t("buttons.lyrics")),
    ];

    vec![
        CreateActionRow::Buttons(first),
        CreateActionRow::Buttons(second),
    ]
}

/// Page navigation for the queue view, followed by the player controls.
pub fn queue_controls(
    tr: &Translator,
    page: usize,
    total_pages: usize,
    paused: bool,
    loop_mode: LoopMode,
) -> Vec<CreateActionRow> {
    let navigation = vec![
        button(&format!("{}:{}", QUEUE_PREV_PAGE, page), "◀️", ButtonStyle::Secondary)
            .label(tr.t("buttons.previous_page"))
            .disabled(page == 0),
        button(&format!("{}:{}", QUEUE_REFRESH, page), "🔄", ButtonStyle::Secondary)
            .label(tr.t("buttons.refresh")),
        button(&format!("{}:{}", QUEUE_NEXT_PAGE, page), "▶️", ButtonStyle::Secondary)
            .label(tr.t("buttons.next_page"))
            .disabled(page + 1 >= total_pages),
    ];

    let mut rows = vec![CreateActionRow::Buttons(navigation)];
    rows.extend(player_controls(tr, paused, loop_mode));
    rows
}

/// Splits `queue_next_page:3` into its action and page.
pub fn parse_page_id(custom_id: &str) -> Option<(&str, usize)> {
    let (action, page) = custom_id.split_once(':')?;
    Some((action, page.parse().ok()?))
}

pub fn filter_controls(tr: &Translator, active: Option<FilterPreset>) -> Vec<CreateActionRow> {
    let style = |preset: FilterPreset| {
        let on = match (active, preset) {
            (Some(FilterPreset::BassBoost(_)), FilterPreset::BassBoost(_)) => true,
            (Some(a), p) => a == p,
            (None, _) => false,
        };
        if on {
            ButtonStyle::Success
        } else {
            ButtonStyle::Secondary
        }
    };

    let presets = [
        ("filter_bass_boost", "🔊", FilterPreset::BassBoost(BassBoostLevel::Medium)),
        ("filter_nightcore", "🌙", FilterPreset::Nightcore),
        ("filter_karaoke", "🎤", FilterPreset::Karaoke),
        ("filter_rotation", "🔄", FilterPreset::Rotation),
    ];

    let mut buttons: Vec<CreateButton> = presets
        .into_iter()
        .map(|(id, emoji, preset)| {
            button(id, emoji, style(preset)).label(tr.t(&format!("filters.{}", preset.key())))
        })
        .collect();
    buttons.push(button(FILTER_RESET, "♻️", ButtonStyle::Danger).label(tr.t("filters.reset")));

    vec![CreateActionRow::Buttons(buttons)]
}

pub fn lyrics_controls(tr: &Translator) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        button(LYRICS_STOP, "⏹️", ButtonStyle::Danger).label(tr.t("lyrics.stop")),
    ])]
}

/// A select menu of search results plus a cancel button.
pub fn search_controls(tr: &Translator, tracks: &[Track]) -> Vec<CreateActionRow> {
    let options = tracks
        .iter()
        .take(25)
        .enumerate()
        .map(|(i, track)| {
            CreateSelectMenuOption::new(truncate(&track.title, 50), i.to_string())
                .description(format!(
                    "{} • {}",
                    truncate(&track.author, 40),
                    super::format_millis(track.length_ms)
                ))
        })
        .collect();

    let menu = CreateSelectMenu::new(SEARCH_SELECT, CreateSelectMenuKind::String { options })
        .placeholder(tr.t("search.placeholder"))
        .min_values(1)
        .max_values(1);

    vec![
        CreateActionRow::SelectMenu(menu),
        CreateActionRow::Buttons(vec![
            button(SEARCH_CANCEL, "✖️", ButtonStyle::Danger).label(tr.t("search.cancel")),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::localization::Localizer;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::sync::Arc;

    fn tr() -> Translator {
        let mut localizer = Localizer::new("en");
        localizer
            .insert_json(
                "en",
                r#"{"buttons": {"loop": "Loop: {mode}", "queue": "Queue", "lyrics": "Lyrics"},
                    "loop": {"off": "Off", "track": "Track", "queue": "Queue"}}"#,
            )
            .unwrap();
        Translator::new(Arc::new(localizer), "en")
    }

    fn json(rows: Vec<CreateActionRow>) -> Value {
        serde_json::to_value(rows).unwrap()
    }

    #[test]
    fn player_controls_have_two_rows_of_five() {
        let rows = json(player_controls(&tr(), false, LoopMode::Off));
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["components"].as_array().unwrap().len(), 5);
        assert_eq!(rows[1]["components"][2]["custom_id"], MUSIC_LOOP);
        assert_eq!(rows[1]["components"][2]["label"], "Loop: Off");
    }

    #[test]
    fn loop_button_follows_mode() {
        let rows = json(player_controls(&tr(), true, LoopMode::Track));
        assert_eq!(rows[1]["components"][2]["label"], "Loop: Track");
        assert_eq!(loop_style(LoopMode::Track), ButtonStyle::Success);
        assert_eq!(loop_style(LoopMode::Queue), ButtonStyle::Primary);
    }

    #[test]
    fn queue_navigation_disables_edges() {
        let rows = json(queue_controls(&tr(), 0, 1, false, LoopMode::Off));
        assert_eq!(rows[0]["components"][0]["disabled"], true);
        assert_eq!(rows[0]["components"][2]["disabled"], true);
        assert_eq!(rows[0]["components"][1]["custom_id"], "queue_refresh:0");
    }

    #[test]
    fn page_ids_round_trip() {
        assert_eq!(parse_page_id("queue_next_page:3"), Some((QUEUE_NEXT_PAGE, 3)));
        assert_eq!(parse_page_id("queue_next_page"), None);
        assert_eq!(parse_page_id("queue_next_page:x"), None);
    }
}

use pretty_assertions::assert_eq;
use reqwest::Client;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use melody::commands::music::utils::lyrics::{
    LyricsClient, line_index, lyrics_embed, render_window,
};
use melody::utils::localization::Translator;

use crate::common::fixtures::lrclib_record;
use crate::common::{init_tracing, locales, track};

#[tokio::test]
async fn isrc_hit_drives_the_live_view() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("isrc", "BRXXX2400001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lrclib_record()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut playing = track("a");
    playing.isrc = Some(" BRXXX2400001 ".to_string());
    playing.artwork_url = Some("https://img.example/a.jpg".to_string());

    let client = LyricsClient::with_base_url(Client::new(), server.uri());
    let lyrics = client.fetch(&playing).await.unwrap().unwrap();

    assert!(lyrics.is_synced());
    assert_eq!(lyrics.title, "Song a");
    assert_eq!(
        lyrics.text,
        "First line\nSecond line\nThird line\nFourth line"
    );

    // Lines light up slightly before their timestamp.
    assert_eq!(line_index(&lyrics.lines, Duration::ZERO), Some(0));
    assert_eq!(line_index(&lyrics.lines, Duration::from_millis(5_300)), Some(1));
    assert_eq!(line_index(&lyrics.lines, Duration::from_secs(60)), Some(3));
    assert_eq!(
        render_window(&lyrics.lines, 1),
        "First line\n**→ Second line ←**\nThird line\nFourth line"
    );

    let tr = Translator::new(locales(), "en");
    let embed = lyrics_embed(&tr, &lyrics, &playing, &render_window(&lyrics.lines, 1));
    let json = serde_json::to_value(&embed).unwrap();
    assert_eq!(json["title"], "Lyrics: Song a");
    assert_eq!(json["footer"]["text"], "Source: LRCLIB | Song a");
    assert_eq!(json["author"]["icon_url"], "https://img.example/a.jpg");
}

#[tokio::test]
async fn plain_only_lyrics_are_not_synced() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": 3,
            "trackName": "Song b",
            "artistName": "Band",
            "duration": 180.0,
            "instrumental": false,
            "plainLyrics": "Only words"
        }])))
        .mount(&server)
        .await;

    let client = LyricsClient::with_base_url(Client::new(), server.uri());
    let lyrics = client.fetch(&track("b")).await.unwrap().unwrap();

    assert!(!lyrics.is_synced());
    assert_eq!(lyrics.text, "Only words");
    assert_eq!(line_index(&lyrics.lines, Duration::from_secs(5)), None);
}

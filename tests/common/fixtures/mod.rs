use serde_json::{Value, json};
use serenity::model::id::{ChannelId, GuildId};

pub const GUILD: GuildId = GuildId::new(4242);
pub const VOICE: ChannelId = ChannelId::new(100);
pub const TEXT: ChannelId = ChannelId::new(200);

/// An LRCLIB `get` answer with both plain and timed lyrics.
pub fn lrclib_record() -> Value {
    json!({
        "id": 77,
        "trackName": "Song a",
        "artistName": "Band",
        "albumName": "Record",
        "duration": 180.0,
        "instrumental": false,
        "plainLyrics": "First line\r\n\r\n\r\n\r\nSecond line\nThird line\nFourth line",
        "syncedLyrics": "[00:01.00]First line\n[00:05.50]Second line\n[00:09.00]Third line\n[00:12.25]Fourth line"
    })
}

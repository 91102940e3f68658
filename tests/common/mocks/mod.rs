//! Mocks of the seams between the player and the outside world.

use async_trait::async_trait;
use mockall::mock;
use serenity::model::id::{ChannelId, GuildId};
use std::time::Duration;

use melody::commands::music::utils::backend::{AudioBackend, PlayerSnapshot, VoiceConnection};
use melody::commands::music::utils::filters::FilterSettings;
use melody::commands::music::utils::lavalink_rest::LoadResult;
use melody::commands::music::utils::music_manager::MusicResult;
use melody::commands::music::utils::node_pool::AudioNode;
use melody::commands::music::utils::queue_manager::Track;
use melody::commands::music::utils::voice_gateway::VoiceGateway;
use melody::config::NodeConfig;

mock! {
    pub Backend {}

    #[async_trait]
    impl AudioBackend for Backend {
        async fn connect(&self, guild_id: GuildId, connection: VoiceConnection) -> MusicResult<()>;
        async fn destroy(&self, guild_id: GuildId) -> MusicResult<()>;
        fn has_player(&self, guild_id: GuildId) -> bool;
        async fn node_connected(&self, guild_id: GuildId) -> bool;
        async fn player_state(&self, guild_id: GuildId) -> MusicResult<Option<PlayerSnapshot>>;
        async fn play(&self, guild_id: GuildId, track: &Track) -> MusicResult<()>;
        async fn stop(&self, guild_id: GuildId) -> MusicResult<()>;
        async fn set_paused(&self, guild_id: GuildId, paused: bool) -> MusicResult<()>;
        async fn set_volume(&self, guild_id: GuildId, volume: u16) -> MusicResult<()>;
        async fn seek(&self, guild_id: GuildId, position: Duration) -> MusicResult<()>;
        async fn set_filters(&self, guild_id: GuildId, filters: &FilterSettings) -> MusicResult<()>;
    }
}

mock! {
    pub Voice {}

    #[async_trait]
    impl VoiceGateway for Voice {
        async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<VoiceConnection>;
        async fn leave(&self, guild_id: GuildId) -> MusicResult<()>;
        async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId>;
        async fn deafen(&self, guild_id: GuildId) -> MusicResult<()>;
    }
}

mock! {
    pub Node {}

    #[async_trait]
    impl AudioNode for Node {
        fn label(&self) -> String;
        fn config(&self) -> NodeConfig;
        fn is_connected(&self) -> bool;
        async fn reconnect(&self) -> MusicResult<()>;
        async fn load(&self, query: &str) -> MusicResult<LoadResult>;
        async fn probe(&self) -> MusicResult<Duration>;
    }
}

/// A node that is up. Loads must be set up by the test.
pub fn online_node() -> MockNode {
    let mut node = MockNode::new();
    node.expect_is_connected().return_const(true);
    node.expect_label().returning(|| "main".to_string());
    node
}

/// A backend that accepts housekeeping calls and has no player to report.
/// Playback calls (`play`, `stop`) are left to each test.
pub fn idle_backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_connect().returning(|_, _| Ok(()));
    backend.expect_destroy().returning(|_| Ok(()));
    backend.expect_has_player().return_const(false);
    backend.expect_node_connected().return_const(true);
    backend.expect_player_state().returning(|_| Ok(None));
    backend.expect_set_volume().returning(|_, _| Ok(()));
    backend
}

/// A voice gateway that starts outside any channel and joins whatever it is asked to.
pub fn fresh_voice() -> MockVoice {
    let mut voice = MockVoice::new();
    voice
        .expect_current_channel()
        .return_const(None::<ChannelId>);
    voice.expect_join().returning(|_, channel| {
        Ok(VoiceConnection {
            endpoint: "voice.discord.test".to_string(),
            token: "token".to_string(),
            session_id: "session".to_string(),
            channel_id: Some(channel),
        })
    });
    voice.expect_leave().returning(|_| Ok(()));
    voice
}

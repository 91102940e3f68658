//! Shared builders for the suite.

pub mod fixtures;
pub mod mocks;

use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use melody::commands::music::utils::backend::AudioBackend;
use melody::commands::music::utils::music_manager::MusicManager;
use melody::commands::music::utils::node_pool::{AudioNode, NodePool};
use melody::commands::music::utils::queue_manager::Track;
use melody::commands::music::utils::voice_gateway::VoiceGateway;
use melody::utils::database::Database;
use melody::utils::localization::Localizer;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("melody=debug")
            .with_test_writer()
            .try_init();
    });
}

pub fn locales_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("locales")
}

pub fn locales() -> Arc<Localizer> {
    Arc::new(Localizer::load(locales_path(), "pt"))
}

pub fn track(id: &str) -> Track {
    Track {
        encoded: format!("enc-{}", id),
        identifier: id.to_string(),
        title: format!("Song {}", id),
        author: "Band".to_string(),
        length_ms: 180_000,
        is_seekable: true,
        source_name: "youtube".to_string(),
        ..Default::default()
    }
}

pub fn manager(
    backend: impl AudioBackend + 'static,
    voice: impl VoiceGateway + 'static,
    node: impl AudioNode + 'static,
    database: Option<Database>,
) -> MusicManager {
    let pool = NodePool::new(vec![Arc::new(node) as Arc<dyn AudioNode>]);
    MusicManager::new(Arc::new(backend), Arc::new(voice), Arc::new(pool), database)
        .with_retry_delay(Duration::ZERO)
}

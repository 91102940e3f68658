//! Provides access to the application's SQLite database.
//! Handles table creation and reads/writes for guild languages, the bot presence,
//! global settings (the logs flag) and queues saved on disconnect.

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Serialize, de::DeserializeOwned};
use serenity::model::id::GuildId;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use super::presence::{ActivityKind, BotPresence, PresenceActivity, PresenceStatus};

/// The default filename for the SQLite database.
pub const APPDATA_DB: &str = "application_data.db";

const LOGS_ENABLED_KEY: &str = "logs_enabled";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DatabaseError>;

/// Shared handle to the database. Cloning is cheap; all clones use the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Opens (or creates) the database file and makes sure every table exists.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::Poisoned)?;
        f(&conn)
    }

    /// Stored language for a guild, if any.
    pub fn get_guild_language(&self, guild_id: GuildId) -> Option<String> {
        let result = self.with_conn(|conn| {
            conn.query_row(
                "SELECT language FROM guild_languages WHERE guild_id = ?1",
                params![guild_id.get() as i64],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(Into::into)
        });

        match result {
            Ok(language) => language,
            Err(e) => {
                warn!("Failed to read language for guild {}: {}", guild_id, e);
                None
            }
        }
    }

    pub fn set_guild_language(&self, guild_id: GuildId, language: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO guild_languages (guild_id, language) VALUES (?1, ?2)",
                params![guild_id.get() as i64, language],
            )?;
            Ok(())
        })
    }

    /// Stored bot presence. Falls back to the default presence when nothing is stored
    /// or the stored row can't be read.
    pub fn get_presence(&self) -> BotPresence {
        let result = self.with_conn(|conn| {
            conn.query_row(
                "SELECT status, activity_type, message, url FROM bot_presence WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(Into::into)
        });

        match result {
            Ok(Some((status, kind, message, url))) => BotPresence {
                status: PresenceStatus::parse(&status).unwrap_or_default(),
                activity: match (kind.and_then(|k| ActivityKind::parse(&k).ok()), message) {
                    (Some(kind), Some(message)) => Some(PresenceActivity { kind, message, url }),
                    _ => None,
                },
            },
            Ok(None) => BotPresence::default(),
            Err(e) => {
                warn!("Failed to read stored presence: {}", e);
                BotPresence::default()
            }
        }
    }

    pub fn set_presence(&self, presence: &BotPresence) -> DbResult<()> {
        let activity = presence.activity.as_ref();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO bot_presence (id, status, activity_type, message, url)
                 VALUES (1, ?1, ?2, ?3, ?4)",
                params![
                    presence.status.as_str(),
                    activity.map(|a| a.kind.as_str()),
                    activity.map(|a| a.message.as_str()),
                    activity.and_then(|a| a.url.as_deref()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn set_status(&self, status: PresenceStatus) -> DbResult<BotPresence> {
        let mut presence = self.get_presence();
        presence.status = status;
        self.set_presence(&presence)?;
        Ok(presence)
    }

    /// Whether log embeds should be posted. Defaults to `true`.
    pub fn logs_enabled(&self) -> bool {
        let result = self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![LOGS_ENABLED_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(Into::into)
        });

        match result {
            Ok(Some(value)) => value == "1",
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to read logs flag: {}", e);
                true
            }
        }
    }

    pub fn set_logs_enabled(&self, enabled: bool) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![LOGS_ENABLED_KEY, if enabled { "1" } else { "0" }],
            )?;
            Ok(())
        })
    }

    /// Persists a queue snapshot for a guild, replacing any earlier one.
    pub fn save_queue<T: Serialize>(&self, guild_id: GuildId, payload: &T) -> DbResult<()> {
        let json = serde_json::to_string(payload)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO saved_queues (guild_id, payload, saved_at) VALUES (?1, ?2, ?3)",
                params![guild_id.get() as i64, json, chrono::Utc::now().timestamp()],
            )?;
            Ok(())
        })?;
        debug!("Saved queue snapshot for guild {}", guild_id);
        Ok(())
    }

    pub fn load_queue<T: DeserializeOwned>(&self, guild_id: GuildId) -> DbResult<Option<T>> {
        let payload = self.with_conn(|conn| {
            conn.query_row(
                "SELECT payload FROM saved_queues WHERE guild_id = ?1",
                params![guild_id.get() as i64],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(Into::into)
        })?;

        payload
            .map(|json| serde_json::from_str(&json).map_err(Into::into))
            .transpose()
    }

    pub fn clear_queue(&self, guild_id: GuildId) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM saved_queues WHERE guild_id = ?1",
                params![guild_id.get() as i64],
            )?;
            Ok(())
        })
    }
}

/// Creates the tables if they don't exist.
fn create_tables(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS guild_languages (
            guild_id INTEGER PRIMARY KEY,
            language TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS bot_presence (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            status TEXT NOT NULL,
            activity_type TEXT,
            message TEXT,
            url TEXT
        );
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS saved_queues (
            guild_id INTEGER PRIMARY KEY,
            payload TEXT NOT NULL,
            saved_at INTEGER NOT NULL
        );",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    fn setup_db() -> Database {
        Database::open_in_memory().expect("Failed to open in-memory database")
    }

    #[test]
    fn guild_language_round_trip() {
        let db = setup_db();
        let guild = GuildId::new(42);

        assert_eq!(db.get_guild_language(guild), None);
        db.set_guild_language(guild, "pt").unwrap();
        db.set_guild_language(guild, "fr").unwrap();
        assert_eq!(db.get_guild_language(guild).as_deref(), Some("fr"));
    }

    #[test]
    fn presence_defaults_to_online_without_activity() {
        let db = setup_db();
        let presence = db.get_presence();

        assert_eq!(presence.status, PresenceStatus::Online);
        assert!(presence.activity.is_none());
    }

    #[test]
    fn presence_is_persisted() {
        let db = setup_db();
        let presence = BotPresence {
            status: PresenceStatus::Dnd,
            activity: Some(PresenceActivity {
                kind: ActivityKind::Streaming,
                message: "live coding".to_string(),
                url: Some("https://twitch.tv/someone".to_string()),
            }),
        };

        db.set_presence(&presence).unwrap();
        assert_eq!(db.get_presence(), presence);

        let updated = db.set_status(PresenceStatus::Idle).unwrap();
        assert_eq!(updated.status, PresenceStatus::Idle);
        assert_eq!(db.get_presence().activity, presence.activity);
    }

    #[test]
    fn logs_flag_defaults_to_enabled() {
        let db = setup_db();
        assert!(db.logs_enabled());

        db.set_logs_enabled(false).unwrap();
        assert!(!db.logs_enabled());
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Payload {
        titles: Vec<String>,
    }

    #[test]
    fn saved_queue_lifecycle() {
        let db = setup_db();
        let guild = GuildId::new(7);
        let payload = Payload {
            titles: vec!["a".into(), "b".into()],
        };

        assert_eq!(db.load_queue::<Payload>(guild).unwrap(), None);
        db.save_queue(guild, &payload).unwrap();
        assert_eq!(db.load_queue::<Payload>(guild).unwrap(), Some(payload));

        db.clear_queue(guild).unwrap();
        assert_eq!(db.load_queue::<Payload>(guild).unwrap(), None);
    }
}

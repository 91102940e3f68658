//! Typed runtime configuration, read from the process environment (and `.env`).

use serenity::all::{ChannelId, UserId};
use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LAVALINK_PORT: u16 = 2333;
pub const DEFAULT_LAVALINK_PASSWORD: &str = "youshallnotpass";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5000/callback";
/// The highest numbered `LAVALINK_NODE{n}_*` block that is read.
const MAX_NODES: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Connection details for a single Lavalink node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub secure: bool,
}

impl NodeConfig {
    /// `host:port`, the form the Lavalink client expects.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// REST base url, e.g. `http://localhost:2333`.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.address())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub discord_token: String,
    pub nodes: Vec<NodeConfig>,
    pub locales_dir: String,
    pub default_locale: String,
    pub database_path: String,
    pub bot_admin_ids: Vec<UserId>,
    pub log_channel_id: Option<ChannelId>,
    pub lonely_timeout: Duration,
    pub dashboard: Option<DashboardConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("DISCORD_TOKEN".to_string()))?;

        let log_channel_id = match get("LOG_CHANNEL_ID") {
            Some(raw) => Some(ChannelId::new(parse_id("LOG_CHANNEL_ID", &raw)?)),
            None => None,
        };

        let lonely_timeout = match get("LONELY_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "LONELY_TIMEOUT_SECS".to_string(),
                    value: raw.clone(),
                }
            })?),
            None => Duration::from_secs(120),
        };

        Ok(Self {
            discord_token,
            nodes: read_nodes(&get)?,
            locales_dir: get("LOCALES_DIR").unwrap_or_else(|| "locales".to_string()),
            default_locale: get("DEFAULT_LOCALE").unwrap_or_else(|| "en".to_string()),
            database_path: get("DATABASE_PATH")
                .unwrap_or_else(|| crate::utils::database::APPDATA_DB.to_string()),
            bot_admin_ids: parse_admin_ids(&get("BOT_ADMIN_IDS").unwrap_or_default()),
            log_channel_id,
            lonely_timeout,
            dashboard: read_dashboard(&get)?,
        })
    }

    pub fn is_bot_admin(&self, user_id: UserId) -> bool {
        self.bot_admin_ids.contains(&user_id)
    }
}

fn read_nodes<F>(get: &F) -> Result<Vec<NodeConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut nodes = Vec::new();

    for index in 1..=MAX_NODES {
        let prefix = format!("LAVALINK_NODE{}", index);
        let Some(host) = get(&format!("{}_HOST", prefix)) else {
            continue;
        };
        nodes.push(NodeConfig {
            name: get(&format!("{}_NAME", prefix)).unwrap_or_else(|| format!("node-{}", index)),
            host,
            port: parse_port(&format!("{}_PORT", prefix), get(&format!("{}_PORT", prefix)))?,
            password: get(&format!("{}_PASSWORD", prefix))
                .unwrap_or_else(|| DEFAULT_LAVALINK_PASSWORD.to_string()),
            secure: get(&format!("{}_SECURE", prefix))
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
        });
    }

    // Single-node setups only set the unnumbered variables
    if nodes.is_empty() {
        nodes.push(NodeConfig {
            name: get("LAVALINK_NAME").unwrap_or_else(|| "main".to_string()),
            host: get("LAVALINK_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_port("LAVALINK_PORT", get("LAVALINK_PORT"))?,
            password: get("LAVALINK_PASSWORD")
                .unwrap_or_else(|| DEFAULT_LAVALINK_PASSWORD.to_string()),
            secure: get("LAVALINK_SECURE").map(|v| parse_bool(&v)).unwrap_or(false),
        });
    }

    Ok(nodes)
}

fn read_dashboard<F>(get: &F) -> Result<Option<DashboardConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (Some(client_id), Some(client_secret)) =
        (get("DISCORD_CLIENT_ID"), get("DISCORD_CLIENT_SECRET"))
    else {
        return Ok(None);
    };

    Ok(Some(DashboardConfig {
        client_id,
        client_secret,
        redirect_uri: get("DISCORD_REDIRECT_URI")
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        host: get("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: parse_port("WEB_PORT", get("WEB_PORT").or_else(|| Some("5000".to_string())))?,
    }))
}

fn parse_port(key: &str, raw: Option<String>) -> Result<u16, ConfigError> {
    match raw {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(DEFAULT_LAVALINK_PORT),
    }
}

fn parse_id(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

/// Accepts `1/true/yes/on`, case-insensitively.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parses a comma separated list of user ids. Invalid entries are skipped.
pub fn parse_admin_ids(raw: &str) -> Vec<UserId> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .filter(|id| *id != 0)
        .map(UserId::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use test_case::test_case;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_token_is_an_error() {
        let result = Config::from_lookup(lookup(&[]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingEnvVar("DISCORD_TOKEN".to_string())
        );
    }

    #[test]
    fn single_node_defaults() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();

        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.nodes[0].host, "localhost");
        assert_eq!(config.nodes[0].port, 2333);
        assert_eq!(config.nodes[0].password, "youshallnotpass");
        assert_eq!(config.default_locale, "en");
        assert_eq!(config.lonely_timeout, Duration::from_secs(120));
        assert!(config.dashboard.is_none());
    }

    #[test]
    fn numbered_nodes_take_precedence() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("LAVALINK_HOST", "ignored"),
            ("LAVALINK_NODE1_HOST", "lava-a"),
            ("LAVALINK_NODE1_NAME", "Primary"),
            ("LAVALINK_NODE3_HOST", "lava-c"),
            ("LAVALINK_NODE3_PORT", "443"),
            ("LAVALINK_NODE3_SECURE", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].name, "Primary");
        assert_eq!(config.nodes[1].name, "node-3");
        assert_eq!(config.nodes[1].base_url(), "https://lava-c:443");
    }

    #[test]
    fn invalid_port_is_reported() {
        let result = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("LAVALINK_PORT", "http"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn dashboard_needs_client_credentials() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("DISCORD_CLIENT_ID", "42"),
            ("DISCORD_CLIENT_SECRET", "s3cret"),
        ]))
        .unwrap();

        let dashboard = config.dashboard.unwrap();
        assert_eq!(dashboard.port, 5000);
        assert_eq!(dashboard.redirect_uri, DEFAULT_REDIRECT_URI);
    }

    #[test_case("1", true)]
    #[test_case("Yes", true)]
    #[test_case("on", true)]
    #[test_case("0", false)]
    #[test_case("nope", false)]
    fn bool_parsing(raw: &str, expected: bool) {
        assert_eq!(parse_bool(raw), expected);
    }

    #[test]
    fn admin_ids_skip_garbage() {
        assert_eq!(
            parse_admin_ids("123, abc,456,,0"),
            vec![UserId::new(123), UserId::new(456)]
        );
    }
}

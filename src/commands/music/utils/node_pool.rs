//! Lavalink node selection, search failover and the reconnect watchdog.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::lavalink_rest::LoadResult;
use super::music_manager::{MusicError, MusicResult};
use crate::config::NodeConfig;

const WATCHDOG_HEALTHY: Duration = Duration::from_secs(60);
const WATCHDOG_NO_NODES: Duration = Duration::from_secs(15);
const WATCHDOG_AFTER_ERROR: Duration = Duration::from_secs(30);

/// One Lavalink node as the pool sees it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioNode: Send + Sync {
    fn label(&self) -> String;

    fn config(&self) -> NodeConfig;

    fn is_connected(&self) -> bool;

    async fn reconnect(&self) -> MusicResult<()>;

    async fn load(&self, query: &str) -> MusicResult<LoadResult>;

    /// HTTP health check, returning the latency.
    async fn probe(&self) -> MusicResult<Duration>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatus {
    pub label: String,
    pub address: String,
    pub secure: bool,
    pub connected: bool,
}

pub struct NodePool {
    nodes: Vec<Arc<dyn AudioNode>>,
}

impl NodePool {
    pub fn new(nodes: Vec<Arc<dyn AudioNode>>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Arc<dyn AudioNode>] {
        &self.nodes
    }

    pub fn any_connected(&self) -> bool {
        self.nodes.iter().any(|n| n.is_connected())
    }

    /// True when at least one node is usable, reconnecting dead nodes if none is.
    pub async fn ensure_connected(&self) -> bool {
        if self.any_connected() {
            return true;
        }

        warn!("No Lavalink node connected, attempting to reconnect all nodes");
        self.reconnect_dead().await;
        self.any_connected()
    }

    /// Reconnects every node that is down. Returns whether any attempt failed.
    pub async fn reconnect_dead(&self) -> bool {
        let mut had_error = false;
        for node in self.nodes.iter().filter(|n| !n.is_connected()) {
            match node.reconnect().await {
                Ok(()) => info!("Reconnected Lavalink node {}", node.label()),
                Err(e) => {
                    had_error = true;
                    warn!("Failed to reconnect Lavalink node {}: {}", node.label(), e);
                }
            }
        }
        had_error
    }

    /// Loads `query` from the first connected node that answers.
    /// An empty result is a valid answer, not a reason to try the next node.
    pub async fn search(&self, query: &str) -> MusicResult<LoadResult> {
        if !self.ensure_connected().await {
            return Err(MusicError::NoNodesAvailable);
        }

        let mut errors = Vec::new();
        for node in self.nodes.iter().filter(|n| n.is_connected()) {
            match node.load(query).await {
                Ok(LoadResult::Error(message)) => {
                    debug!("Node {} failed to load '{}': {}", node.label(), query, message);
                    errors.push(format!("{}: {}", node.label(), message));
                }
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("Node {} errored while loading '{}': {}", node.label(), query, e);
                    errors.push(format!("{}: {}", node.label(), e));
                }
            }
        }

        if errors.is_empty() {
            Err(MusicError::NoNodesAvailable)
        } else {
            Err(MusicError::AllNodesFailed(errors))
        }
    }

    pub fn status(&self) -> Vec<NodeStatus> {
        self.nodes
            .iter()
            .map(|node| {
                let config = node.config();
                NodeStatus {
                    label: node.label(),
                    address: config.address(),
                    secure: config.secure,
                    connected: node.is_connected(),
                }
            })
            .collect()
    }

    pub fn log_status_panel(&self) {
        let status = self.status();
        let online = status.iter().filter(|s| s.connected).count();
        info!("┌─ Lavalink nodes ({}/{} online)", online, status.len());
        for node in &status {
            info!(
                "│ {} {} @ {}{}",
                if node.connected { "🟢" } else { "🔴" },
                node.label,
                node.address,
                if node.secure { " (ssl)" } else { "" }
            );
        }
        info!("└─");
    }

    /// Starts the background loop that keeps nodes connected.
    pub fn spawn_watchdog(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut had_error = false;
            loop {
                let interval = watchdog_interval(self.any_connected(), had_error);
                debug!("Node watchdog sleeping for {:?}", interval);
                tokio::time::sleep(interval).await;

                had_error = self.reconnect_dead().await;
                if !self.any_connected() {
                    error!("No Lavalink node is reachable");
                    self.log_status_panel();
                }
            }
        })
    }
}

pub fn watchdog_interval(any_connected: bool, had_error: bool) -> Duration {
    if !any_connected {
        WATCHDOG_NO_NODES
    } else if had_error {
        WATCHDOG_AFTER_ERROR
    } else {
        WATCHDOG_HEALTHY
    }
}

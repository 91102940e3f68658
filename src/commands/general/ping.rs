use poise::{CreateReply, serenity_prelude as serenity};
use ::serenity::all::{CreateEmbed, CreateEmbedFooter};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{CommandResult, Context};

const PING_COLOR: u32 = 0x5865F2;
const INTERNET_PROBE: &str = "1.1.1.1:443";
const INTERNET_TIMEOUT: Duration = Duration::from_secs(3);

/// ⚪ unknown, 🟢 up to 100ms, 🟡 up to 200ms, 🔴 slower.
pub fn latency_emoji(latency: Option<Duration>) -> &'static str {
    match latency.map(|l| l.as_millis()) {
        None => "⚪",
        Some(0..=100) => "🟢",
        Some(101..=200) => "🟡",
        Some(_) => "🔴",
    }
}

fn latency_line(latency: Option<Duration>, unavailable: &str) -> String {
    match latency {
        Some(l) => format!("{} `{} ms`", latency_emoji(latency), l.as_millis()),
        None => format!("{} {}", latency_emoji(None), unavailable),
    }
}

async fn internet_latency() -> Option<Duration> {
    let started = Instant::now();
    match tokio::time::timeout(INTERNET_TIMEOUT, TcpStream::connect(INTERNET_PROBE)).await {
        Ok(Ok(_)) => Some(started.elapsed()),
        Ok(Err(e)) => {
            debug!("Internet probe failed: {}", e);
            None
        }
        Err(_) => None,
    }
}

/// Ping the bot, its audio nodes and the internet
#[poise::command(slash_command, category = "General")]
pub async fn ping(ctx: Context<'_>) -> CommandResult {
    let tr = ctx.data().translator(ctx.guild_id());
    let unavailable = tr.t("ping.unavailable");
    ctx.defer().await?;

    let gateway = get_shard_latency(&ctx).await;
    let mut embed = CreateEmbed::new()
        .title(format!("🏓 {}", tr.t("ping.title")))
        .color(PING_COLOR)
        .field(tr.t("ping.discord"), latency_line(gateway, &unavailable), true);

    for node in ctx.data().music.nodes().nodes() {
        let latency = node.probe().await.ok();
        embed = embed.field(
            format!("🎛️ {}", node.label()),
            latency_line(latency, &unavailable),
            true,
        );
    }

    let internet = internet_latency().await;
    embed = embed
        .field(tr.t("ping.internet"), latency_line(internet, &unavailable), true)
        .footer(CreateEmbedFooter::new(tr.t("ping.footer")));

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

async fn get_shard_latency(ctx: &Context<'_>) -> Option<Duration> {
    // Shards are backed by a "shard runner" responsible for processing events
    // over the shard, so we look up the runner this command arrived on.
    let shard_manager = ctx.framework().shard_manager();
    let runners = shard_manager.runners.lock().await;
    let runner = runners.get(&serenity::ShardId(ctx.serenity_context().shard_id.0))?;

    runner.latency
}

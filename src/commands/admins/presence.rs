use poise::CreateReply;
use ::serenity::all::CreateEmbed;
use tracing::info;

use super::is_bot_admin;
use crate::utils::localization::Translator;
use crate::utils::presence::{
    ActivityKind, BotPresence, PresenceError, PresenceStatus, apply_presence, build_activity,
};
use crate::{CommandResult, Context};

const ADMIN_COLOR: u32 = 0x00ff00;

fn presence_error_message(tr: &Translator, err: &PresenceError) -> String {
    match err {
        PresenceError::MessageRequired | PresenceError::StreamingMessageRequired => {
            tr.t("admin.presence.message_required")
        }
        PresenceError::StreamingUrl => tr.t("admin.presence.streaming_url"),
        other => other.to_string(),
    }
}

pub fn presence_summary(tr: &Translator, presence: &BotPresence) -> String {
    let activity = match &presence.activity {
        Some(activity) => format!("{} {}", activity.kind.as_str(), activity.message),
        None => tr.t("admin.presence.no_activity"),
    };
    tr.tf(
        "admin.presence.summary",
        &[
            ("status", presence.status.as_str().to_string()),
            ("activity", activity),
        ],
    )
}

async fn reply(ctx: Context<'_>, title: String, description: String, color: u32) -> CommandResult {
    ctx.send(
        CreateReply::default()
            .embed(
                CreateEmbed::new()
                    .title(title)
                    .description(description)
                    .color(color),
            )
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

#[poise::command(
    slash_command,
    subcommands("setstatus", "setpresence"),
    check = "is_bot_admin",
    category = "Admin"
)]
pub async fn admin(_ctx: Context<'_>) -> CommandResult {
    Ok(())
}

/// Change the bot's online status
#[poise::command(slash_command, check = "is_bot_admin", category = "Admin")]
pub async fn setstatus(
    ctx: Context<'_>,
    #[description = "New status"] status: PresenceStatus,
) -> CommandResult {
    let tr = ctx.data().translator(ctx.guild_id());
    let presence = ctx.data().database.set_status(status)?;
    apply_presence(ctx.serenity_context(), &presence);
    info!("Status changed to {} by {}", status.as_str(), ctx.author().id);

    reply(
        ctx,
        format!("✅ {}", tr.t("admin.presence.updated")),
        presence_summary(&tr, &presence),
        ADMIN_COLOR,
    )
    .await
}

/// Change the bot's activity
#[poise::command(slash_command, check = "is_bot_admin", category = "Admin")]
pub async fn setpresence(
    ctx: Context<'_>,
    #[description = "Activity type"] activity: Option<ActivityKind>,
    #[description = "Activity text"] message: Option<String>,
    #[description = "Stream url (streaming only)"] url: Option<String>,
    #[description = "Remove the activity"] clear: Option<bool>,
) -> CommandResult {
    let tr = ctx.data().translator(ctx.guild_id());
    let mut presence = ctx.data().database.get_presence();

    if clear.unwrap_or(false) {
        presence.activity = None;
    } else {
        let kind = activity.unwrap_or(ActivityKind::Playing);
        match build_activity(kind, message, url) {
            Ok(activity) => presence.activity = Some(activity),
            Err(e) => {
                return reply(
                    ctx,
                    format!("❌ {}", tr.t("errors.title")),
                    presence_error_message(&tr, &e),
                    0xff0000,
                )
                .await;
            }
        }
    }

    ctx.data().database.set_presence(&presence)?;
    apply_presence(ctx.serenity_context(), &presence);
    info!("Presence changed by {}", ctx.author().id);

    reply(
        ctx,
        format!("✅ {}", tr.t("admin.presence.updated")),
        presence_summary(&tr, &presence),
        ADMIN_COLOR,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::localization::Localizer;
    use crate::utils::presence::PresenceActivity;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn summary_lists_status_and_activity() {
        let mut localizer = Localizer::new("en");
        localizer
            .insert_json(
                "en",
                r#"{"admin": {"presence": {"summary": "{status}: {activity}", "no_activity": "none"}}}"#,
            )
            .unwrap();
        let tr = Translator::new(Arc::new(localizer), "en");

        let mut presence = BotPresence {
            status: PresenceStatus::Idle,
            activity: None,
        };
        assert_eq!(presence_summary(&tr, &presence), "idle: none");

        presence.activity = Some(PresenceActivity {
            kind: ActivityKind::Listening,
            message: "/play".into(),
            url: None,
        });
        assert_eq!(presence_summary(&tr, &presence), "idle: listening /play");
    }
}

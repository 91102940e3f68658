use poise::CreateReply;
use ::serenity::all::{CreateEmbed, CreateEmbedFooter};
use tracing::info;

use crate::utils::localization::Translator;
use crate::{CommandResult, Context};

const LANGUAGE_COLOR: u32 = 0x2ecc71;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum LanguageChoice {
    #[name = "🇧🇷 Português (Brasil)"]
    Pt,
    #[name = "🇵🇹 Português (Portugal)"]
    PtPt,
    #[name = "🇺🇸 English"]
    En,
    #[name = "🇫🇷 Français"]
    Fr,
}

impl LanguageChoice {
    pub fn code(&self) -> &'static str {
        match self {
            LanguageChoice::Pt => "pt",
            LanguageChoice::PtPt => "pt-pt",
            LanguageChoice::En => "en",
            LanguageChoice::Fr => "fr",
        }
    }
}

pub fn flag(code: &str) -> &'static str {
    match code {
        "pt" => "🇧🇷",
        "pt-pt" => "🇵🇹",
        "en" => "🇺🇸",
        "fr" => "🇫🇷",
        _ => "🔤",
    }
}

/// Language picked when the command runs without a choice.
pub fn toggled_language(current: &str) -> &'static str {
    if current == "pt" { "en" } else { "pt" }
}

async fn can_change_language(ctx: Context<'_>) -> bool {
    if ctx.data().config.is_bot_admin(ctx.author().id) {
        return true;
    }
    ctx.author_member()
        .await
        .and_then(|member| member.permissions)
        .is_some_and(|p| p.manage_guild() || p.administrator())
}

fn language_embed(tr: &Translator, code: &str, already: bool) -> CreateEmbed {
    let label = tr.t(&format!("languages.{}", code));
    let key = if already {
        "language.already"
    } else {
        "language.updated"
    };
    CreateEmbed::new()
        .title(format!("{} {}", flag(code), tr.t(&format!("{}.title", key))))
        .description(tr.tf(&format!("{}.description", key), &[("language", label)]))
        .color(LANGUAGE_COLOR)
        .footer(CreateEmbedFooter::new(tr.t("language.footer")))
}

/// Change the bot language for this server
#[poise::command(slash_command, guild_only, category = "General")]
pub async fn language(
    ctx: Context<'_>,
    #[description = "Language to use. Leave empty to toggle"] choice: Option<LanguageChoice>,
) -> CommandResult {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let data = ctx.data();
    let current_tr = data.translator(Some(guild_id));

    if !can_change_language(ctx).await {
        ctx.send(
            CreateReply::default()
                .content(current_tr.t("language.no_permission"))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let current = current_tr.locale().to_string();
    let target = match choice {
        Some(choice) => choice.code().to_string(),
        None => toggled_language(&current).to_string(),
    };

    if target == current {
        ctx.send(
            CreateReply::default()
                .embed(language_embed(&current_tr, &target, true))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    data.database.set_guild_language(guild_id, &target)?;
    info!("Guild {} language set to {}", guild_id, target);

    let tr = data.translator(Some(guild_id));
    ctx.send(
        CreateReply::default()
            .embed(language_embed(&tr, &target, false))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

use poise::CreateReply;
use ::serenity::all::{CreateEmbed, CreateEmbedFooter};

use crate::utils::localization::Translator;
use crate::{CommandResult, Context, Data, Error};

const HELP_COLOR: u32 = 0x5865F2;

/// Localized description of a command, or the one written on the command itself.
fn describe(tr: &Translator, name: &str, fallback: Option<&str>) -> String {
    let key = format!("commands.{}.description", name.replace(' ', "."));
    let translated = tr.t(&key);
    if translated != key {
        return translated;
    }
    fallback.unwrap_or("-").to_string()
}

/// `(name, description)` of every visible command and subcommand, sorted by name.
pub fn command_entries(
    tr: &Translator,
    commands: &[poise::Command<Data, Error>],
) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for command in commands.iter().filter(|c| !c.hide_in_help) {
        if command.subcommands.is_empty() {
            entries.push((
                command.name.clone(),
                describe(tr, &command.name, command.description.as_deref()),
            ));
            continue;
        }
        for sub in command.subcommands.iter().filter(|c| !c.hide_in_help) {
            let name = format!("{} {}", command.name, sub.name);
            let description = describe(tr, &name, sub.description.as_deref());
            entries.push((name, description));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

/// List every command
#[poise::command(slash_command, category = "General")]
pub async fn help(ctx: Context<'_>) -> CommandResult {
    let tr = ctx.data().translator(ctx.guild_id());
    let entries = command_entries(&tr, &ctx.framework().options().commands);

    let description = entries
        .iter()
        .map(|(name, description)| format!("`/{}` - {}", name, description))
        .collect::<Vec<_>>()
        .join("\n");
    let embed = CreateEmbed::new()
        .title(format!("📖 {}", tr.t("help.title")))
        .description(description)
        .color(HELP_COLOR)
        .footer(CreateEmbedFooter::new(
            tr.tf("help.footer", &[("count", entries.len().to_string())]),
        ));

    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::localization::Localizer;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn translated_description_wins() {
        let mut localizer = Localizer::new("en");
        localizer
            .insert_json("en", r#"{"commands": {"play": {"description": "Plays music"}}}"#)
            .unwrap();
        let tr = Translator::new(Arc::new(localizer), "en");

        assert_eq!(describe(&tr, "play", Some("fallback")), "Plays music");
        assert_eq!(describe(&tr, "skip", Some("Skip it")), "Skip it");
        assert_eq!(describe(&tr, "skip", None), "-");
    }
}

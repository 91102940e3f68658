/// Log channel toggle.
pub(crate) mod logs;
/// Bot status and activity.
pub(crate) mod presence;

use crate::{Context, Error};

/// Only users listed in `BOT_ADMIN_IDS` pass.
pub async fn is_bot_admin(ctx: Context<'_>) -> Result<bool, Error> {
    Ok(ctx.data().config.is_bot_admin(ctx.author().id))
}

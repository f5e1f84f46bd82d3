use log::{error, info, warn};

use crate::moderation::CancelError;
use crate::twitch::irc::command_system::CommandContext;

/// False-positive appeal: cancels the pending ban event for the named
/// chatter and lifts their timeout.
pub async fn handle_fp(
    ctx: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(name) = ctx.params.first() else {
        info!("No name specified in fp command, ignoring");
        ctx.handler
            .say(&ctx.event.channel, "No name specified, try ?fp <name>")
            .await?;
        return Ok(());
    };
    let name = name.trim_start_matches('@');

    match ctx.handler.registry().cancel(name).await {
        Ok(()) => {
            info!("Open ban event for user {} is removed", name);
            ctx.handler
                .say(
                    &ctx.event.channel,
                    &format!("Ban event for {} successfully canceled", name),
                )
                .await?;
        }
        Err(CancelError::NotRegistered(_)) => {
            warn!("No open ban event for user {} found", name);
            ctx.handler
                .say(
                    &ctx.event.channel,
                    &format!("No open ban event for user {} found", name),
                )
                .await?;
        }
        Err(e) => {
            error!("Cancel error: {}", e);
            ctx.handler.say(&ctx.event.channel, &e.to_string()).await?;
        }
    }
    Ok(())
}

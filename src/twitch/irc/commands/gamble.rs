use crate::twitch::irc::command_system::CommandContext;
use crate::wager::WagerError;

/// Starts a gamble session of `<count>` bets against the configured
/// responder.
pub async fn handle_gamble(
    ctx: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(count) = ctx.params.first() else {
        ctx.handler
            .say(
                &ctx.event.channel,
                "No bet count specified, try ?gamble <count>",
            )
            .await?;
        return Ok(());
    };
    let n_bets: u32 = match count.parse() {
        Ok(n) => n,
        Err(_) => {
            ctx.handler
                .say(
                    &ctx.event.channel,
                    &format!("Invalid number entered: {}", count),
                )
                .await?;
            return Ok(());
        }
    };

    match ctx.handler.wager().start(&ctx.event.channel, n_bets).await {
        Ok(()) => {}
        Err(WagerError::AlreadyRunning) => {
            ctx.handler
                .say(&ctx.event.channel, "A gamble session is already running")
                .await?;
        }
    }
    Ok(())
}

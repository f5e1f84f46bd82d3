use crate::twitch::irc::command_system::CommandContext;

/// Casts a break vote; the vote controller answers in chat itself.
pub async fn handle_votebreak(
    ctx: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    ctx.handler
        .voter()
        .add_vote(&ctx.event.user_name, &ctx.event.channel)
        .await;
    Ok(())
}

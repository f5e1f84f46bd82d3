use log::warn;

use crate::twitch::irc::command_system::CommandContext;

pub async fn handle_hello(
    ctx: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let reply = format!(
        "Hello {}, I am an automated moderation bot",
        ctx.event.user_name
    );
    ctx.handler.say(&ctx.event.channel, &reply).await
}

pub async fn handle_goal(
    ctx: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    ctx.handler
        .say(
            &ctx.event.channel,
            "Hi, I am a bot and for now my only goal is to boot pesky spam/phishing bots out of \
             here. Oh, and world dominion of course.",
        )
        .await
}

pub async fn handle_leave(
    ctx: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    warn!("Leave command received, closing");
    ctx.handler
        .say(
            &ctx.event.channel,
            &format!(
                "Hello {}, I will be leaving your channel now",
                ctx.event.user_name
            ),
        )
        .await?;
    ctx.handler.trigger_shutdown();
    Ok(())
}

use log::{error, warn};

use crate::twitch::irc::command_system::CommandContext;

/// Atomically replaces the filter rule set from its config file. On
/// failure the previous rule set stays active.
pub async fn handle_reload(
    ctx: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    warn!("Reloading filter config file");
    let path = ctx.handler.filter_config_path().await;
    match ctx.handler.checker().load_rules(&path).await {
        Ok(name) => {
            ctx.handler
                .say(
                    &ctx.event.channel,
                    &format!(
                        "Reload complete, the {} filter feels even more powerful now",
                        name
                    ),
                )
                .await?;
        }
        Err(e) => {
            error!("Reload failed: {}", e);
            ctx.handler
                .say(
                    &ctx.event.channel,
                    "Reload failed, check the filter config file",
                )
                .await?;
        }
    }
    Ok(())
}

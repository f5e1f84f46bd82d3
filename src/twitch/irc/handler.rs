use std::sync::Arc;
use log::{debug, error, info, warn};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use twitch_irc::message::PrivmsgMessage;

use crate::config::Config;
use crate::filter::{CheckOutcome, CheckResult, IgnoreReason, MessageChecker};
use crate::moderation::{BanEventRegistry, RegistryError};
use crate::storage::StorageClient;
use crate::twitch::api::requests::followers;
use crate::twitch::api::TwitchApiClient;
use crate::twitch::irc::command_system::{CommandContext, COMMANDS};
use crate::twitch::models::{ChatEvent, FollowStatus};
use crate::twitch::ChatSender;
use crate::voting::VoteController;
use crate::wager::GambleDriver;

/// Per-message pipeline: enrich the raw message into a [`ChatEvent`], run
/// it through the spam filter, feed the wager session, and dispatch chat
/// commands. Processed sequentially on the message loop so filter, timers
/// and votes observe events in arrival order.
pub struct MessageHandler {
    sender: Arc<dyn ChatSender>,
    api: Arc<TwitchApiClient>,
    checker: Arc<MessageChecker>,
    registry: Arc<BanEventRegistry>,
    voter: VoteController,
    wager: Arc<GambleDriver>,
    storage: Arc<StorageClient>,
    config: Arc<RwLock<Config>>,
    shutdown: CancellationToken,
}

impl MessageHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sender: Arc<dyn ChatSender>,
        api: Arc<TwitchApiClient>,
        checker: Arc<MessageChecker>,
        registry: Arc<BanEventRegistry>,
        voter: VoteController,
        wager: Arc<GambleDriver>,
        storage: Arc<StorageClient>,
        config: Arc<RwLock<Config>>,
    ) -> Self {
        MessageHandler {
            sender,
            api,
            checker,
            registry,
            voter,
            wager,
            storage,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub(crate) fn trigger_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub(crate) fn registry(&self) -> &BanEventRegistry {
        &self.registry
    }

    pub(crate) fn checker(&self) -> &MessageChecker {
        &self.checker
    }

    pub(crate) fn voter(&self) -> &VoteController {
        &self.voter
    }

    pub(crate) fn wager(&self) -> &Arc<GambleDriver> {
        &self.wager
    }

    pub async fn say(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sender.say(channel, message).await
    }

    pub(crate) async fn filter_config_path(&self) -> String {
        self.config.read().await.filter_config_path.clone()
    }

    pub async fn handle_message(
        &self,
        msg: &PrivmsgMessage,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Ignore the bot's own messages
        let own_login = self
            .config
            .read()
            .await
            .twitch_bot_username
            .clone()
            .unwrap_or_default();
        if msg.sender.login.eq_ignore_ascii_case(&own_login) {
            return Ok(());
        }

        let event = self.build_event(msg).await;
        self.handle_event(&event).await
    }

    pub async fn handle_event(
        &self,
        event: &ChatEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // The gamble responder's replies are ordinary chat messages
        if self.wager.is_active().await {
            self.wager
                .offer_message(&event.user_name, &event.content)
                .await;
        }

        let result = self.checker.check_message(event).await;
        self.handle_check_result(result).await?;

        self.dispatch_command(event).await
    }

    async fn build_event(&self, msg: &PrivmsgMessage) -> ChatEvent {
        let first_message = match self.storage.record_chatter(
            &msg.sender.id,
            &msg.sender.name,
            &msg.channel_login,
        ) {
            Ok(first) => first,
            Err(e) => {
                warn!("Failed to record chatter {}: {}", msg.sender.name, e);
                false
            }
        };

        let follow = match self.api.broadcaster_id().await {
            Ok(broadcaster_id) => {
                match followers::get_follow_status(&self.api, &broadcaster_id, &msg.sender.id)
                    .await
                {
                    Ok(status) => status,
                    Err(e) => {
                        debug!("Follow lookup for {} failed: {}", msg.sender.name, e);
                        FollowStatus::Unknown
                    }
                }
            }
            Err(_) => FollowStatus::Unknown,
        };

        ChatEvent::from_privmsg(msg, first_message, follow)
    }

    async fn handle_check_result(
        &self,
        result: CheckResult,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match result.outcome {
            CheckOutcome::Match => {
                info!(
                    "Flagged message from {} in {} with:\n    Score: {}\n    Message: {}",
                    result.event.user_name, result.event.channel, result.score, result.event.content
                );
                if let Err(e) = self.storage.record_decision(&result) {
                    warn!("Failed to record decision: {}", e);
                }

                let name = result.event.user_name.clone();
                let channel = result.event.channel.clone();
                let checker_name = result.checker_name.clone();
                match self.registry.register(result).await {
                    Ok(()) => {
                        self.say(
                            &channel,
                            &format!(
                                "{} Got flagged by {} (Use ?fp {} to report a false positive)",
                                name, checker_name, name
                            ),
                        )
                        .await?;
                    }
                    // First flag wins; the interim timeout is already in place
                    Err(RegistryError::DuplicateRegistration(_)) => {}
                }
            }
            CheckOutcome::Ignored => {
                // Friendly bots pass silently
                if result.ignore_reason != Some(IgnoreReason::FriendlyBot) {
                    if let Some(reason) = result.ignore_reason {
                        info!(
                            "Passing message from {} in {} with:\n    Pass reason: {}\n    Score: {}\n    Message: {}",
                            result.event.user_name,
                            result.event.channel,
                            reason,
                            result.score,
                            result.event.content
                        );
                        if let Err(e) = self.storage.record_decision(&result) {
                            warn!("Failed to record decision: {}", e);
                        }
                        self.say(
                            &result.event.channel,
                            &format!(
                                "@{} You get a pass because: {}",
                                result.event.user_name, reason
                            ),
                        )
                        .await?;
                    }
                }
            }
            // Log near misses
            CheckOutcome::NoMatch if result.score >= 2.0 => {
                debug!(
                    "Near miss from {} in {} with:\n    Score: {}\n    Message: {}",
                    result.event.user_name, result.event.channel, result.score, result.event.content
                );
            }
            _ => {}
        }
        Ok(())
    }

    async fn dispatch_command(
        &self,
        event: &ChatEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let content = event.content.trim();
        if !content.starts_with('?') {
            return Ok(());
        }

        let mut parts = content.split_whitespace();
        let command_name = match parts.next() {
            Some(first) => first.to_lowercase(),
            None => return Ok(()),
        };
        // Params keep their original case: ban events are keyed by display
        // name
        let params: Vec<&str> = parts.collect();

        let Some(command) = COMMANDS.iter().find(|c| c.name == command_name) else {
            return Ok(());
        };

        if event.role() >= command.required_role {
            let ctx = CommandContext {
                event,
                params: &params,
                handler: self,
            };
            if let Err(e) = (command.handler)(&ctx).await {
                error!("Error handling command {}: {}", command.name, e);
            }
        } else {
            let response = format!(
                "@{}, this command is only available to {}s and above.",
                event.user_name, command.required_role
            );
            self.say(&event.channel, &response).await?;
        }
        Ok(())
    }
}

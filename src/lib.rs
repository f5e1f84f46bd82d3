pub mod config;
pub mod filter;
pub mod logging;
pub mod moderation;
pub mod storage;
pub mod twitch;
pub mod voting;
pub mod wager;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info};
use tokio::sync::{mpsc, RwLock};
use twitch_irc::message::ServerMessage;

use crate::config::Config;
use crate::filter::MessageChecker;
use crate::moderation::BanEventRegistry;
use crate::storage::StorageClient;
use crate::twitch::api::{HelixModerator, TwitchApiClient};
use crate::twitch::irc::{IrcClient, MessageHandler};
use crate::twitch::ChatSender;
use crate::voting::{VoteController, VoteParams};
use crate::wager::parser::ReplyParser;
use crate::wager::{GambleDriver, WagerParams};

const STORAGE_PATH: &str = "chatwarden.db";

pub struct BotClients {
    pub handler: Arc<MessageHandler>,
    pub incoming: mpsc::UnboundedReceiver<ServerMessage>,
}

pub async fn init(
    config: Arc<RwLock<Config>>,
) -> Result<BotClients, Box<dyn std::error::Error + Send + Sync>> {
    {
        let config_read = config.read().await;
        if !config_read.is_twitch_irc_configured() {
            return Err("Twitch IRC is not configured".into());
        }
        if !config_read.is_twitch_api_configured() {
            return Err("Twitch API is not configured".into());
        }
    }

    let storage = Arc::new(StorageClient::new(STORAGE_PATH)?);
    let api = Arc::new(TwitchApiClient::new(Arc::clone(&config)));
    let (irc, incoming) = IrcClient::connect(Arc::clone(&config)).await?;
    let irc: Arc<dyn ChatSender> = Arc::new(irc);

    let config_read = config.read().await;

    let checker = Arc::new(MessageChecker::new(config_read.moderation.cyrillics_score));
    if let Err(e) = checker.load_rules(&config_read.filter_config_path).await {
        error!(
            "Could not load filter config from {}: {} (the filter stays disabled until ?reload succeeds)",
            config_read.filter_config_path, e
        );
    }

    let broadcaster_id = config_read
        .twitch_broadcaster_id
        .clone()
        .ok_or("Twitch broadcaster ID not set")?;
    let moderator_id = config_read
        .twitch_user_id
        .clone()
        .ok_or("Twitch bot user ID not set")?;
    let moderator = Arc::new(HelixModerator::new(
        Arc::clone(&api),
        broadcaster_id,
        moderator_id,
    ));
    let registry = Arc::new(BanEventRegistry::new(
        moderator,
        Duration::from_secs(config_read.moderation.grace_period_minutes * 60),
        Some(Arc::clone(&storage)),
    ));

    let voter = VoteController::new(
        Arc::clone(&irc),
        VoteParams {
            votes_required: config_read.voting.votes_required,
            vote_period: Duration::from_secs(config_read.voting.vote_period_secs),
            fail_timeout: Duration::from_secs(config_read.voting.fail_timeout_secs),
            pass_timeout: Duration::from_secs(config_read.voting.pass_timeout_secs),
            double_names: config_read
                .voting
                .double_vote_names
                .iter()
                .cloned()
                .collect::<HashSet<_>>(),
            announce_message: config_read.voting.announce_message.clone(),
        },
    );

    let bot_username = config_read
        .twitch_bot_username
        .clone()
        .ok_or("Twitch IRC username not set")?;
    let wager = Arc::new(GambleDriver::new(
        Arc::clone(&irc),
        ReplyParser::new(&bot_username, &config_read.wager.responder_name),
        WagerParams {
            base_stake: config_read.wager.base_stake,
            max_loss_factor: config_read.wager.max_loss_factor,
            reply_timeout: Duration::from_secs(config_read.wager.reply_timeout_secs),
            resend_delay: Duration::from_secs(config_read.wager.resend_delay_secs),
        },
    ));

    drop(config_read);

    let handler = Arc::new(MessageHandler::new(
        irc,
        api,
        checker,
        registry,
        voter,
        wager,
        storage,
        Arc::clone(&config),
    ));

    info!("chatwarden initialized");
    Ok(BotClients { handler, incoming })
}

pub async fn run(clients: BotClients) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let BotClients {
        handler,
        mut incoming,
    } = clients;
    let shutdown = handler.shutdown_token();

    let message_loop = {
        let handler = Arc::clone(&handler);
        async move {
            while let Some(message) = incoming.recv().await {
                match message {
                    ServerMessage::Privmsg(msg) => {
                        if let Err(e) = handler.handle_message(&msg).await {
                            error!("Error handling Twitch message: {:?}", e);
                        }
                    }
                    ServerMessage::Ping(_) | ServerMessage::Pong(_) => {}
                    other => debug!("Received other IRC message: {:?}", other),
                }
            }
        }
    };

    info!("Bot is now running. Press Ctrl+C to exit.");
    tokio::select! {
        _ = message_loop => {
            info!("Message stream ended.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down.");
        }
        _ = shutdown.cancelled() => {
            info!("Leave command received, shutting down.");
        }
    }

    info!("Bot has shut down.");
    Ok(())
}

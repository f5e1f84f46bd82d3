use std::sync::Arc;
use async_trait::async_trait;
use log::info;
use tokio::sync::{mpsc, RwLock};
use twitch_irc::login::StaticLoginCredentials;
use twitch_irc::message::ServerMessage;
use twitch_irc::{ClientConfig, SecureTCPTransport, TwitchIRCClient};

use crate::config::Config;
use crate::twitch::ChatSender;

pub type TwitchIrcClientType = TwitchIRCClient<SecureTCPTransport, StaticLoginCredentials>;

pub struct IrcClient {
    pub client: Arc<TwitchIrcClientType>,
}

impl IrcClient {
    /// Builds the IRC client from the config and joins the configured
    /// channel. Returns the wrapper plus the incoming message stream.
    pub async fn connect(
        config: Arc<RwLock<Config>>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>), Box<dyn std::error::Error + Send + Sync>>
    {
        let config = config.read().await;
        let username = config
            .twitch_bot_username
            .clone()
            .ok_or("Twitch IRC username not set")?;
        let oauth_token = config
            .twitch_irc_oauth_token
            .clone()
            .ok_or("Twitch IRC OAuth token not set")?;
        let channel = config
            .twitch_channel_to_join
            .clone()
            .ok_or("Twitch channel to join not set")?;

        let oauth_token = oauth_token.trim_start_matches("oauth:").to_string();
        let client_config =
            ClientConfig::new_simple(StaticLoginCredentials::new(username, Some(oauth_token)));

        let (incoming_messages, client) = TwitchIrcClientType::new(client_config);
        let client = Arc::new(client);

        client.join(channel.clone())?;
        info!("Joined Twitch channel {}", channel);

        Ok((IrcClient { client }, incoming_messages))
    }

    pub async fn send_message(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.client
            .say(channel.to_string(), message.to_string())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatSender for IrcClient {
    async fn say(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.send_message(channel, message).await
    }
}

use std::sync::Arc;
use log::info;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::twitch::api::ApiError;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Thin Helix client: holds the shared `reqwest` client and the token pair
/// from the config. Request modules under `requests/` build the actual
/// calls and retry once through `refresh_token` on a 401.
#[derive(Clone)]
pub struct TwitchApiClient {
    config: Arc<RwLock<Config>>,
    pub(crate) client: Client,
}

impl TwitchApiClient {
    pub fn new(config: Arc<RwLock<Config>>) -> Self {
        TwitchApiClient {
            config,
            client: Client::new(),
        }
    }

    pub(crate) async fn get_token(&self) -> Result<String, ApiError> {
        self.config
            .read()
            .await
            .twitch_access_token
            .clone()
            .ok_or(ApiError::MissingCredential("twitch_access_token"))
    }

    pub(crate) async fn get_client_id(&self) -> Result<String, ApiError> {
        self.config
            .read()
            .await
            .twitch_client_id
            .clone()
            .ok_or(ApiError::MissingCredential("twitch_client_id"))
    }

    pub async fn broadcaster_id(&self) -> Result<String, ApiError> {
        self.config
            .read()
            .await
            .twitch_broadcaster_id
            .clone()
            .ok_or(ApiError::MissingCredential("twitch_broadcaster_id"))
    }

    pub async fn moderator_id(&self) -> Result<String, ApiError> {
        self.config
            .read()
            .await
            .twitch_user_id
            .clone()
            .ok_or(ApiError::MissingCredential("twitch_user_id"))
    }

    /// Exchanges the refresh token for a fresh access token and persists
    /// the new pair back to the config file.
    pub async fn refresh_token(&self) -> Result<(), ApiError> {
        let (client_id, client_secret, refresh_token) = {
            let config = self.config.read().await;
            (
                config
                    .twitch_client_id
                    .clone()
                    .ok_or(ApiError::MissingCredential("twitch_client_id"))?,
                config
                    .twitch_client_secret
                    .clone()
                    .ok_or(ApiError::MissingCredential("twitch_client_secret"))?,
                config
                    .twitch_refresh_token
                    .clone()
                    .ok_or(ApiError::MissingCredential("twitch_refresh_token"))?,
            )
        };

        let response = self
            .client
            .post("https://id.twitch.tv/oauth2/token")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
                ("client_id", &client_id),
                ("client_secret", &client_secret),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: RefreshResponse = response.json().await?;
        let mut config = self.config.write().await;
        config
            .set_twitch_tokens(tokens.access_token, tokens.refresh_token)
            .map_err(|e| ApiError::TokenPersist(e.to_string()))?;
        info!("Refreshed Twitch API tokens");
        Ok(())
    }
}

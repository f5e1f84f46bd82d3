use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, error};
use serde_json::json;

use crate::moderation::ModerationActions;
use crate::twitch::api::{ApiError, TwitchApiClient};

/// Bans a user, or times them out when a duration is given. Helix uses the
/// same endpoint for both.
pub async fn ban_chatter(
    client: &TwitchApiClient,
    broadcaster_id: &str,
    moderator_id: &str,
    user_id: &str,
    duration: Option<Duration>,
    reason: &str,
) -> Result<(), ApiError> {
    let mut attempt = 0;
    loop {
        let token = client.get_token().await?;
        let client_id = client.get_client_id().await?;

        let mut data = json!({ "user_id": user_id, "reason": reason });
        if let Some(duration) = duration {
            data["duration"] = json!(duration.as_secs());
        }

        let response = client
            .client
            .post(&format!(
                "https://api.twitch.tv/helix/moderation/bans?broadcaster_id={}&moderator_id={}",
                broadcaster_id, moderator_id
            ))
            .header("Client-ID", client_id)
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({ "data": data }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED && attempt == 0 {
            attempt += 1;
            debug!("Access token rejected, refreshing and retrying");
            client.refresh_token().await?;
            continue;
        }
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await?;
        if body.contains("already banned") {
            return Err(ApiError::AlreadyApplied);
        }
        error!("Failed to ban user. Status: {}, Body: {}", status, body);
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
}

/// Lifts a ban or timeout on a user.
pub async fn unban_chatter(
    client: &TwitchApiClient,
    broadcaster_id: &str,
    moderator_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    let mut attempt = 0;
    loop {
        let token = client.get_token().await?;
        let client_id = client.get_client_id().await?;

        let response = client
            .client
            .delete(&format!(
                "https://api.twitch.tv/helix/moderation/bans?broadcaster_id={}&moderator_id={}&user_id={}",
                broadcaster_id, moderator_id, user_id
            ))
            .header("Client-ID", client_id)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED && attempt == 0 {
            attempt += 1;
            debug!("Access token rejected, refreshing and retrying");
            client.refresh_token().await?;
            continue;
        }
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await?;
        if body.contains("is not banned") {
            return Err(ApiError::AlreadyApplied);
        }
        error!("Failed to unban user. Status: {}, Body: {}", status, body);
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
}

/// Helix-backed implementation of the moderation seam used by the ban
/// event registry.
pub struct HelixModerator {
    api: Arc<TwitchApiClient>,
    broadcaster_id: String,
    moderator_id: String,
}

impl HelixModerator {
    pub fn new(api: Arc<TwitchApiClient>, broadcaster_id: String, moderator_id: String) -> Self {
        HelixModerator {
            api,
            broadcaster_id,
            moderator_id,
        }
    }
}

#[async_trait]
impl ModerationActions for HelixModerator {
    async fn timeout_user(
        &self,
        user_id: &str,
        duration: Duration,
        reason: &str,
    ) -> Result<(), ApiError> {
        ban_chatter(
            &self.api,
            &self.broadcaster_id,
            &self.moderator_id,
            user_id,
            Some(duration),
            reason,
        )
        .await
    }

    async fn ban_user(&self, user_id: &str, reason: &str) -> Result<(), ApiError> {
        ban_chatter(
            &self.api,
            &self.broadcaster_id,
            &self.moderator_id,
            user_id,
            None,
            reason,
        )
        .await
    }

    async fn unban_user(&self, user_id: &str) -> Result<(), ApiError> {
        unban_chatter(&self.api, &self.broadcaster_id, &self.moderator_id, user_id).await
    }
}

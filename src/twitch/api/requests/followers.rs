use chrono::{DateTime, Utc};
use log::{debug, error};
use serde_json::Value;

use crate::twitch::api::{ApiError, TwitchApiClient};
use crate::twitch::models::FollowStatus;

/// Looks up whether a user follows the broadcaster and for how many days.
pub async fn get_follow_status(
    client: &TwitchApiClient,
    broadcaster_id: &str,
    user_id: &str,
) -> Result<FollowStatus, ApiError> {
    let mut attempt = 0;
    loop {
        let token = client.get_token().await?;
        let client_id = client.get_client_id().await?;

        let response = client
            .client
            .get(&format!(
                "https://api.twitch.tv/helix/channels/followers?broadcaster_id={}&user_id={}",
                broadcaster_id, user_id
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
        if !status.is_success() {
            let body = response.text().await?;
            error!("Failed to get follow status. Status: {}, Body: {}", status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let followed_at = body["data"]
            .as_array()
            .and_then(|data| data.first())
            .and_then(|follower| follower["followed_at"].as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

        return Ok(match followed_at {
            Some(followed_at) => FollowStatus::Following {
                days: (Utc::now() - followed_at.with_timezone(&Utc)).num_days(),
            },
            None => FollowStatus::NotFollowing,
        });
    }
}

pub mod client;
pub mod requests;

use thiserror::Error;

pub use client::TwitchApiClient;
pub use requests::moderation::HelixModerator;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("twitch api returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The requested effect is already in place (e.g. the user is already
    /// banned). Callers treat this as success.
    #[error("the moderation action was already applied")]
    AlreadyApplied,
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("failed to persist refreshed tokens: {0}")]
    TokenPersist(String),
}

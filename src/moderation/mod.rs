pub mod ban_event;
pub mod errors;
pub mod registry;

use std::fmt;
use std::time::Duration;
use async_trait::async_trait;

use crate::twitch::api::ApiError;

pub use ban_event::BanEvent;
pub use errors::{CancelError, RegistryError};
pub use registry::BanEventRegistry;

/// The punitive actions the registry needs from the chat platform. The
/// production implementation talks to Helix; tests substitute a mock.
#[async_trait]
pub trait ModerationActions: Send + Sync {
    async fn timeout_user(
        &self,
        user_id: &str,
        duration: Duration,
        reason: &str,
    ) -> Result<(), ApiError>;

    async fn ban_user(&self, user_id: &str, reason: &str) -> Result<(), ApiError>;

    async fn unban_user(&self, user_id: &str) -> Result<(), ApiError>;
}

/// Lifecycle of a deferred ban, recorded to storage on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanState {
    Pending,
    Fired,
    Canceled,
}

impl fmt::Display for BanState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BanState::Pending => write!(f, "pending"),
            BanState::Fired => write!(f, "fired"),
            BanState::Canceled => write!(f, "canceled"),
        }
    }
}

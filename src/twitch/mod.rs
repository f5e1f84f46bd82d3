pub mod api;
pub mod irc;
pub mod models;

use async_trait::async_trait;

/// Outgoing chat messages. Implemented by the IRC client wrapper; tests
/// substitute a recording mock.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn say(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub mod parser;
pub mod session;

use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::twitch::ChatSender;
use crate::wager::parser::{GambleReply, ReplyParser};
use crate::wager::session::{SessionStep, StopReason, WagerSession};

#[derive(Error, Debug)]
pub enum WagerError {
    #[error("a gamble session is already running")]
    AlreadyRunning,
}

#[derive(Debug, Clone)]
pub struct WagerParams {
    pub base_stake: i64,
    pub max_loss_factor: i64,
    pub reply_timeout: Duration,
    pub resend_delay: Duration,
}

/// Drives repeated `!gamble` bets against the external responder.
///
/// One session at a time: `start` spawns the routine, `offer_message` feeds
/// it every chat message so classified replies can advance the state
/// machine. The responder's reply is authoritative; a timeout only re-sends
/// the current stake.
pub struct GambleDriver {
    sender: Arc<dyn ChatSender>,
    parser: ReplyParser,
    params: WagerParams,
    active: Mutex<Option<mpsc::Sender<GambleReply>>>,
}

impl GambleDriver {
    pub fn new(sender: Arc<dyn ChatSender>, parser: ReplyParser, params: WagerParams) -> Self {
        GambleDriver {
            sender,
            parser,
            params,
            active: Mutex::new(None),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Offers an incoming chat message to the running session, if any.
    /// Unclassifiable replies never reach the routine, so they cannot
    /// advance it.
    pub async fn offer_message(&self, sender_name: &str, content: &str) {
        let tx = match self.active.lock().await.as_ref() {
            Some(tx) => tx.clone(),
            None => return,
        };
        let reply = self.parser.parse(sender_name, content);
        if matches!(reply, GambleReply::Unrelated) {
            return;
        }
        if tx.send(reply).await.is_err() {
            debug!("Gamble routine is gone, dropping reply");
        }
    }

    pub async fn start(
        self: &Arc<Self>,
        channel: &str,
        n_bets: u32,
    ) -> Result<(), WagerError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(WagerError::AlreadyRunning);
        }
        info!("Starting {} gamble(s) in {}'s channel", n_bets, channel);

        let (tx, rx) = mpsc::channel(16);
        *active = Some(tx);

        let driver = Arc::clone(self);
        let channel = channel.to_string();
        tokio::spawn(async move {
            driver.gamble_routine(&channel, n_bets, rx).await;
            *driver.active.lock().await = None;
        });
        Ok(())
    }

    async fn gamble_routine(&self, channel: &str, n_bets: u32, mut rx: mpsc::Receiver<GambleReply>) {
        info!("Starting gamble routine");
        let mut session =
            WagerSession::new(self.params.base_stake, self.params.max_loss_factor, n_bets);

        // Kick off with the opening bet
        self.send_gamble(channel, session.stake()).await;

        loop {
            debug!(
                "Waiting for a gamble result, {} remaining - running total: {}",
                session.remaining(),
                session.total()
            );
            let reply = match timeout(self.params.reply_timeout, rx.recv()).await {
                Err(_) => {
                    warn!(
                        "Timed out waiting for gamble result, re-sending in {}s",
                        self.params.resend_delay.as_secs()
                    );
                    tokio::time::sleep(self.params.resend_delay).await;
                    self.send_gamble(channel, session.stake()).await;
                    continue;
                }
                Ok(None) => break,
                Ok(Some(reply)) => reply,
            };

            match session.advance(&reply) {
                SessionStep::Bet(stake) => self.send_gamble(channel, stake).await,
                SessionStep::Hold => continue,
                SessionStep::Stop(reason) => {
                    match reason {
                        StopReason::Completed => {}
                        StopReason::OutOfFunds => info!("Ran out of gamble points, stopping now"),
                        StopReason::CatastrophicLoss => info!("Massive loss, stopping now"),
                    }
                    break;
                }
            }
        }

        info!("Gamble routine completed with {} profit", session.total());
    }

    async fn send_gamble(&self, channel: &str, stake: i64) {
        if let Err(e) = self.sender.say(channel, &format!("!gamble {}", stake)).await {
            error!("Failed to send gamble bet: {}", e);
        }
    }
}

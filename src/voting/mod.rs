use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::twitch::ChatSender;

#[derive(Debug, Clone)]
pub struct VoteParams {
    pub votes_required: usize,
    pub vote_period: Duration,
    pub fail_timeout: Duration,
    pub pass_timeout: Duration,
    pub double_names: HashSet<String>,
    pub announce_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Pass,
    Fail,
}

/// What happened to a submitted vote, reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    /// First vote of a fresh session; the window timer is now running.
    Started { votes: usize },
    /// Vote counted toward the running session.
    Counted { votes: usize },
    /// The voter already voted this session.
    AlreadyCounted,
    /// This vote reached the threshold and the session passed.
    Passed,
    /// Voting is closed; reopens after `remaining`.
    Closed { remaining: Duration },
}

/// Read-only view of the aggregator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteSnapshot {
    Open { votes: usize },
    Closed { remaining: Duration },
}

enum VoteState {
    Open {
        voters: HashSet<String>,
        window: Option<CancellationToken>,
    },
    Closed {
        reopens_at: Instant,
    },
}

/// Windowed threshold vote collector for one channel.
///
/// Sessions move Open -> Closed(cooldown) -> Open. The first vote arms the
/// window timer; reaching the threshold cancels it and passes immediately,
/// otherwise the timer decides pass/fail on the final count. While closed,
/// votes are rejected with the remaining cooldown.
#[derive(Clone)]
pub struct VoteController {
    state: Arc<Mutex<VoteState>>,
    sender: Arc<dyn ChatSender>,
    params: Arc<VoteParams>,
}

impl VoteController {
    pub fn new(sender: Arc<dyn ChatSender>, params: VoteParams) -> Self {
        info!(
            "Voter added with {} required votes in {}s, timeout: {}s|{}s",
            params.votes_required,
            params.vote_period.as_secs(),
            params.fail_timeout.as_secs(),
            params.pass_timeout.as_secs()
        );
        VoteController {
            state: Arc::new(Mutex::new(VoteState::Open {
                voters: HashSet::new(),
                window: None,
            })),
            sender,
            params: Arc::new(params),
        }
    }

    pub async fn add_vote(&self, voter: &str, channel: &str) -> VoteStatus {
        let mut state = self.state.lock().await;
        let mut messages: Vec<String> = Vec::new();
        let mut passed_count: Option<usize> = None;

        let status = match &mut *state {
            VoteState::Closed { reopens_at } => {
                let remaining = reopens_at.saturating_duration_since(Instant::now());
                debug!(
                    "Voting will open again in {} seconds",
                    remaining.as_secs()
                );
                messages.push(format!(
                    "Voting will open again in {} min",
                    remaining.as_secs().div_ceil(60)
                ));
                VoteStatus::Closed { remaining }
            }
            VoteState::Open { voters, window } => {
                let n_votes_pre = voters.len();
                voters.insert(voter.to_string());
                // Some names count double
                if self.params.double_names.contains(voter) {
                    debug!("Double vote added for: {}", voter);
                    voters.insert(format!("{}_2", voter));
                }
                let n_votes_post = voters.len();

                if n_votes_post == n_votes_pre {
                    // Ignore double votes
                    VoteStatus::AlreadyCounted
                } else {
                    if n_votes_pre == 0 {
                        let token = CancellationToken::new();
                        *window = Some(token.clone());
                        self.spawn_window_timer(channel.to_string(), token);
                        messages.push(format!(
                            "{} Started a new vote. You have {}s to get {} more votes",
                            voter,
                            self.params.vote_period.as_secs(),
                            self.params.votes_required.saturating_sub(n_votes_post)
                        ));
                        messages.push(format!("/announce {}", self.params.announce_message));
                        info!(
                            "New vote started ({}/{}) by {}",
                            n_votes_post, self.params.votes_required, voter
                        );
                    } else {
                        messages.push(format!(
                            "{} Your vote was registered. ({}/{})",
                            voter, n_votes_post, self.params.votes_required
                        ));
                        info!(
                            "Vote added ({}/{}) by {}",
                            n_votes_post, self.params.votes_required, voter
                        );
                    }

                    if n_votes_post >= self.params.votes_required {
                        // Threshold reached before the window elapsed: the
                        // timer is canceled, not just ignored
                        if let Some(token) = window.take() {
                            token.cancel();
                        }
                        passed_count = Some(n_votes_post);
                        VoteStatus::Passed
                    } else if n_votes_pre == 0 {
                        VoteStatus::Started { votes: n_votes_post }
                    } else {
                        VoteStatus::Counted { votes: n_votes_post }
                    }
                }
            }
        };

        if let Some(count) = passed_count {
            let timeout = self.cooldown_for(VoteOutcome::Pass);
            *state = VoteState::Closed {
                reopens_at: Instant::now() + timeout,
            };
            self.spawn_reopen_timer(timeout);
            messages.push(self.outcome_message(VoteOutcome::Pass, count));
            info!("Vote passed");
        }
        drop(state);

        for message in messages {
            self.say(channel, &message).await;
        }
        status
    }

    pub async fn snapshot(&self) -> VoteSnapshot {
        match &*self.state.lock().await {
            VoteState::Open { voters, .. } => VoteSnapshot::Open {
                votes: voters.len(),
            },
            VoteState::Closed { reopens_at } => VoteSnapshot::Closed {
                remaining: reopens_at.saturating_duration_since(Instant::now()),
            },
        }
    }

    fn cooldown_for(&self, outcome: VoteOutcome) -> Duration {
        match outcome {
            VoteOutcome::Pass => self.params.pass_timeout,
            VoteOutcome::Fail => self.params.fail_timeout,
        }
    }

    fn outcome_message(&self, outcome: VoteOutcome, count: usize) -> String {
        match outcome {
            VoteOutcome::Pass => String::from("Vote passed!"),
            VoteOutcome::Fail => format!(
                "Vote failed, only {} out of {}",
                count, self.params.votes_required
            ),
        }
    }

    /// Ends the session when the window elapses without the threshold being
    /// reached first.
    fn spawn_window_timer(&self, channel: String, token: CancellationToken) {
        let ctl = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(ctl.params.vote_period) => {}
            }

            let mut state = ctl.state.lock().await;
            if token.is_cancelled() {
                return;
            }
            let count = match &*state {
                VoteState::Open { voters, .. } => voters.len(),
                VoteState::Closed { .. } => return,
            };
            let outcome = if count >= ctl.params.votes_required {
                VoteOutcome::Pass
            } else {
                VoteOutcome::Fail
            };
            let timeout = ctl.cooldown_for(outcome);
            *state = VoteState::Closed {
                reopens_at: Instant::now() + timeout,
            };
            drop(state);

            match outcome {
                VoteOutcome::Pass => info!("Vote passed"),
                VoteOutcome::Fail => {
                    info!("Vote failed ({}/{})", count, ctl.params.votes_required)
                }
            }
            let message = ctl.outcome_message(outcome, count);
            ctl.say(&channel, &message).await;
            ctl.spawn_reopen_timer(timeout);
        });
    }

    /// Re-opens the voting once the cooldown elapses.
    fn spawn_reopen_timer(&self, timeout: Duration) {
        let ctl = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut state = ctl.state.lock().await;
            if matches!(&*state, VoteState::Closed { .. }) {
                *state = VoteState::Open {
                    voters: HashSet::new(),
                    window: None,
                };
                debug!("Enabled votes");
            }
        });
    }

    async fn say(&self, channel: &str, message: &str) {
        if let Err(e) = self.sender.say(channel, message).await {
            error!("Failed to send vote message: {}", e);
        }
    }
}

use crate::wager::parser::GambleReply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// All planned bets were resolved.
    Completed,
    /// The responder reported our balance is too low to bet.
    OutOfFunds,
    /// A single loss exceeded `base_stake * max_loss_factor`.
    CatastrophicLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// Place the next bet at this stake.
    Bet(i64),
    /// Nothing changed; keep waiting for a reply.
    Hold,
    /// The session is over.
    Stop(StopReason),
}

/// The betting state machine, independent of chat I/O.
///
/// Wins reset the stake to the base; a survivable loss doubles it
/// (Martingale recovery); a loss past the catastrophic guard stops the
/// session without consuming the remaining-bet counter.
#[derive(Debug)]
pub struct WagerSession {
    base_stake: i64,
    max_loss_factor: i64,
    remaining: u32,
    stake: i64,
    total: i64,
}

impl WagerSession {
    pub fn new(base_stake: i64, max_loss_factor: i64, n_bets: u32) -> Self {
        WagerSession {
            base_stake,
            max_loss_factor,
            remaining: n_bets,
            stake: base_stake,
            total: 0,
        }
    }

    pub fn stake(&self) -> i64 {
        self.stake
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn advance(&mut self, reply: &GambleReply) -> SessionStep {
        match reply {
            GambleReply::Unrelated => SessionStep::Hold,
            GambleReply::OutOfFunds => {
                self.remaining = 0;
                SessionStep::Stop(StopReason::OutOfFunds)
            }
            GambleReply::Win(amount) | GambleReply::WinAllIn(amount) => {
                self.total += amount;
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    SessionStep::Stop(StopReason::Completed)
                } else {
                    self.stake = self.base_stake;
                    SessionStep::Bet(self.stake)
                }
            }
            GambleReply::Loss(amount) | GambleReply::LossAllIn(amount) => {
                if amount.abs() > self.base_stake * self.max_loss_factor {
                    // The remaining-bet counter is left unconsumed; the loss
                    // still lands in the total so the summary is a true P/L
                    self.total += amount;
                    return SessionStep::Stop(StopReason::CatastrophicLoss);
                }
                self.total += amount;
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    SessionStep::Stop(StopReason::Completed)
                } else {
                    self.stake = amount.abs() * 2;
                    SessionStep::Bet(self.stake)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_loss_doubles_the_next_stake() {
        let mut session = WagerSession::new(1, 500, 5);
        let step = session.advance(&GambleReply::Loss(-50));
        assert_eq!(step, SessionStep::Bet(100));
        assert_eq!(session.total(), -50);
        assert_eq!(session.remaining(), 4);
    }

    #[test]
    fn a_win_resets_the_stake_to_base() {
        let mut session = WagerSession::new(1, 500, 5);
        session.advance(&GambleReply::Loss(-50));
        let step = session.advance(&GambleReply::Win(100));
        assert_eq!(step, SessionStep::Bet(1));
        assert_eq!(session.total(), 50);
    }

    #[test]
    fn a_catastrophic_loss_stops_without_consuming_the_counter() {
        let mut session = WagerSession::new(1, 500, 5);
        let step = session.advance(&GambleReply::Loss(-501));
        assert_eq!(step, SessionStep::Stop(StopReason::CatastrophicLoss));
        assert_eq!(session.remaining(), 5);
        assert_eq!(session.total(), -501);
    }

    #[test]
    fn a_loss_exactly_at_the_guard_is_survivable() {
        let mut session = WagerSession::new(1, 500, 5);
        let step = session.advance(&GambleReply::Loss(-500));
        assert_eq!(step, SessionStep::Bet(1000));
    }

    #[test]
    fn out_of_funds_stops_regardless_of_remaining_bets() {
        let mut session = WagerSession::new(1, 500, 5);
        let step = session.advance(&GambleReply::OutOfFunds);
        assert_eq!(step, SessionStep::Stop(StopReason::OutOfFunds));
        assert_eq!(session.remaining(), 0);
    }

    #[test]
    fn the_session_completes_when_the_counter_runs_out() {
        let mut session = WagerSession::new(1, 500, 2);
        assert_eq!(session.advance(&GambleReply::Win(10)), SessionStep::Bet(1));
        assert_eq!(
            session.advance(&GambleReply::Win(10)),
            SessionStep::Stop(StopReason::Completed)
        );
        assert_eq!(session.total(), 20);
    }

    #[test]
    fn unrelated_replies_hold_the_state() {
        let mut session = WagerSession::new(1, 500, 2);
        assert_eq!(session.advance(&GambleReply::Unrelated), SessionStep::Hold);
        assert_eq!(session.remaining(), 2);
        assert_eq!(session.stake(), 1);
    }

    #[test]
    fn an_all_in_loss_follows_the_same_rules() {
        let mut session = WagerSession::new(2, 500, 5);
        assert_eq!(
            session.advance(&GambleReply::LossAllIn(-8)),
            SessionStep::Bet(16)
        );
        assert_eq!(
            session.advance(&GambleReply::LossAllIn(-2000)),
            SessionStep::Stop(StopReason::CatastrophicLoss)
        );
    }
}

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use tokio::sync::RwLock;

use crate::filter::rules::{FilterError, RuleSet};
use crate::twitch::models::{ChatEvent, FollowStatus};

lazy_static! {
    static ref CYRILLIC_RE: Regex = Regex::new("[А-Яа-яЁё]").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Message was matched
    Match,
    /// Message was not matched
    NoMatch,
    /// Message was matched but ignored
    Ignored,
    /// No result could be produced
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    FriendlyBot,
    ChannelStaff,
    Vip,
    Subscriber,
    Follower,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IgnoreReason::FriendlyBot => write!(f, "FRIENDLY_BOT"),
            IgnoreReason::ChannelStaff => write!(f, "CHANNEL_STAFF"),
            IgnoreReason::Vip => write!(f, "VIP"),
            IgnoreReason::Subscriber => write!(f, "SUBSCRIBER"),
            IgnoreReason::Follower => write!(f, "FOLLOWER"),
        }
    }
}

/// Result of running one message through the checker. If the outcome is
/// `Ignored`, the reason is carried alongside.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub checker_name: String,
    pub event: ChatEvent,
    pub outcome: CheckOutcome,
    pub ignore_reason: Option<IgnoreReason>,
    pub score: f64,
}

/// Scores messages against the currently loaded rule set.
///
/// The rule set is held as an `Arc` snapshot: reloads swap the whole set
/// atomically, and an evaluation that is already running keeps the snapshot
/// it started with. Until the first successful load every check returns
/// `CheckOutcome::Error` so an unconfigured checker can never flag anyone.
pub struct MessageChecker {
    cyrillics_score: Option<f64>,
    rules: RwLock<Option<Arc<RuleSet>>>,
}

impl MessageChecker {
    pub fn new(cyrillics_score: Option<f64>) -> Self {
        MessageChecker {
            cyrillics_score,
            rules: RwLock::new(None),
        }
    }

    /// Loads (or replaces) the rule set from the given file. Returns the
    /// rule set name on success; on failure the previous rule set stays
    /// active.
    pub async fn load_rules<P: AsRef<Path>>(&self, path: P) -> Result<String, FilterError> {
        let rules = RuleSet::load(path)?;
        let name = rules.name.clone();
        *self.rules.write().await = Some(Arc::new(rules));
        info!("=== {} filter completed initializing ===", name);
        Ok(name)
    }

    pub async fn is_configured(&self) -> bool {
        self.rules.read().await.is_some()
    }

    /// Installs an already-compiled rule set, bypassing the filesystem.
    pub async fn install_rules(&self, rules: RuleSet) {
        *self.rules.write().await = Some(Arc::new(rules));
    }

    pub async fn check_message(&self, event: &ChatEvent) -> CheckResult {
        let rules = match self.rules.read().await.as_ref() {
            Some(rules) => Arc::clone(rules),
            None => {
                warn!("Message checker has no filter config loaded: check will not be run");
                return CheckResult {
                    checker_name: String::from("unconfigured"),
                    event: event.clone(),
                    outcome: CheckOutcome::Error,
                    ignore_reason: None,
                    score: 0.0,
                };
            }
        };

        // Filter out spaces and non-alphanumeric characters
        let filtered_msg: String = event.content.chars().filter(|c| c.is_alphanumeric()).collect();

        let mut score = 0.0;
        for tier in &rules.tiers {
            // Duplicate phrases count once per tier
            let matches: HashSet<String> = tier
                .matcher
                .find_iter(&filtered_msg)
                .map(|m| m.as_str().to_lowercase())
                .collect();
            score += tier.weight as f64 * matches.len() as f64;
        }

        // Only check for cyrillics if enabled; the bonus applies once and
        // scans the raw content
        if let Some(bonus) = self.cyrillics_score {
            if CYRILLIC_RE.is_match(&event.content) {
                warn!("Matched cyrillics");
                score += bonus;
            }
        }

        // Not following at all, or following for no longer than the cutoff,
        // multiplies the score once
        match event.follow {
            FollowStatus::NotFollowing => score *= rules.follow_time_multiplier,
            FollowStatus::Following { days } if days <= rules.follow_time_days_cutoff => {
                score *= rules.follow_time_multiplier
            }
            _ => {}
        }

        if event.first_message {
            score *= rules.first_time_chatter_multiplier;
        }

        let mut outcome = if score >= rules.min_score {
            CheckOutcome::Match
        } else {
            CheckOutcome::NoMatch
        };
        let mut ignore_reason = None;

        // Fixed ignore precedence: friendly-bot > channel-staff > VIP >
        // subscriber > follower. The friendly-bot rule applies regardless of
        // the tentative outcome; the rest only downgrade a Match.
        if rules.silent_ignore_bots && rules.bot_names.iter().any(|n| n == &event.user_name) {
            outcome = CheckOutcome::Ignored;
            ignore_reason = Some(IgnoreReason::FriendlyBot);
        } else if rules.ignore_channel_staff && event.is_staff() {
            if outcome == CheckOutcome::Match {
                outcome = CheckOutcome::Ignored;
                ignore_reason = Some(IgnoreReason::ChannelStaff);
            }
        } else if rules.ignore_vip && event.is_vip {
            if outcome == CheckOutcome::Match {
                outcome = CheckOutcome::Ignored;
                ignore_reason = Some(IgnoreReason::Vip);
            }
        } else if rules.ignore_subscriber && event.is_subscriber {
            if outcome == CheckOutcome::Match {
                outcome = CheckOutcome::Ignored;
                ignore_reason = Some(IgnoreReason::Subscriber);
            }
        } else if rules.ignore_follower && matches!(event.follow, FollowStatus::Following { .. }) {
            if outcome == CheckOutcome::Match {
                outcome = CheckOutcome::Ignored;
                ignore_reason = Some(IgnoreReason::Follower);
            }
        }

        CheckResult {
            checker_name: rules.name.clone(),
            event: event.clone(),
            outcome,
            ignore_reason,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::rules::RuleSetFile;
    use chrono::Utc;

    fn event(content: &str) -> ChatEvent {
        ChatEvent {
            user_id: String::from("1001"),
            user_login: String::from("suspect"),
            user_name: String::from("Suspect"),
            channel: String::from("somechannel"),
            content: content.to_string(),
            is_broadcaster: false,
            is_mod: false,
            is_vip: false,
            is_subscriber: false,
            first_message: false,
            follow: FollowStatus::Unknown,
            timestamp: Utc::now(),
        }
    }

    fn rules(json: &str) -> RuleSet {
        let file: RuleSetFile = serde_json::from_str(json).expect("test json is well-formed");
        RuleSet::compile(file).expect("test rules compile")
    }

    fn basic_rules() -> RuleSet {
        rules(
            r#"{
                "name": "spam-bot-filter",
                "flaggedTiers": {"5": ["spamword"], "10": ["phishlink"]},
                "minScore": 5,
                "multipliers": {
                    "follow_time_days_cutoff": 7,
                    "follow_time_multiplier": 2,
                    "first_time_chatter_multiplier": 3
                },
                "bot_names": ["Nightbot"],
                "options": {
                    "silent_ignore_bots": true,
                    "ignore_channel_staff": true,
                    "ignore_vip": true,
                    "ignore_subscriber": true,
                    "ignore_follower": false
                }
            }"#,
        )
    }

    async fn checker_with(rules: RuleSet) -> MessageChecker {
        let checker = MessageChecker::new(None);
        checker.install_rules(rules).await;
        checker
    }

    #[tokio::test]
    async fn unconfigured_checker_reports_error() {
        let checker = MessageChecker::new(Some(10.0));
        let result = checker.check_message(&event("spamword")).await;
        assert_eq!(result.outcome, CheckOutcome::Error);
        assert!(!checker.is_configured().await);
    }

    #[tokio::test]
    async fn punctuation_is_stripped_before_matching() {
        let checker = checker_with(basic_rules()).await;
        // "SPAMWORD now!!" collapses to "SPAMWORDnow" and still matches
        let result = checker.check_message(&event("SPAMWORD now!!")).await;
        assert_eq!(result.outcome, CheckOutcome::Match);
        assert_eq!(result.score, 5.0);
        assert_eq!(result.checker_name, "spam-bot-filter");
    }

    #[tokio::test]
    async fn duplicate_phrases_count_once_per_tier() {
        let checker = checker_with(basic_rules()).await;
        let result = checker
            .check_message(&event("spamword SPAMWORD spamword"))
            .await;
        assert_eq!(result.score, 5.0);

        // Distinct phrases in different tiers both count
        let result = checker.check_message(&event("spamword phishlink")).await;
        assert_eq!(result.score, 15.0);
    }

    #[tokio::test]
    async fn rechecking_the_same_event_is_idempotent() {
        let checker = checker_with(basic_rules()).await;
        let ev = event("spamword phishlink");
        let first = checker.check_message(&ev).await;
        let second = checker.check_message(&ev).await;
        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.score, second.score);
        assert_eq!(first.ignore_reason, second.ignore_reason);
    }

    #[tokio::test]
    async fn cyrillic_bonus_alone_can_reach_the_threshold() {
        let checker = MessageChecker::new(Some(10.0));
        checker.install_rules(basic_rules()).await;
        let result = checker.check_message(&event("привет")).await;
        assert_eq!(result.score, 10.0);
        assert_eq!(result.outcome, CheckOutcome::Match);
    }

    #[tokio::test]
    async fn follow_time_multiplier_applies_to_non_and_recent_followers() {
        let checker = checker_with(basic_rules()).await;

        let mut ev = event("spamword");
        ev.follow = FollowStatus::NotFollowing;
        assert_eq!(checker.check_message(&ev).await.score, 10.0);

        ev.follow = FollowStatus::Following { days: 3 };
        assert_eq!(checker.check_message(&ev).await.score, 10.0);

        // Long-time followers are not multiplied
        ev.follow = FollowStatus::Following { days: 90 };
        assert_eq!(checker.check_message(&ev).await.score, 5.0);
    }

    #[tokio::test]
    async fn first_time_chatter_multiplier_stacks_with_follow_multiplier() {
        let checker = checker_with(basic_rules()).await;
        let mut ev = event("spamword");
        ev.follow = FollowStatus::NotFollowing;
        ev.first_message = true;
        // 5 * 2 (not following) * 3 (first message)
        assert_eq!(checker.check_message(&ev).await.score, 30.0);
    }

    #[tokio::test]
    async fn friendly_bot_wins_over_channel_staff() {
        let checker = checker_with(basic_rules()).await;
        let mut ev = event("spamword phishlink");
        ev.user_name = String::from("Nightbot");
        ev.is_mod = true;
        let result = checker.check_message(&ev).await;
        assert_eq!(result.outcome, CheckOutcome::Ignored);
        assert_eq!(result.ignore_reason, Some(IgnoreReason::FriendlyBot));
    }

    #[tokio::test]
    async fn staff_ignore_only_downgrades_a_match() {
        let checker = checker_with(basic_rules()).await;
        let mut ev = event("perfectly fine message");
        ev.is_mod = true;
        let result = checker.check_message(&ev).await;
        assert_eq!(result.outcome, CheckOutcome::NoMatch);
        assert_eq!(result.ignore_reason, None);

        ev.content = String::from("spamword");
        let result = checker.check_message(&ev).await;
        assert_eq!(result.outcome, CheckOutcome::Ignored);
        assert_eq!(result.ignore_reason, Some(IgnoreReason::ChannelStaff));
    }

    #[tokio::test]
    async fn vip_and_subscriber_ignores_follow_the_precedence() {
        let checker = checker_with(basic_rules()).await;
        let mut ev = event("spamword");
        ev.is_vip = true;
        ev.is_subscriber = true;
        let result = checker.check_message(&ev).await;
        assert_eq!(result.ignore_reason, Some(IgnoreReason::Vip));

        ev.is_vip = false;
        let result = checker.check_message(&ev).await;
        assert_eq!(result.ignore_reason, Some(IgnoreReason::Subscriber));
    }

    #[tokio::test]
    async fn follower_ignore_applies_when_enabled() {
        let mut rule_set = basic_rules();
        rule_set.ignore_follower = true;
        rule_set.ignore_subscriber = false;
        let checker = checker_with(rule_set).await;

        let mut ev = event("spamword");
        ev.follow = FollowStatus::Following { days: 400 };
        let result = checker.check_message(&ev).await;
        assert_eq!(result.outcome, CheckOutcome::Ignored);
        assert_eq!(result.ignore_reason, Some(IgnoreReason::Follower));
    }

    #[tokio::test]
    async fn empty_tier_list_still_applies_multipliers_and_threshold() {
        let rule_set = rules(
            r#"{
                "name": "tierless",
                "flaggedTiers": {},
                "minScore": 5,
                "multipliers": {
                    "follow_time_days_cutoff": 7,
                    "follow_time_multiplier": 2,
                    "first_time_chatter_multiplier": 2
                },
                "bot_names": [],
                "options": {
                    "silent_ignore_bots": false,
                    "ignore_channel_staff": false,
                    "ignore_vip": false,
                    "ignore_subscriber": false,
                    "ignore_follower": false
                }
            }"#,
        );
        let checker = checker_with(rule_set).await;
        let mut ev = event("anything at all");
        ev.follow = FollowStatus::NotFollowing;
        ev.first_message = true;
        let result = checker.check_message(&ev).await;
        assert_eq!(result.score, 0.0);
        assert_eq!(result.outcome, CheckOutcome::NoMatch);
    }
}

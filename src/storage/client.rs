use std::path::Path;
use chrono::Utc;
use log::info;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Result};

use crate::filter::{CheckOutcome, CheckResult};
use crate::moderation::BanState;

/// Persists what the moderation pipeline produces: the decision audit log,
/// ban-event state transitions, and the per-channel chatters table that
/// answers the first-message flag.
pub struct StorageClient {
    conn: Mutex<Connection>,
}

impl StorageClient {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chatters (
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                channel TEXT NOT NULL,
                first_seen INTEGER NOT NULL,
                PRIMARY KEY (user_id, channel)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS decisions (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                channel TEXT NOT NULL,
                outcome TEXT NOT NULL,
                ignore_reason TEXT,
                score REAL NOT NULL,
                message TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ban_events (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                channel TEXT NOT NULL,
                state TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        info!("Database schema created or updated");
        Ok(StorageClient {
            conn: Mutex::new(conn),
        })
    }

    /// Records the chatter and reports whether this was the first message
    /// ever seen from them in this channel.
    pub fn record_chatter(&self, user_id: &str, username: &str, channel: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT OR IGNORE INTO chatters (user_id, username, channel, first_seen)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        let inserted = stmt.execute(params![user_id, username, channel, Utc::now().timestamp()])?;
        Ok(inserted > 0)
    }

    pub fn record_decision(&self, result: &CheckResult) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO decisions (user_id, username, channel, outcome, ignore_reason, score, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        stmt.execute(params![
            result.event.user_id,
            result.event.user_name,
            result.event.channel,
            outcome_label(result.outcome),
            result.ignore_reason.map(|r| r.to_string()),
            result.score,
            result.event.content,
            Utc::now().timestamp()
        ])?;
        Ok(())
    }

    pub fn record_ban_transition(
        &self,
        user_id: &str,
        username: &str,
        channel: &str,
        state: BanState,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO ban_events (user_id, username, channel, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            user_id,
            username,
            channel,
            state.to_string(),
            Utc::now().timestamp()
        ])?;
        Ok(())
    }
}

fn outcome_label(outcome: CheckOutcome) -> &'static str {
    match outcome {
        CheckOutcome::Match => "match",
        CheckOutcome::NoMatch => "no_match",
        CheckOutcome::Ignored => "ignored",
        CheckOutcome::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitch::models::{ChatEvent, FollowStatus};

    fn storage() -> StorageClient {
        StorageClient::new(":memory:").expect("in-memory database opens")
    }

    fn flagged_result() -> CheckResult {
        CheckResult {
            checker_name: String::from("test-filter"),
            event: ChatEvent {
                user_id: String::from("42"),
                user_login: String::from("suspect"),
                user_name: String::from("Suspect"),
                channel: String::from("somechannel"),
                content: String::from("spamword"),
                is_broadcaster: false,
                is_mod: false,
                is_vip: false,
                is_subscriber: false,
                first_message: false,
                follow: FollowStatus::Unknown,
                timestamp: Utc::now(),
            },
            outcome: CheckOutcome::Match,
            ignore_reason: None,
            score: 5.0,
        }
    }

    #[test]
    fn first_message_is_detected_per_channel() {
        let storage = storage();
        assert!(storage.record_chatter("42", "Suspect", "chan_a").unwrap());
        assert!(!storage.record_chatter("42", "Suspect", "chan_a").unwrap());
        // Same user in a different channel counts as first again
        assert!(storage.record_chatter("42", "Suspect", "chan_b").unwrap());
    }

    #[test]
    fn decisions_and_ban_transitions_are_persisted() {
        let storage = storage();
        storage.record_decision(&flagged_result()).unwrap();
        storage
            .record_ban_transition("42", "Suspect", "somechannel", BanState::Pending)
            .unwrap();
        storage
            .record_ban_transition("42", "Suspect", "somechannel", BanState::Fired)
            .unwrap();

        let conn = storage.conn.lock();
        let decisions: i64 = conn
            .query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))
            .unwrap();
        let transitions: i64 = conn
            .query_row("SELECT COUNT(*) FROM ban_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(decisions, 1);
        assert_eq!(transitions, 2);
    }
}

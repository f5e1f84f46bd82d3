use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use twitch_irc::message::PrivmsgMessage;

/// Follow relationship between a chatter and the channel, as known at the
/// time the message was received. `Unknown` means the lookup was skipped or
/// failed; score multipliers and follower ignores are not applied in that
/// case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowStatus {
    Unknown,
    NotFollowing,
    Following { days: i64 },
}

/// An incoming chat message enriched with everything the moderation
/// subsystems need. Immutable once built.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub channel: String,
    pub content: String,
    pub is_broadcaster: bool,
    pub is_mod: bool,
    pub is_vip: bool,
    pub is_subscriber: bool,
    pub first_message: bool,
    pub follow: FollowStatus,
    pub timestamp: DateTime<Utc>,
}

impl ChatEvent {
    pub fn from_privmsg(msg: &PrivmsgMessage, first_message: bool, follow: FollowStatus) -> Self {
        let has_badge = |name: &str| msg.badges.iter().any(|b| b.name == name);

        ChatEvent {
            user_id: msg.sender.id.clone(),
            user_login: msg.sender.login.clone(),
            user_name: msg.sender.name.clone(),
            channel: msg.channel_login.clone(),
            content: msg.message_text.clone(),
            is_broadcaster: has_badge("broadcaster"),
            is_mod: has_badge("moderator"),
            is_vip: has_badge("vip"),
            is_subscriber: has_badge("subscriber") || has_badge("founder"),
            first_message,
            follow,
            timestamp: msg.server_timestamp,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.is_broadcaster || self.is_mod
    }

    pub fn role(&self) -> UserRole {
        if self.is_broadcaster {
            UserRole::Broadcaster
        } else if self.is_mod {
            UserRole::Moderator
        } else if self.is_vip {
            UserRole::VIP
        } else if self.is_subscriber {
            UserRole::Subscriber
        } else {
            UserRole::Viewer
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRole {
    Viewer,
    Subscriber,
    VIP,
    Moderator,
    Broadcaster,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Viewer
    }
}

impl PartialOrd for UserRole {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UserRole {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl UserRole {
    fn rank(&self) -> u8 {
        match self {
            UserRole::Viewer => 0,
            UserRole::Subscriber => 1,
            UserRole::VIP => 2,
            UserRole::Moderator => 3,
            UserRole::Broadcaster => 4,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UserRole::Viewer => write!(f, "Viewer"),
            UserRole::Subscriber => write!(f, "Subscriber"),
            UserRole::VIP => write!(f, "VIP"),
            UserRole::Moderator => write!(f, "Moderator"),
            UserRole::Broadcaster => write!(f, "Broadcaster"),
        }
    }
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "broadcaster" => Ok(UserRole::Broadcaster),
            "moderator" => Ok(UserRole::Moderator),
            "vip" => Ok(UserRole::VIP),
            "subscriber" => Ok(UserRole::Subscriber),
            "viewer" => Ok(UserRole::Viewer),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_matches_privilege_ladder() {
        assert!(UserRole::Broadcaster > UserRole::Moderator);
        assert!(UserRole::Moderator > UserRole::VIP);
        assert!(UserRole::VIP > UserRole::Subscriber);
        assert!(UserRole::Subscriber > UserRole::Viewer);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Moderator".parse::<UserRole>(), Ok(UserRole::Moderator));
        assert_eq!("vip".parse::<UserRole>(), Ok(UserRole::VIP));
        assert!("janitor".parse::<UserRole>().is_err());
    }
}

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub twitch_bot_username: Option<String>,
    pub twitch_user_id: Option<String>,
    pub twitch_channel_to_join: Option<String>,
    pub twitch_broadcaster_id: Option<String>,
    pub twitch_client_id: Option<String>,
    pub twitch_client_secret: Option<String>,
    pub twitch_irc_oauth_token: Option<String>,
    pub twitch_access_token: Option<String>,
    pub twitch_refresh_token: Option<String>,
    #[serde(default = "default_filter_config_path")]
    pub filter_config_path: String,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub voting: VotingConfig,
    #[serde(default)]
    pub wager: WagerConfig,
    #[serde(skip)]
    config_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModerationConfig {
    /// Grace period between the interim timeout and the ban.
    #[serde(default = "default_grace_period_minutes")]
    pub grace_period_minutes: u64,
    /// Score added when a message contains any cyrillic character; absent
    /// to disable the bonus.
    #[serde(default = "default_cyrillics_score")]
    pub cyrillics_score: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VotingConfig {
    #[serde(default = "default_votes_required")]
    pub votes_required: usize,
    #[serde(default = "default_vote_period_secs")]
    pub vote_period_secs: u64,
    #[serde(default = "default_fail_timeout_secs")]
    pub fail_timeout_secs: u64,
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,
    /// Names whose single vote counts twice.
    #[serde(default)]
    pub double_vote_names: Vec<String>,
    #[serde(default = "default_announce_message")]
    pub announce_message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WagerConfig {
    #[serde(default = "default_base_stake")]
    pub base_stake: i64,
    #[serde(default = "default_max_loss_factor")]
    pub max_loss_factor: i64,
    #[serde(default = "default_responder_name")]
    pub responder_name: String,
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,
    #[serde(default = "default_resend_delay_secs")]
    pub resend_delay_secs: u64,
}

fn default_filter_config_path() -> String {
    String::from("chatwarden-filter.json")
}

fn default_grace_period_minutes() -> u64 {
    2
}

fn default_cyrillics_score() -> Option<f64> {
    Some(10.0)
}

fn default_votes_required() -> usize {
    3
}

fn default_vote_period_secs() -> u64 {
    60
}

fn default_fail_timeout_secs() -> u64 {
    10 * 60
}

fn default_pass_timeout_secs() -> u64 {
    3 * 60 * 60
}

fn default_announce_message() -> String {
    String::from("We are voting to take a short break. Vote by typing ?votebreak")
}

fn default_base_stake() -> i64 {
    1
}

fn default_max_loss_factor() -> i64 {
    500
}

fn default_responder_name() -> String {
    String::from("StreamElements")
}

fn default_reply_timeout_secs() -> u64 {
    5
}

fn default_resend_delay_secs() -> u64 {
    10
}

impl Default for ModerationConfig {
    fn default() -> Self {
        ModerationConfig {
            grace_period_minutes: default_grace_period_minutes(),
            cyrillics_score: default_cyrillics_score(),
        }
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        VotingConfig {
            votes_required: default_votes_required(),
            vote_period_secs: default_vote_period_secs(),
            fail_timeout_secs: default_fail_timeout_secs(),
            pass_timeout_secs: default_pass_timeout_secs(),
            double_vote_names: Vec::new(),
            announce_message: default_announce_message(),
        }
    }
}

impl Default for WagerConfig {
    fn default() -> Self {
        WagerConfig {
            base_stake: default_base_stake(),
            max_loss_factor: default_max_loss_factor(),
            responder_name: default_responder_name(),
            reply_timeout_secs: default_reply_timeout_secs(),
            resend_delay_secs: default_resend_delay_secs(),
        }
    }
}

impl Config {
    pub const DEFAULT_CONFIG_PATH: &'static str = "chatwarden.conf";

    pub fn new(path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let path = path.unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_PATH));
        if path.exists() {
            let mut config: Config = toml::from_str(&fs::read_to_string(&path)?)?;
            config.config_path = path;
            config.prompt_for_missing_fields()?;
            Ok(config)
        } else {
            Self::initial_setup(path)
        }
    }

    fn prompt_for_missing_fields(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Twitch IRC
        if self.twitch_bot_username.is_none() {
            self.twitch_bot_username = Some(Self::prompt_input("Enter your Twitch IRC username: ")?);
        }
        if self.twitch_irc_oauth_token.is_none() {
            self.twitch_irc_oauth_token =
                Some(Self::prompt_input("Enter your Twitch IRC OAuth Token: ")?);
        }
        if self.twitch_channel_to_join.is_none() {
            self.twitch_channel_to_join =
                Some(Self::prompt_input("Enter the Twitch channel to join: ")?);
        }

        // Twitch API
        if self.twitch_client_id.is_none() {
            self.twitch_client_id = Some(Self::prompt_input("Enter your Twitch API Client ID: ")?);
        }
        if self.twitch_client_secret.is_none() {
            self.twitch_client_secret =
                Some(Self::prompt_input("Enter your Twitch API Client Secret: ")?);
        }
        if self.twitch_user_id.is_none() {
            self.twitch_user_id =
                Some(Self::prompt_input("Enter the bot account's Twitch user ID: ")?);
        }
        if self.twitch_broadcaster_id.is_none() {
            self.twitch_broadcaster_id = Some(Self::prompt_input(
                "Enter the broadcaster's Twitch user ID: ",
            )?);
        }

        self.save()?;
        Ok(())
    }

    fn initial_setup(path: PathBuf) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        println!(
            "{}",
            "Welcome to chatwarden! Let's set up your configuration.".bold()
        );

        println!("First, you'll need a Twitch application for the Client ID and Client Secret.");
        println!("Please follow these steps:");
        println!("1. Go to https://dev.twitch.tv/console");
        println!("2. Log in with your Twitch account");
        println!("3. Click on 'Register Your Application'");
        println!("4. Fill in the required fields and click 'Create'");
        println!("5. On the next page you'll see your Client ID and can generate a Client Secret");
        println!("\nPress Enter when you're ready to continue...");
        let mut buffer = String::new();
        io::stdin().read_line(&mut buffer)?;

        let twitch_client_id = Self::prompt_input("Enter your Twitch Client ID: ")?;
        let twitch_client_secret = Self::prompt_input("Enter your Twitch Client Secret: ")?;

        println!("\nNow, let's get your Twitch Chat OAuth Token.");
        println!("Generate a chat token for the bot account (including the 'oauth:' prefix).");
        println!("\nPress Enter when you're ready to continue...");
        io::stdin().read_line(&mut buffer)?;

        let twitch_irc_oauth_token = Self::prompt_input("Enter your Twitch Chat OAuth Token: ")?;
        let twitch_bot_username = Self::prompt_input("Enter the username of your Twitch bot: ")?;
        let twitch_user_id = Self::prompt_input("Enter the bot account's Twitch user ID: ")?;
        let twitch_channel_to_join =
            Self::prompt_input("Enter the Twitch channel you want the bot to join: ")?;
        let twitch_broadcaster_id =
            Self::prompt_input("Enter the broadcaster's Twitch user ID: ")?;

        let config = Config {
            twitch_bot_username: Some(twitch_bot_username),
            twitch_user_id: Some(twitch_user_id),
            twitch_channel_to_join: Some(twitch_channel_to_join),
            twitch_broadcaster_id: Some(twitch_broadcaster_id),
            twitch_client_id: Some(twitch_client_id),
            twitch_client_secret: Some(twitch_client_secret),
            twitch_irc_oauth_token: Some(twitch_irc_oauth_token),
            twitch_access_token: None,
            twitch_refresh_token: None,
            filter_config_path: default_filter_config_path(),
            log_level: LogLevel::Info,
            moderation: ModerationConfig::default(),
            voting: VotingConfig::default(),
            wager: WagerConfig::default(),
            config_path: path,
        };

        config.save()?;
        println!("Configuration saved successfully!");

        Ok(config)
    }

    fn prompt_input(prompt: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        print!("{}", prompt);
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let toml = toml::to_string(self)?;
        fs::write(&self.config_path, toml)?;
        Ok(())
    }

    pub fn set_twitch_tokens(
        &mut self,
        access_token: String,
        refresh_token: String,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.twitch_access_token = Some(access_token);
        self.twitch_refresh_token = Some(refresh_token);
        self.save()
    }

    pub fn is_twitch_irc_configured(&self) -> bool {
        self.twitch_bot_username.is_some()
            && self.twitch_irc_oauth_token.is_some()
            && self.twitch_channel_to_join.is_some()
    }

    pub fn is_twitch_api_configured(&self) -> bool {
        self.twitch_client_id.is_some()
            && self.twitch_client_secret.is_some()
            && self.twitch_broadcaster_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_is_filled_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            twitch_bot_username = "warden"
            "#,
        )
        .expect("partial config parses");
        assert_eq!(config.moderation.grace_period_minutes, 2);
        assert_eq!(config.moderation.cyrillics_score, Some(10.0));
        assert_eq!(config.voting.votes_required, 3);
        assert_eq!(config.wager.max_loss_factor, 500);
        assert_eq!(config.wager.responder_name, "StreamElements");
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.is_twitch_irc_configured());
    }

    #[test]
    fn nested_tables_override_their_defaults() {
        let config: Config = toml::from_str(
            r#"
            [moderation]
            grace_period_minutes = 5

            [voting]
            votes_required = 7
            double_vote_names = ["Queen"]

            [wager]
            base_stake = 2
            "#,
        )
        .expect("nested config parses");
        assert_eq!(config.moderation.grace_period_minutes, 5);
        assert_eq!(config.voting.votes_required, 7);
        assert_eq!(config.voting.double_vote_names, vec!["Queen"]);
        assert_eq!(config.wager.base_stake, 2);
        // Untouched fields keep their defaults
        assert_eq!(config.voting.vote_period_secs, 60);
        assert_eq!(config.wager.max_loss_factor, 500);
    }
}

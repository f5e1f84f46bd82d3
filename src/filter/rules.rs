use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use log::{info, warn};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("could not read filter config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse filter config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tier key '{key}' is not a base-10 integer")]
    BadTierKey { key: String },
    #[error("tier '{tier}' contains an invalid pattern: {source}")]
    BadPattern {
        tier: String,
        source: regex::Error,
    },
}

/// On-disk shape of the filter configuration file.
#[derive(Debug, Deserialize)]
pub struct RuleSetFile {
    pub name: String,
    #[serde(rename = "flaggedTiers")]
    pub flagged_tiers: BTreeMap<String, Vec<String>>,
    #[serde(rename = "minScore")]
    pub min_score: f64,
    pub multipliers: MultipliersFile,
    pub bot_names: Vec<String>,
    pub options: OptionsFile,
}

#[derive(Debug, Deserialize)]
pub struct MultipliersFile {
    pub follow_time_days_cutoff: i64,
    pub follow_time_multiplier: f64,
    pub first_time_chatter_multiplier: f64,
}

#[derive(Debug, Deserialize)]
pub struct OptionsFile {
    pub silent_ignore_bots: bool,
    pub ignore_channel_staff: bool,
    pub ignore_vip: bool,
    pub ignore_subscriber: bool,
    pub ignore_follower: bool,
}

/// One scoring bucket: the tier key doubles as its weight, so a match set
/// of size n contributes `weight * n` to the message score.
#[derive(Debug)]
pub struct Tier {
    pub weight: u32,
    pub matcher: Regex,
}

/// A validated, compiled filter configuration. Replaced atomically as a
/// whole on reload; never mutated in place.
#[derive(Debug)]
pub struct RuleSet {
    pub name: String,
    pub tiers: Vec<Tier>,
    pub min_score: f64,
    pub follow_time_days_cutoff: i64,
    pub follow_time_multiplier: f64,
    pub first_time_chatter_multiplier: f64,
    pub bot_names: Vec<String>,
    pub silent_ignore_bots: bool,
    pub ignore_channel_staff: bool,
    pub ignore_vip: bool,
    pub ignore_subscriber: bool,
    pub ignore_follower: bool,
}

impl RuleSet {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FilterError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let file: RuleSetFile = serde_json::from_str(&contents)?;
        Self::compile(file)
    }

    /// Validates and compiles the parsed file. Tier keys that are not
    /// base-10 integers are rejected here so a broken config fails at load
    /// time instead of on every message.
    pub fn compile(file: RuleSetFile) -> Result<Self, FilterError> {
        let mut tiers = Vec::new();
        for (key, patterns) in &file.flagged_tiers {
            let weight: u32 = key
                .parse()
                .map_err(|_| FilterError::BadTierKey { key: key.clone() })?;
            if patterns.is_empty() {
                warn!("Skipping tier '{}' with empty pattern list", key);
                continue;
            }
            info!("Tier '{}' containing: {:?}", key, patterns);
            let matcher = Regex::new(&format!("(?i){}", patterns.join("|"))).map_err(|e| {
                FilterError::BadPattern {
                    tier: key.clone(),
                    source: e,
                }
            })?;
            tiers.push(Tier { weight, matcher });
        }

        info!("Min score is {}", file.min_score);
        info!(
            "Loaded follow-time multiplier {} ({} days cutoff)",
            file.multipliers.follow_time_multiplier, file.multipliers.follow_time_days_cutoff
        );
        info!(
            "Loaded first time chatter multiplier {}",
            file.multipliers.first_time_chatter_multiplier
        );
        info!("Loaded {:?} as friendly bots", file.bot_names);
        info!(
            "Loaded ignores: {}|{}|{}|{}|{}",
            file.options.silent_ignore_bots,
            file.options.ignore_channel_staff,
            file.options.ignore_vip,
            file.options.ignore_subscriber,
            file.options.ignore_follower
        );

        Ok(RuleSet {
            name: file.name,
            tiers,
            min_score: file.min_score,
            follow_time_days_cutoff: file.multipliers.follow_time_days_cutoff,
            follow_time_multiplier: file.multipliers.follow_time_multiplier,
            first_time_chatter_multiplier: file.multipliers.first_time_chatter_multiplier,
            bot_names: file.bot_names,
            silent_ignore_bots: file.options.silent_ignore_bots,
            ignore_channel_staff: file.options.ignore_channel_staff,
            ignore_vip: file.options.ignore_vip,
            ignore_subscriber: file.options.ignore_subscriber,
            ignore_follower: file.options.ignore_follower,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<RuleSet, FilterError> {
        let file: RuleSetFile = serde_json::from_str(json).expect("test json is well-formed");
        RuleSet::compile(file)
    }

    #[test]
    fn compiles_tiers_with_numeric_keys() {
        let rules = parse(
            r#"{
                "name": "test",
                "flaggedTiers": {"5": ["spamword", "phishlink"], "10": ["worseword"]},
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
        )
        .expect("config should compile");
        assert_eq!(rules.name, "test");
        assert_eq!(rules.tiers.len(), 2);
        assert!(rules.tiers.iter().any(|t| t.weight == 10));
    }

    #[test]
    fn rejects_non_numeric_tier_key() {
        let err = parse(
            r#"{
                "name": "test",
                "flaggedTiers": {"high": ["spamword"]},
                "minScore": 5,
                "multipliers": {
                    "follow_time_days_cutoff": 7,
                    "follow_time_multiplier": 1,
                    "first_time_chatter_multiplier": 1
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
        )
        .expect_err("non-numeric tier key must fail at load");
        assert!(matches!(err, FilterError::BadTierKey { key } if key == "high"));
    }

    #[test]
    fn skips_empty_tier_but_keeps_the_rest() {
        let rules = parse(
            r#"{
                "name": "test",
                "flaggedTiers": {"2": [], "5": ["spamword"]},
                "minScore": 5,
                "multipliers": {
                    "follow_time_days_cutoff": 7,
                    "follow_time_multiplier": 1,
                    "first_time_chatter_multiplier": 1
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
        )
        .expect("config should compile");
        assert_eq!(rules.tiers.len(), 1);
        assert_eq!(rules.tiers[0].weight, 5);
    }
}

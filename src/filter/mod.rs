pub mod checker;
pub mod rules;

pub use checker::{CheckOutcome, CheckResult, IgnoreReason, MessageChecker};
pub use rules::{FilterError, RuleSet};

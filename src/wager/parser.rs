use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FIRST_INT_RE: Regex = Regex::new(r"\d+").unwrap();
}

/// A classified reply from the external gamble responder.
///
/// Win amounts are positive, loss amounts negative, matching the sign the
/// session applies to the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GambleReply {
    Win(i64),
    WinAllIn(i64),
    Loss(i64),
    LossAllIn(i64),
    OutOfFunds,
    Unrelated,
}

/// Classifies the responder's chat lines.
///
/// The responder announces results as CTCP ACTION lines with fixed
/// preambles addressed to our own name; the first embedded integer is the
/// amount. Anything else, including messages from any other identity, is
/// `Unrelated`.
pub struct ReplyParser {
    responder: String,
    w_preamble: String,
    w_all_preamble: String,
    l_preamble: String,
    l_all_preamble: String,
    broke_marker: String,
}

impl ReplyParser {
    pub fn new(own_name: &str, responder: &str) -> Self {
        ReplyParser {
            responder: responder.to_string(),
            w_preamble: format!("\u{1}ACTION {} won ", own_name),
            w_all_preamble: format!("\u{1}ACTION PogChamp {} went all in and won ", own_name),
            l_preamble: format!("\u{1}ACTION {} gambled ", own_name),
            l_all_preamble: format!(
                "\u{1}ACTION {} went all in and lost every single on of their ",
                own_name
            ),
            broke_marker: format!("@{}, you only have ", own_name),
        }
    }

    pub fn parse(&self, sender: &str, content: &str) -> GambleReply {
        if sender != self.responder {
            return GambleReply::Unrelated;
        }

        if let Some(rest) = content.strip_prefix(&self.w_preamble) {
            match first_int(rest) {
                Some(amount) => GambleReply::Win(amount),
                None => GambleReply::Unrelated,
            }
        } else if let Some(rest) = content.strip_prefix(&self.w_all_preamble) {
            match first_int(rest) {
                Some(amount) => GambleReply::WinAllIn(amount),
                None => GambleReply::Unrelated,
            }
        } else if let Some(rest) = content.strip_prefix(&self.l_preamble) {
            match first_int(rest) {
                Some(amount) => GambleReply::Loss(-amount),
                None => GambleReply::Unrelated,
            }
        } else if let Some(rest) = content.strip_prefix(&self.l_all_preamble) {
            match first_int(rest) {
                Some(amount) => GambleReply::LossAllIn(-amount),
                None => GambleReply::Unrelated,
            }
        } else if content.contains(&self.broke_marker) {
            GambleReply::OutOfFunds
        } else {
            GambleReply::Unrelated
        }
    }
}

fn first_int(s: &str) -> Option<i64> {
    FIRST_INT_RE.find(s)?.as_str().parse().ok()
}

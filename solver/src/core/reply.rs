//! Parsers for structured role replies.
//!
//! Each parser is strict about the fields it needs and lenient about
//! surrounding prose and markdown decoration. All of them return
//! [`ReplyParseError`] instead of panicking.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::core::puzzle::normalize_word;

static GUESS_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<GUESS_FOR_THIS_ROUND>(.*?)<END_GUESS_FOR_THIS_ROUND>")
        .expect("guess block regex should be valid")
});
static UNDERSTANDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<UNDERSTANDING_OF_BOARD>(.*?)<END_UNDERSTANDING_OF_BOARD>")
        .expect("understanding regex should be valid")
});
static AGREEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)agreement to perform the guess\W*(true|false)")
        .expect("agreement regex should be valid")
});
static FEEDBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)feedback for guesser agent\W*(.*)").expect("feedback regex should be valid")
});
static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s*").expect("list marker regex should be valid")
});

/// Reply did not contain the expected structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyParseError(pub String);

impl fmt::Display for ReplyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ReplyParseError {}

fn parse_error(message: impl Into<String>) -> ReplyParseError {
    ReplyParseError(message.into())
}

/// Proposal from the guessing role of the negotiation protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuesserReply {
    pub understanding: Option<String>,
    pub group: Vec<String>,
    pub category: String,
}

/// Verdict from the validating role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorReply {
    pub agrees: bool,
    pub feedback: String,
}

/// Single-shot JSON proposal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapReply {
    #[serde(default)]
    pub reason: String,
    pub words: Vec<String>,
}

/// Reply of the direct strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectReply {
    pub group: Vec<String>,
    pub category: String,
    pub reasoning: Option<String>,
}

/// Parse the guesser's `<GUESS_FOR_THIS_ROUND>` block.
///
/// Expected shape:
/// ```text
/// <UNDERSTANDING_OF_BOARD>...<END_UNDERSTANDING_OF_BOARD>
/// <GUESS_FOR_THIS_ROUND>
/// Group: HAIL, RAIN, SLEET, SNOW
/// Category: WET WEATHER
/// <END_GUESS_FOR_THIS_ROUND>
/// ```
pub fn parse_guesser_reply(text: &str) -> Result<GuesserReply, ReplyParseError> {
    let block = GUESS_BLOCK_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| parse_error("missing <GUESS_FOR_THIS_ROUND> block"))?;
    let group = labeled_value(block, "Group")
        .map(|value| split_words(&value))
        .ok_or_else(|| parse_error("guess block has no 'Group:' line"))?;
    if group.is_empty() {
        return Err(parse_error("guess block lists no words"));
    }
    let category = labeled_value(block, "Category")
        .filter(|value| !value.is_empty())
        .ok_or_else(|| parse_error("guess block has no 'Category:' line"))?;
    let understanding = UNDERSTANDING_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty());
    Ok(GuesserReply {
        understanding,
        group,
        category,
    })
}

/// Parse `Agreement to Perform the Guess: True|False` plus optional feedback.
pub fn parse_validator_reply(text: &str) -> Result<ValidatorReply, ReplyParseError> {
    let agrees = AGREEMENT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().eq_ignore_ascii_case("true"))
        .ok_or_else(|| parse_error("missing 'Agreement to Perform the Guess' verdict"))?;
    let feedback = FEEDBACK_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_matches('*').trim().to_string())
        .unwrap_or_default();
    Ok(ValidatorReply { agrees, feedback })
}

/// Parse the first JSON object in `text` as `{"reason": ..., "words": [...]}`.
pub fn parse_snap_reply(text: &str) -> Result<SnapReply, ReplyParseError> {
    let start = text
        .find('{')
        .ok_or_else(|| parse_error("reply contains no JSON object"))?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| parse_error("reply contains no complete JSON object"))?;
    let mut reply: SnapReply = serde_json::from_str(&text[start..=end])
        .map_err(|err| parse_error(format!("invalid JSON reply: {err}")))?;
    reply.words = reply
        .words
        .iter()
        .map(|word| normalize_word(word))
        .filter(|word| !word.is_empty())
        .collect();
    if reply.words.is_empty() {
        return Err(parse_error("JSON reply lists no words"));
    }
    Ok(reply)
}

/// Parse `Group:`, `Category:` and optional `Reasoning:` lines.
pub fn parse_direct_reply(text: &str) -> Result<DirectReply, ReplyParseError> {
    let group = labeled_value(text, "Group")
        .map(|value| split_words(&value))
        .filter(|group| !group.is_empty())
        .ok_or_else(|| parse_error("reply has no 'Group:' line"))?;
    Ok(DirectReply {
        group,
        category: labeled_value(text, "Category").unwrap_or_default(),
        reasoning: labeled_value(text, "Reasoning").filter(|value| !value.is_empty()),
    })
}

/// Parse a comma-separated word list (listener replies).
///
/// Uses a `Group:` line when present, else the first non-empty line.
pub fn parse_word_list(text: &str) -> Result<Vec<String>, ReplyParseError> {
    let line = labeled_value(text, "Group").or_else(|| {
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    });
    let words = line.map(|line| split_words(&line)).unwrap_or_default();
    if words.is_empty() {
        return Err(parse_error("reply lists no words"));
    }
    Ok(words)
}

/// Parse up to `limit` category descriptions, one per line.
pub fn parse_descriptions(text: &str, limit: usize) -> Result<Vec<String>, ReplyParseError> {
    let descriptions: Vec<String> = text
        .lines()
        .map(|line| LIST_MARKER_RE.replace(line, "").trim().trim_matches('"').trim().to_string())
        .filter(|line| !line.is_empty())
        .take(limit)
        .collect();
    if descriptions.is_empty() {
        return Err(parse_error("reply lists no category descriptions"));
    }
    Ok(descriptions)
}

/// Value after `label:` on the first matching line, markdown emphasis removed.
fn labeled_value(text: &str, label: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let line = line.trim().trim_start_matches(['*', '-', '#', ' ']);
        let head = line.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        let rest = line[label.len()..].trim_start_matches('*').trim_start();
        let value = rest.strip_prefix(':')?;
        Some(value.trim().trim_matches('*').trim().to_string())
    })
}

fn split_words(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|word| word.trim().trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '\'')))
        .map(normalize_word)
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::words;

    #[test]
    fn parses_guesser_reply_with_understanding() {
        let text = "Thinking out loud first.\n\
            <UNDERSTANDING_OF_BOARD>Weather words and teams.<END_UNDERSTANDING_OF_BOARD>\n\
            <GUESS_FOR_THIS_ROUND>\n\
            **Group:** hail, rain, sleet, snow\n\
            Category: WET WEATHER\n\
            <END_GUESS_FOR_THIS_ROUND>";
        let reply = parse_guesser_reply(text).expect("parse");
        assert_eq!(reply.group, words(&["HAIL", "RAIN", "SLEET", "SNOW"]));
        assert_eq!(reply.category, "WET WEATHER");
        assert_eq!(reply.understanding.as_deref(), Some("Weather words and teams."));
    }

    #[test]
    fn guesser_reply_without_block_is_an_error() {
        let err = parse_guesser_reply("Group: HAIL, RAIN, SLEET, SNOW").unwrap_err();
        assert_eq!(err.to_string(), "missing <GUESS_FOR_THIS_ROUND> block");

        let err = parse_guesser_reply(
            "<GUESS_FOR_THIS_ROUND>Group: HAIL, RAIN<END_GUESS_FOR_THIS_ROUND>",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "guess block has no 'Category:' line");
    }

    #[test]
    fn parses_validator_verdicts() {
        let yes = parse_validator_reply(
            "Agreement to Perform the Guess: True\nFeedback for Guesser Agent: Looks right.",
        )
        .expect("parse");
        assert!(yes.agrees);
        assert_eq!(yes.feedback, "Looks right.");

        let no = parse_validator_reply(
            "**Agreement to Perform the Guess:** false\n**Feedback for Guesser Agent:** HEAT is a team.",
        )
        .expect("parse");
        assert!(!no.agrees);
        assert_eq!(no.feedback, "HEAT is a team.");

        assert!(parse_validator_reply("I think so").is_err());
    }

    #[test]
    fn parses_snap_json_inside_prose() {
        let reply = parse_snap_reply(
            "Sure:\n```json\n{\"reason\": \"teams\", \"words\": [\"bucks\", \"heat\", \"jazz\", \"nets\"]}\n```",
        )
        .expect("parse");
        assert_eq!(reply.reason, "teams");
        assert_eq!(reply.words, words(&["BUCKS", "HEAT", "JAZZ", "NETS"]));

        assert!(parse_snap_reply("no json here").is_err());
        assert!(parse_snap_reply("{\"words\": []}").is_err());
    }

    #[test]
    fn parses_direct_reply() {
        let reply = parse_direct_reply(
            "Reasoning: they read the same backwards\nGroup: KAYAK, LEVEL, MOM, RACECAR\nCategory: PALINDROMES",
        )
        .expect("parse");
        assert_eq!(reply.group, words(&["KAYAK", "LEVEL", "MOM", "RACECAR"]));
        assert_eq!(reply.category, "PALINDROMES");
        assert_eq!(
            reply.reasoning.as_deref(),
            Some("they read the same backwards")
        );
    }

    #[test]
    fn parses_listener_lists_and_descriptions() {
        assert_eq!(
            parse_word_list("\n[\"TAB\", \"SHIFT\", OPTION, return]\n").expect("list"),
            words(&["TAB", "SHIFT", "OPTION", "RETURN"])
        );
        assert!(parse_word_list("   \n").is_err());

        let descriptions =
            parse_descriptions("1. Keyboard keys\n- \"Modifier keys\"\n\n3) Keys on a Mac\n", 2)
                .expect("descriptions");
        assert_eq!(descriptions, vec!["Keyboard keys", "Modifier keys"]);
    }
}

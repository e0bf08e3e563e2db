//! Ordered intent rules and command parsers
//!
//! Classification is a fixed priority list of predicates evaluated top to
//! bottom; the first match wins. Parsers here are pure so the policy can be
//! tested without any collaborators.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::{Error, Result};

/// What a command asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Time,
    Date,
    Weather,
    Greeting,
    OpenApp,
    Search,
    Timer,
    Reminder,
    Ask,
}

const GREETINGS: &[&str] = &["hello", "hi", "hey"];

/// Prefixes that start a web search; all are seven bytes long
const SEARCH_PREFIXES: &[&str] = &["search ", "google "];

/// Intent rules in priority order; [`Intent::Ask`] is the fallback
pub const RULES: &[(Intent, fn(&str) -> bool)] = &[
    (Intent::Time, |c| has_word(c, "time")),
    (Intent::Date, |c| has_word(c, "date")),
    (Intent::Weather, |c| has_word(c, "weather")),
    (Intent::Greeting, |c| GREETINGS.iter().any(|g| has_word(c, g))),
    (Intent::OpenApp, |c| c.starts_with("open ")),
    (Intent::Search, |c| SEARCH_PREFIXES.iter().any(|p| c.starts_with(p))),
    (Intent::Timer, |c| c.starts_with("timer")),
    (Intent::Reminder, |c| c.starts_with("remind me")),
];

/// Classify a normalized (lower-cased, trimmed) command
#[must_use]
pub fn classify(command: &str) -> Intent {
    RULES
        .iter()
        .find(|(_, matches)| matches(command))
        .map_or(Intent::Ask, |(intent, _)| *intent)
}

/// Whether `word` appears in `command` as a whole token
fn has_word(command: &str, word: &str) -> bool {
    command
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// Application name from an "open ..." command
#[must_use]
pub fn app_name(command: &str) -> Option<&str> {
    let name = command.get("open ".len()..)?.trim();
    (!name.is_empty()).then_some(name)
}

/// Query from a "search ..." or "google ..." command
#[must_use]
pub fn search_query(command: &str) -> Option<&str> {
    let query = command.get(SEARCH_PREFIXES[0].len()..)?.trim();
    (!query.is_empty()).then_some(query)
}

static TIMER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:minute|min)\b").ok());

static LABEL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:called|named)\s+(.+)$").ok());

/// Default label for unnamed timers
pub const DEFAULT_TIMER_LABEL: &str = "Timer";

/// A parsed "timer ..." command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerRequest {
    pub minutes: u64,
    pub label: String,
}

impl TimerRequest {
    /// Countdown length, or `None` if it does not fit a [`Duration`]
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.minutes.checked_mul(60).map(Duration::from_secs)
    }
}

/// Parse "timer 5 minutes [called tea]"
///
/// Returns `None` when no positive minute count is present.
#[must_use]
pub fn parse_timer(command: &str) -> Option<TimerRequest> {
    let caps = TIMER_RE.as_ref()?.captures(command)?;
    let minutes: u64 = caps.get(1)?.as_str().parse().ok()?;
    if minutes == 0 {
        return None;
    }

    let label = LABEL_RE
        .as_ref()
        .and_then(|re| re.captures(command))
        .and_then(|caps| caps.get(1))
        .map(|m| capitalize(m.as_str().trim()))
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| DEFAULT_TIMER_LABEL.to_string());

    Some(TimerRequest { minutes, label })
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

/// A parsed "remind me ..." command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub message: String,
    pub remind_at: NaiveDateTime,
}

/// Parse "remind me to <message> at <HH:MM>" for `today`
///
/// The last " at " separates message from time, so messages may contain
/// "at" themselves. Times may be 24-hour or carry an am/pm suffix.
///
/// # Errors
///
/// Returns [`Error::Reminder`] if the message is empty or the time is missing
/// or malformed
pub fn parse_reminder(command: &str, today: NaiveDate) -> Result<ReminderRequest> {
    let (left, right) = command
        .rsplit_once(" at ")
        .ok_or_else(|| Error::Reminder("missing \" at <time>\"".to_string()))?;

    let message = left
        .strip_prefix("remind me to")
        .or_else(|| left.strip_prefix("remind me"))
        .unwrap_or(left)
        .trim();
    if message.is_empty() {
        return Err(Error::Reminder("missing reminder message".to_string()));
    }

    let time = parse_clock(right.trim())
        .ok_or_else(|| Error::Reminder(format!("unrecognized time: {}", right.trim())))?;

    Ok(ReminderRequest {
        message: message.to_string(),
        remind_at: today.and_time(time),
    })
}

fn parse_clock(text: &str) -> Option<NaiveTime> {
    let compact = text.replace('.', "");
    ["%H:%M", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&compact, format).ok())
}

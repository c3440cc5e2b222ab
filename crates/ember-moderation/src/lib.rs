//! Keyword and pattern screening for user content, with auto-remediation.
//!
//! Two checks run in order: banned-term containment (case-insensitive
//! substring), then suspicious-pattern regexes. First match wins. Flagged
//! messages are deleted and auto-flagged for the admin queue; flagged
//! moment titles hide the moment instead of deleting it. The pipeline is
//! best-effort: callers invoke it around their writes and treat a pipeline
//! failure as a logged gap, never as a reason to roll the write back.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use ember_db::Database;
use ember_db::error::StoreResult;
use ember_types::api::FlagTarget;

/// Banned terms for chat messages (case-insensitive containment).
const MESSAGE_BANNED_TERMS: &[&str] = &[
    // Profanity
    "fuck", "shit", "bitch", "asshole", "bastard",
    // Sexual content
    "porn", "xxx", "nude",
    // Drugs
    "cocaine", "heroin", "meth", "weed", "marijuana",
    // Violence
    "kill", "murder", "bomb", "terrorist", "weapon",
    // Scams
    "bitcoin", "crypto", "paypal", "venmo", "free money", "get rich",
    // Spam phrases
    "click here", "buy now", "discount", "promo",
];

/// Suspicious patterns for chat messages, checked only when no banned term
/// matched.
static MESSAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(http|https|www)\b",                          // URLs
        r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",                     // phone numbers
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b", // email addresses
        r"\$\d+",                                             // money amounts
        r"(?i)\b(telegram|whatsapp|snapchat|instagram|onlyfans)\b", // external platforms
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static moderation pattern"))
    .collect()
});

/// Banned keywords for moment titles.
const TITLE_BANNED_KEYWORDS: &[&str] = &["drug", "weapon", "illegal", "scam"];

static TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(free\s+money|get\s+rich|click\s+here)\b",
        r"(?i)\b(buy|sell|discount|promo)\b", // commercial spam
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static moderation pattern"))
    .collect()
});

const MESSAGE_BANNED_REASON: &str = "Inappropriate content detected";
const MESSAGE_PATTERN_REASON: &str =
    "Suspicious content detected (URLs, phone numbers, or external platforms)";

/// What the pipeline did to a piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    MessageRemoved { reason: String },
    MomentHidden { reason: String },
}

impl Outcome {
    pub fn flagged_reason(&self) -> Option<&str> {
        match self {
            Outcome::Clean => None,
            Outcome::MessageRemoved { reason } | Outcome::MomentHidden { reason } => Some(reason),
        }
    }
}

/// Classification only: the reason a message would be flagged, if any.
pub fn screen_message(content: &str) -> Option<String> {
    let lower = content.to_lowercase();
    for term in MESSAGE_BANNED_TERMS {
        if lower.contains(term) {
            return Some(MESSAGE_BANNED_REASON.to_string());
        }
    }
    for pattern in MESSAGE_PATTERNS.iter() {
        if pattern.is_match(content) {
            return Some(MESSAGE_PATTERN_REASON.to_string());
        }
    }
    None
}

/// Classification only: the reason a moment title would be flagged, if any.
pub fn screen_title(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    for keyword in TITLE_BANNED_KEYWORDS {
        if lower.contains(keyword) {
            return Some(format!("Banned keyword detected: {keyword}"));
        }
    }
    for pattern in TITLE_PATTERNS.iter() {
        if pattern.is_match(title) {
            return Some("Suspicious pattern detected".to_string());
        }
    }
    None
}

/// Screen a just-sent message; on a match, delete the row and auto-flag it
/// attributed to the acting user. The auto-flag insert is keyed on the flag
/// uniqueness constraint, so a duplicate is a silent no-op.
pub fn moderate_message(
    db: &Database,
    message_id: &str,
    acting_user: &str,
    content: &str,
    now: DateTime<Utc>,
) -> StoreResult<Outcome> {
    let Some(reason) = screen_message(content) else {
        return Ok(Outcome::Clean);
    };

    if db.delete_message(message_id)? {
        info!("Auto-deleted message {}: {}", message_id, reason);
    }
    db.create_flag(acting_user, FlagTarget::Message, message_id, "inappropriate", now)?;

    Ok(Outcome::MessageRemoved { reason })
}

/// Screen a just-created moment title; on a match the moment is hidden, not
/// deleted.
pub fn moderate_moment_title(
    db: &Database,
    moment_id: &str,
    title: &str,
) -> StoreResult<Outcome> {
    let Some(reason) = screen_title(title) else {
        return Ok(Outcome::Clean);
    };

    match db.set_moment_status(moment_id, ember_types::api::MomentStatus::Hidden) {
        Ok(()) => info!("Auto-hidden moment {}: {}", moment_id, reason),
        // Already deleted out from under us; the screen result stands.
        Err(e) => warn!("Failed to hide moment {}: {}", moment_id, e),
    }

    Ok(Outcome::MomentHidden { reason })
}

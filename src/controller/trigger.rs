//! Switchover trigger evaluation
//!
//! A switchover is requested by writing the `trigger-switchover` annotation
//! on the cluster resource. The annotation value is parsed into a typed
//! [`TriggerToken`] so that newer-than comparison is a real comparison, not
//! string ordering over arbitrary time formats.
//!
//! A token fires exactly once: repeats of the same value and values not
//! strictly newer than the last processed one are ignored. This keeps
//! duplicate reconciliation passes from re-triggering a switchover that is
//! mid-flight or already done.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

/// Typed switchover trigger token.
///
/// Accepted forms: an RFC 3339 timestamp, or an unsigned integer sequence
/// number. Tokens of different forms are never comparable; such a request is
/// ignored rather than guessed at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerToken {
    Timestamp(DateTime<Utc>),
    Sequence(u64),
}

impl TriggerToken {
    /// Parse an annotation value into a token.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if let Ok(seq) = value.parse::<u64>() {
            return Some(TriggerToken::Sequence(seq));
        }
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|ts| TriggerToken::Timestamp(ts.with_timezone(&Utc)))
    }

    /// Compare against another token; `None` when the forms differ.
    fn compare(&self, other: &TriggerToken) -> Option<Ordering> {
        match (self, other) {
            (TriggerToken::Timestamp(a), TriggerToken::Timestamp(b)) => Some(a.cmp(b)),
            (TriggerToken::Sequence(a), TriggerToken::Sequence(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Why a trigger observation did not fire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The annotation value parsed as neither a timestamp nor a sequence
    Malformed(String),
    /// The exact token was already processed
    AlreadyProcessed,
    /// The token is older than the last processed one
    NotNewer,
    /// Token form differs from the last processed token's form
    FormMismatch,
}

/// Outcome of evaluating a trigger annotation observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerDecision {
    Fire(TriggerToken),
    Ignore(IgnoreReason),
}

/// Evaluate an observed annotation value against the last processed token.
///
/// `last` is the raw token recorded in `status.last_switchover`; `seen` is
/// the current annotation value. Fires only for a well-formed token strictly
/// newer than `last` (or any well-formed token when nothing was processed
/// before).
pub fn decide(last: Option<&str>, seen: &str) -> TriggerDecision {
    let Some(seen_token) = TriggerToken::parse(seen) else {
        return TriggerDecision::Ignore(IgnoreReason::Malformed(seen.to_string()));
    };

    // A previously recorded token that no longer parses is treated as
    // absent; the status field only ever holds values that parsed once
    let last_token = last.and_then(TriggerToken::parse);

    match last_token {
        None => TriggerDecision::Fire(seen_token),
        Some(last_token) => match seen_token.compare(&last_token) {
            None => TriggerDecision::Ignore(IgnoreReason::FormMismatch),
            Some(Ordering::Greater) => TriggerDecision::Fire(seen_token),
            Some(Ordering::Equal) => TriggerDecision::Ignore(IgnoreReason::AlreadyProcessed),
            Some(Ordering::Less) => TriggerDecision::Ignore(IgnoreReason::NotNewer),
        },
    }
}

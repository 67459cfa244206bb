//! Recipient extraction from notification subjects.
//!
//! Budget notifications are named after the Service Catalog product that
//! raised them, and the product name embeds the owning Synapse user id:
//! `AWS Budgets: service-catalog_3388489 has exceeded your alert threshold`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Literal text that must immediately precede the user id.
pub const RECIPIENT_PREFIX: &str = "service-catalog_";

/// A numeric Synapse user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    /// Wraps a digit string. Returns `None` if `value` is empty or holds
    /// anything other than ASCII digits.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecipientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn recipient_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!("{}([0-9]+)", regex::escape(RECIPIENT_PREFIX)))
            .expect("recipient pattern is a valid regex")
    })
}

/// Returns the first user id embedded in `subject`, if any.
pub fn parse_recipient_id(subject: Option<&str>) -> Option<RecipientId> {
    let subject = subject?;
    recipient_pattern()
        .captures(subject)
        .and_then(|caps| caps.get(1))
        .map(|m| RecipientId(m.as_str().to_string()))
}

//! Sequence prefix parsing
//!
//! A prefix such as `VI-001` names the first document of a batch: a fixed roman
//! numeral token and a counter that advances once per record.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

fn prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Literal pattern, cannot fail to compile
        #[allow(clippy::expect_used)]
        Regex::new(r"^[IVX]+-\d{3}$").expect("prefix pattern is valid")
    })
}

/// Check a prefix without parsing it
///
/// ```
/// use slm_batch::prefix::is_valid_prefix;
///
/// assert!(is_valid_prefix("VI-001"));
/// assert!(!is_valid_prefix("VI_001"));
/// ```
pub fn is_valid_prefix(input: &str) -> bool {
    prefix_pattern().is_match(input)
}

/// Parsed `{RomanNumeral}-{NNN}` identifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SequencePrefix {
    roman: String,
    start: u32,
}

impl SequencePrefix {
    /// Roman numeral token, kept verbatim
    pub fn roman(&self) -> &str {
        &self.roman
    }

    /// First sequence number of the batch
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Counter positioned at the first sequence number
    pub fn counter(&self) -> SequenceCounter {
        SequenceCounter { next: self.start }
    }

    /// Archive-safe form, `-` replaced by `_` (e.g. `VI_001`)
    pub fn archive_stem(&self) -> String {
        format!("{}_{:03}", self.roman, self.start)
    }
}

impl FromStr for SequencePrefix {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        if !is_valid_prefix(input) {
            return Err(Error::InvalidPrefix(input.to_string()));
        }

        let (roman, digits) = input
            .split_once('-')
            .ok_or_else(|| Error::InvalidPrefix(input.to_string()))?;
        let start = digits
            .parse::<u32>()
            .map_err(|_| Error::InvalidPrefix(input.to_string()))?;

        Ok(Self {
            roman: roman.to_string(),
            start,
        })
    }
}

impl TryFrom<String> for SequencePrefix {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SequencePrefix> for String {
    fn from(prefix: SequencePrefix) -> Self {
        prefix.to_string()
    }
}

impl std::fmt::Display for SequencePrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:03}", self.roman, self.start)
    }
}

/// Monotonic per-record sequence
#[derive(Debug)]
pub struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    /// Current value, then advance by one
    pub fn advance(&mut self) -> u32 {
        let current = self.next;
        self.next = self.next.saturating_add(1);
        current
    }

    /// Value the next call to [`advance`](Self::advance) returns
    pub fn peek(&self) -> u32 {
        self.next
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_prefixes() {
        for input in ["VI-001", "I-000", "XII-999", "IVX-123"] {
            assert!(is_valid_prefix(input), "{input} should be valid");
            assert!(input.parse::<SequencePrefix>().is_ok());
        }
    }

    #[test]
    fn rejects_malformed_prefixes() {
        for input in [
            "6-001", "VI_001", "VI-01", "VI-0001", "vi-001", "VI-001 ", "", "-001", "VI-",
        ] {
            assert!(!is_valid_prefix(input), "{input:?} should be invalid");
            match input.parse::<SequencePrefix>() {
                Err(Error::InvalidPrefix(got)) => assert_eq!(got, input),
                other => panic!("expected InvalidPrefix for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn decomposes_roman_and_counter() {
        let prefix: SequencePrefix = "XI-042".parse().unwrap();
        assert_eq!(prefix.roman(), "XI");
        assert_eq!(prefix.start(), 42);
        assert_eq!(prefix.to_string(), "XI-042");
        assert_eq!(prefix.archive_stem(), "XI_042");
    }

    #[test]
    fn counter_advances_by_one() {
        let prefix: SequencePrefix = "VI-998".parse().unwrap();
        let mut counter = prefix.counter();
        assert_eq!(counter.advance(), 998);
        assert_eq!(counter.advance(), 999);
        assert_eq!(counter.peek(), 1000);
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: SequencePrefix = serde_json::from_str(r#""VI-007""#).unwrap();
        assert_eq!(ok.start(), 7);
        assert!(serde_json::from_str::<SequencePrefix>(r#""VI-7""#).is_err());
    }
}

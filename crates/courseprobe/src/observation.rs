//! Point-in-time observations of page state.
//!
//! Percentages are plain `i32` values with [`UNKNOWN_PERCENT`] as the sentinel
//! for "unknown/unavailable", which is distinct from a valid `0`. Every
//! extraction here is total: malformed input degrades to the sentinel.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Sentinel percentage meaning "could not be observed"
pub const UNKNOWN_PERCENT: i32 = -1;

/// A normalized observation produced by the condition evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Observation {
    /// Integer percentage, possibly [`UNKNOWN_PERCENT`]
    Percent(i32),
    /// Boolean probe result
    Flag(bool),
    /// Scraped text
    Text(String),
    /// Number of matches (elements, windows)
    Count(usize),
    /// Nothing could be observed
    Missing,
}

impl Observation {
    /// Whether this observation is a known percentage
    #[must_use]
    pub const fn is_known_percent(&self) -> bool {
        matches!(self, Self::Percent(p) if *p != UNKNOWN_PERCENT)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(UNKNOWN_PERCENT) => write!(f, "unknown%"),
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Text(t) => {
                let mut shown: String = t.chars().take(80).collect();
                if t.chars().count() > 80 {
                    shown.push('…');
                }
                write!(f, "{shown:?}")
            }
            Self::Count(n) => write!(f, "{n} match(es)"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// Strip every non-digit character and parse what remains.
///
/// `"45% complete"` yields `45`; text with no digits, or digits that overflow
/// `i32`, yields [`UNKNOWN_PERCENT`].
#[must_use]
pub fn digits_only_percent(text: &str) -> i32 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return UNKNOWN_PERCENT;
    }
    digits.parse().unwrap_or(UNKNOWN_PERCENT)
}

/// Whether label text is usable as-is (non-empty and carries a percent sign)
#[must_use]
pub fn looks_like_percent_label(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.contains('%')
}

fn bar_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)%").ok()).as_ref()
}

fn complete_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)%?\s*complete").ok())
        .as_ref()
}

fn any_number_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").ok()).as_ref()
}

fn first_capture(re: Option<&Regex>, text: &str) -> Option<i32> {
    re?.captures(text)?.get(1)?.as_str().parse().ok()
}

/// First `N%` in progress-bar text, or [`UNKNOWN_PERCENT`]
#[must_use]
pub fn bar_text_percent(text: &str) -> i32 {
    first_capture(bar_regex(), text).unwrap_or(UNKNOWN_PERCENT)
}

/// Percentage from combined page text.
///
/// Prefers the first `N% complete` / `N complete` phrase (case-insensitive),
/// then the first bare number, then [`UNKNOWN_PERCENT`].
#[must_use]
pub fn complete_phrase_percent(text: &str) -> i32 {
    first_capture(complete_regex(), text)
        .or_else(|| first_capture(any_number_regex(), text))
        .unwrap_or(UNKNOWN_PERCENT)
}

/// Token used for text-containment checkpoints, e.g. `75%`
#[must_use]
pub fn percent_token(percent: u8) -> String {
    format!("{percent}%")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod digits_only_tests {
        use super::*;

        #[test]
        fn test_label_with_percent() {
            assert_eq!(digits_only_percent("45% complete"), 45);
        }

        #[test]
        fn test_zero_is_not_sentinel() {
            assert_eq!(digits_only_percent("0% complete"), 0);
            assert_ne!(digits_only_percent("0%"), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_no_digits_is_sentinel() {
            assert_eq!(digits_only_percent("complete"), UNKNOWN_PERCENT);
            assert_eq!(digits_only_percent(""), UNKNOWN_PERCENT);
            assert_eq!(digits_only_percent("%"), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_overflow_is_sentinel() {
            assert_eq!(digits_only_percent("99999999999999%"), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_whitespace_and_noise_stripped() {
            assert_eq!(digits_only_percent("  1 0 0 %  "), 100);
        }
    }

    mod label_tests {
        use super::*;

        #[test]
        fn test_usable_label() {
            assert!(looks_like_percent_label(" 33% complete "));
            assert!(!looks_like_percent_label("   "));
            assert!(!looks_like_percent_label("complete"));
        }
    }

    mod regex_tests {
        use super::*;

        #[test]
        fn test_bar_text_percent() {
            assert_eq!(bar_text_percent("Progress 91% complete"), 91);
            assert_eq!(bar_text_percent("Step 2: 34% complete"), 34);
            assert_eq!(bar_text_percent("complete"), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_complete_phrase_preferred() {
            let text = "Module 2 of 6\nProgress\n83% Complete";
            assert_eq!(complete_phrase_percent(text), 83);
        }

        #[test]
        fn test_complete_without_percent_sign() {
            assert_eq!(complete_phrase_percent("75 complete"), 75);
        }

        #[test]
        fn test_falls_back_to_first_number() {
            assert_eq!(complete_phrase_percent("Question 4"), 4);
            assert_eq!(complete_phrase_percent("no numbers"), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_percent_token() {
            assert_eq!(percent_token(75), "75%");
        }
    }

    mod observation_tests {
        use super::*;

        #[test]
        fn test_display() {
            assert_eq!(Observation::Percent(33).to_string(), "33%");
            assert_eq!(Observation::Percent(UNKNOWN_PERCENT).to_string(), "unknown%");
            assert_eq!(Observation::Flag(true).to_string(), "true");
            assert_eq!(Observation::Count(2).to_string(), "2 match(es)");
        }

        #[test]
        fn test_long_text_truncated() {
            let long = "x".repeat(200);
            let shown = Observation::Text(long).to_string();
            assert!(shown.chars().count() < 100);
        }

        #[test]
        fn test_known_percent() {
            assert!(Observation::Percent(0).is_known_percent());
            assert!(!Observation::Percent(UNKNOWN_PERCENT).is_known_percent());
            assert!(!Observation::Flag(true).is_known_percent());
        }

        #[test]
        fn test_serde_shape() {
            let json = serde_json::to_string(&Observation::Percent(75)).unwrap();
            assert_eq!(json, r#"{"kind":"percent","value":75}"#);
        }
    }

    proptest! {
        #[test]
        fn prop_well_formed_percent_text_extracts_value(n in 0u32..=100, suffix in "( complete)?") {
            let text = format!("{n}%{suffix}");
            prop_assert_eq!(digits_only_percent(&text), n as i32);
            prop_assert_eq!(bar_text_percent(&text), n as i32);
        }

        #[test]
        fn prop_text_without_digits_is_sentinel(text in "[^0-9]*") {
            prop_assert_eq!(digits_only_percent(&text), UNKNOWN_PERCENT);
        }

        #[test]
        fn prop_extraction_never_below_sentinel(text in ".*") {
            prop_assert!(digits_only_percent(&text) >= UNKNOWN_PERCENT);
            prop_assert!(complete_phrase_percent(&text) >= UNKNOWN_PERCENT);
        }
    }
}

//! Input validation shared by the chat flow and the console.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// "+" followed by digits only, at least 11 characters in total.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d{10,}$").unwrap());

pub fn is_valid_phone(input: &str) -> bool {
    PHONE_PATTERN.is_match(input.trim())
}

/// Strict `YYYY-MM-DD`.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    // chrono accepts unpadded fields like "2024-1-5"; the stored format does not
    if input.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

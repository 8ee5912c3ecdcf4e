use regex::Regex;
use std::sync::OnceLock;

use super::engine::OcrSymbol;

/// A keypad label is exactly one ASCII digit once whitespace is trimmed.
const DIGIT_PATTERN: &str = r"^[0-9]$";

fn digit_regex() -> &'static Regex {
    static DIGIT: OnceLock<Regex> = OnceLock::new();
    DIGIT.get_or_init(|| Regex::new(DIGIT_PATTERN).expect("digit pattern is a valid regex"))
}

/// Returns the digit a key shows, or `None` for empty, multi-character or
/// non-numeric text (delete/clear keys, noise).
pub fn parse_digit(text: &str) -> Option<char> {
    let trimmed = text.trim();
    if digit_regex().is_match(trimmed) {
        trimmed.chars().next()
    } else {
        None
    }
}

/// Finds the first symbol whose text is exactly `digit`.
pub fn find_symbol(symbols: &[OcrSymbol], digit: char) -> Option<&OcrSymbol> {
    symbols.iter().find(|s| {
        let mut chars = s.text.chars();
        chars.next() == Some(digit) && chars.next().is_none()
    })
}

/// Concatenates all symbol texts, for logging what the engine saw.
pub fn symbols_text(symbols: &[OcrSymbol]) -> String {
    symbols.iter().map(|s| s.text.as_str()).collect()
}

//! Typed errors surfaced by PIN entry.
//!
//! Structural failures (too few keys, unresolvable digits, host or OCR
//! failures) propagate to the caller as [`KeypadError`]. Soft per-digit
//! misses never become errors; they only show up in the log.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeypadError {
    /// The keypad exposes fewer keys than a numeric keypad must have.
    #[error("keypad exposes {found} keys, at least {required} required")]
    InsufficientKeys { found: usize, required: usize },

    /// A digit could not be located on the keypad after every attempt.
    #[error("digit '{digit}' not found on keypad after {attempts} attempt(s)")]
    DigitNotFound { digit: char, attempts: u32 },

    /// OCR read the same digit on several keys and the duplicate policy
    /// refuses to pick one.
    #[error("digit '{digit}' recognized on several keys (ordinals {ordinals:?})")]
    AmbiguousDigit { digit: char, ordinals: Vec<usize> },

    /// The browser-automation host failed (missing frame or keypad,
    /// protocol error, visibility timeout).
    #[error("browser host error: {0:#}")]
    Host(#[source] anyhow::Error),

    /// The OCR engine could not be acquired or failed while recognizing.
    #[error("OCR engine error: {0:#}")]
    Ocr(#[source] anyhow::Error),
}

pub type KeypadResult<T> = std::result::Result<T, KeypadError>;

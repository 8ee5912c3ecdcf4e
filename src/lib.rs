//! OCR-driven PIN entry on randomized secure keypads.
//!
//! Payment pages shuffle their on-screen keypad on every render. This crate
//! reads the current layout with OCR and clicks the PIN digits through a
//! browser automation host.
//!
//! - [`keypad`]: enumeration, recognition, playback and the entry strategies
//! - [`ocr`]: preprocessing, the engine abstraction and the Tesseract backend
//! - [`browser`]: the host trait and a blocking WebDriver client
//! - [`config`], [`diagnostics`], [`logging`], [`paths`]: binary support

pub mod browser;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod keypad;
pub mod logging;
pub mod ocr;
pub mod paths;

#[cfg(test)]
mod testing;

pub use error::{KeypadError, KeypadResult};

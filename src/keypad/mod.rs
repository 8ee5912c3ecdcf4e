//! PIN entry on randomized secure keypads.
//!
//! Three strategies share the [`PinEntry`] trait:
//! - `key-handle`: enumerate keys, OCR each key, click by handle
//! - `frame-region`: OCR the whole keypad, click by coordinate
//! - `labeled`: look keys up by accessible label, no OCR

pub mod enumerate;
pub mod frame_region;
pub mod labeled;
pub mod pin;
pub mod player;
pub mod recognize;

pub use enumerate::{enumerate_keys, MIN_KEYS};
pub use frame_region::{FrameRegionOptions, FrameRegionStrategy};
pub use labeled::{LabeledOptions, LabeledStrategy};
pub use pin::PinSequence;
pub use player::{play_pin, Pacing};
pub use recognize::{recognize_digits, DigitMap, DuplicatePolicy};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::browser::{KeypadHost, KeypadLocator};
use crate::config::KeypadConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{KeypadError, KeypadResult};
use crate::ocr::{EngineGuard, KeyPreprocess, OcrProvider};

/// Outcome of one PIN entry, by PIN position (never by digit).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayReport {
    pub entered: Vec<usize>,
    pub skipped: Vec<usize>,
}

impl PlayReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// A way of entering a PIN on a keypad.
pub trait PinEntry {
    fn name(&self) -> &'static str;

    fn enter_pin(
        &self,
        host: &mut dyn KeypadHost,
        keypad: &KeypadLocator,
        pin: &PinSequence,
    ) -> KeypadResult<PlayReport>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    KeyHandle,
    FrameRegion,
    Labeled,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::KeyHandle => "key-handle",
            StrategyKind::FrameRegion => "frame-region",
            StrategyKind::Labeled => "labeled",
        })
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key-handle" => Ok(StrategyKind::KeyHandle),
            "frame-region" => Ok(StrategyKind::FrameRegion),
            "labeled" => Ok(StrategyKind::Labeled),
            other => Err(anyhow::anyhow!(
                "unknown strategy '{}' (expected key-handle, frame-region or labeled)",
                other
            )),
        }
    }
}

/// Builds the configured strategy along with the locator it drives.
pub fn build_strategy<'a>(
    kind: StrategyKind,
    config: &KeypadConfig,
    ocr: &'a dyn OcrProvider,
    diagnostics: Diagnostics,
) -> (Box<dyn PinEntry + 'a>, KeypadLocator) {
    let strategy: Box<dyn PinEntry + 'a> = match kind {
        StrategyKind::KeyHandle => Box::new(KeyHandleStrategy::new(
            ocr,
            config.key_handle.clone(),
            diagnostics,
        )),
        StrategyKind::FrameRegion => Box::new(FrameRegionStrategy::new(
            ocr,
            config.frame_region.clone(),
            diagnostics,
        )),
        StrategyKind::Labeled => Box::new(LabeledStrategy::new(config.labeled.clone())),
    };
    let selector = match kind {
        StrategyKind::KeyHandle => &config.keypad.keys,
        StrategyKind::FrameRegion => &config.keypad.region,
        StrategyKind::Labeled => &config.keypad.labeled_keys,
    };
    let frame = match kind {
        StrategyKind::Labeled => config.labeled.frame.as_ref(),
        _ => None,
    }
    .or(config.keypad.frame.as_ref());

    let locator = KeypadLocator {
        frame: frame.cloned(),
        selector: selector.clone(),
    };
    (strategy, locator)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyHandleOptions {
    /// Keys the keypad must expose before recognition starts
    pub min_keys: usize,
    pub preprocess: KeyPreprocess,
    pub pacing: Pacing,
    pub duplicates: DuplicatePolicy,
}

impl Default for KeyHandleOptions {
    fn default() -> Self {
        Self {
            min_keys: MIN_KEYS,
            preprocess: KeyPreprocess::default(),
            pacing: Pacing::default(),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

/// Enumerate, recognize every key once, then play the PIN over the map.
pub struct KeyHandleStrategy<'a> {
    ocr: &'a dyn OcrProvider,
    options: KeyHandleOptions,
    diagnostics: Diagnostics,
}

impl<'a> KeyHandleStrategy<'a> {
    pub fn new(ocr: &'a dyn OcrProvider, options: KeyHandleOptions, diagnostics: Diagnostics) -> Self {
        Self {
            ocr,
            options,
            diagnostics,
        }
    }
}

impl PinEntry for KeyHandleStrategy<'_> {
    fn name(&self) -> &'static str {
        "key-handle"
    }

    fn enter_pin(
        &self,
        host: &mut dyn KeypadHost,
        keypad: &KeypadLocator,
        pin: &PinSequence,
    ) -> KeypadResult<PlayReport> {
        info!(pin = %pin, %keypad, "Entering PIN by key OCR");

        let keys = enumerate_keys(host, keypad, self.options.min_keys)?;

        let map = {
            let mut engine = EngineGuard::acquire(self.ocr).map_err(KeypadError::Ocr)?;
            recognize_digits(
                host,
                &mut *engine,
                &keys,
                &self.options.preprocess,
                self.options.duplicates,
                &self.diagnostics,
            )?
        };

        if map.is_empty() {
            warn!(keys = keys.len(), "No key was read as a digit");
        }

        let report = play_pin(host, pin, &map, &self.options.pacing, &mut rand::thread_rng())?;
        info!(
            entered = report.entered.len(),
            skipped = report.skipped.len(),
            "PIN entry complete"
        );
        Ok(report)
    }
}

//! Whole-keypad OCR: one screenshot, character boxes, coordinate clicks.
//!
//! Per digit the player loops Capture → Preprocess → Recognize → Match, and
//! retries with a full recapture until `retry_count` attempts are spent.
//! An unresolved digit fails the whole entry since there is no other way to
//! find its location.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::pin::PinSequence;
use super::{PinEntry, PlayReport};
use crate::browser::{ClickEvent, KeypadHost, KeypadLocator, PagePoint, PageRect};
use crate::diagnostics::Diagnostics;
use crate::error::{KeypadError, KeypadResult};
use crate::ocr::extract::symbols_text;
use crate::ocr::{find_symbol, prepare_region_image, EngineGuard, OcrProvider, OcrSymbol, RegionPreprocess};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameRegionOptions {
    /// Delay between resolved digits (milliseconds)
    pub delay_ms: u64,
    /// Capture attempts per digit
    pub retry_count: u32,
    /// Wait before recapturing after a miss (milliseconds)
    pub retry_backoff_ms: u64,
    /// Maximum wait for the keypad region to become visible (milliseconds)
    pub visible_timeout_ms: u64,
    pub preprocess: RegionPreprocess,
}

impl Default for FrameRegionOptions {
    fn default() -> Self {
        Self {
            delay_ms: 300,
            retry_count: 3,
            retry_backoff_ms: 500,
            visible_timeout_ms: 10_000,
            preprocess: RegionPreprocess::default(),
        }
    }
}

pub struct FrameRegionStrategy<'a> {
    ocr: &'a dyn OcrProvider,
    options: FrameRegionOptions,
    diagnostics: Diagnostics,
}

impl<'a> FrameRegionStrategy<'a> {
    pub fn new(ocr: &'a dyn OcrProvider, options: FrameRegionOptions, diagnostics: Diagnostics) -> Self {
        Self {
            ocr,
            options,
            diagnostics,
        }
    }

    /// Captures and recognizes until `digit` is found; returns its page coordinate.
    fn locate_digit(
        &self,
        host: &mut dyn KeypadHost,
        engine: &mut EngineGuard,
        keypad: &KeypadLocator,
        bounds: &PageRect,
        position: usize,
        digit: char,
    ) -> KeypadResult<Option<PagePoint>> {
        let attempts = self.options.retry_count;

        for attempt in 0..attempts {
            let raw = host.capture_region(keypad).map_err(KeypadError::Host)?;
            self.diagnostics
                .save_rgba(&format!("region_raw_{}_{}", position, attempt), &raw);

            let prepared = prepare_region_image(&raw, &self.options.preprocess);
            self.diagnostics
                .save_gray(&format!("region_processed_{}_{}", position, attempt), &prepared);

            let symbols = engine.recognize_symbols(&prepared).map_err(KeypadError::Ocr)?;
            if attempt == 0 {
                debug!(
                    recognized = %symbols_text(&symbols),
                    count = symbols.len(),
                    "Keypad symbols"
                );
            }

            if let Some(hit) = find_symbol(&symbols, digit) {
                return Ok(Some(click_point(hit, bounds, raw.dimensions())));
            }

            warn!(
                position = position + 1,
                attempt = attempt + 1,
                attempts,
                "Digit not recognized on keypad"
            );
            if attempt + 1 < attempts {
                host.pause(Duration::from_millis(self.options.retry_backoff_ms));
            }
        }

        Ok(None)
    }
}

/// Page coordinate of a symbol's box centre.
pub fn click_point(symbol: &OcrSymbol, bounds: &PageRect, image_size: (u32, u32)) -> PagePoint {
    let (cx, cy) = symbol.bbox.center();
    bounds.image_to_page(cx, cy, image_size)
}

impl PinEntry for FrameRegionStrategy<'_> {
    fn name(&self) -> &'static str {
        "frame-region"
    }

    fn enter_pin(
        &self,
        host: &mut dyn KeypadHost,
        keypad: &KeypadLocator,
        pin: &PinSequence,
    ) -> KeypadResult<PlayReport> {
        info!(pin = %pin, %keypad, "Entering PIN by keypad OCR");

        // Released on every return below, including errors.
        let mut engine = EngineGuard::acquire(self.ocr).map_err(KeypadError::Ocr)?;

        host.wait_visible(keypad, Duration::from_millis(self.options.visible_timeout_ms))
            .map_err(KeypadError::Host)?;
        let bounds = host.region_bounds(keypad).map_err(KeypadError::Host)?;

        let mut report = PlayReport::default();
        let total = pin.len();

        for (i, digit) in pin.digits().enumerate() {
            let Some(point) = self.locate_digit(host, &mut engine, keypad, &bounds, i, digit)?
            else {
                return Err(KeypadError::DigitNotFound {
                    digit,
                    attempts: self.options.retry_count,
                });
            };

            host.activate(&ClickEvent::Point(point))
                .map_err(KeypadError::Host)?;
            info!(position = i + 1, total, x = point.x, y = point.y, "Digit clicked");
            report.entered.push(i);

            if i + 1 < total {
                host.pause(Duration::from_millis(self.options.delay_ms));
            }
        }

        info!("PIN entry complete");
        Ok(report)
    }
}

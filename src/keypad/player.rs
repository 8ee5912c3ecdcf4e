//! PIN playback over a digit map, with randomized pacing.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use super::pin::PinSequence;
use super::recognize::DigitMap;
use super::PlayReport;
use crate::browser::{ClickEvent, KeypadHost};
use crate::error::{KeypadError, KeypadResult};

/// Uniform delay window between key presses (milliseconds, inclusive).
///
/// Secure keypads drop input that arrives too fast or at a fixed cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min_delay_ms: 200,
            max_delay_ms: 400,
        }
    }
}

impl Pacing {
    pub fn next_delay(&self, rng: &mut impl Rng) -> Duration {
        let (lo, hi) = if self.min_delay_ms <= self.max_delay_ms {
            (self.min_delay_ms, self.max_delay_ms)
        } else {
            (self.max_delay_ms, self.min_delay_ms)
        };
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

/// Clicks each PIN digit's key in order, best-effort.
///
/// A digit missing from the map is logged and skipped; the remaining digits
/// are still entered and the call returns normally. Whether the PIN was
/// accepted is for the caller to verify.
pub fn play_pin(
    host: &mut dyn KeypadHost,
    pin: &PinSequence,
    map: &DigitMap,
    pacing: &Pacing,
    rng: &mut impl Rng,
) -> KeypadResult<PlayReport> {
    let mut report = PlayReport::default();
    let total = pin.len();

    for (i, digit) in pin.digits().enumerate() {
        let Some(key) = map.get(digit) else {
            error!(position = i + 1, total, "Digit not found on keypad, skipping");
            report.skipped.push(i);
            continue;
        };

        host.activate(&ClickEvent::Key(key.clone()))
            .map_err(KeypadError::Host)?;
        info!(position = i + 1, total, key = key.ordinal, "Key clicked");
        report.entered.push(i);

        host.pause(pacing.next_delay(rng));
    }

    Ok(report)
}

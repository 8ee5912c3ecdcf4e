//! Keypads that publish each key's digit as an accessible label.
//!
//! No OCR involved: the key is looked up by label for every digit. These
//! keypads usually live in their own frame, which is clicked once first so it
//! takes focus.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::pin::PinSequence;
use super::{PinEntry, PlayReport};
use crate::browser::{ClickEvent, KeypadHost, KeypadLocator};
use crate::error::{KeypadError, KeypadResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabeledOptions {
    /// Delay after each key press (milliseconds)
    pub delay_ms: u64,
    /// Frame hosting the labeled keypad; `null` uses `keypad.frame`
    pub frame: Option<String>,
    /// Click the frame element before the first key
    pub activate_frame: bool,
    /// Wait after the frame click (milliseconds)
    pub activate_delay_ms: u64,
}

impl Default for LabeledOptions {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            frame: Some(r#"iframe[src*="qpay-api.kcp.co.kr"]"#.to_string()),
            activate_frame: true,
            activate_delay_ms: 3000,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LabeledStrategy {
    options: LabeledOptions,
}

impl LabeledStrategy {
    pub fn new(options: LabeledOptions) -> Self {
        Self { options }
    }
}

impl PinEntry for LabeledStrategy {
    fn name(&self) -> &'static str {
        "labeled"
    }

    fn enter_pin(
        &self,
        host: &mut dyn KeypadHost,
        keypad: &KeypadLocator,
        pin: &PinSequence,
    ) -> KeypadResult<PlayReport> {
        info!(pin = %pin, %keypad, "Entering PIN by key labels");

        if let (true, Some(frame)) = (self.options.activate_frame, &keypad.frame) {
            host.activate(&ClickEvent::Frame(frame.clone()))
                .map_err(KeypadError::Host)?;
            debug!(%frame, "Keypad frame clicked");
            host.pause(Duration::from_millis(self.options.activate_delay_ms));
        }

        let mut report = PlayReport::default();
        let total = pin.len();
        let mut label = [0u8; 4];

        for (i, digit) in pin.digits().enumerate() {
            let found = host
                .find_labeled_key(keypad, digit.encode_utf8(&mut label))
                .map_err(KeypadError::Host)?;

            let Some(key) = found else {
                warn!(position = i + 1, total, "No key carries this label, skipping");
                report.skipped.push(i);
                continue;
            };

            host.activate(&ClickEvent::Key(key))
                .map_err(KeypadError::Host)?;
            info!(position = i + 1, total, "Key clicked");
            report.entered.push(i);

            host.pause(Duration::from_millis(self.options.delay_ms));
        }

        Ok(report)
    }
}

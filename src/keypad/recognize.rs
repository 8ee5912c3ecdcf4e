//! Digit recognition: key screenshots → digit-to-key map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::browser::{KeyHandle, KeypadHost};
use crate::diagnostics::Diagnostics;
use crate::error::{KeypadError, KeypadResult};
use crate::ocr::{parse_digit, prepare_key_image, KeyPreprocess, OcrEngine};

/// How to resolve two keys that OCR read as the same digit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The later-enumerated key replaces the earlier one
    #[default]
    LastWins,
    /// Keep the key with the highest OCR confidence (later key on ties)
    HighestConfidence,
    /// Fail with [`KeypadError::AmbiguousDigit`]
    Reject,
}

/// A key mapped to a digit, with the confidence it was recognized at.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedKey {
    pub key: KeyHandle,
    pub confidence: f32,
}

/// Digit → key mapping for one rendering of the keypad.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DigitMap {
    entries: BTreeMap<char, MappedKey>,
}

impl DigitMap {
    pub fn get(&self, digit: char) -> Option<&KeyHandle> {
        self.entries.get(&digit).map(|m| &m.key)
    }

    pub fn insert(&mut self, digit: char, key: KeyHandle, confidence: f32) {
        self.entries.insert(digit, MappedKey { key, confidence });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn digits(&self) -> String {
        self.entries.keys().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &MappedKey)> {
        self.entries.iter().map(|(d, m)| (*d, m))
    }
}

/// Screenshots and recognizes every key, once each, in enumeration order.
///
/// Keys whose text is not a single digit are skipped with a warning.
/// Capture and engine failures abort the whole pass.
pub fn recognize_digits(
    host: &mut dyn KeypadHost,
    engine: &mut dyn OcrEngine,
    keys: &[KeyHandle],
    settings: &KeyPreprocess,
    policy: DuplicatePolicy,
    diagnostics: &Diagnostics,
) -> KeypadResult<DigitMap> {
    let mut candidates: BTreeMap<char, Vec<MappedKey>> = BTreeMap::new();

    for key in keys {
        let raw = host.capture_key(key).map_err(KeypadError::Host)?;
        diagnostics.save_rgba(&format!("key_raw_{}", key.ordinal), &raw);

        let prepared = prepare_key_image(&raw, settings);
        diagnostics.save_gray(&format!("key_processed_{}", key.ordinal), &prepared);

        let recognition = engine.recognize_text(&prepared).map_err(KeypadError::Ocr)?;
        info!(
            key = key.ordinal,
            text = %recognition.text.trim(),
            confidence = f64::from(recognition.confidence),
            "Key recognized"
        );

        match parse_digit(&recognition.text) {
            Some(digit) => candidates.entry(digit).or_default().push(MappedKey {
                key: key.clone(),
                confidence: recognition.confidence,
            }),
            None => warn!(
                key = key.ordinal,
                text = ?recognition.text,
                "Key is not a single digit, skipping"
            ),
        }
    }

    let mut map = DigitMap::default();
    for (digit, mut found) in candidates {
        if found.len() > 1 {
            let ordinals: Vec<usize> = found.iter().map(|m| m.key.ordinal).collect();
            warn!(%digit, ?ordinals, ?policy, "Digit recognized on several keys");
            if policy == DuplicatePolicy::Reject {
                return Err(KeypadError::AmbiguousDigit { digit, ordinals });
            }
        }

        let chosen = match policy {
            DuplicatePolicy::HighestConfidence => found
                .into_iter()
                .reduce(|best, m| if m.confidence >= best.confidence { m } else { best }),
            DuplicatePolicy::LastWins | DuplicatePolicy::Reject => found.pop(),
        };
        if let Some(m) = chosen {
            map.insert(digit, m.key, m.confidence);
        }
    }

    info!(digits = %map.digits(), count = map.len(), "Digit map built");
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::KeypadLocator;
    use crate::keypad::enumerate::{enumerate_keys, MIN_KEYS};
    use crate::testing::{MockHost, ScriptedOcr};
    use crate::ocr::EngineGuard;

    fn recognize(
        host: &mut MockHost,
        ocr: &ScriptedOcr,
        policy: DuplicatePolicy,
    ) -> KeypadResult<DigitMap> {
        let keys = enumerate_keys(host, &KeypadLocator::new(".key"), MIN_KEYS)?;
        let mut engine = EngineGuard::acquire(ocr).map_err(KeypadError::Ocr)?;
        recognize_digits(
            host,
            &mut *engine,
            &keys,
            &KeyPreprocess::default(),
            policy,
            &Diagnostics::disabled(),
        )
    }

    #[test]
    fn test_ten_unique_digits_map_to_distinct_keys() {
        let mut host = MockHost::with_keys(10);
        let ocr = ScriptedOcr::new();
        for label in ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"] {
            ocr.push_text(label, 90.0);
        }

        let map = recognize(&mut host, &ocr, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(map.len(), 10);
        assert_eq!(map.digits(), "0123456789");
        assert_eq!(map.get('1').unwrap().ordinal, 0);
        assert_eq!(map.get('0').unwrap().ordinal, 9);

        let mut ordinals: Vec<usize> = map.iter().map(|(_, m)| m.key.ordinal).collect();
        ordinals.sort_unstable();
        ordinals.dedup();
        assert_eq!(ordinals.len(), 10);
        assert_eq!(host.key_captures, 10);
    }

    #[test]
    fn test_non_digit_keys_are_skipped() {
        let mut host = MockHost::with_keys(12);
        let ocr = ScriptedOcr::new();
        for label in ["1", "2", "3", "4", "", "6", "7", "8", "9", "del", "0", "12"] {
            ocr.push_text(label, 80.0);
        }

        let map = recognize(&mut host, &ocr, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(map.digits(), "01234678");
        assert!(map.get('5').is_none());
        assert_eq!(map.get('0').unwrap().ordinal, 10);
    }

    #[test]
    fn test_duplicate_last_wins() {
        let mut host = MockHost::with_keys(10);
        let ocr = ScriptedOcr::new();
        for (label, conf) in [("8", 95.0), ("2", 90.0), ("8", 40.0)] {
            ocr.push_text(label, conf);
        }
        for _ in 3..10 {
            ocr.push_text("", 0.0);
        }

        let map = recognize(&mut host, &ocr, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(map.get('8').unwrap().ordinal, 2);
    }

    #[test]
    fn test_duplicate_highest_confidence() {
        let mut host = MockHost::with_keys(10);
        let ocr = ScriptedOcr::new();
        for (label, conf) in [("8", 95.0), ("2", 90.0), ("8", 40.0)] {
            ocr.push_text(label, conf);
        }
        for _ in 3..10 {
            ocr.push_text("", 0.0);
        }

        let map = recognize(&mut host, &ocr, DuplicatePolicy::HighestConfidence).unwrap();
        assert_eq!(map.get('8').unwrap().ordinal, 0);
        assert_eq!(map.get('2').unwrap().ordinal, 1);
    }

    #[test]
    fn test_duplicate_reject() {
        let mut host = MockHost::with_keys(10);
        let ocr = ScriptedOcr::new();
        for (label, conf) in [("8", 95.0), ("2", 90.0), ("8", 40.0)] {
            ocr.push_text(label, conf);
        }
        for _ in 3..10 {
            ocr.push_text("", 0.0);
        }

        let err = recognize(&mut host, &ocr, DuplicatePolicy::Reject).unwrap_err();
        match err {
            KeypadError::AmbiguousDigit { digit, ordinals } => {
                assert_eq!(digit, '8');
                assert_eq!(ordinals, vec![0, 2]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ocr.released(), 1);
    }

    #[test]
    fn test_engine_failure_is_ocr_error() {
        let mut host = MockHost::with_keys(10);
        let ocr = ScriptedOcr::new();
        ocr.push_text("1", 90.0);
        // Second key has nothing scripted: the engine errors out.

        let err = recognize(&mut host, &ocr, DuplicatePolicy::LastWins).unwrap_err();
        assert!(matches!(err, KeypadError::Ocr(_)));
        assert_eq!(ocr.released(), 1);
    }
}

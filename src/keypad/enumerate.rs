use tracing::info;

use crate::browser::{KeyHandle, KeypadHost, KeypadLocator};
use crate::error::{KeypadError, KeypadResult};

/// A numeric keypad must expose at least the digits 0-9.
pub const MIN_KEYS: usize = 10;

/// Returns the keypad's keys in document order.
///
/// Fails with [`KeypadError::InsufficientKeys`] when fewer than `min_keys`
/// are found; the caller must not go on to recognition in that case.
pub fn enumerate_keys(
    host: &mut dyn KeypadHost,
    keypad: &KeypadLocator,
    min_keys: usize,
) -> KeypadResult<Vec<KeyHandle>> {
    let keys = host.find_keys(keypad).map_err(KeypadError::Host)?;

    if keys.len() < min_keys {
        return Err(KeypadError::InsufficientKeys {
            found: keys.len(),
            required: min_keys,
        });
    }

    info!(count = keys.len(), %keypad, "Keypad keys found");
    Ok(keys)
}

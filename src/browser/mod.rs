//! Browser-automation host abstraction.
//!
//! This module provides:
//! - Keypad locators, key handles and page geometry (`locator`)
//! - The [`KeypadHost`] trait the PIN strategies drive
//! - A blocking W3C WebDriver implementation (`webdriver`)
//!
//! The host owns element lookup, screenshots and click delivery. The
//! strategies only decide which key or coordinate to activate, and when.

pub mod locator;
pub mod webdriver;

#[cfg(test)]
mod fake_driver;

pub use locator::{ClickEvent, KeyHandle, KeypadLocator, PagePoint, PageRect};
pub use webdriver::{WebDriverConfig, WebDriverHost};

use anyhow::Result;
use image::RgbaImage;
use std::time::Duration;

/// Operations a PIN strategy needs from the browser.
///
/// Calls are strictly sequential; implementations never see two operations
/// in flight.
pub trait KeypadHost {
    /// Waits until the keypad element is displayed, failing after `timeout`.
    fn wait_visible(&mut self, keypad: &KeypadLocator, timeout: Duration) -> Result<()>;

    /// Returns every element matching the keypad selector, in document order.
    fn find_keys(&mut self, keypad: &KeypadLocator) -> Result<Vec<KeyHandle>>;

    /// Returns the key whose accessible label equals `label`, if any.
    fn find_labeled_key(&mut self, keypad: &KeypadLocator, label: &str)
    -> Result<Option<KeyHandle>>;

    /// Screenshots exactly the key's bounding region.
    fn capture_key(&mut self, key: &KeyHandle) -> Result<RgbaImage>;

    /// Page-relative bounds of the keypad element (frame offset included).
    fn region_bounds(&mut self, keypad: &KeypadLocator) -> Result<PageRect>;

    /// Screenshots the keypad element.
    fn capture_region(&mut self, keypad: &KeypadLocator) -> Result<RgbaImage>;

    /// Performs one activation.
    fn activate(&mut self, click: &ClickEvent) -> Result<()>;

    /// Blocks the calling flow between inputs.
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

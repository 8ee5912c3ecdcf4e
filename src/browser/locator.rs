//! Keypad locators, key handles and page geometry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a keypad lives: a CSS selector, optionally scoped to an embedded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeypadLocator {
    /// Selector of the `<iframe>` hosting the keypad, `None` for the top-level document
    pub frame: Option<String>,
    /// Selector of the keypad element(s) inside that document
    pub selector: String,
}

impl KeypadLocator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            frame: None,
            selector: selector.into(),
        }
    }

    pub fn in_frame(frame: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            frame: Some(frame.into()),
            selector: selector.into(),
        }
    }
}

impl fmt::Display for KeypadLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.frame {
            Some(frame) => write!(f, "{} >> {}", frame, self.selector),
            None => write!(f, "{}", self.selector),
        }
    }
}

/// One clickable key found by enumeration.
///
/// `element` is the host's opaque element reference; `ordinal` is the key's
/// index in document order and never changes after enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyHandle {
    pub ordinal: usize,
    pub element: String,
    pub frame: Option<String>,
}

/// A point in page (CSS pixel) coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

/// A rectangle in page (CSS pixel) coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageRect {
    /// Maps a point in a screenshot of this rect to page coordinates.
    ///
    /// Screenshots may be taken at a device pixel ratio other than 1, so the
    /// image size is used to scale image pixels back to CSS pixels.
    pub fn image_to_page(&self, image_x: f64, image_y: f64, image_size: (u32, u32)) -> PagePoint {
        let (iw, ih) = image_size;
        let sx = if iw > 0 { self.width / iw as f64 } else { 1.0 };
        let sy = if ih > 0 { self.height / ih as f64 } else { 1.0 };
        PagePoint {
            x: self.x + image_x * sx,
            y: self.y + image_y * sy,
        }
    }
}

/// An activation the host should perform.
#[derive(Clone, Debug, PartialEq)]
pub enum ClickEvent {
    /// Click the key element itself
    Key(KeyHandle),
    /// Click at a page coordinate
    Point(PagePoint),
    /// Click the `<iframe>` element matching this selector, to give the frame focus
    Frame(String),
}

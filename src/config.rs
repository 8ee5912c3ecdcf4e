//! Configuration for the `keypad-ocr` binary.
//!
//! Loaded from keypad.json at startup. Every field has a default, so a
//! partial file only overrides what it names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::browser::WebDriverConfig;
use crate::keypad::{FrameRegionOptions, KeyHandleOptions, LabeledOptions, StrategyKind};

/// Where the keypad sits on the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypadSelectors {
    /// Selector of the `<iframe>` hosting the keypad (`null` for the page itself)
    pub frame: Option<String>,
    /// Selector matching every key (key-handle strategy)
    pub keys: String,
    /// Selector of the whole keypad element (frame-region strategy)
    pub region: String,
    /// Selector of the labelled key images (labeled strategy)
    pub labeled_keys: String,
}

impl Default for KeypadSelectors {
    fn default() -> Self {
        Self {
            frame: Some("iframe#lazyModalDialogIframe".to_string()),
            keys: ".key_area a".to_string(),
            region: ".key_area".to_string(),
            labeled_keys: "img.kpd-data".to_string(),
        }
    }
}

/// Complete configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypadConfig {
    pub webdriver: WebDriverConfig,
    pub keypad: KeypadSelectors,
    /// Strategy used by `enter-pin` unless overridden on the command line
    pub strategy: StrategyKind,
    pub key_handle: KeyHandleOptions,
    pub frame_region: FrameRegionOptions,
    pub labeled: LabeledOptions,
    /// Folder for diagnostic images; unset disables them
    pub diagnostics_dir: Option<PathBuf>,
    /// Environment variable holding the PIN
    pub pin_env: String,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self {
            webdriver: WebDriverConfig::default(),
            keypad: KeypadSelectors::default(),
            strategy: StrategyKind::default(),
            key_handle: KeyHandleOptions::default(),
            frame_region: FrameRegionOptions::default(),
            labeled: LabeledOptions::default(),
            diagnostics_dir: None,
            pin_env: "KEYPAD_PIN".to_string(),
        }
    }
}

impl KeypadConfig {
    /// Loads configuration.
    ///
    /// An explicit `path` must exist and parse. Without one, keypad.json next
    /// to the executable is tried and defaults are used if it is missing or
    /// broken.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::load_implicit(&crate::paths::get_config_path())),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    fn load_implicit(path: &Path) -> Self {
        info!(path = %path.display(), "Looking for config");

        if !path.exists() {
            info!("keypad.json not found. Using default config.");
            return Self::default();
        }

        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Using default config");
                Self::default()
            }
        }
    }
}

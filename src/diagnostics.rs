//! Optional on-disk copies of the images fed to OCR.

use chrono::Local;
use image::{GrayImage, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Image sink for one PIN entry. Disabled unless a session folder was created.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Creates a timestamped session folder: `<base>/YYYYMMDD_HHMMSS/`.
    ///
    /// Falls back to disabled if the folder cannot be created.
    pub fn session(base: &Path) -> Self {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let dir = base.join(timestamp);

        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                info!(dir = %dir.display(), "Saving diagnostic images");
                Self { dir: Some(dir) }
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot create diagnostics folder");
                Self::disabled()
            }
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn save_rgba(&self, name: &str, img: &RgbaImage) {
        if let Some(path) = self.path_for(name) {
            report(&path, img.save(&path));
        }
    }

    pub fn save_gray(&self, name: &str, img: &GrayImage) {
        if let Some(path) = self.path_for(name) {
            report(&path, img.save(&path));
        }
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.png", name)))
    }
}

fn report(path: &Path, result: image::ImageResult<()>) {
    match result {
        Ok(()) => debug!(path = %path.display(), "Diagnostic image saved"),
        Err(e) => warn!(path = %path.display(), error = %e, "Could not save diagnostic image"),
    }
}

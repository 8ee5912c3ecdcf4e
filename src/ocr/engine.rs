//! OCR engine abstraction and its scoped lifetime.

use anyhow::Result;
use image::GrayImage;
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

/// Text recognized in one image region, with the engine's confidence (0-100).
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: f32,
}

/// Pixel bounding box in image-local coordinates (top-left origin, exclusive max).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x0 as f64 + self.x1 as f64) / 2.0,
            (self.y0 as f64 + self.y1 as f64) / 2.0,
        )
    }
}

/// One character found by layout analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct OcrSymbol {
    pub text: String,
    pub bbox: BoundingBox,
}

/// A running OCR engine.
pub trait OcrEngine {
    /// Recognizes the whole image as text.
    fn recognize_text(&mut self, img: &GrayImage) -> Result<Recognition>;

    /// Recognizes individual characters with their bounding boxes.
    fn recognize_symbols(&mut self, img: &GrayImage) -> Result<Vec<OcrSymbol>>;

    /// Releases engine resources. Called exactly once by [`EngineGuard`].
    fn terminate(&mut self) -> Result<()>;
}

/// Creates engines on demand.
pub trait OcrProvider {
    fn acquire(&self) -> Result<Box<dyn OcrEngine>>;
}

/// Owns an acquired engine and terminates it when dropped, on every exit path.
pub struct EngineGuard {
    engine: Box<dyn OcrEngine>,
}

impl EngineGuard {
    pub fn acquire(provider: &dyn OcrProvider) -> Result<Self> {
        let engine = provider.acquire()?;
        debug!("OCR engine acquired");
        Ok(Self { engine })
    }
}

impl Deref for EngineGuard {
    type Target = dyn OcrEngine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

impl DerefMut for EngineGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine.as_mut()
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        match self.engine.terminate() {
            Ok(()) => debug!("OCR engine terminated"),
            Err(e) => warn!(error = %e, "Failed to terminate OCR engine"),
        }
    }
}

pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;
pub mod tesseract;

pub use engine::{BoundingBox, EngineGuard, OcrEngine, OcrProvider, OcrSymbol, Recognition};
pub use extract::{find_symbol, parse_digit};
pub use preprocess::{prepare_key_image, prepare_region_image, KeyPreprocess, RegionPreprocess};
pub use setup::{ensure_tesseract, TesseractPaths};
pub use tesseract::TesseractProvider;

use anyhow::Result;
use image::RgbaImage;

/// High-level function: key screenshot → preprocessed image → recognition.
pub fn read_key_image(
    engine: &mut dyn OcrEngine,
    img: &RgbaImage,
    settings: &KeyPreprocess,
) -> Result<(Recognition, Option<char>)> {
    let prepared = prepare_key_image(img, settings);
    let recognition = engine.recognize_text(&prepared)?;
    let digit = parse_digit(&recognition.text);
    Ok((recognition, digit))
}

/// High-level function: keypad screenshot → preprocessed image → symbols.
pub fn read_region_image(
    engine: &mut dyn OcrEngine,
    img: &RgbaImage,
    settings: &RegionPreprocess,
) -> Result<Vec<OcrSymbol>> {
    let prepared = prepare_region_image(img, settings);
    engine.recognize_symbols(&prepared)
}

//! Tesseract command-line backend.
//!
//! Each engine owns a scratch directory for its input images and output
//! files; terminating the engine removes it.

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

use super::engine::{BoundingBox, OcrEngine, OcrProvider, OcrSymbol, Recognition};
use super::setup::{find_tessdata_dir, find_tesseract_executable, TesseractPaths};

/// Only digits are ever valid keypad labels.
pub const DIGIT_WHITELIST: &str = "0123456789";

/// Page segmentation for a single key: one text line.
const PSM_SINGLE_LINE: &str = "7";

/// Page segmentation for a keypad region: sparse text, find as much as possible.
const PSM_SPARSE_TEXT: &str = "11";

/// Starts Tesseract engines with a fixed language and character whitelist.
#[derive(Clone, Debug)]
pub struct TesseractProvider {
    paths: TesseractPaths,
    language: String,
    whitelist: String,
}

impl TesseractProvider {
    pub fn new(paths: TesseractPaths) -> Self {
        Self {
            paths,
            language: "eng".to_string(),
            whitelist: DIGIT_WHITELIST.to_string(),
        }
    }

    /// Locates an installed Tesseract and its trained data.
    pub fn discover() -> Result<Self> {
        Ok(Self::new(TesseractPaths {
            executable: find_tesseract_executable()?,
            tessdata: find_tessdata_dir()?,
        }))
    }
}

impl OcrProvider for TesseractProvider {
    fn acquire(&self) -> Result<Box<dyn OcrEngine>> {
        let scratch = tempfile::Builder::new()
            .prefix("keypad-ocr-")
            .tempdir()
            .context("Failed to create OCR scratch directory")?;
        debug!(scratch = %scratch.path().display(), "Starting Tesseract engine");
        Ok(Box::new(TesseractEngine {
            provider: self.clone(),
            scratch: Some(scratch),
            invocations: 0,
        }))
    }
}

pub struct TesseractEngine {
    provider: TesseractProvider,
    scratch: Option<TempDir>,
    invocations: u32,
}

impl TesseractEngine {
    /// Runs Tesseract on `img` and returns the contents of the output file with `extension`.
    fn run(&mut self, img: &GrayImage, psm: &str, config: &str, extension: &str) -> Result<String> {
        let scratch = self
            .scratch
            .as_ref()
            .ok_or_else(|| anyhow!("Tesseract engine already terminated"))?
            .path()
            .to_path_buf();

        self.invocations += 1;
        let input = scratch.join(format!("input_{}.png", self.invocations));
        let output_base = scratch.join(format!("output_{}", self.invocations));
        img.save(&input)
            .with_context(|| format!("Failed to write OCR input {}", input.display()))?;

        let output = Command::new(&self.provider.paths.executable)
            .arg(&input)
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&self.provider.paths.tessdata)
            .arg("-l")
            .arg(&self.provider.language)
            .arg("--psm")
            .arg(psm)
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", self.provider.whitelist))
            .arg(config)
            .output()
            .with_context(|| {
                format!(
                    "Failed to run Tesseract at {}",
                    self.provider.paths.executable.display()
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let result_path = with_extension(&output_base, extension);
        let content = std::fs::read_to_string(&result_path)
            .with_context(|| format!("Failed to read Tesseract output {}", result_path.display()))?;

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&result_path);
        Ok(content)
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize_text(&mut self, img: &GrayImage) -> Result<Recognition> {
        let tsv = self.run(img, PSM_SINGLE_LINE, "tsv", "tsv")?;
        Ok(recognition_from_lines(&parse_tsv_output(&tsv)))
    }

    fn recognize_symbols(&mut self, img: &GrayImage) -> Result<Vec<OcrSymbol>> {
        let boxes = self.run(img, PSM_SPARSE_TEXT, "makebox", "box")?;
        Ok(parse_box_output(&boxes, img.height()))
    }

    fn terminate(&mut self) -> Result<()> {
        if let Some(scratch) = self.scratch.take() {
            scratch
                .close()
                .context("Failed to remove OCR scratch directory")?;
        }
        debug!(invocations = self.invocations, "Tesseract engine terminated");
        Ok(())
    }
}

fn with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// A line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

/// A single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Joins all lines into one recognition; confidence is the mean over words.
fn recognition_from_lines(lines: &[OcrLine]) -> Recognition {
    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let (sum, count) = lines
        .iter()
        .flat_map(|l| &l.words)
        .fold((0.0f32, 0usize), |(s, n), w| (s + w.confidence, n + 1));
    let confidence = if count > 0 { sum / count as f32 } else { 0.0 };
    Recognition { text, confidence }
}

fn flush_line(words: &mut Vec<OcrWord>, lines: &mut Vec<OcrLine>) {
    if words.is_empty() {
        return;
    }
    let words = std::mem::take(words);
    let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(OcrLine {
        text,
        words,
        confidence,
    });
}

/// Parses Tesseract TSV output into lines of words.
fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    // Skip header
    for row in tsv.lines().skip(1) {
        // level, page_num, block_num, par_num, line_num, word_num,
        // left, top, width, height, conf, text
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        // Level 5 = word
        if level != 5 {
            continue;
        }

        let text = fields[11].trim();
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        if current_key.is_some_and(|k| k != key) {
            flush_line(&mut current_words, &mut lines);
        }
        current_key = Some(key);

        current_words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }

    flush_line(&mut current_words, &mut lines);
    lines
}

/// Parses Tesseract box output (`<char> <left> <bottom> <right> <top> <page>`).
///
/// Box coordinates have their origin at the bottom-left corner of the image;
/// they are flipped to the top-left origin used everywhere else.
fn parse_box_output(boxes: &str, image_height: u32) -> Vec<OcrSymbol> {
    boxes
        .lines()
        .filter_map(|row| {
            let fields: Vec<&str> = row.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            let left: u32 = fields[1].parse().ok()?;
            let bottom: u32 = fields[2].parse().ok()?;
            let right: u32 = fields[3].parse().ok()?;
            let top: u32 = fields[4].parse().ok()?;
            Some(OcrSymbol {
                text: fields[0].to_string(),
                bbox: BoundingBox {
                    x0: left,
                    y0: image_height.saturating_sub(top),
                    x1: right,
                    y1: image_height.saturating_sub(bottom),
                },
            })
        })
        .collect()
}

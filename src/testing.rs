//! Scripted stand-ins for the browser and the OCR engine.

use anyhow::{anyhow, bail, Result};
use image::{GrayImage, Rgba, RgbaImage};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::browser::{ClickEvent, KeyHandle, KeypadHost, KeypadLocator, PagePoint, PageRect};
use crate::ocr::{OcrEngine, OcrProvider, OcrSymbol, Recognition};

/// In-memory keypad host that records every capture, click and pause.
pub struct MockHost {
    pub key_count: usize,
    /// Accessible label per key ordinal
    pub labels: Vec<String>,
    pub region: PageRect,
    pub region_image_size: (u32, u32),

    pub fail_find_keys: bool,
    pub fail_capture: bool,
    pub fail_wait_visible: bool,

    pub key_captures: usize,
    pub region_captures: usize,
    pub clicks: Vec<ClickEvent>,
    pub pauses: Vec<Duration>,
}

impl MockHost {
    pub fn with_keys(key_count: usize) -> Self {
        Self {
            key_count,
            labels: Vec::new(),
            region: PageRect {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 100.0,
            },
            region_image_size: (100, 100),
            fail_find_keys: false,
            fail_capture: false,
            fail_wait_visible: false,
            key_captures: 0,
            region_captures: 0,
            clicks: Vec::new(),
            pauses: Vec::new(),
        }
    }

    /// Labels key `i` with the `i`-th character of `labels`.
    pub fn label_keys(&mut self, labels: &str) {
        self.labels = labels.chars().map(String::from).collect();
    }

    pub fn clicked_ordinals(&self) -> Vec<usize> {
        self.clicks
            .iter()
            .filter_map(|c| match c {
                ClickEvent::Key(key) => Some(key.ordinal),
                _ => None,
            })
            .collect()
    }

    pub fn clicked_points(&self) -> Vec<PagePoint> {
        self.clicks
            .iter()
            .filter_map(|c| match c {
                ClickEvent::Point(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn clicked_frames(&self) -> Vec<String> {
        self.clicks
            .iter()
            .filter_map(|c| match c {
                ClickEvent::Frame(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    fn handle(&self, ordinal: usize, keypad: &KeypadLocator) -> KeyHandle {
        KeyHandle {
            ordinal,
            element: format!("key-{}", ordinal),
            frame: keypad.frame.clone(),
        }
    }
}

impl KeypadHost for MockHost {
    fn wait_visible(&mut self, keypad: &KeypadLocator, _timeout: Duration) -> Result<()> {
        if self.fail_wait_visible {
            bail!("{} did not become visible", keypad);
        }
        Ok(())
    }

    fn find_keys(&mut self, keypad: &KeypadLocator) -> Result<Vec<KeyHandle>> {
        if self.fail_find_keys {
            bail!("frame {:?} not found", keypad.frame);
        }
        Ok((0..self.key_count).map(|i| self.handle(i, keypad)).collect())
    }

    fn find_labeled_key(
        &mut self,
        keypad: &KeypadLocator,
        label: &str,
    ) -> Result<Option<KeyHandle>> {
        Ok(self
            .labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.handle(i, keypad)))
    }

    fn capture_key(&mut self, key: &KeyHandle) -> Result<RgbaImage> {
        if self.fail_capture {
            bail!("screenshot of {} failed", key.element);
        }
        self.key_captures += 1;
        Ok(RgbaImage::from_pixel(40, 60, Rgba([255, 255, 255, 255])))
    }

    fn region_bounds(&mut self, _keypad: &KeypadLocator) -> Result<PageRect> {
        Ok(self.region)
    }

    fn capture_region(&mut self, _keypad: &KeypadLocator) -> Result<RgbaImage> {
        if self.fail_capture {
            bail!("region screenshot failed");
        }
        self.region_captures += 1;
        let (w, h) = self.region_image_size;
        Ok(RgbaImage::from_pixel(w, h, Rgba([240, 240, 240, 255])))
    }

    fn activate(&mut self, click: &ClickEvent) -> Result<()> {
        self.clicks.push(click.clone());
        Ok(())
    }

    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

#[derive(Default)]
struct Script {
    texts: VecDeque<Recognition>,
    symbols: VecDeque<Vec<OcrSymbol>>,
    acquired: usize,
    released: usize,
}

/// OCR provider that replays queued results, one per recognition call.
///
/// Running out of queued results is an engine error.
#[derive(Clone, Default)]
pub struct ScriptedOcr {
    script: Rc<RefCell<Script>>,
}

impl ScriptedOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: &str, confidence: f32) {
        self.script.borrow_mut().texts.push_back(Recognition {
            text: text.to_string(),
            confidence,
        });
    }

    pub fn push_symbols(&self, symbols: Vec<OcrSymbol>) {
        self.script.borrow_mut().symbols.push_back(symbols);
    }

    pub fn acquired(&self) -> usize {
        self.script.borrow().acquired
    }

    pub fn released(&self) -> usize {
        self.script.borrow().released
    }
}

impl OcrProvider for ScriptedOcr {
    fn acquire(&self) -> Result<Box<dyn OcrEngine>> {
        self.script.borrow_mut().acquired += 1;
        Ok(Box::new(ScriptedEngine {
            script: Rc::clone(&self.script),
        }))
    }
}

struct ScriptedEngine {
    script: Rc<RefCell<Script>>,
}

impl OcrEngine for ScriptedEngine {
    fn recognize_text(&mut self, _img: &GrayImage) -> Result<Recognition> {
        self.script
            .borrow_mut()
            .texts
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted text left"))
    }

    fn recognize_symbols(&mut self, _img: &GrayImage) -> Result<Vec<OcrSymbol>> {
        self.script
            .borrow_mut()
            .symbols
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted symbols left"))
    }

    fn terminate(&mut self) -> Result<()> {
        self.script.borrow_mut().released += 1;
        Ok(())
    }
}

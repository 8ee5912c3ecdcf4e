//! keypad-ocr
//!
//! Command-line front end: Tesseract setup, offline OCR checks on saved
//! screenshots, and PIN entry through a WebDriver session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use keypad_ocr::browser::WebDriverHost;
use keypad_ocr::config::KeypadConfig;
use keypad_ocr::diagnostics::Diagnostics;
use keypad_ocr::keypad::{build_strategy, PinSequence, StrategyKind};
use keypad_ocr::ocr::extract::symbols_text;
use keypad_ocr::ocr::{
    ensure_tesseract, read_key_image, read_region_image, EngineGuard, KeyPreprocess,
    RegionPreprocess, TesseractProvider,
};
use keypad_ocr::{logging, paths};

#[derive(Parser)]
#[command(name = "keypad-ocr")]
#[command(about = "Enter PINs on shuffled secure keypads using OCR")]
#[command(version)]
struct Cli {
    /// Configuration file (default: keypad.json next to the executable)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Locate Tesseract and download trained data if missing
    Setup,

    /// Recognize a saved single-key screenshot
    ReadKey {
        image: PathBuf,
        /// Binarization threshold
        #[arg(long)]
        threshold: Option<u8>,
        /// Working width in pixels
        #[arg(long)]
        width: Option<u32>,
    },

    /// Recognize a saved whole-keypad screenshot and list the digit boxes
    ReadFrame {
        image: PathBuf,
        /// Binarization threshold
        #[arg(long)]
        threshold: Option<u8>,
    },

    /// Enter a PIN on the keypad of a WebDriver session
    EnterPin {
        /// Page to open before entering the PIN
        #[arg(long)]
        url: Option<String>,
        /// Attach to an existing session instead of creating one
        #[arg(long)]
        session: Option<String>,
        /// key-handle, frame-region or labeled
        #[arg(long)]
        strategy: Option<StrategyKind>,
        /// PIN to enter (default: read from the configured environment variable)
        #[arg(long)]
        pin: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Failed to create output directories: {}", e);
    }
    if let Err(e) = logging::init_tracing(cli.verbose) {
        eprintln!("{:#}", e);
    }
    logging::install_panic_hook();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = KeypadConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Setup => {
            let paths = ensure_tesseract()?;
            info!(
                executable = %paths.executable.display(),
                tessdata = %paths.tessdata.display(),
                "Tesseract ready"
            );
            Ok(())
        }
        Command::ReadKey {
            image,
            threshold,
            width,
        } => {
            let mut settings = config.key_handle.preprocess;
            if let Some(t) = threshold {
                settings.threshold = t;
            }
            if let Some(w) = width {
                settings.width = w;
            }
            read_key(&image, &settings)
        }
        Command::ReadFrame { image, threshold } => {
            let mut settings = config.frame_region.preprocess;
            if let Some(t) = threshold {
                settings.threshold = t;
            }
            read_frame(&image, &settings)
        }
        Command::EnterPin {
            url,
            session,
            strategy,
            pin,
        } => {
            let pin = match pin {
                Some(pin) => PinSequence::new(pin),
                None => PinSequence::from_env(&config.pin_env)?,
            };
            enter_pin(&config, url, session, strategy.unwrap_or(config.strategy), &pin)
        }
    }
}

fn load_image(path: &Path) -> Result<image::RgbaImage> {
    let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(img.to_rgba8())
}

fn read_key(path: &Path, settings: &KeyPreprocess) -> Result<()> {
    let img = load_image(path)?;
    let provider = TesseractProvider::discover()?;
    let mut engine = EngineGuard::acquire(&provider)?;

    let (recognition, digit) = read_key_image(&mut *engine, &img, settings)?;
    info!(
        text = ?recognition.text.trim(),
        confidence = f64::from(recognition.confidence),
        "Key recognized"
    );
    match digit {
        Some(d) => println!("{}", d),
        None => warn!("Not a single digit"),
    }
    Ok(())
}

fn read_frame(path: &Path, settings: &RegionPreprocess) -> Result<()> {
    let img = load_image(path)?;
    let provider = TesseractProvider::discover()?;
    let mut engine = EngineGuard::acquire(&provider)?;

    let symbols = read_region_image(&mut *engine, &img, settings)?;
    info!(recognized = %symbols_text(&symbols), count = symbols.len(), "Keypad symbols");
    for s in &symbols {
        let (cx, cy) = s.bbox.center();
        println!(
            "{}\t({}, {})-({}, {})\tcenter ({:.1}, {:.1})",
            s.text, s.bbox.x0, s.bbox.y0, s.bbox.x1, s.bbox.y1, cx, cy
        );
    }
    Ok(())
}

fn enter_pin(
    config: &KeypadConfig,
    url: Option<String>,
    session: Option<String>,
    kind: StrategyKind,
    pin: &PinSequence,
) -> Result<()> {
    let provider = TesseractProvider::discover()?;
    let diagnostics = match &config.diagnostics_dir {
        Some(dir) => Diagnostics::session(dir),
        None => Diagnostics::disabled(),
    };

    let mut host = match session {
        Some(id) => WebDriverHost::attach(&config.webdriver, id)?,
        None => WebDriverHost::connect(&config.webdriver)?,
    };
    if let Some(url) = url {
        host.navigate(&url)?;
    }

    let (strategy, keypad) = build_strategy(kind, config, &provider, diagnostics.clone());
    info!(strategy = strategy.name(), session = host.session_id(), "Starting PIN entry");

    let result = match strategy.enter_pin(&mut host, &keypad, pin) {
        Ok(report) => {
            if !report.is_complete() {
                warn!(skipped = ?report.skipped, "Some digits were not entered");
            }
            info!(entered = report.entered.len(), total = pin.len(), "Done");
            Ok(())
        }
        Err(e) => {
            save_failure_screenshot(&mut host, config, &diagnostics);
            Err(e.into())
        }
    };

    if let Err(e) = host.close() {
        warn!(error = %format!("{:#}", e), "Failed to close WebDriver session");
    }
    result
}

/// Best-effort page screenshot for post-mortem inspection.
fn save_failure_screenshot(host: &mut WebDriverHost, config: &KeypadConfig, diagnostics: &Diagnostics) {
    let shot = match host.screenshot() {
        Ok(img) => img,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Could not capture failure screenshot");
            return;
        }
    };

    if diagnostics.dir().is_some() {
        diagnostics.save_rgba("failure", &shot);
    } else {
        let base = config
            .diagnostics_dir
            .clone()
            .unwrap_or_else(paths::get_diagnostics_dir);
        Diagnostics::session(&base).save_rgba("failure", &shot);
    }
}

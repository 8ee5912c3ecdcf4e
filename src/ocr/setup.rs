use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::info;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Trained data file required by the engine.
const ENG_TRAINEDDATA: &str = "eng.traineddata";

#[cfg(windows)]
const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

#[cfg(not(windows))]
const COMMON_EXECUTABLES: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

#[cfg(windows)]
const SYSTEM_TESSDATA: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

#[cfg(not(windows))]
const SYSTEM_TESSDATA: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

#[derive(Clone, Debug)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Returns the directory for locally downloaded trained data
pub fn get_local_tessdata_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keypad-ocr")
        .join("tessdata")
}

/// Ensures Tesseract is usable. Downloads eng.traineddata if no tessdata directory has it.
pub fn ensure_tesseract() -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;
    info!(executable = %executable.display(), "Tesseract found");

    let tessdata = match find_tessdata_dir() {
        Ok(dir) => dir,
        Err(_) => {
            info!("Trained data not found locally, downloading...");
            let dir = get_local_tessdata_dir();
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            download_tessdata(&dir)?;
            dir
        }
    };
    info!(tessdata = %tessdata.display(), "Tesseract ready");

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Downloads English trained data from the tessdata repository
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/{}", TESSDATA_REPO, ENG_TRAINEDDATA);
    let eng_path = tessdata_dir.join(ENG_TRAINEDDATA);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "keypad-ocr")
        .send()
        .with_context(|| format!("Failed to download {}", eng_url))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            ENG_TRAINEDDATA,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    // Write to a temporary name first so an interrupted download is never picked up.
    let partial = tessdata_dir.join(format!("{}.part", ENG_TRAINEDDATA));
    let mut file = fs::File::create(&partial)?;
    file.write_all(&bytes)?;
    drop(file);
    fs::rename(&partial, &eng_path)?;

    info!(bytes = bytes.len(), path = %eng_path.display(), "Downloaded trained data");
    Ok(())
}

/// Finds the Tesseract executable: `TESSERACT_PATH`, then `PATH`, then common install locations
pub fn find_tesseract_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TESSERACT_PATH") {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            anyhow!(
                "Tesseract not found. Install Tesseract-OCR, add it to PATH, \
                 or set TESSERACT_PATH to the executable."
            )
        })
}

/// Finds a tessdata directory containing eng.traineddata
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let env_prefix = std::env::var("TESSDATA_PREFIX").ok().map(PathBuf::from);
    let mut candidates = vec![get_local_tessdata_dir()];
    candidates.extend(tessdata_prefix_candidates(env_prefix.as_deref()));
    candidates.extend(SYSTEM_TESSDATA.iter().map(PathBuf::from));

    first_with_traineddata(&candidates).ok_or_else(|| {
        anyhow!(
            "tessdata directory not found. Run `keypad-ocr setup` or set TESSDATA_PREFIX."
        )
    })
}

/// `TESSDATA_PREFIX` may point at the tessdata directory itself or at its parent.
fn tessdata_prefix_candidates(prefix: Option<&Path>) -> Vec<PathBuf> {
    match prefix {
        Some(p) => vec![p.to_path_buf(), p.join("tessdata")],
        None => Vec::new(),
    }
}

fn first_with_traineddata(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| dir.join(ENG_TRAINEDDATA).exists())
        .cloned()
}

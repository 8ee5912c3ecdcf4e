//! Log output for the binary: console plus `logs/keypad_ocr.log`.

use anyhow::{anyhow, Result};
use chrono::Local;
use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{prelude::*, EnvFilter};

pub const LOG_FILE_NAME: &str = "keypad_ocr.log";

/// Local wall-clock time, e.g. `14:03:27.512`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Level filter: `RUST_LOG` if set, else `debug` with `verbose`, else `info`.
pub fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global subscriber. Call once at startup.
///
/// Console output always works; the log file is skipped with a warning if it
/// cannot be opened.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let log_path = crate::paths::get_logs_dir().join(LOG_FILE_NAME);
    let (file_layer, file_error) = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(LocalTime)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTime).with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    if let Some(e) = file_error {
        tracing::warn!(
            path = %log_path.display(),
            error = %e,
            "Log file unavailable, logging to console only"
        );
    }
    Ok(())
}

/// Routes panics through the log so they also reach the log file.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        tracing::error!(%location, "PANIC {}", msg);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_time_format() {
        let mut out = String::new();
        LocalTime.format_time(&mut Writer::new(&mut out)).unwrap();
        // HH:MM:SS.mmm
        assert_eq!(out.len(), 12);
        assert_eq!(&out[2..3], ":");
        assert_eq!(&out[8..9], ".");
    }
}

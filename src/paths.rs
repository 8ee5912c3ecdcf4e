//! Files the binary keeps next to its executable.

use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Directory containing the executable, or `.` if it cannot be determined.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// `<exe_dir>/keypad.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("keypad.json")
}

/// `<exe_dir>/diagnostics/`, used for failure screenshots when no
/// diagnostics folder is configured.
pub fn get_diagnostics_dir() -> PathBuf {
    get_exe_dir().join("diagnostics")
}

/// Creates the logs directory. Call before installing the log subscriber.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())
}

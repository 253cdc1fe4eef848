//! Chrome executable discovery.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::BrowserError;

/// Well-known install locations, checked before `PATH`.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Locate Chrome: the configured path if given, then known locations, then
/// `PATH`.
pub fn find_chrome(configured: Option<&Path>) -> Result<PathBuf, BrowserError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(BrowserError::Launch(format!(
            "Configured Chrome executable not found: {}",
            path.display()
        )));
    }

    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(BrowserError::Launch(
        "Chrome/Chromium not found. Install it or set CHROME_PATH:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium"
            .to_string(),
    ))
}

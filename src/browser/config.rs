//! Browser launch configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Launch argument set for the runtime the browser runs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchPreset {
    /// Developer machine with a regular Chrome install.
    #[default]
    Local,
    /// Sandboxed serverless-style runtime: no setuid sandbox, no /dev/shm,
    /// single process.
    Constrained,
}

impl FromStr for LaunchPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(LaunchPreset::Local),
            "constrained" | "serverless" => Ok(LaunchPreset::Constrained),
            other => Err(format!("Unknown browser preset '{}'", other)),
        }
    }
}

/// Flags that hide the most obvious automation markers.
const COMMON_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--metrics-recording-only",
];

const CONSTRAINED_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--single-process",
    "--disable-gpu",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-extensions",
];

impl LaunchPreset {
    /// Chrome arguments for this preset, without duplicates.
    pub fn args(self) -> Vec<&'static str> {
        let mut args: Vec<&'static str> = COMMON_ARGS.to_vec();
        if self == LaunchPreset::Constrained {
            for arg in CONSTRAINED_ARGS {
                if !args.contains(arg) {
                    args.push(arg);
                }
            }
        }
        args
    }
}

/// How to obtain a browser for each scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserLaunchConfig {
    #[serde(default)]
    pub preset: LaunchPreset,

    /// Run without a visible window (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome executable; searched for when unset. `~` is expanded.
    #[serde(default)]
    pub executable: Option<String>,

    /// Extra Chrome arguments appended after the preset's.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// When set, each session opens an isolated context there instead of
    /// launching a process.
    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

fn default_headless() -> bool {
    true
}

fn default_launch_timeout() -> u64 {
    20
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

impl Default for BrowserLaunchConfig {
    fn default() -> Self {
        Self {
            preset: LaunchPreset::default(),
            headless: default_headless(),
            executable: None,
            chrome_args: Vec::new(),
            proxy: None,
            remote_url: None,
            launch_timeout_secs: default_launch_timeout(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

impl BrowserLaunchConfig {
    /// Apply environment overrides.
    ///
    /// - `BROWSER_URL` - remote DevTools endpoint
    /// - `CHROME_PATH` - Chrome executable
    /// - `MARKETSCRAPE_BROWSER_PRESET` - `local` or `constrained`
    /// - `SOCKS_PROXY` - proxy, only when none is configured
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("BROWSER_URL") {
            if !url.trim().is_empty() {
                self.remote_url = Some(url.trim().to_string());
            }
        }

        if let Ok(path) = env::var("CHROME_PATH") {
            if !path.trim().is_empty() {
                self.executable = Some(path);
            }
        }

        if let Ok(preset) = env::var("MARKETSCRAPE_BROWSER_PRESET") {
            if let Ok(preset) = preset.parse() {
                self.preset = preset;
            }
        }

        if self.proxy.is_none() {
            if let Ok(proxy) = env::var("SOCKS_PROXY") {
                if !proxy.is_empty() {
                    self.proxy = Some(proxy);
                }
            }
        }

        self
    }

    /// Executable path with `~` and `$VAR` expanded.
    pub fn executable_path(&self) -> Option<PathBuf> {
        self.executable.as_ref().map(|raw| {
            let expanded = shellexpand::full(raw)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| raw.clone());
            PathBuf::from(expanded)
        })
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    /// Every argument passed to a launched Chrome.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.preset.args().into_iter().map(String::from).collect();
        if let Some(proxy) = &self.proxy {
            args.push(format!("--proxy-server={}", proxy));
        }
        args.extend(self.chrome_args.iter().cloned());
        args
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Catalog API settings (`[catalog]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Site root; the JSON API lives at `<base_url>/api`, watch pages at `<base_url>/play/..`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// User-Agent sent with catalog requests.
    pub user_agent: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://animepahe.ru".to_string(),
            request_timeout_secs: 15,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Browser automation settings (`[browser]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// W3C WebDriver endpoint (e.g. a running chromedriver).
    pub webdriver_url: String,
    /// Chromium-family browser binary (e.g. Brave). None = driver default.
    pub binary: Option<PathBuf>,
    pub headless: bool,
    /// Initial resolve timeout in seconds (page load + frame wait + extraction).
    pub resolve_timeout_secs: u64,
    /// Poll interval while waiting for DOM elements, in milliseconds.
    pub poll_interval_ms: u64,
    /// CSS selector of the embedded player frame on the watch page.
    pub frame_selector: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:9515".to_string(),
            binary: None,
            headless: true,
            resolve_timeout_secs: 20,
            poll_interval_ms: 250,
            frame_selector: "iframe[src*='kwik']".to_string(),
        }
    }
}

/// Retry policy parameters (`[retry]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum resolve attempts per episode (including the first).
    pub max_resolve_attempts: u32,
    /// Maximum download attempts per episode (including the first).
    pub max_download_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Resolve timeout multiplier applied after each navigation timeout.
    pub timeout_growth: f64,
    /// Upper bound for the grown resolve timeout, in seconds.
    pub max_resolve_timeout_secs: u64,
    /// Re-resolve the stream when a download fails because the link expired.
    pub re_resolve_on_expiry: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_resolve_attempts: 3,
            max_download_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
            timeout_growth: 1.5,
            max_resolve_timeout_secs: 60,
            re_resolve_on_expiry: true,
        }
    }
}

/// Download backend: yt-dlp child process (default) or a plain curl GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadBackend {
    #[default]
    YtDlp,
    Direct,
}

/// Download settings (`[download]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub backend: DownloadBackend,
    /// Explicit yt-dlp binary; None = look it up on PATH.
    pub ytdlp_path: Option<PathBuf>,
    /// Overlap episode N's download with episode N+1's resolution.
    pub pipeline: bool,
    /// Root directory for downloads; None = `~/Videos/AnimePahe Downloads`.
    pub root: Option<PathBuf>,
}

/// Global configuration loaded from `~/.config/apdl/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaheConfig {
    pub catalog: CatalogConfig,
    pub browser: BrowserConfig,
    pub retry: RetryConfig,
    pub download: DownloadConfig,
}

impl PaheConfig {
    /// Effective downloads root: configured value or the default under `$HOME`.
    pub fn downloads_root(&self) -> PathBuf {
        self.download
            .root
            .clone()
            .unwrap_or_else(default_downloads_root)
    }
}

/// `$HOME/Videos/AnimePahe Downloads`, or `./AnimePahe Downloads` without a home.
pub fn default_downloads_root() -> PathBuf {
    let base = std::env::var_os("HOME")
        .map(|h| PathBuf::from(h).join("Videos"))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("AnimePahe Downloads")
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("apdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PaheConfig> {
    load_or_init_at(&config_path()?)
}

/// Like [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<PaheConfig> {
    if !path.exists() {
        let default_cfg = PaheConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PaheConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Effective configuration as TOML, the same shape as the config file.
pub fn render(cfg: &PaheConfig) -> Result<String> {
    Ok(toml::to_string_pretty(cfg)?)
}

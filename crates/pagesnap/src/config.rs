//! Snapshot configuration: the request record, its defaults, and
//! environment overrides.

use crate::types::Viewport;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the default user agent.
pub const ENV_USER_AGENT: &str = "PAGESNAP_USER_AGENT";
/// Path to a Chromium binary.
pub const ENV_CHROMIUM_PATH: &str = "PAGESNAP_CHROMIUM_PATH";
/// Overrides the download worker count.
pub const ENV_CONCURRENCY: &str = "PAGESNAP_CONCURRENCY";
/// Path of the JSONL audit log.
pub const ENV_AUDIT_LOG: &str = "PAGESNAP_AUDIT_LOG";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_ASSET_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_SETTLE_MS: u64 = 1_000;
pub const DEFAULT_DESKTOP_VIEWPORT: Viewport = Viewport::new(1920, 1080);
pub const DEFAULT_MOBILE_VIEWPORT: Viewport = Viewport::new(375, 812);
/// Timeout for the robots.txt fetch.
pub const ROBOTS_TIMEOUT_MS: u64 = 5_000;

/// Everything one snapshot run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    pub url: String,
    pub output_dir: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub respect_robots: bool,
    /// Navigation timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub download_assets: bool,
    #[serde(default = "default_true")]
    pub take_screenshots: bool,
    #[serde(default = "default_desktop")]
    pub desktop_viewport: Viewport,
    #[serde(default = "default_mobile")]
    pub mobile_viewport: Viewport,
    /// Timeout applied to each asset fetch.
    #[serde(default = "default_asset_timeout_ms")]
    pub asset_timeout_ms: u64,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_downloads: usize,
    /// Delay after each viewport change before capturing.
    #[serde(default = "default_settle_ms")]
    pub screenshot_settle_ms: u64,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
fn default_asset_timeout_ms() -> u64 {
    DEFAULT_ASSET_TIMEOUT_MS
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}
fn default_desktop() -> Viewport {
    DEFAULT_DESKTOP_VIEWPORT
}
fn default_mobile() -> Viewport {
    DEFAULT_MOBILE_VIEWPORT
}

impl SnapshotRequest {
    /// A request with every optional field at its default.
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            user_agent: default_user_agent(),
            respect_robots: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            download_assets: true,
            take_screenshots: true,
            desktop_viewport: DEFAULT_DESKTOP_VIEWPORT,
            mobile_viewport: DEFAULT_MOBILE_VIEWPORT,
            asset_timeout_ms: DEFAULT_ASSET_TIMEOUT_MS,
            max_concurrent_downloads: DEFAULT_CONCURRENCY,
            screenshot_settle_ms: DEFAULT_SETTLE_MS,
        }
    }

    /// Apply `PAGESNAP_USER_AGENT` and `PAGESNAP_CONCURRENCY` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(ua) = std::env::var(ENV_USER_AGENT) {
            if !ua.trim().is_empty() {
                self.user_agent = ua;
            }
        }
        if let Some(n) = std::env::var(ENV_CONCURRENCY)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.max_concurrent_downloads = n;
        }
        self
    }

    /// Download worker count, never below one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_downloads.max(1)
    }

    /// Load a request from a JSON file; `-` reads stdin.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let raw = if path == Path::new("-") {
            std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read request file: {}", path.display()))?
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid snapshot request in {}", path.display()))
    }
}

/// Resolve the audit log path: explicit, then env, then `~/.pagesnap/audit.jsonl`.
pub fn resolve_audit_log_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(env_path) = std::env::var(ENV_AUDIT_LOG) {
        return PathBuf::from(env_path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".pagesnap")
        .join("audit.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_minimal_json() {
        let req: SnapshotRequest =
            serde_json::from_str(r#"{"url":"https://example.com","outputDir":"out"}"#).unwrap();
        assert_eq!(req.user_agent, DEFAULT_USER_AGENT);
        assert!(req.respect_robots);
        assert!(req.download_assets);
        assert!(req.take_screenshots);
        assert_eq!(req.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(req.desktop_viewport, Viewport::new(1920, 1080));
        assert_eq!(req.mobile_viewport, Viewport::new(375, 812));
        assert_eq!(req.concurrency(), DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_request_full_json() {
        let req: SnapshotRequest = serde_json::from_str(
            r#"{
                "url": "https://example.com",
                "outputDir": "/tmp/snap",
                "userAgent": "bot",
                "respectRobots": false,
                "timeoutMs": 1000,
                "downloadAssets": false,
                "takeScreenshots": false,
                "desktopViewport": {"width": 1280, "height": 800},
                "mobileViewport": {"width": 390, "height": 844},
                "maxConcurrentDownloads": 0
            }"#,
        )
        .unwrap();
        assert_eq!(req.user_agent, "bot");
        assert!(!req.respect_robots);
        assert_eq!(req.desktop_viewport, Viewport::new(1280, 800));
        assert_eq!(req.mobile_viewport.width, 390);
        assert_eq!(req.concurrency(), 1);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.json");
        std::fs::write(&path, r#"{"url":"https://a.test","outputDir":"x"}"#).unwrap();
        let req = SnapshotRequest::from_json_file(&path).unwrap();
        assert_eq!(req.url, "https://a.test");

        std::fs::write(&path, "{not json").unwrap();
        assert!(SnapshotRequest::from_json_file(&path).is_err());
    }

    #[test]
    fn test_explicit_audit_path_wins() {
        let p = resolve_audit_log_path(Some(Path::new("/x/audit.jsonl")));
        assert_eq!(p, PathBuf::from("/x/audit.jsonl"));
    }
}

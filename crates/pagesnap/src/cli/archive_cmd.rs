//! `pagesnap archive <url>` and `pagesnap run <request.json>`.

use super::output;
use crate::acquisition::{HttpClient, RobotsChecker};
use crate::audit::{AuditLogger, SnapshotEvent};
use crate::config::{SnapshotRequest, ROBOTS_TIMEOUT_MS};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NoopRenderer, Renderer};
use crate::snapshot::{Archiver, SnapshotOutcome};
use crate::types::Viewport;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Flags of `pagesnap archive`, already parsed.
#[derive(Debug, Clone, Default)]
pub struct ArchiveArgs {
    pub url: String,
    pub out: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub no_robots: bool,
    pub timeout_ms: Option<u64>,
    pub asset_timeout_ms: Option<u64>,
    pub no_assets: bool,
    pub no_screenshots: bool,
    pub desktop: Option<Viewport>,
    pub mobile: Option<Viewport>,
    pub concurrency: Option<usize>,
}

impl ArchiveArgs {
    /// Build the request: defaults, then environment, then flags.
    pub fn into_request(self) -> SnapshotRequest {
        let out = self.out.unwrap_or_else(|| default_output_dir(&self.url));
        let mut req = SnapshotRequest::new(self.url, out).with_env_overrides();
        if let Some(ua) = self.user_agent {
            req.user_agent = ua;
        }
        req.respect_robots = !self.no_robots;
        if let Some(t) = self.timeout_ms {
            req.timeout_ms = t;
        }
        if let Some(t) = self.asset_timeout_ms {
            req.asset_timeout_ms = t;
        }
        req.download_assets = !self.no_assets;
        req.take_screenshots = !self.no_screenshots;
        if let Some(v) = self.desktop {
            req.desktop_viewport = v;
        }
        if let Some(v) = self.mobile {
            req.mobile_viewport = v;
        }
        if let Some(n) = self.concurrency {
            req.max_concurrent_downloads = n;
        }
        req
    }
}

/// `snapshots/<host>` in the working directory.
fn default_output_dir(url: &str) -> PathBuf {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "page".to_string());
    PathBuf::from("snapshots").join(host)
}

/// Archive a URL given on the command line.
pub async fn run_archive(
    args: ArchiveArgs,
    chromium: Option<&Path>,
    audit_log: Option<&Path>,
) -> Result<bool> {
    execute(args.into_request(), chromium, audit_log).await
}

/// Archive from a JSON request file (`-` for stdin).
pub async fn run_request_file(
    path: &Path,
    chromium: Option<&Path>,
    audit_log: Option<&Path>,
) -> Result<bool> {
    let request = SnapshotRequest::from_json_file(path)?;
    execute(request, chromium, audit_log).await
}

async fn execute(
    request: SnapshotRequest,
    chromium: Option<&Path>,
    audit_log: Option<&Path>,
) -> Result<bool> {
    let started = Instant::now();
    output::say(start_line(&request));

    let renderer: Arc<dyn Renderer> = match ChromiumRenderer::launch(chromium).await {
        Ok(r) => Arc::new(r),
        Err(e) => {
            warn!("{e:#}");
            Arc::new(NoopRenderer)
        }
    };

    let client = HttpClient::new(&request.user_agent, request.asset_timeout_ms);
    let robots = RobotsChecker::new(client.clone(), ROBOTS_TIMEOUT_MS);
    let archiver = Archiver::new(renderer.clone(), Arc::new(client)).with_robots(Arc::new(robots));

    let outcome = archiver.archive(&request).await;
    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown failed: {e:#}");
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    record_audit(audit_log, &request.url, &outcome, duration_ms);
    report(&outcome);

    Ok(outcome.success)
}

fn start_line(request: &SnapshotRequest) -> String {
    format!("Archiving {} to {}", request.url, request.output_dir.display())
}

/// Audit failures never fail the run.
fn record_audit(path: Option<&Path>, url: &str, outcome: &SnapshotOutcome, duration_ms: u64) {
    let event = SnapshotEvent::from_outcome(url, outcome, duration_ms);
    match AuditLogger::default_logger(path).and_then(|mut logger| logger.log(&event)) {
        Ok(()) => info!(url, "audit event recorded"),
        Err(e) => warn!("audit log unavailable: {e:#}"),
    }
}

fn report(outcome: &SnapshotOutcome) {
    if output::is_json() {
        output::print_json(outcome);
        return;
    }
    if outcome.success {
        let stats = &outcome.statistics;
        output::say(format!("  [OK] {}", outcome.message));
        output::say(format!(
            "  Assets:      {} total, {} downloaded, {} failed",
            stats.total_assets, stats.downloaded_assets, stats.failed_assets
        ));
        output::say(format!(
            "  Screenshots: desktop {}, mobile {}",
            outcome.screenshots.desktop.as_deref().unwrap_or("-"),
            outcome.screenshots.mobile.as_deref().unwrap_or("-")
        ));
        output::say(format!("  Output:      {}", outcome.output_dir.display()));
        output::say(format!("  Time:        {}ms", stats.processing_time_ms));
    } else if !output::is_quiet() {
        eprintln!("  [!!] {}", outcome.message);
    }
}

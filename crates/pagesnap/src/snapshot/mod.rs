//! The archiving pipeline.
//!
//! [`Archiver::archive`] runs one snapshot end to end: validate the URL,
//! consult robots.txt, render the page, extract and download its assets,
//! capture screenshots, rewrite the markup and write the archive. Fatal
//! errors and panics become a failed [`SnapshotOutcome`]; per-asset and
//! per-screenshot failures are recorded without aborting.

pub mod downloader;
pub mod extractor;
pub mod loader;
pub mod naming;
pub mod rewriter;
pub mod screenshot;
pub mod writer;

use crate::acquisition::{AssetFetcher, RobotsPolicy};
use crate::config::SnapshotRequest;
use crate::error::{SnapshotError, SnapshotResult};
use crate::renderer::{ContextGuard, Renderer, ViewportProfile};
use crate::types::{AssetFailure, AssetLists, AssetMapping, ScreenshotPair, Statistics};
use chrono::{DateTime, Utc};
use downloader::{DownloadOptions, DownloadReport};
use futures::FutureExt;
use loader::LoadedPage;
use screenshot::CaptureOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use writer::MetadataRecord;

/// What the page yielded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedData {
    /// Markup as written to `index.html`.
    pub html: String,
    pub title: String,
    pub metadata: BTreeMap<String, String>,
    pub assets: AssetLists,
}

/// Result of one snapshot run. Always produced, even on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotOutcome {
    pub success: bool,
    /// The page was reached and rendered.
    pub accessible: bool,
    /// False when the URL was rejected or robots.txt forbids the page.
    pub scraping_allowed: bool,
    pub scraped_data: Option<ScrapedData>,
    pub screenshots: ScreenshotPair,
    pub asset_mapping: AssetMapping,
    pub statistics: Statistics,
    pub message: String,
    pub final_url: Option<String>,
    pub output_dir: PathBuf,
    pub failures: Vec<AssetFailure>,
}

impl SnapshotOutcome {
    fn failed(request: &SnapshotRequest, progress: &Progress, message: String) -> Self {
        Self {
            success: false,
            accessible: progress.navigated,
            scraping_allowed: progress.scraping_allowed,
            scraped_data: None,
            screenshots: ScreenshotPair::default(),
            asset_mapping: AssetMapping::new(),
            statistics: Statistics {
                processing_time_ms: progress.elapsed_ms(),
                ..Default::default()
            },
            message,
            final_url: progress.final_url.clone(),
            output_dir: request.output_dir.clone(),
            failures: Vec::new(),
        }
    }
}

/// How far a run got; read when it fails.
struct Progress {
    started: Instant,
    navigated: bool,
    scraping_allowed: bool,
    final_url: Option<String>,
}

impl Progress {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            navigated: false,
            scraping_allowed: true,
            final_url: None,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Everything gathered while the render context was open.
struct RenderedPage {
    page: LoadedPage,
    assets: AssetLists,
    screenshots: ScreenshotPair,
}

/// Snapshot pipeline over injectable collaborators.
pub struct Archiver {
    renderer: Arc<dyn Renderer>,
    fetcher: Arc<dyn AssetFetcher>,
    robots: Option<Arc<dyn RobotsPolicy>>,
}

impl Archiver {
    /// An archiver without a robots.txt policy; see [`Archiver::with_robots`].
    pub fn new(renderer: Arc<dyn Renderer>, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            renderer,
            fetcher,
            robots: None,
        }
    }

    pub fn with_robots(mut self, policy: Arc<dyn RobotsPolicy>) -> Self {
        self.robots = Some(policy);
        self
    }

    /// Run one snapshot. Never panics and never returns an error: every
    /// failure is reported through the outcome.
    pub async fn archive(&self, request: &SnapshotRequest) -> SnapshotOutcome {
        let mut progress = Progress::new();
        let result = AssertUnwindSafe(self.run(request, &mut progress))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                if let SnapshotError::Validation(_) | SnapshotError::PolicyBlocked(_) = e {
                    progress.scraping_allowed = false;
                }
                warn!(url = %request.url, "snapshot failed: {e}");
                SnapshotOutcome::failed(request, &progress, e.to_string())
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(url = %request.url, "snapshot panicked: {detail}");
                SnapshotOutcome::failed(
                    request,
                    &progress,
                    format!("Unexpected failure: {detail}"),
                )
            }
        }
    }

    async fn run(
        &self,
        request: &SnapshotRequest,
        progress: &mut Progress,
    ) -> SnapshotResult<SnapshotOutcome> {
        let target = loader::validate_url(&request.url)?;
        let captured_at = Utc::now();
        info!(url = %target, out = %request.output_dir.display(), "starting snapshot");

        tokio::fs::create_dir_all(&request.output_dir).await?;

        if request.respect_robots {
            match &self.robots {
                Some(policy) => {
                    loader::check_robots(policy.as_ref(), &target, &request.user_agent).await?
                }
                None => debug!("no robots.txt policy configured; skipping check"),
            }
        }

        let context = self
            .renderer
            .new_context(&request.user_agent)
            .await
            .map_err(|e| SnapshotError::Render(format!("failed to open render context: {e:#}")))?;
        let mut guard = ContextGuard::new(context);
        let rendered = self
            .render(&mut guard, request, &target, captured_at, progress)
            .await;
        if let Err(e) = guard.close().await {
            warn!("failed to close render context: {e:#}");
        }
        let RenderedPage {
            page,
            assets,
            screenshots,
        } = rendered?;

        let report = if request.download_assets && !assets.is_empty() {
            let options = DownloadOptions {
                output_dir: request.output_dir.clone(),
                timeout_ms: request.asset_timeout_ms,
                concurrency: request.concurrency(),
            };
            downloader::download_assets(&assets, self.fetcher.as_ref(), &options).await
        } else {
            DownloadReport::default()
        };

        let html = rewriter::rewrite(&page.html, &report.mapping);
        let statistics = Statistics {
            total_assets: report.total,
            downloaded_assets: report.downloaded(),
            failed_assets: report.failed(),
            processing_time_ms: progress.elapsed_ms(),
        };

        let record = MetadataRecord {
            original_url: request.url.clone(),
            final_url: page.final_url.to_string(),
            title: page.title.clone(),
            metadata: page.metadata.clone(),
            assets: assets.clone(),
            downloaded: report.records.clone(),
            failures: report.failures.clone(),
            asset_mapping: report.mapping.clone(),
            screenshots: screenshots.clone(),
            statistics,
            captured_at: captured_at.to_rfc3339(),
            user_agent: request.user_agent.clone(),
        };
        writer::write_archive(&request.output_dir, &html, &record).await?;

        let message = format!(
            "Archived {}: {} of {} assets downloaded, {} failed",
            page.final_url, statistics.downloaded_assets, statistics.total_assets,
            statistics.failed_assets
        );
        info!(
            url = %page.final_url,
            total = statistics.total_assets,
            downloaded = statistics.downloaded_assets,
            failed = statistics.failed_assets,
            elapsed_ms = statistics.processing_time_ms,
            "snapshot complete"
        );

        Ok(SnapshotOutcome {
            success: true,
            accessible: true,
            scraping_allowed: true,
            scraped_data: Some(ScrapedData {
                html,
                title: page.title,
                metadata: page.metadata,
                assets,
            }),
            screenshots,
            asset_mapping: report.mapping,
            statistics,
            message,
            final_url: Some(page.final_url.to_string()),
            output_dir: request.output_dir.clone(),
            failures: report.failures,
        })
    }

    /// Navigation, extraction and screenshots; the only steps that touch
    /// the render context.
    async fn render(
        &self,
        guard: &mut ContextGuard,
        request: &SnapshotRequest,
        target: &url::Url,
        captured_at: DateTime<Utc>,
        progress: &mut Progress,
    ) -> SnapshotResult<RenderedPage> {
        let ctx = guard
            .get_mut()
            .ok_or_else(|| SnapshotError::Render("render context already closed".into()))?;

        let page = loader::load_page(ctx, target, request.timeout_ms).await?;
        progress.navigated = true;
        progress.final_url = Some(page.final_url.to_string());

        let assets = extractor::extract_assets(ctx, &page.html, &page.final_url).await;

        let screenshots = if request.take_screenshots {
            let options = CaptureOptions {
                desktop: ViewportProfile {
                    viewport: request.desktop_viewport,
                    mobile: false,
                },
                mobile: ViewportProfile {
                    viewport: request.mobile_viewport,
                    mobile: true,
                },
                settle_ms: request.screenshot_settle_ms,
                timestamp_ms: captured_at.timestamp_millis(),
            };
            let host = page.final_url.host_str().unwrap_or("page").to_string();
            screenshot::capture_screenshots(ctx, &host, &request.output_dir, &options).await
        } else {
            ScreenshotPair::default()
        };

        Ok(RenderedPage {
            page,
            assets,
            screenshots,
        })
    }
}

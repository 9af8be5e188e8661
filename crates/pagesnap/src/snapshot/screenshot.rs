//! Desktop and mobile full-page screenshots of the loaded page.

use crate::renderer::{RenderContext, ViewportProfile};
use crate::types::ScreenshotPair;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Capture settings for one run.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub desktop: ViewportProfile,
    pub mobile: ViewportProfile,
    /// Wait after each viewport change.
    pub settle_ms: u64,
    /// Epoch milliseconds shared by both filenames.
    pub timestamp_ms: i64,
}

/// Capture both screenshots into `<output_dir>/screenshots/`.
///
/// The two captures are independent: a failure leaves only that slot empty.
pub async fn capture_screenshots(
    ctx: &mut dyn RenderContext,
    host: &str,
    output_dir: &Path,
    options: &CaptureOptions,
) -> ScreenshotPair {
    let host = sanitize_host(host);
    let mut pair = ScreenshotPair::default();

    for (label, profile) in [("desktop", options.desktop), ("mobile", options.mobile)] {
        let rel = format!("screenshots/{host}-{label}-{}.png", options.timestamp_ms);
        match capture_one(ctx, profile, options.settle_ms, &output_dir.join(&rel)).await {
            Ok(bytes) => {
                info!(viewport = %profile.viewport, path = %rel, bytes, "{label} screenshot saved");
                match label {
                    "desktop" => pair.desktop = Some(rel),
                    _ => pair.mobile = Some(rel),
                }
            }
            Err(e) => warn!(viewport = %profile.viewport, "{label} screenshot failed: {e:#}"),
        }
    }

    pair
}

async fn capture_one(
    ctx: &mut dyn RenderContext,
    profile: ViewportProfile,
    settle_ms: u64,
    target: &Path,
) -> Result<usize> {
    ctx.set_viewport(profile)
        .await
        .with_context(|| format!("failed to set viewport {}", profile.viewport))?;
    if settle_ms > 0 {
        tokio::time::sleep(Duration::from_millis(settle_ms)).await;
    }
    let png = ctx.screenshot().await.context("screenshot capture failed")?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(target, &png)
        .await
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(png.len())
}

fn sanitize_host(host: &str) -> String {
    let cleaned: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "page".to_string()
    } else {
        cleaned
    }
}

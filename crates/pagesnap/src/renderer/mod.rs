//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The snapshot
//! pipeline only ever talks to these traits, so tests can drive it with a
//! scripted in-memory page.

pub mod chromium;

use crate::types::Viewport;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code of the main document.
    pub status: u16,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Viewport emulation applied before a screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportProfile {
    pub viewport: Viewport,
    /// Enable mobile emulation (touch, meta viewport handling).
    pub mobile: bool,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab) that identifies as `user_agent`.
    async fn new_context(&self, user_agent: &str) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
///
/// A context is a stateful resource and must not be used concurrently.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Resize the page to the given viewport profile.
    async fn set_viewport(&mut self, profile: ViewportProfile) -> Result<()>;
    /// Capture the full scrollable page as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Owns a render context and guarantees it is closed.
///
/// The explicit `close()` is the normal path. If the guard is dropped while
/// still holding a context (early return or panic), the close is spawned on
/// the current tokio runtime.
pub struct ContextGuard {
    context: Option<Box<dyn RenderContext>>,
}

impl ContextGuard {
    pub fn new(context: Box<dyn RenderContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    /// Borrow the context mutably. `None` only after `close()`.
    pub fn get_mut(&mut self) -> Option<&mut (dyn RenderContext + 'static)> {
        self.context.as_deref_mut()
    }

    /// Close the context, consuming the guard.
    pub async fn close(mut self) -> Result<()> {
        match self.context.take() {
            Some(ctx) => ctx.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(ctx) = self.context.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = ctx.close().await {
                        warn!("render context cleanup failed: {e:#}");
                    } else {
                        debug!("render context closed from drop");
                    }
                });
            }
            Err(_) => warn!("render context dropped outside a runtime; not closed"),
        }
    }
}

/// A no-op renderer used when Chromium is unavailable.
///
/// Every context request fails, so a snapshot aborts at the navigation stage
/// with a readable message instead of a launch panic.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self, _user_agent: &str) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("Browser not available. Run `pagesnap doctor`."))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

//! Page loading: URL validation, the robots.txt gate, and navigation.

use crate::acquisition::robots::{robots_url_for, RobotsPolicy};
use crate::error::{SnapshotError, SnapshotResult};
use crate::renderer::RenderContext;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use tracing::{info, warn};
use url::Url;

/// A page that navigated successfully.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// URL after redirects; base for resolving references.
    pub final_url: Url,
    /// Serialized DOM after rendering.
    pub html: String,
    pub title: String,
    pub metadata: BTreeMap<String, String>,
}

/// Parse `raw` and accept only http(s) URLs.
///
/// Runs before any network activity.
pub fn validate_url(raw: &str) -> SnapshotResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| SnapshotError::Validation(format!("invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SnapshotError::Validation(format!(
            "unsupported URL scheme '{other}': only http and https are allowed"
        ))),
    }
}

/// Consult robots.txt for `target`.
///
/// An unreachable or unreadable robots.txt does not block the snapshot.
pub async fn check_robots(
    policy: &dyn RobotsPolicy,
    target: &Url,
    user_agent: &str,
) -> SnapshotResult<()> {
    let Some(robots_url) = robots_url_for(target) else {
        return Ok(());
    };
    match policy
        .is_allowed(&robots_url, target.as_str(), user_agent)
        .await
    {
        Ok(true) => Ok(()),
        Ok(false) => {
            info!(url = %target, "robots.txt disallows this page");
            Err(SnapshotError::PolicyBlocked(format!(
                "{robots_url} disallows {}",
                target.path()
            )))
        }
        Err(e) => {
            warn!(robots = %robots_url, "robots.txt unavailable ({e}); proceeding");
            Ok(())
        }
    }
}

/// Navigate the context to `target` and capture the rendered document.
///
/// A navigation error, timeout, or non-2xx status is fatal.
pub async fn load_page(
    ctx: &mut dyn RenderContext,
    target: &Url,
    timeout_ms: u64,
) -> SnapshotResult<LoadedPage> {
    let nav = ctx
        .navigate(target.as_str(), timeout_ms)
        .await
        .map_err(|e| SnapshotError::Navigation(format!("{e:#}")))?;

    if !(200..300).contains(&nav.status) {
        return Err(SnapshotError::Navigation(format!(
            "{} answered with HTTP {}",
            target, nav.status
        )));
    }

    let final_url = Url::parse(&nav.final_url).unwrap_or_else(|_| target.clone());
    let html = ctx
        .get_html()
        .await
        .map_err(|e| SnapshotError::Render(format!("failed to read rendered HTML: {e:#}")))?;

    let (markup_title, metadata) = extract_page_metadata(&html);
    let live_title = ctx
        .execute_js("document.title")
        .await
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|t| !t.trim().is_empty());
    let title = live_title
        .or(markup_title)
        .unwrap_or_else(|| "Untitled".to_string());

    info!(
        url = %final_url,
        status = nav.status,
        load_time_ms = nav.load_time_ms,
        bytes = html.len(),
        "page rendered"
    );

    Ok(LoadedPage {
        final_url,
        html,
        title,
        metadata,
    })
}

/// `<title>` text and `<meta>` key/value pairs of a document.
///
/// Keys come from `name`, `property`, or `http-equiv` (first occurrence
/// wins). `charset` and the canonical link are included when present.
pub fn extract_page_metadata(html: &str) -> (Option<String>, BTreeMap<String, String>) {
    let document = Html::parse_document(html);
    let mut metadata = BTreeMap::new();

    let title = Selector::parse("title").ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    if let Ok(sel) = Selector::parse("meta") {
        for el in document.select(&sel) {
            let v = el.value();
            if let Some(charset) = v.attr("charset") {
                metadata
                    .entry("charset".to_string())
                    .or_insert_with(|| charset.to_string());
                continue;
            }
            let key = v
                .attr("name")
                .or_else(|| v.attr("property"))
                .or_else(|| v.attr("http-equiv"));
            if let (Some(key), Some(content)) = (key, v.attr("content")) {
                metadata
                    .entry(key.to_string())
                    .or_insert_with(|| content.to_string());
            }
        }
    }

    if let Ok(sel) = Selector::parse(r#"link[rel="canonical"]"#) {
        if let Some(href) = document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("href"))
        {
            metadata.insert("canonical".to_string(), href.to_string());
        }
    }

    (title, metadata)
}

//! Asset reference extraction from the rendered page.
//!
//! One script runs in the page and returns raw attribute values plus every
//! computed `background-image`. Computed values are absolute, so the
//! `url()` literals written in inline `style` attributes and `<style>`
//! blocks are always added from the markup; the rewriter needs them verbatim.
//! If the script cannot run, every raw reference comes from the markup.
//! Raw references are then resolved against the page's final URL.

use crate::renderer::RenderContext;
use crate::types::{AssetCategory, AssetLists, AssetReference};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

const COLLECT_SCRIPT: &str = r#"(() => {
  const attrs = (selector, name) =>
    Array.from(document.querySelectorAll(selector))
      .map((el) => el.getAttribute(name))
      .filter((v) => v);
  const backgrounds = [];
  for (const el of document.querySelectorAll('*')) {
    const bg = window.getComputedStyle(el).backgroundImage;
    if (bg && bg !== 'none') backgrounds.push(bg);
  }
  const links = Array.from(document.querySelectorAll('link[href]')).map((el) => ({
    rel: el.getAttribute('rel') || '',
    as: el.getAttribute('as') || '',
    href: el.getAttribute('href'),
  }));
  return {
    images: attrs('img[src]', 'src'),
    backgrounds,
    links,
    scripts: attrs('script[src]', 'src'),
  };
})()"#;

const FONT_EXTENSIONS: [&str; 5] = [".woff", ".woff2", ".ttf", ".otf", ".eot"];

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]+))\s*\)"#)
        .expect("valid url() regex")
});

static BACKGROUND_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)background(?:-image)?\s*:\s*([^;}]+)").expect("valid background regex")
});

/// A `<link>` element as seen in the page.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawLink {
    #[serde(default)]
    pub rel: String,
    #[serde(default, rename = "as")]
    pub as_type: String,
    pub href: String,
}

/// Unresolved references, exactly as they appear in the page.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawReferences {
    #[serde(default)]
    pub images: Vec<String>,
    /// Values of `background`/`background-image`; may hold several `url()`s.
    #[serde(default)]
    pub backgrounds: Vec<String>,
    #[serde(default)]
    pub links: Vec<RawLink>,
    #[serde(default)]
    pub scripts: Vec<String>,
}

/// Collect and resolve every asset reference of the loaded page.
pub async fn extract_assets(ctx: &dyn RenderContext, html: &str, base: &Url) -> AssetLists {
    let raw = match ctx.execute_js(COLLECT_SCRIPT).await {
        Ok(value) => match serde_json::from_value::<RawReferences>(value) {
            Ok(mut raw) => {
                raw.backgrounds
                    .extend(markup_backgrounds(&Html::parse_document(html)));
                raw
            }
            Err(e) => {
                warn!("unexpected reference collector result ({e}); scanning markup");
                collect_from_markup(html)
            }
        },
        Err(e) => {
            warn!("reference collector failed ({e:#}); scanning markup");
            collect_from_markup(html)
        }
    };
    let lists = resolve_references(&raw, base);
    debug!(
        images = lists.images.len(),
        stylesheets = lists.stylesheets.len(),
        scripts = lists.scripts.len(),
        fonts = lists.fonts.len(),
        "assets extracted"
    );
    lists
}

/// Collect raw references from serialized markup.
pub fn collect_from_markup(html: &str) -> RawReferences {
    let document = Html::parse_document(html);
    let mut raw = RawReferences::default();

    if let Ok(sel) = Selector::parse("img[src]") {
        raw.images = document
            .select(&sel)
            .filter_map(|el| el.value().attr("src"))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Ok(sel) = Selector::parse("script[src]") {
        raw.scripts = document
            .select(&sel)
            .filter_map(|el| el.value().attr("src"))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Ok(sel) = Selector::parse("link[href]") {
        raw.links = document
            .select(&sel)
            .filter_map(|el| {
                let v = el.value();
                Some(RawLink {
                    rel: v.attr("rel").unwrap_or("").to_string(),
                    as_type: v.attr("as").unwrap_or("").to_string(),
                    href: v.attr("href")?.to_string(),
                })
            })
            .collect();
    }

    raw.backgrounds = markup_backgrounds(&document);
    raw
}

/// Background values written in `style` attributes and `<style>` blocks.
fn markup_backgrounds(document: &Html) -> Vec<String> {
    let mut out = Vec::new();

    if let Ok(sel) = Selector::parse("[style]") {
        for el in document.select(&sel) {
            if let Some(style) = el.value().attr("style") {
                out.extend(background_values(style));
            }
        }
    }

    if let Ok(sel) = Selector::parse("style") {
        for el in document.select(&sel) {
            let css: String = el.text().collect();
            out.extend(background_values(&css));
        }
    }

    out
}

fn background_values(css: &str) -> Vec<String> {
    BACKGROUND_DECL_RE
        .captures_iter(css)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| CSS_URL_RE.is_match(v))
        .collect()
}

/// Every `url(...)` argument in a CSS value, unquoted.
pub fn css_url_literals(value: &str) -> Vec<String> {
    CSS_URL_RE
        .captures_iter(value)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Resolve raw references into categorized lists.
///
/// References that do not resolve to an http(s) URL (inline `data:`/`blob:`
/// payloads, `javascript:`, garbage) are dropped one by one. A literal seen
/// twice within a category is listed once.
pub fn resolve_references(raw: &RawReferences, base: &Url) -> AssetLists {
    let mut lists = AssetLists::default();
    let mut seen: HashSet<(AssetCategory, String)> = HashSet::new();

    let mut push = |category: AssetCategory, literal: &str| {
        let Some(url) = canonicalize(base, literal) else {
            debug!(literal = %literal, "dropping unresolvable reference");
            return;
        };
        if seen.insert((category, literal.to_string())) {
            lists.list_mut(category).push(AssetReference {
                url,
                original: literal.to_string(),
                category,
            });
        }
    };

    for src in &raw.images {
        push(AssetCategory::Image, src);
    }
    for value in &raw.backgrounds {
        for literal in css_url_literals(value) {
            push(AssetCategory::Image, &literal);
        }
    }
    for link in &raw.links {
        if let Some(category) = classify_link(link) {
            push(category, &link.href);
        }
    }
    for src in &raw.scripts {
        push(AssetCategory::Script, src);
    }

    lists
}

/// Stylesheet, font, or not an asset we archive.
fn classify_link(link: &RawLink) -> Option<AssetCategory> {
    let rel = link.rel.to_ascii_lowercase();
    let mut tokens = rel.split_whitespace();
    if tokens.clone().any(|t| t == "stylesheet") {
        return Some(AssetCategory::Stylesheet);
    }
    let preload = tokens.any(|t| t == "preload" || t == "prefetch");
    if preload && link.as_type.eq_ignore_ascii_case("font") {
        return Some(AssetCategory::Font);
    }
    let path = link
        .href
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if FONT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return Some(AssetCategory::Font);
    }
    None
}

/// Absolute http(s) URL for a literal, fragment removed.
pub fn canonicalize(base: &Url, literal: &str) -> Option<String> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("data:") || lower.starts_with("blob:") {
        return None;
    }
    let mut url = base.join(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{NavigationResult, ViewportProfile};
    use anyhow::Result;
    use async_trait::async_trait;

    /// Answers the collector script with a fixed value.
    struct CollectedPage {
        collected: Option<serde_json::Value>,
    }

    #[async_trait]
    impl RenderContext for CollectedPage {
        async fn navigate(&mut self, url: &str, _t: u64) -> Result<NavigationResult> {
            Ok(NavigationResult {
                final_url: url.to_string(),
                status: 200,
                load_time_ms: 0,
            })
        }
        async fn execute_js(&self, _s: &str) -> Result<serde_json::Value> {
            match &self.collected {
                Some(v) => Ok(v.clone()),
                None => anyhow::bail!("execution context destroyed"),
            }
        }
        async fn get_html(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn set_viewport(&mut self, _p: ViewportProfile) -> Result<()> {
            Ok(())
        }
        async fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn base() -> Url {
        Url::parse("https://example.com/blog/post.html").unwrap()
    }

    const PAGE: &str = r#"<!doctype html>
<html><head>
  <title>Post</title>
  <link rel="stylesheet" href="/css/site.css">
  <link rel="Alternate Stylesheet" href="dark.css">
  <link rel="preload" as="font" href="/fonts/inter.woff2" crossorigin>
  <link rel="icon" href="/favicon.ico">
  <link href="https://cdn.example.net/f/roboto.ttf?v=2">
  <style>.hero { background-image: url('/img/hero.jpg'); color: red }</style>
  <script src="/js/app.js"></script>
  <script>inline()</script>
</head><body>
  <img src="../img/a.png">
  <img src="https://example.com/img/a.png">
  <img src="data:image/png;base64,AAAA">
  <img src="">
  <div style="background: #fff url(&quot;/img/bg.png&quot;) no-repeat"></div>
  <img src="/img/a.png#frag">
</body></html>"#;

    #[test]
    fn test_collect_from_markup() {
        let raw = collect_from_markup(PAGE);
        assert_eq!(raw.images.len(), 4);
        assert_eq!(raw.scripts, vec!["/js/app.js"]);
        assert_eq!(raw.links.len(), 5);
        assert_eq!(raw.backgrounds.len(), 2);
    }

    #[test]
    fn test_resolve_categorizes_and_canonicalizes() {
        let lists = resolve_references(&collect_from_markup(PAGE), &base());

        let images: Vec<_> = lists.images.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(
            images,
            vec![
                "../img/a.png",
                "https://example.com/img/a.png",
                "/img/a.png#frag",
                "/img/bg.png",
                "/img/hero.jpg",
            ]
        );
        // Three literals, one canonical URL.
        assert!(lists.images[..3]
            .iter()
            .all(|r| r.url == "https://example.com/img/a.png"));

        let sheets: Vec<_> = lists.stylesheets.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            sheets,
            vec![
                "https://example.com/css/site.css",
                "https://example.com/blog/dark.css",
            ]
        );

        let fonts: Vec<_> = lists.fonts.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            fonts,
            vec![
                "https://example.com/fonts/inter.woff2",
                "https://cdn.example.net/f/roboto.ttf?v=2",
            ]
        );

        assert_eq!(lists.scripts.len(), 1);
        assert_eq!(lists.scripts[0].url, "https://example.com/js/app.js");
    }

    #[test]
    fn test_css_url_literals() {
        let v = r#"url("a.png"), linear-gradient(red, blue), url('b.png'), URL( c.png )"#;
        assert_eq!(css_url_literals(v), vec!["a.png", "b.png", "c.png"]);
        assert!(css_url_literals("none").is_empty());
    }

    #[test]
    fn test_canonicalize_drops_inline_and_foreign_schemes() {
        let b = base();
        assert_eq!(canonicalize(&b, "data:image/gif;base64,R0"), None);
        assert_eq!(canonicalize(&b, "blob:https://example.com/1234"), None);
        assert_eq!(canonicalize(&b, "javascript:void(0)"), None);
        assert_eq!(canonicalize(&b, "   "), None);
        assert_eq!(
            canonicalize(&b, " img/x.png#top "),
            Some("https://example.com/blog/img/x.png".to_string())
        );
    }

    #[test]
    fn test_raw_references_from_script_result() {
        let value = serde_json::json!({
            "images": ["/a.png"],
            "backgrounds": ["url(\"https://example.com/bg.png\")"],
            "links": [{"rel": "stylesheet", "as": "", "href": "/s.css"}],
            "scripts": []
        });
        let raw: RawReferences = serde_json::from_value(value).unwrap();
        let lists = resolve_references(&raw, &base());
        assert_eq!(lists.images.len(), 2);
        assert_eq!(lists.images[1].original, "https://example.com/bg.png");
        assert_eq!(lists.stylesheets[0].url, "https://example.com/s.css");
    }

    #[tokio::test]
    async fn test_script_result_keeps_markup_background_literals() {
        // Computed styles come back absolute; the markup still says '/img/hero.jpg'.
        let page = CollectedPage {
            collected: Some(serde_json::json!({
                "images": ["/img/a.png"],
                "backgrounds": [
                    "url(\"https://example.com/img/hero.jpg\")",
                    "url(\"https://example.com/img/bg.png\")"
                ],
                "links": [{"rel": "stylesheet", "as": "", "href": "/css/site.css"}],
                "scripts": ["/js/app.js"]
            })),
        };
        let lists = extract_assets(&page, PAGE, &base()).await;

        let originals: Vec<_> = lists.images.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(
            originals,
            vec![
                "/img/a.png",
                "https://example.com/img/hero.jpg",
                "https://example.com/img/bg.png",
                "/img/bg.png",
                "/img/hero.jpg",
            ]
        );
        let hero: Vec<_> = lists
            .images
            .iter()
            .filter(|r| r.url == "https://example.com/img/hero.jpg")
            .collect();
        assert_eq!(hero.len(), 2);
        assert_eq!(lists.stylesheets.len(), 1);
        assert_eq!(lists.scripts.len(), 1);
    }

    #[tokio::test]
    async fn test_script_failure_scans_markup() {
        let page = CollectedPage { collected: None };
        let lists = extract_assets(&page, PAGE, &base()).await;
        assert_eq!(lists.images.len(), 5);
        assert_eq!(lists.stylesheets.len(), 2);
        assert_eq!(lists.fonts.len(), 2);
    }
}

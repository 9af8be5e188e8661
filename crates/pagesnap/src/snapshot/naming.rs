//! Collision-safe local filenames for downloaded assets.
//!
//! A filename is `<basename>-<hash>.<ext>`: the sanitized last path segment,
//! a blake3 digest of the canonical URL, and the path's extension (or the
//! category default). The digest depends only on the URL, so a re-run lands
//! on the same file and can skip the download.

use crate::types::AssetCategory;
use std::collections::HashMap;
use url::Url;

/// Hex characters of the digest used in the common case.
const SHORT_HASH_LEN: usize = 12;
const MAX_BASENAME_LEN: usize = 48;
const MAX_EXTENSION_LEN: usize = 5;

/// Hands out filenames and guarantees distinct URLs never share one.
///
/// If two URLs ever produce the same short name, the later one gets the
/// full 64-character digest instead.
#[derive(Debug, Default)]
pub struct AssetNamer {
    /// `<category dir>/<filename>` → canonical URL that owns it.
    assigned: HashMap<String, String>,
}

impl AssetNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative path (`assets/<dir>/<file>`) for a canonical URL.
    ///
    /// Asking twice for the same URL returns the same path.
    pub fn assign(&mut self, canonical: &str, category: AssetCategory) -> String {
        let (base, ext) = split_basename(canonical);
        let ext = ext.unwrap_or_else(|| category.default_extension().to_string());
        let digest = blake3::hash(canonical.as_bytes()).to_hex();
        let dir = category.dir_name();

        let mut path = format!("assets/{dir}/{base}-{}.{ext}", &digest[..SHORT_HASH_LEN]);
        if self
            .assigned
            .get(&path)
            .is_some_and(|owner| owner != canonical)
        {
            path = format!("assets/{dir}/{base}-{}.{ext}", digest.as_str());
        }
        self.assigned.insert(path.clone(), canonical.to_string());
        path
    }
}

/// Sanitized basename and lowercase extension of the URL's last path segment.
pub fn split_basename(canonical: &str) -> (String, Option<String>) {
    let segment = Url::parse(canonical)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_default();

    let (stem, ext) = match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=MAX_EXTENSION_LEN).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem.to_string(), Some(ext.to_ascii_lowercase()))
        }
        _ => (segment, None),
    };

    (sanitize(&stem), ext)
}

/// Collapse every run of non-alphanumeric characters into one `_`.
fn sanitize(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut pending = false;
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            if pending && !out.is_empty() {
                out.push('_');
            }
            pending = false;
            out.push(c);
        } else {
            pending = true;
        }
        if out.len() >= MAX_BASENAME_LEN {
            break;
        }
    }
    if out.is_empty() {
        "asset".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_basename() {
        assert_eq!(
            split_basename("https://a.test/img/hero--banner.JPG?x=1"),
            ("hero_banner".to_string(), Some("jpg".to_string()))
        );
        assert_eq!(
            split_basename("https://a.test/css/"),
            ("css".to_string(), None)
        );
        assert_eq!(split_basename("https://a.test/"), ("asset".to_string(), None));
        assert_eq!(
            split_basename("https://a.test/bundle.min.js"),
            ("bundle_min".to_string(), Some("js".to_string()))
        );
        assert_eq!(
            split_basename("https://a.test/font.woff2-backup"),
            ("font_woff2_backup".to_string(), None)
        );
    }

    #[test]
    fn test_sanitize_collapses_and_truncates() {
        assert_eq!(sanitize("--a!!b__c--"), "a_b_c");
        assert_eq!(sanitize("%%%"), "asset");
        assert!(sanitize(&"x".repeat(200)).len() <= MAX_BASENAME_LEN);
    }

    #[test]
    fn test_assign_is_deterministic_and_categorized() {
        let mut a = AssetNamer::new();
        let mut b = AssetNamer::new();
        let p1 = a.assign("https://a.test/logo.svg", AssetCategory::Image);
        let p2 = b.assign("https://a.test/logo.svg", AssetCategory::Image);
        assert_eq!(p1, p2);
        assert!(p1.starts_with("assets/images/logo-"));
        assert!(p1.ends_with(".svg"));

        let css = a.assign("https://a.test/site", AssetCategory::Stylesheet);
        assert!(css.starts_with("assets/stylesheets/site-"));
        assert!(css.ends_with(".css"));
    }

    #[test]
    fn test_distinct_urls_never_share_a_name() {
        let mut namer = AssetNamer::new();
        let mut seen = HashSet::new();
        for i in 0..500 {
            // Same basename, differing only in query.
            let url = format!("https://a.test/img/photo.jpg?v={i}");
            assert!(seen.insert(namer.assign(&url, AssetCategory::Image)));
        }
        let again = namer.assign("https://a.test/img/photo.jpg?v=7", AssetCategory::Image);
        assert!(seen.contains(&again));
    }

    #[test]
    fn test_forced_collision_uses_full_digest() {
        let mut namer = AssetNamer::new();
        let first = namer.assign("https://a.test/x.png", AssetCategory::Image);
        // Pretend another URL already owns the short name.
        namer
            .assigned
            .insert(first.clone(), "https://other.test/x.png".to_string());
        let second = namer.assign("https://a.test/x.png", AssetCategory::Image);
        assert_ne!(first, second);
        assert_eq!(second.len(), first.len() + 64 - SHORT_HASH_LEN);
    }
}

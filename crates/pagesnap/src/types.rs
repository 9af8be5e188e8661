//! Core data types for snapshot assets, mappings, and statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kind of sub-resource a reference points at.
///
/// Determines the output subdirectory and the default file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Image,
    Stylesheet,
    Script,
    Font,
}

impl AssetCategory {
    /// All categories, in extraction order.
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Image,
        AssetCategory::Stylesheet,
        AssetCategory::Script,
        AssetCategory::Font,
    ];

    /// Subdirectory under `assets/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetCategory::Image => "images",
            AssetCategory::Stylesheet => "stylesheets",
            AssetCategory::Script => "scripts",
            AssetCategory::Font => "fonts",
        }
    }

    /// Extension used when the URL path carries none.
    pub fn default_extension(self) -> &'static str {
        match self {
            AssetCategory::Image => "png",
            AssetCategory::Stylesheet => "css",
            AssetCategory::Script => "js",
            AssetCategory::Font => "woff2",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetCategory::Image => "image",
            AssetCategory::Stylesheet => "stylesheet",
            AssetCategory::Script => "script",
            AssetCategory::Font => "font",
        };
        f.write_str(s)
    }
}

/// A single reference to a sub-resource found in the rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
    /// Absolute URL with the fragment removed; the deduplication key.
    pub url: String,
    /// Text exactly as it appeared in the markup or computed style.
    pub original: String,
    pub category: AssetCategory,
}

/// References grouped by category, each list in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLists {
    pub images: Vec<AssetReference>,
    pub stylesheets: Vec<AssetReference>,
    pub scripts: Vec<AssetReference>,
    pub fonts: Vec<AssetReference>,
}

impl AssetLists {
    /// Mutable list for a category.
    pub fn list_mut(&mut self, category: AssetCategory) -> &mut Vec<AssetReference> {
        match category {
            AssetCategory::Image => &mut self.images,
            AssetCategory::Stylesheet => &mut self.stylesheets,
            AssetCategory::Script => &mut self.scripts,
            AssetCategory::Font => &mut self.fonts,
        }
    }

    /// All references flattened in category order.
    pub fn iter(&self) -> impl Iterator<Item = &AssetReference> {
        self.images
            .iter()
            .chain(self.stylesheets.iter())
            .chain(self.scripts.iter())
            .chain(self.fonts.iter())
    }

    /// Total number of references, duplicates included.
    pub fn len(&self) -> usize {
        self.images.len() + self.stylesheets.len() + self.scripts.len() + self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A sub-resource stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub url: String,
    /// Path relative to the snapshot root, `/`-separated.
    pub local_path: String,
    /// Bytes written; 0 when an existing file was reused.
    pub size: u64,
    pub category: AssetCategory,
}

/// A sub-resource that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFailure {
    pub url: String,
    pub category: AssetCategory,
    pub error: String,
}

/// Literal reference text → local relative path.
///
/// Keys are sorted so the serialized record is stable across runs.
pub type AssetMapping = BTreeMap<String, String>;

/// Screenshot file paths, each absent when its capture failed or was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotPair {
    pub desktop: Option<String>,
    pub mobile: Option<String>,
}

/// Counters reported with every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_assets: usize,
    pub downloaded_assets: usize,
    pub failed_assets: usize,
    pub processing_time_ms: u64,
}

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Viewport {
    type Err = String;

    /// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid width '{w}': {e}"))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid height '{h}': {e}"))?;
        if width == 0 || height == 0 {
            return Err(format!("viewport must be non-zero, got '{s}'"));
        }
        Ok(Self { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_parse() {
        let vp: Viewport = "1920x1080".parse().unwrap();
        assert_eq!(vp, Viewport::new(1920, 1080));
        assert_eq!(vp.to_string(), "1920x1080");
        assert!("1920".parse::<Viewport>().is_err());
        assert!("0x10".parse::<Viewport>().is_err());
        assert!("axb".parse::<Viewport>().is_err());
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&AssetCategory::Stylesheet).unwrap();
        assert_eq!(json, "\"stylesheet\"");
        assert_eq!(AssetCategory::Font.dir_name(), "fonts");
        assert_eq!(AssetCategory::Script.default_extension(), "js");
    }

    #[test]
    fn test_asset_lists_iter_order() {
        let mut lists = AssetLists::default();
        for category in AssetCategory::ALL.iter().rev() {
            lists.list_mut(*category).push(AssetReference {
                url: format!("https://a.test/{category}"),
                original: category.to_string(),
                category: *category,
            });
        }
        let order: Vec<_> = lists.iter().map(|r| r.category).collect();
        assert_eq!(order, AssetCategory::ALL.to_vec());
        assert_eq!(lists.len(), 4);
    }
}

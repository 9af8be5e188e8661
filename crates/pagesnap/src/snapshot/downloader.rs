//! Deduplicated asset downloads with per-item failure isolation.
//!
//! References are grouped by canonical URL; each unique URL is fetched at
//! most once and written under `assets/<category>/`. A failed fetch is
//! recorded and never aborts the batch.

use super::naming::AssetNamer;
use crate::acquisition::AssetFetcher;
use crate::types::{AssetCategory, AssetFailure, AssetLists, AssetMapping, AssetRecord};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where and how to download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Snapshot root; assets land under `<root>/assets/`.
    pub output_dir: PathBuf,
    /// Timeout for each fetch.
    pub timeout_ms: u64,
    /// Maximum number of fetches in flight.
    pub concurrency: usize,
}

/// One canonical URL and every literal that referenced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAsset {
    pub url: String,
    /// Category of the first reference.
    pub category: AssetCategory,
    /// Distinct literals, first-seen order.
    pub literals: Vec<String>,
    pub local_path: String,
}

/// Outcome of a download batch.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub records: Vec<AssetRecord>,
    pub failures: Vec<AssetFailure>,
    pub mapping: AssetMapping,
    /// Number of unique canonical URLs.
    pub total: usize,
}

impl DownloadReport {
    pub fn downloaded(&self) -> usize {
        self.records.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Group references by canonical URL and assign each a local path.
pub fn plan_downloads(lists: &AssetLists, namer: &mut AssetNamer) -> Vec<PlannedAsset> {
    let mut plan: Vec<PlannedAsset> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for reference in lists.iter() {
        match index.get(reference.url.as_str()) {
            Some(&i) => {
                let entry = &mut plan[i];
                if !entry.literals.contains(&reference.original) {
                    entry.literals.push(reference.original.clone());
                }
            }
            None => {
                index.insert(reference.url.as_str(), plan.len());
                plan.push(PlannedAsset {
                    url: reference.url.clone(),
                    category: reference.category,
                    literals: vec![reference.original.clone()],
                    local_path: namer.assign(&reference.url, reference.category),
                });
            }
        }
    }

    plan
}

/// Download every unique asset referenced by `lists`.
pub async fn download_assets(
    lists: &AssetLists,
    fetcher: &dyn AssetFetcher,
    options: &DownloadOptions,
) -> DownloadReport {
    let mut namer = AssetNamer::new();
    let plan = plan_downloads(lists, &mut namer);
    info!(
        references = lists.len(),
        unique = plan.len(),
        concurrency = options.concurrency,
        "downloading assets"
    );

    let mut results: Vec<(usize, Result<AssetRecord, AssetFailure>)> =
        stream::iter(plan.iter().enumerate())
            .map(|(i, asset)| async move {
                let result =
                    store_asset(asset, fetcher, &options.output_dir, options.timeout_ms).await;
                (i, result)
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;
    results.sort_by_key(|(i, _)| *i);

    let mut report = DownloadReport {
        total: plan.len(),
        ..Default::default()
    };
    for (i, result) in results {
        match result {
            Ok(record) => {
                let asset = &plan[i];
                report
                    .mapping
                    .insert(asset.url.clone(), asset.local_path.clone());
                for literal in &asset.literals {
                    report
                        .mapping
                        .insert(literal.clone(), asset.local_path.clone());
                }
                report.records.push(record);
            }
            Err(failure) => report.failures.push(failure),
        }
    }

    info!(
        total = report.total,
        downloaded = report.downloaded(),
        failed = report.failed(),
        "asset downloads finished"
    );
    report
}

async fn store_asset(
    asset: &PlannedAsset,
    fetcher: &dyn AssetFetcher,
    root: &Path,
    timeout_ms: u64,
) -> Result<AssetRecord, AssetFailure> {
    let fail = |error: String| {
        warn!(url = %asset.url, "asset failed: {error}");
        AssetFailure {
            url: asset.url.clone(),
            category: asset.category,
            error,
        }
    };

    let target = root.join(&asset.local_path);
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        debug!(url = %asset.url, path = %asset.local_path, "already present, skipping fetch");
        return Ok(AssetRecord {
            url: asset.url.clone(),
            local_path: asset.local_path.clone(),
            size: 0,
            category: asset.category,
        });
    }

    let bytes = fetcher
        .fetch(&asset.url, timeout_ms)
        .await
        .map_err(|e| fail(e.to_string()))?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| fail(format!("failed to create {}: {e}", parent.display())))?;
    }
    tokio::fs::write(&target, &bytes)
        .await
        .map_err(|e| fail(format!("failed to write {}: {e}", target.display())))?;

    debug!(url = %asset.url, path = %asset.local_path, size = bytes.len(), "asset stored");
    Ok(AssetRecord {
        url: asset.url.clone(),
        local_path: asset.local_path.clone(),
        size: bytes.len() as u64,
        category: asset.category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::types::AssetReference;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves bytes from a table; anything else is a 404.
    struct TableFetcher {
        table: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
    }

    impl TableFetcher {
        fn new(entries: &[(&str, &[u8])]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(u, b)| (u.to_string(), b.to_vec()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AssetFetcher for TableFetcher {
        async fn fetch(&self, url: &str, _timeout_ms: u64) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table.get(url).cloned().ok_or(FetchError::Status(404))
        }
    }

    fn reference(url: &str, original: &str, category: AssetCategory) -> AssetReference {
        AssetReference {
            url: url.to_string(),
            original: original.to_string(),
            category,
        }
    }

    fn sample_lists() -> AssetLists {
        AssetLists {
            images: vec![
                reference("https://a.test/img/a.png", "/img/a.png", AssetCategory::Image),
                reference("https://a.test/img/a.png", "https://a.test/img/a.png", AssetCategory::Image),
                reference("https://a.test/img/b.png", "img/b.png", AssetCategory::Image),
                reference("https://a.test/img/gone.png", "gone.png", AssetCategory::Image),
            ],
            stylesheets: vec![reference(
                "https://a.test/site.css",
                "/site.css",
                AssetCategory::Stylesheet,
            )],
            ..Default::default()
        }
    }

    fn options(dir: &Path, concurrency: usize) -> DownloadOptions {
        DownloadOptions {
            output_dir: dir.to_path_buf(),
            timeout_ms: 1000,
            concurrency,
        }
    }

    #[test]
    fn test_plan_groups_by_canonical_url() {
        let mut namer = AssetNamer::new();
        let plan = plan_downloads(&sample_lists(), &mut namer);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].literals, vec!["/img/a.png", "https://a.test/img/a.png"]);
        assert_eq!(plan[3].category, AssetCategory::Stylesheet);
        assert!(plan[3].local_path.starts_with("assets/stylesheets/site-"));
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TableFetcher::new(&[
            ("https://a.test/img/a.png", b"AAA"),
            ("https://a.test/img/b.png", b"BB"),
            ("https://a.test/site.css", b"body{}"),
        ]);

        let report = download_assets(&sample_lists(), &fetcher, &options(dir.path(), 3)).await;

        assert_eq!(report.total, 4);
        assert_eq!(report.downloaded(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].url, "https://a.test/img/gone.png");
        assert!(report.failures[0].error.contains("404"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);

        // Both literals and the canonical URL share one path.
        let p = &report.mapping["/img/a.png"];
        assert_eq!(&report.mapping["https://a.test/img/a.png"], p);
        assert_eq!(std::fs::read(dir.path().join(p)).unwrap(), b"AAA");
        assert!(!report.mapping.contains_key("gone.png"));
    }

    #[tokio::test]
    async fn test_rerun_skips_present_files() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TableFetcher::new(&[
            ("https://a.test/img/a.png", b"AAA"),
            ("https://a.test/img/b.png", b"BB"),
            ("https://a.test/site.css", b"body{}"),
        ]);

        let first = download_assets(&sample_lists(), &fetcher, &options(dir.path(), 1)).await;
        let calls_after_first = fetcher.calls.load(Ordering::SeqCst);
        let second = download_assets(&sample_lists(), &fetcher, &options(dir.path(), 1)).await;

        assert_eq!(second.downloaded(), first.downloaded());
        assert_eq!(second.mapping, first.mapping);
        assert!(second.records.iter().all(|r| r.size == 0));
        // Only the missing asset is requested again.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), calls_after_first + 1);
    }

    #[tokio::test]
    async fn test_empty_lists() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TableFetcher::new(&[]);
        let report = download_assets(&AssetLists::default(), &fetcher, &options(dir.path(), 4)).await;
        assert_eq!(report.total, 0);
        assert!(report.mapping.is_empty());
    }
}

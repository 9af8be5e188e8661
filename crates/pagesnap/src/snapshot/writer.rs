//! Persist the rewritten markup and the provenance record.

use crate::error::SnapshotResult;
use crate::types::{
    AssetFailure, AssetLists, AssetMapping, AssetRecord, ScreenshotPair, Statistics,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const INDEX_FILE: &str = "index.html";
pub const METADATA_FILE: &str = "metadata.json";

/// Contents of `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub original_url: String,
    pub final_url: String,
    pub title: String,
    pub metadata: BTreeMap<String, String>,
    pub assets: AssetLists,
    pub downloaded: Vec<AssetRecord>,
    pub failures: Vec<AssetFailure>,
    pub asset_mapping: AssetMapping,
    pub screenshots: ScreenshotPair,
    pub statistics: Statistics,
    /// RFC 3339.
    pub captured_at: String,
    pub user_agent: String,
}

/// Files produced by [`write_archive`].
#[derive(Debug, Clone)]
pub struct WrittenArchive {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Write `index.html` and `metadata.json` under `output_dir`, replacing any
/// previous copies.
pub async fn write_archive(
    output_dir: &Path,
    html: &str,
    record: &MetadataRecord,
) -> SnapshotResult<WrittenArchive> {
    tokio::fs::create_dir_all(output_dir).await?;

    let index_path = output_dir.join(INDEX_FILE);
    tokio::fs::write(&index_path, html).await?;

    let metadata_path = output_dir.join(METADATA_FILE);
    let json = serde_json::to_string_pretty(record)?;
    tokio::fs::write(&metadata_path, json).await?;

    info!(
        index = %index_path.display(),
        metadata = %metadata_path.display(),
        "archive written"
    );
    Ok(WrittenArchive {
        index_path,
        metadata_path,
    })
}

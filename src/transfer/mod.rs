use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::bucket::DatasetId;
use crate::config::PromotionConfig;
use crate::error::{PromoteError, Result};
use crate::storage::StorageBackend;

/// One planned upload: a local release resource and its bucket URL.
#[derive(Debug, Clone)]
pub struct TransferItem {
    pub source: PathBuf,
    pub destination: String,
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub items: Vec<TransferItem>,
    /// Files under the version root that no dataset claims. Usually a
    /// typoed dataset name; they are never uploaded.
    pub strays: Vec<PathBuf>,
    pub applied: bool,
}

/// Copies per-dataset release resources (config, publisher cards,
/// release stats) from the local `release-resources/{version}/` tree
/// into each dataset's raw bucket under `release_resources/{version}/`.
///
/// Every expected file and every target bucket is checked before the
/// first copy runs, so a typo never leaves a bucket half-populated.
pub struct ReleaseTransfer<'a> {
    backend: &'a dyn StorageBackend,
    config: &'a PromotionConfig,
}

impl<'a> ReleaseTransfer<'a> {
    pub fn new(backend: &'a dyn StorageBackend, config: &'a PromotionConfig) -> Self {
        Self { backend, config }
    }

    pub async fn run(&self, resources_root: &Path, dry_run: bool) -> Result<TransferOutcome> {
        let version = self.config.general.release_version.trim();
        if version.is_empty() {
            return Err(PromoteError::Config(
                "config has no general.release_version".to_string(),
            ));
        }
        if self.config.general.dataset_names.is_empty() {
            return Err(PromoteError::Config(
                "config has no general.dataset_names".to_string(),
            ));
        }
        let version_root = resources_root.join(version);

        let mut items = Vec::new();
        let mut missing = Vec::new();
        for name in &self.config.general.dataset_names {
            let id = DatasetId::from_combined(name)?;
            let bucket = self.config.naming.raw_bucket(&id)?;
            self.backend.describe_bucket(&bucket).await?;

            for relative in expected_files(version, name) {
                let source = version_root.join(&relative);
                if !source.is_file() {
                    missing.push(source.display().to_string());
                    continue;
                }
                let destination =
                    bucket.join(&format!("release_resources/{}/{}", version, relative));
                items.push(TransferItem {
                    source,
                    destination,
                });
            }
        }
        if !missing.is_empty() {
            return Err(PromoteError::Transfer(format!(
                "missing release resources: {}",
                missing.join(", ")
            )));
        }

        let strays = stray_files(&version_root, &items)?;

        if !dry_run {
            for item in &items {
                let source = item.source.to_string_lossy();
                self.backend.copy(&source, &item.destination, false).await?;
            }
        }

        Ok(TransferOutcome {
            items,
            strays,
            applied: !dry_run,
        })
    }
}

/// The fixed set of resources a release ships per dataset, relative to
/// the version root.
fn expected_files(version: &str, dataset_name: &str) -> Vec<String> {
    vec![
        format!("config/release_{}.json", version),
        format!("publisher_cards/text/{}_CARD.html", dataset_name),
        format!(
            "publisher_cards/figures/combined/{}-ALL.svg",
            dataset_name
        ),
        format!("release_stats/{}/release_stats.json", dataset_name),
    ]
}

fn stray_files(version_root: &Path, items: &[TransferItem]) -> Result<Vec<PathBuf>> {
    if !version_root.is_dir() {
        return Ok(Vec::new());
    }
    let expected: BTreeSet<&Path> = items.iter().map(|i| i.source.as_path()).collect();
    let pattern = format!("{}/**/*", version_root.display());

    let mut strays = Vec::new();
    for entry in glob::glob(&pattern)
        .map_err(|e| PromoteError::Transfer(format!("bad resource pattern: {e}")))?
    {
        let path = entry.map_err(|e| PromoteError::Transfer(e.to_string()))?;
        if path.is_file() && !expected.contains(path.as_path()) {
            strays.push(path);
        }
    }
    Ok(strays)
}

use std::fmt;

use serde::Serialize;
use tabled::Tabled;

use crate::bucket::{base_name, BucketSnapshot, BucketUrl};
use crate::error::Result;
use crate::storage::{take_snapshot, try_take_snapshot, StorageBackend};

use super::manifest::CombinedManifest;

/// Files at or below this many bytes are treated as empty. Harmonized
/// outputs are never this small; anything under it is a placeholder or
/// a truncated upload.
pub const EMPTY_FILE_THRESHOLD: u64 = 10;

const MANIFEST_FILE: &str = "MANIFEST.tsv";
const SAMPLE_LIST_FILE: &str = "sample_list.tsv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    Passed,
    Failed,
    NotApplicable,
}

impl CheckStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "✅",
            CheckStatus::Failed => "❌",
            CheckStatus::NotApplicable => "N/A",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CheckStatus::Failed)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Test outcomes for one workflow output file.
#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    pub name: String,
    pub timestamp: Option<String>,
    pub not_empty: CheckStatus,
    pub metadata_present: CheckStatus,
}

impl FileCheck {
    pub fn passed(&self) -> bool {
        !self.not_empty.is_failed() && !self.metadata_present.is_failed()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub checks: Vec<FileCheck>,
    pub threshold: u64,
}

impl IntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed())
    }

    pub fn all_not_empty(&self) -> bool {
        !self.checks.iter().any(|c| c.not_empty.is_failed())
    }

    pub fn all_in_manifest(&self) -> bool {
        !self.checks.iter().any(|c| c.metadata_present.is_failed())
    }

    pub fn failures(&self) -> Vec<&FileCheck> {
        self.checks.iter().filter(|c| !c.passed()).collect()
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct CheckTableRow {
    #[tabled(rename = "filename")]
    pub filename: String,
    #[tabled(rename = "timestamp")]
    pub timestamp: String,
    #[tabled(rename = "not empty")]
    pub not_empty: String,
    #[tabled(rename = "metadata present")]
    pub metadata_present: String,
}

impl From<&FileCheck> for CheckTableRow {
    fn from(check: &FileCheck) -> Self {
        Self {
            filename: check.name.clone(),
            timestamp: check
                .timestamp
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            not_empty: check.not_empty.symbol().to_string(),
            metadata_present: check.metadata_present.symbol().to_string(),
        }
    }
}

/// Everything the checks and the report need to know about one workflow
/// prefix of a staging bucket: the live files (the `archive/` history is
/// skipped), the combined manifest rows, and where the manifests and
/// sample lists sit.
#[derive(Debug, Clone)]
pub struct WorkflowInventory {
    pub bucket: BucketUrl,
    pub workflow: String,
    pub snapshot: BucketSnapshot,
    pub manifest: CombinedManifest,
    pub manifest_urls: Vec<String>,
    pub sample_list_urls: Vec<String>,
}

impl WorkflowInventory {
    pub async fn collect(
        backend: &dyn StorageBackend,
        bucket: &BucketUrl,
        workflow: &str,
    ) -> Result<Self> {
        let snapshot = take_snapshot(backend, bucket, Some(workflow)).await?;
        Self::from_snapshot(backend, bucket, workflow, snapshot).await
    }

    /// `Ok(None)` when the bucket or the workflow prefix does not exist,
    /// which callers treat as "nothing released yet".
    pub async fn try_collect(
        backend: &dyn StorageBackend,
        bucket: &BucketUrl,
        workflow: &str,
    ) -> Result<Option<Self>> {
        match try_take_snapshot(backend, bucket, Some(workflow)).await? {
            Some(snapshot) => Ok(Some(
                Self::from_snapshot(backend, bucket, workflow, snapshot).await?,
            )),
            None => Ok(None),
        }
    }

    async fn from_snapshot(
        backend: &dyn StorageBackend,
        bucket: &BucketUrl,
        workflow: &str,
        mut snapshot: BucketSnapshot,
    ) -> Result<Self> {
        let archive_prefix = format!("{}/archive/", workflow.trim_matches('/'));
        snapshot.entries.retain(|e| !e.name.starts_with(&archive_prefix));

        let mut manifest = CombinedManifest::default();
        let mut manifest_urls = Vec::new();
        let mut sample_list_urls = Vec::new();
        for entry in &snapshot.entries {
            match base_name(&entry.name) {
                MANIFEST_FILE => {
                    let url = snapshot.url_of(&entry.name);
                    let content = backend.read_object(&url).await?;
                    manifest.merge(CombinedManifest::parse_tsv(&content)?);
                    manifest_urls.push(url);
                }
                SAMPLE_LIST_FILE => {
                    sample_list_urls.push(snapshot.url_of(&entry.name));
                }
                _ => {}
            }
        }

        Ok(Self {
            bucket: bucket.clone(),
            workflow: workflow.trim_matches('/').to_string(),
            snapshot,
            manifest,
            manifest_urls,
            sample_list_urls,
        })
    }
}

/// Runs the per-file release tests over a workflow inventory.
#[derive(Debug, Clone)]
pub struct IntegrityChecker {
    threshold: u64,
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self {
            threshold: EMPTY_FILE_THRESHOLD,
        }
    }
}

impl IntegrityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn check(&self, inventory: &WorkflowInventory) -> IntegrityReport {
        let mut checks = Vec::new();
        for entry in &inventory.snapshot.entries {
            let base = base_name(&entry.name);

            let not_empty = match entry.size {
                Some(size) if size > self.threshold => CheckStatus::Passed,
                _ => CheckStatus::Failed,
            };

            let metadata_present = if base == MANIFEST_FILE {
                CheckStatus::NotApplicable
            } else if inventory.manifest.contains_filename(base) {
                CheckStatus::Passed
            } else {
                CheckStatus::Failed
            };

            checks.push(FileCheck {
                name: entry.name.clone(),
                timestamp: inventory.manifest.timestamp_of(base).map(|t| t.to_string()),
                not_empty,
                metadata_present,
            });
        }

        IntegrityReport {
            checks,
            threshold: self.threshold,
        }
    }
}

mod access;

pub use access::{AccessManager, LockdownAction, LockdownReport};

use std::path::PathBuf;

use chrono::Utc;

use crate::bucket::{BucketUrl, DatasetId, StagingEnv};
use crate::config::PromotionConfig;
use crate::diff::DiffResult;
use crate::error::{PromoteError, Result};
use crate::integrity::{IntegrityChecker, WorkflowInventory};
use crate::report::{EnvSummary, PromotionReport};
use crate::storage::StorageBackend;

const VIEWER_ROLE: &str = "roles/storage.objectViewer";

/// Knobs for one promotion run. Everything defaults to the read-only
/// path; `promote` is the single switch that allows mutation.
#[derive(Debug, Clone)]
pub struct PromoteOptions {
    pub staging_env: StagingEnv,
    pub workflow: String,
    pub promote: bool,
    pub include_metadata: bool,
    pub include_artifacts: bool,
    pub grant_readers: bool,
    pub report_dir: PathBuf,
}

impl PromoteOptions {
    pub fn new(staging_env: StagingEnv, workflow: impl Into<String>) -> Self {
        Self {
            staging_env,
            workflow: workflow.into(),
            promote: false,
            include_metadata: false,
            include_artifacts: false,
            grant_readers: false,
            report_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug)]
pub struct PromoteOutcome {
    pub report: PromotionReport,
    pub report_path: PathBuf,
    /// True only when `promote` was set and the sync actually ran.
    pub promoted: bool,
    /// Per-file lines from the sync commands (the copy plan on dry runs).
    pub sync_output: Vec<String>,
}

/// Runs the staging-to-curated pipeline: inventory both environments,
/// test, diff, write the report, and sync only when every test passed.
pub struct Promoter<'a> {
    backend: &'a dyn StorageBackend,
    config: &'a PromotionConfig,
}

impl<'a> Promoter<'a> {
    pub fn new(backend: &'a dyn StorageBackend, config: &'a PromotionConfig) -> Self {
        Self { backend, config }
    }

    pub async fn run(&self, dataset: &DatasetId, options: &PromoteOptions) -> Result<PromoteOutcome> {
        let staging_bucket = self
            .config
            .naming
            .staging_bucket(options.staging_env, dataset)?;
        let curated_bucket = self.config.naming.curated_bucket(dataset)?;

        self.backend.describe_bucket(&staging_bucket).await?;
        let curated_exists = match self.backend.describe_bucket(&curated_bucket).await {
            Ok(()) => true,
            Err(PromoteError::Storage(e)) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };

        let staging =
            WorkflowInventory::collect(self.backend, &staging_bucket, &options.workflow).await?;
        let production = if curated_exists {
            WorkflowInventory::try_collect(self.backend, &curated_bucket, &options.workflow)
                .await?
        } else {
            None
        };

        let integrity = IntegrityChecker::new().check(&staging);
        let diff = match &production {
            Some(production) => DiffResult::between(&staging.snapshot, &production.snapshot),
            None => DiffResult::first_release(&staging.snapshot),
        };

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
        let previous_manifest = self
            .previous_manifest(&staging_bucket, &options.workflow)
            .await?;

        let report = PromotionReport {
            timestamp,
            staging_env: options.staging_env,
            dataset: dataset.clone(),
            workflow: options.workflow.clone(),
            staging: EnvSummary::from_inventory(&staging),
            production_bucket: curated_bucket.clone(),
            production: production.as_ref().map(EnvSummary::from_inventory),
            diff,
            integrity,
            latest_workflow_version: staging.manifest.latest_workflow_version(),
            previous_manifest,
        };

        // The report is the audit trail, so it lands on disk whether or
        // not anything gets promoted.
        let report_path = report.write_to(&options.report_dir)?;

        let mut sync_output = Vec::new();
        let mut promoted = false;
        if report.tests_passed() {
            if !curated_exists {
                if options.promote {
                    return Err(PromoteError::Promotion(format!(
                        "curated bucket {curated_bucket} does not exist"
                    )));
                }
            } else {
                let dry_run = !options.promote;
                for prefix in self.sync_prefixes(options) {
                    let out = self
                        .backend
                        .rsync(
                            &staging_bucket.join(&prefix),
                            &curated_bucket.join(&prefix),
                            dry_run,
                        )
                        .await?;
                    sync_output.extend(
                        out.lines()
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(str::to_string),
                    );
                }

                if options.promote {
                    if let Some(manifest_url) = staging.manifest_urls.first() {
                        self.backend
                            .copy(manifest_url, &report.new_manifest_location(), false)
                            .await?;
                    }
                    if options.grant_readers {
                        self.backend
                            .add_iam_binding(
                                &curated_bucket,
                                &self.config.access.reader_member(),
                                VIEWER_ROLE,
                            )
                            .await?;
                    }
                    promoted = true;
                }
            }
        }

        Ok(PromoteOutcome {
            report,
            report_path,
            promoted,
            sync_output,
        })
    }

    fn sync_prefixes(&self, options: &PromoteOptions) -> Vec<String> {
        let mut prefixes = vec![options.workflow.trim_matches('/').to_string()];
        if options.include_metadata {
            prefixes.push("metadata".to_string());
        }
        if options.include_artifacts {
            prefixes.push("artifacts".to_string());
        }
        prefixes
    }

    /// Most recent archived combined manifest for this workflow, found
    /// by listing the archive tree. Archive paths embed the timestamp,
    /// so the lexicographically last entry is the newest.
    async fn previous_manifest(
        &self,
        bucket: &BucketUrl,
        workflow: &str,
    ) -> Result<Option<String>> {
        let pattern = bucket.join(&format!(
            "{}/archive/workflow_version/**",
            workflow.trim_matches('/')
        ));
        let listing = match self.backend.try_list(&pattern).await? {
            Some(listing) => listing,
            None => return Ok(None),
        };

        let mut manifests: Vec<&str> = listing
            .lines()
            .map(str::trim)
            .filter(|line| line.ends_with("/MANIFEST.tsv"))
            .collect();
        manifests.sort_unstable();
        Ok(manifests.last().map(|s| s.to_string()))
    }
}

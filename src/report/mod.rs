use std::fs;
use std::path::{Path, PathBuf};

use crate::bucket::{BucketUrl, DatasetId, StagingEnv};
use crate::diff::DiffResult;
use crate::error::Result;
use crate::integrity::{IntegrityReport, WorkflowInventory};

/// Manifest-derived facts about one environment's workflow prefix.
#[derive(Debug, Clone)]
pub struct EnvSummary {
    pub bucket: BucketUrl,
    pub timestamps: Vec<String>,
    pub workflow_pairs: Vec<(String, String)>,
    pub sample_list: Option<String>,
}

impl EnvSummary {
    pub fn from_inventory(inventory: &WorkflowInventory) -> Self {
        Self {
            bucket: inventory.bucket.clone(),
            timestamps: inventory.manifest.timestamps(),
            workflow_pairs: inventory.manifest.workflow_pairs(),
            sample_list: inventory.sample_list_urls.first().cloned(),
        }
    }

    fn timestamps_block(&self) -> String {
        self.timestamps
            .iter()
            .map(|t| format!("- {}", t))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn workflow_info(&self) -> String {
        self.workflow_pairs
            .iter()
            .map(|(version, release)| format!("[{}]({})", version, release))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn sample_loc(&self) -> String {
        match &self.sample_list {
            Some(url) => format!("`{}`", url),
            None => "N/A".to_string(),
        }
    }
}

/// All inputs of one promotion run, rendered into the fixed markdown
/// document reviewers sign off on. The production side is `None` on a
/// first release.
#[derive(Debug, Clone)]
pub struct PromotionReport {
    pub timestamp: String,
    pub staging_env: StagingEnv,
    pub dataset: DatasetId,
    pub workflow: String,
    pub staging: EnvSummary,
    pub production_bucket: BucketUrl,
    pub production: Option<EnvSummary>,
    pub diff: DiffResult,
    pub integrity: IntegrityReport,
    pub latest_workflow_version: Option<String>,
    pub previous_manifest: Option<String>,
}

impl PromotionReport {
    pub fn tests_passed(&self) -> bool {
        self.integrity.all_passed()
    }

    pub fn file_name(&self) -> String {
        format!("{}_data_promotion_report.md", self.dataset.underscored())
    }

    /// Where the current staging manifest gets archived on promotion.
    pub fn new_manifest_location(&self) -> String {
        format!(
            "{}/{}/archive/workflow_version/{}/workflow_metadata/{}/MANIFEST.tsv",
            self.staging.bucket,
            self.workflow,
            self.latest_workflow_version.as_deref().unwrap_or("N/A"),
            self.timestamp
        )
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        fs::write(&path, self.render())?;
        Ok(path)
    }

    pub fn render(&self) -> String {
        let staging_url = |name: &str| self.staging.bucket.join(name);

        let new_files_rows = if self.diff.added.is_empty() {
            "| N/A |".to_string()
        } else {
            self.diff
                .added
                .iter()
                .map(|name| format!("| {} |", staging_url(name)))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let modified_files_rows = if self.diff.modified.is_empty() {
            "| N/A | N/A |".to_string()
        } else {
            self.diff
                .modified
                .iter()
                .map(|file| {
                    format!(
                        "| {} | {} |",
                        staging_url(&file.name),
                        file.staging_md5.as_deref().unwrap_or("N/A")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        // Deleted files only exist in production, but reviewers read
        // all three tables against the staging bucket.
        let deleted_files_rows = if self.diff.deleted.is_empty() {
            "| N/A |".to_string()
        } else {
            self.diff
                .deleted
                .iter()
                .map(|name| format!("| {} |", staging_url(name)))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let integrity_rows = self
            .integrity
            .checks
            .iter()
            .map(|check| {
                format!(
                    "| {} | {} | {} | {} |",
                    check.name, self.timestamp, check.not_empty, check.metadata_present
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let (production_timestamps, production_workflow_info, production_sample_loc) =
            match &self.production {
                Some(production) => (
                    production.timestamps_block(),
                    production.workflow_info(),
                    production.sample_loc(),
                ),
                None => ("N/A".to_string(), "N/A".to_string(), "N/A".to_string()),
            };

        let previous_manifest = match &self.previous_manifest {
            Some(url) => format!("`{}`", url),
            None => "N/A".to_string(),
        };

        format!(
            r#"# Info
## Initial environment
**Environment:** [{staging_env}]

**Bucket:** `{staging_bucket}`

**Processing timestamp(s):**
{staging_timestamps}

**Harmonized {workflow} workflow version:** {staging_workflow_info}

**Sample set:** {staging_sample_loc}

**Tests passed:** {tests_passed}

## Target environment
**Environment:** [curated]

**Bucket:** `{production_bucket}`

**Processing timestamp(s):**
{production_timestamps}

**Harmonized {workflow} workflow version:** {production_workflow_info}

**Sample set:** {production_sample_loc}

**Tests passed:** N/A


# Definitions
### Table 1: Definitions
| Term | Definition |
|---------|---------|
| Initial environment | This is where the staging data lives with the intent of promoting it to production. |
| Target environment | This is where the current production data lives with the intent of replacing it with the staging data in the initial environment. |
| New files | Set of new files (i.e. they didn’t exist in previous runs/workflow versions). |
| Modified files | Set of files that have different checksums. |
| Deleted files | Set of files that no longer exist in this version of the pipeline (expected, not an error in the pipeline). |
| Not empty test | A test that checks if all files in buckets are empty or less than or equal to 10 bytes in size. |
| Metadata present test | A test that checks if all files in buckets have an associated metadata. The metadata file (MANIFEST.tsv) is generated in the workflow. |


# Files changed
## New (i.e. only in staging)
| filename |
|---------|
{new_files_rows}

## Modified
| filename | hash (md5) |
|---------|---------|
{modified_files_rows}

## Deleted (i.e. only in prod)
| filename |
|---------|
{deleted_files_rows}


# File tests
### Table 2: Summary of data integrity tests results
Summarizes the results of all data integrity tests on all files and when the tests were run. If all tests pass for all files, the data will be promoted and the "all tests passed" column will show a ✅. If any test fails for any file, the data will not be promoted and the "all tests passed" column will show a ❌.
| timestamp | all tests passed |
|---------|---------|
| {timestamp} | {test_result} |

### Table 3: Data integrity tests results for each file
Individual data integrity test results for each file (a comprehensive variation of [Table 2](#table-2-summary-of-data-integrity-tests-results)) and when the tests were run. Tests involve checking if files are not empty and have an associated metadata (more details in [Table 1](#table-1-definitions)). All tests for all files must pass in order for data to be promoted.
| filename | timestamp | not empty test | metadata present test |
|---------|---------|---------|-------------|
{integrity_rows}


# Combined manifest file locations
**New manifest:** `{new_manifest}`

**Previous manifest:** {previous_manifest}
"#,
            staging_env = self.staging_env,
            staging_bucket = self.staging.bucket,
            staging_timestamps = self.staging.timestamps_block(),
            workflow = self.workflow,
            staging_workflow_info = self.staging.workflow_info(),
            staging_sample_loc = self.staging.sample_loc(),
            tests_passed = if self.tests_passed() { "True" } else { "False" },
            production_bucket = self.production_bucket,
            production_timestamps = production_timestamps,
            production_workflow_info = production_workflow_info,
            production_sample_loc = production_sample_loc,
            new_files_rows = new_files_rows,
            modified_files_rows = modified_files_rows,
            deleted_files_rows = deleted_files_rows,
            timestamp = self.timestamp,
            test_result = if self.tests_passed() { "✅" } else { "❌" },
            integrity_rows = integrity_rows,
            new_manifest = self.new_manifest_location(),
            previous_manifest = previous_manifest,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ModifiedFile;
    use crate::integrity::{CheckStatus, FileCheck, IntegrityReport, EMPTY_FILE_THRESHOLD};

    fn file_check(name: &str, not_empty: CheckStatus, metadata_present: CheckStatus) -> FileCheck {
        FileCheck {
            name: name.to_string(),
            timestamp: Some("2024-05-01T10-00-00Z".to_string()),
            not_empty,
            metadata_present,
        }
    }

    fn sample_report(production: bool, passed: bool) -> PromotionReport {
        let staging = EnvSummary {
            bucket: BucketUrl::parse("gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq").unwrap(),
            timestamps: vec![
                "2024-05-01T10-00-00Z".to_string(),
                "2024-04-02T08-30-00Z".to_string(),
            ],
            workflow_pairs: vec![(
                "v1.2.0".to_string(),
                "https://example.com/releases/v1.2.0".to_string(),
            )],
            sample_list: Some(
                "gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq/harmonized_pmdbs/sample_list.tsv"
                    .to_string(),
            ),
        };

        PromotionReport {
            timestamp: "2024-06-01T12-00-00Z".to_string(),
            staging_env: StagingEnv::Dev,
            dataset: DatasetId::new("team-hardy", "pmdbs-bulk-rnaseq").unwrap(),
            workflow: "harmonized_pmdbs".to_string(),
            staging: staging.clone(),
            production_bucket: BucketUrl::parse("gs://asap-curated-team-hardy-pmdbs-bulk-rnaseq")
                .unwrap(),
            production: production.then(|| EnvSummary {
                bucket: BucketUrl::parse("gs://asap-curated-team-hardy-pmdbs-bulk-rnaseq")
                    .unwrap(),
                timestamps: vec!["2024-04-02T08-30-00Z".to_string()],
                workflow_pairs: vec![(
                    "v1.1.0".to_string(),
                    "https://example.com/releases/v1.1.0".to_string(),
                )],
                sample_list: None,
            }),
            diff: DiffResult {
                added: vec!["harmonized_pmdbs/metadata/NEW.csv".to_string()],
                deleted: vec!["harmonized_pmdbs/metadata/OLD.csv".to_string()],
                modified: vec![ModifiedFile {
                    name: "harmonized_pmdbs/metadata/STUDY.csv".to_string(),
                    staging_md5: Some("newhash==".to_string()),
                    production_md5: Some("oldhash==".to_string()),
                }],
                unchanged: vec![],
            },
            integrity: IntegrityReport {
                checks: vec![
                    file_check(
                        "harmonized_pmdbs/metadata/STUDY.csv",
                        CheckStatus::Passed,
                        if passed {
                            CheckStatus::Passed
                        } else {
                            CheckStatus::Failed
                        },
                    ),
                    file_check(
                        "harmonized_pmdbs/MANIFEST.tsv",
                        CheckStatus::Passed,
                        CheckStatus::NotApplicable,
                    ),
                ],
                threshold: EMPTY_FILE_THRESHOLD,
            },
            latest_workflow_version: Some("v1.2.0".to_string()),
            previous_manifest: Some(
                "gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq/harmonized_pmdbs/archive/workflow_version/v1.1.0/workflow_metadata/2024-04-02T08-30-00Z/MANIFEST.tsv"
                    .to_string(),
            ),
        }
    }

    #[test]
    fn test_render_environments() {
        let rendered = sample_report(true, true).render();

        assert!(rendered.contains("**Environment:** [dev]"));
        assert!(rendered.contains("**Bucket:** `gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq`"));
        assert!(rendered.contains("- 2024-05-01T10-00-00Z\n- 2024-04-02T08-30-00Z"));
        assert!(rendered.contains(
            "**Harmonized harmonized_pmdbs workflow version:** [v1.2.0](https://example.com/releases/v1.2.0)"
        ));
        assert!(rendered.contains("**Tests passed:** True"));
        assert!(rendered.contains("**Environment:** [curated]"));
        assert!(rendered
            .contains("**Bucket:** `gs://asap-curated-team-hardy-pmdbs-bulk-rnaseq`"));
    }

    #[test]
    fn test_render_files_changed_uses_staging_urls() {
        let rendered = sample_report(true, true).render();

        assert!(rendered.contains(
            "| gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq/harmonized_pmdbs/metadata/NEW.csv |"
        ));
        assert!(rendered.contains(
            "| gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq/harmonized_pmdbs/metadata/STUDY.csv | newhash== |"
        ));
        // Deleted files exist only in production but render with the
        // staging bucket prefix.
        assert!(rendered.contains(
            "| gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq/harmonized_pmdbs/metadata/OLD.csv |"
        ));
    }

    #[test]
    fn test_render_integrity_tables() {
        let rendered = sample_report(true, true).render();

        assert!(rendered.contains("| 2024-06-01T12-00-00Z | ✅ |"));
        assert!(rendered.contains(
            "| harmonized_pmdbs/metadata/STUDY.csv | 2024-06-01T12-00-00Z | ✅ | ✅ |"
        ));
        assert!(rendered.contains(
            "| harmonized_pmdbs/MANIFEST.tsv | 2024-06-01T12-00-00Z | ✅ | N/A |"
        ));
    }

    #[test]
    fn test_render_failed_tests() {
        let rendered = sample_report(true, false).render();

        assert!(rendered.contains("**Tests passed:** False"));
        assert!(rendered.contains("| 2024-06-01T12-00-00Z | ❌ |"));
    }

    #[test]
    fn test_render_first_release_fallbacks() {
        let mut report = sample_report(false, true);
        report.diff = DiffResult {
            added: vec!["harmonized_pmdbs/metadata/STUDY.csv".to_string()],
            ..DiffResult::default()
        };
        report.previous_manifest = None;
        let rendered = report.render();

        assert!(rendered.contains("**Sample set:** N/A"));
        assert!(rendered.contains("**Tests passed:** N/A"));
        assert!(rendered.contains("| N/A | N/A |"));
        assert!(rendered.contains("**Previous manifest:** N/A"));
        // The curated bucket name still renders even though nothing
        // lives there yet.
        assert!(rendered
            .contains("**Bucket:** `gs://asap-curated-team-hardy-pmdbs-bulk-rnaseq`"));
    }

    #[test]
    fn test_manifest_locations() {
        let report = sample_report(true, true);
        let rendered = report.render();

        assert!(rendered.contains(
            "**New manifest:** `gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq/harmonized_pmdbs/archive/workflow_version/v1.2.0/workflow_metadata/2024-06-01T12-00-00Z/MANIFEST.tsv`"
        ));
        assert!(rendered.contains(
            "**Previous manifest:** `gs://asap-dev-team-hardy-pmdbs-bulk-rnaseq/harmonized_pmdbs/archive/workflow_version/v1.1.0/workflow_metadata/2024-04-02T08-30-00Z/MANIFEST.tsv`"
        ));
    }

    #[test]
    fn test_file_name_uses_underscores() {
        assert_eq!(
            sample_report(true, true).file_name(),
            "team_hardy_pmdbs_bulk_rnaseq_data_promotion_report.md"
        );
    }

    #[test]
    fn test_write_to() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(true, true);

        let path = report.write_to(dir.path()).unwrap();
        assert!(path.ends_with("team_hardy_pmdbs_bulk_rnaseq_data_promotion_report.md"));
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, report.render());
    }
}

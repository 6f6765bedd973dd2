use std::fmt;

use crate::bucket::{parse_listing, BucketUrl};
use crate::error::{PromoteError, Result};
use crate::storage::StorageBackend;

use super::rules::StructureRules;

/// How far along the QC pipeline a raw bucket is. First submissions hold
/// loose CSVs directly under `metadata/`; once QC has run, the metadata
/// splits into `original/` and `release/` subdirectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketLayout {
    Initial,
    Complete,
}

impl BucketLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketLayout::Initial => "initial",
            BucketLayout::Complete => "complete",
        }
    }
}

impl fmt::Display for BucketLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a top-level structure check. Only missing required
/// directories make a bucket invalid; everything else is advisory.
#[derive(Debug, Clone)]
pub struct StructureReport {
    pub bucket: BucketUrl,
    pub present: Vec<String>,
    pub missing_required: Vec<String>,
    pub missing_recommended: Vec<String>,
    pub unexpected: Vec<String>,
}

impl StructureReport {
    pub fn is_valid(&self) -> bool {
        self.missing_required.is_empty()
    }
}

/// Result of checking the metadata directory against the core and
/// supplementary file sets.
#[derive(Debug, Clone)]
pub struct MetadataFilesCheck {
    pub bucket: BucketUrl,
    /// Directory the files were found in, `metadata/` for current
    /// buckets or `metadata/original/` for datasets uploaded before the
    /// layout settled.
    pub checked_dir: String,
    pub present_core: Vec<String>,
    pub missing_core: Vec<String>,
    pub supplementary: Vec<String>,
    pub unexpected: Vec<String>,
}

impl MetadataFilesCheck {
    pub fn is_complete(&self) -> bool {
        self.missing_core.is_empty()
    }
}

pub struct StructureValidator<'a> {
    backend: &'a dyn StorageBackend,
    rules: StructureRules,
}

impl<'a> StructureValidator<'a> {
    pub fn new(backend: &'a dyn StorageBackend) -> Self {
        Self {
            backend,
            rules: StructureRules::default(),
        }
    }

    pub fn with_rules(backend: &'a dyn StorageBackend, rules: StructureRules) -> Self {
        Self { backend, rules }
    }

    pub fn rules(&self) -> &StructureRules {
        &self.rules
    }

    /// Checks the top-level directories of a bucket without judging the
    /// result. Fails if the bucket itself is unreachable.
    pub async fn bucket_structure(&self, bucket: &BucketUrl) -> Result<StructureReport> {
        let raw = self.backend.list(bucket.as_str()).await?;
        let listing = parse_listing(&raw, bucket.as_str());

        let mut present = Vec::new();
        let mut unexpected = Vec::new();
        for dir in &listing.dirs {
            if self.rules.is_known_dir(dir) {
                present.push(dir.clone());
            } else {
                unexpected.push(dir.clone());
            }
        }
        unexpected.extend(listing.files.iter().cloned());

        let missing_required = self
            .rules
            .required_dirs
            .iter()
            .filter(|d| !listing.contains_dir(d))
            .cloned()
            .collect();
        let missing_recommended = self
            .rules
            .recommended_dirs
            .iter()
            .filter(|d| !listing.contains_dir(d))
            .cloned()
            .collect();

        Ok(StructureReport {
            bucket: bucket.clone(),
            present,
            missing_required,
            missing_recommended,
            unexpected,
        })
    }

    /// Like [`bucket_structure`](Self::bucket_structure), but missing
    /// required directories become a hard error.
    pub async fn validate(&self, bucket: &BucketUrl) -> Result<StructureReport> {
        let report = self.bucket_structure(bucket).await?;
        if !report.is_valid() {
            return Err(PromoteError::Validation(format!(
                "MISSING required directories in {}: {}",
                bucket,
                report.missing_required.join(", ")
            )));
        }
        Ok(report)
    }

    /// Compares the metadata directory contents against the core table
    /// set, following the `metadata/original/` fallback for older
    /// dataset layouts.
    pub async fn metadata_files(&self, bucket: &BucketUrl) -> Result<MetadataFilesCheck> {
        let (checked_dir, files) = self.locate_metadata_files(bucket).await?;

        let mut present_core = Vec::new();
        let mut supplementary = Vec::new();
        let mut unexpected = Vec::new();
        for file in &files {
            if self.rules.is_core_file(file) {
                present_core.push(file.clone());
            } else if self.rules.is_supplementary_file(file) {
                supplementary.push(file.clone());
            } else {
                unexpected.push(file.clone());
            }
        }

        let missing_core = self
            .rules
            .core_metadata_files
            .iter()
            .filter(|f| !present_core.contains(f))
            .cloned()
            .collect();

        Ok(MetadataFilesCheck {
            bucket: bucket.clone(),
            checked_dir,
            present_core,
            missing_core,
            supplementary,
            unexpected,
        })
    }

    /// Detects first-submission vs post-QC layout from the `metadata/`
    /// subdirectory markers. An unlistable `metadata/` directory is an
    /// error, not a layout.
    pub async fn detect_layout(&self, bucket: &BucketUrl) -> Result<BucketLayout> {
        let dir = bucket.join("metadata/");
        let Some(raw) = self.backend.try_list(&dir).await? else {
            return Err(PromoteError::Validation(format!(
                "could not list metadata directory: {}",
                dir
            )));
        };

        let listing = parse_listing(&raw, &dir);
        if listing.contains_dir("original/") && listing.contains_dir("release/") {
            Ok(BucketLayout::Complete)
        } else {
            Ok(BucketLayout::Initial)
        }
    }

    async fn locate_metadata_files(&self, bucket: &BucketUrl) -> Result<(String, Vec<String>)> {
        let direct = bucket.join("metadata/");
        let Some(raw) = self.backend.try_list(&direct).await? else {
            return Err(PromoteError::Validation(format!(
                "no metadata directory found in {}",
                bucket
            )));
        };

        let listing = parse_listing(&raw, &direct);
        if listing.files.is_empty() && listing.contains_dir("original/") {
            let nested = bucket.join("metadata/original/");
            if let Some(raw) = self.backend.try_list(&nested).await? {
                let nested_listing = parse_listing(&raw, &nested);
                return Ok(("metadata/original/".to_string(), nested_listing.files));
            }
        }

        Ok(("metadata/".to_string(), listing.files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStorage;

    const CORE: [&str; 7] = [
        "ASSAY.csv",
        "CONDITION.csv",
        "DATA.csv",
        "PROTOCOL.csv",
        "SAMPLE.csv",
        "STUDY.csv",
        "SUBJECT.csv",
    ];

    fn bucket() -> BucketUrl {
        BucketUrl::parse("gs://asap-raw-team-hardy-pmdbs-bulk-rnaseq").unwrap()
    }

    fn complete_bucket() -> MockStorage {
        let storage = MockStorage::new();
        let name = bucket().name().to_string();
        for file in CORE {
            storage.put_object(&name, &format!("metadata/{}", file), b"header\nrow\n");
        }
        storage.put_object(&name, "artifacts/qc_report.html", b"<html></html>");
        storage.put_object(&name, "fastqs/sample1_R1.fastq.gz", b"@read");
        storage
    }

    #[tokio::test]
    async fn test_complete_bucket_is_valid() {
        let storage = complete_bucket();
        let validator = StructureValidator::new(&storage);

        let report = validator.validate(&bucket()).await.unwrap();
        assert!(report.is_valid());
        assert!(report.missing_recommended.is_empty());
        assert!(report.unexpected.is_empty());
        assert_eq!(
            report.present,
            vec!["artifacts/", "fastqs/", "metadata/"]
        );
    }

    #[tokio::test]
    async fn test_missing_metadata_dir_fails_validation() {
        let storage = MockStorage::new();
        let name = bucket().name().to_string();
        storage.put_object(&name, "artifacts/qc_report.html", b"<html></html>");
        let validator = StructureValidator::new(&storage);

        let err = validator.validate(&bucket()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("MISSING required directories"));
        assert!(message.contains("metadata/"));
    }

    #[tokio::test]
    async fn test_missing_artifacts_is_only_advisory() {
        let storage = MockStorage::new();
        let name = bucket().name().to_string();
        storage.put_object(&name, "metadata/STUDY.csv", b"study_id\n");
        let validator = StructureValidator::new(&storage);

        let report = validator.validate(&bucket()).await.unwrap();
        assert!(report.is_valid());
        assert_eq!(report.missing_recommended, vec!["artifacts/"]);
    }

    #[tokio::test]
    async fn test_unexpected_entries_reported() {
        let storage = complete_bucket();
        let name = bucket().name().to_string();
        storage.put_object(&name, "scratch/tmp.txt", b"x");
        storage.put_object(&name, "notes.txt", b"x");
        let validator = StructureValidator::new(&storage);

        let report = validator.bucket_structure(&bucket()).await.unwrap();
        assert!(report.unexpected.contains(&"scratch/".to_string()));
        assert!(report.unexpected.contains(&"notes.txt".to_string()));
    }

    #[tokio::test]
    async fn test_metadata_files_complete() {
        let storage = complete_bucket();
        let validator = StructureValidator::new(&storage);

        let check = validator.metadata_files(&bucket()).await.unwrap();
        assert!(check.is_complete());
        assert_eq!(check.checked_dir, "metadata/");
        assert_eq!(check.present_core.len(), 7);
        assert!(check.supplementary.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_files_missing_core() {
        let storage = MockStorage::new();
        let name = bucket().name().to_string();
        storage.put_object(&name, "metadata/STUDY.csv", b"study_id\n");
        storage.put_object(&name, "metadata/SAMPLE.csv", b"sample_id\n");
        let validator = StructureValidator::new(&storage);

        let check = validator.metadata_files(&bucket()).await.unwrap();
        assert!(!check.is_complete());
        assert_eq!(
            check.missing_core,
            vec![
                "ASSAY.csv",
                "CONDITION.csv",
                "DATA.csv",
                "PROTOCOL.csv",
                "SUBJECT.csv"
            ]
        );
    }

    #[tokio::test]
    async fn test_metadata_files_classifies_supplementary_and_unexpected() {
        let storage = complete_bucket();
        let name = bucket().name().to_string();
        storage.put_object(&name, "metadata/PMDBS.csv", b"a\n");
        storage.put_object(&name, "metadata/notes-draft.xlsx", b"a\n");
        let validator = StructureValidator::new(&storage);

        let check = validator.metadata_files(&bucket()).await.unwrap();
        assert!(check.is_complete());
        assert_eq!(check.supplementary, vec!["PMDBS.csv"]);
        assert_eq!(check.unexpected, vec!["notes-draft.xlsx"]);
    }

    #[tokio::test]
    async fn test_metadata_files_original_fallback() {
        let storage = MockStorage::new();
        let name = bucket().name().to_string();
        for file in CORE {
            storage.put_object(&name, &format!("metadata/original/{}", file), b"header\n");
        }
        let validator = StructureValidator::new(&storage);

        let check = validator.metadata_files(&bucket()).await.unwrap();
        assert!(check.is_complete());
        assert_eq!(check.checked_dir, "metadata/original/");
    }

    #[tokio::test]
    async fn test_metadata_dir_absent_is_hard_error() {
        let storage = MockStorage::new();
        storage.create_bucket(bucket().name());
        let validator = StructureValidator::new(&storage);

        let err = validator.metadata_files(&bucket()).await.unwrap_err();
        assert!(matches!(err, PromoteError::Validation(_)));
    }

    #[tokio::test]
    async fn test_detect_layout_initial() {
        let storage = complete_bucket();
        let validator = StructureValidator::new(&storage);

        let layout = validator.detect_layout(&bucket()).await.unwrap();
        assert_eq!(layout, BucketLayout::Initial);
    }

    #[tokio::test]
    async fn test_detect_layout_complete_needs_both_markers() {
        let storage = MockStorage::new();
        let name = bucket().name().to_string();
        storage.put_object(&name, "metadata/original/STUDY.csv", b"study_id\n");
        let validator = StructureValidator::new(&storage);
        assert_eq!(
            validator.detect_layout(&bucket()).await.unwrap(),
            BucketLayout::Initial
        );

        storage.put_object(&name, "metadata/release/v4.0.0/STUDY.csv", b"study_id\n");
        assert_eq!(
            validator.detect_layout(&bucket()).await.unwrap(),
            BucketLayout::Complete
        );
    }

    #[tokio::test]
    async fn test_detect_layout_unlistable_metadata_is_error() {
        let storage = MockStorage::new();
        storage.create_bucket(bucket().name());
        let validator = StructureValidator::new(&storage);

        let err = validator.detect_layout(&bucket()).await.unwrap_err();
        assert!(err.to_string().contains("metadata"));
    }
}

mod render;

pub use render::{format_diff, format_manifest_diff, has_manifest_changes};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::bucket::{base_name, BucketSnapshot};

/// A common file whose content digest differs between environments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedFile {
    pub name: String,
    pub staging_md5: Option<String>,
    pub production_md5: Option<String>,
}

/// File-level differences from a production listing to a staging one.
/// A renamed file shows up as one addition plus one deletion; nothing
/// tracks identity across names. Manifest files are bookkeeping and are
/// left out of every set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResult {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<ModifiedFile>,
    pub unchanged: Vec<String>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.deleted.is_empty() || !self.modified.is_empty()
    }

    /// Every staging file is new; used when no production side exists
    /// yet.
    pub fn first_release(staging: &BucketSnapshot) -> Self {
        Self {
            added: staging
                .names()
                .filter(|n| !is_manifest(n))
                .map(|n| n.to_string())
                .collect(),
            ..Self::default()
        }
    }

    /// Compares two snapshots by object name, then by MD5 digest for
    /// names present on both sides. A file with no digest on either
    /// side counts as modified rather than silently unchanged.
    pub fn between(staging: &BucketSnapshot, production: &BucketSnapshot) -> Self {
        let staging_md5s: BTreeMap<&str, Option<&str>> = staging
            .entries
            .iter()
            .filter(|e| !is_manifest(&e.name))
            .map(|e| (e.name.as_str(), e.md5.as_deref()))
            .collect();
        let production_md5s: BTreeMap<&str, Option<&str>> = production
            .entries
            .iter()
            .filter(|e| !is_manifest(&e.name))
            .map(|e| (e.name.as_str(), e.md5.as_deref()))
            .collect();

        let mut result = Self::default();
        for (name, staging_md5) in &staging_md5s {
            match production_md5s.get(name) {
                None => result.added.push(name.to_string()),
                Some(production_md5) => {
                    let same = match (staging_md5, production_md5) {
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    };
                    if same {
                        result.unchanged.push(name.to_string());
                    } else {
                        result.modified.push(ModifiedFile {
                            name: name.to_string(),
                            staging_md5: staging_md5.map(|s| s.to_string()),
                            production_md5: production_md5.map(|s| s.to_string()),
                        });
                    }
                }
            }
        }
        for name in production_md5s.keys() {
            if !staging_md5s.contains_key(name) {
                result.deleted.push(name.to_string());
            }
        }
        result
    }
}

fn is_manifest(name: &str) -> bool {
    base_name(name) == "MANIFEST.tsv"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{BucketUrl, ObjectEntry};

    fn snapshot(bucket: &str, entries: Vec<ObjectEntry>) -> BucketSnapshot {
        BucketSnapshot::new(BucketUrl::parse(bucket).unwrap(), None, entries)
    }

    fn entry(name: &str, md5: &str) -> ObjectEntry {
        ObjectEntry::new(name).with_md5(md5)
    }

    #[test]
    fn test_identical_snapshots_have_no_changes() {
        let staging = snapshot(
            "gs://asap-dev-cohort-pmdbs",
            vec![entry("metadata/STUDY.csv", "aaa"), entry("metadata/SAMPLE.csv", "bbb")],
        );
        let production = snapshot(
            "gs://asap-curated-cohort-pmdbs",
            vec![entry("metadata/STUDY.csv", "aaa"), entry("metadata/SAMPLE.csv", "bbb")],
        );

        let diff = DiffResult::between(&staging, &production);
        assert!(!diff.has_changes());
        assert_eq!(diff.unchanged.len(), 2);
    }

    #[test]
    fn test_added_and_deleted() {
        let staging = snapshot(
            "gs://asap-dev-cohort-pmdbs",
            vec![entry("metadata/STUDY.csv", "aaa"), entry("metadata/NEW.csv", "ccc")],
        );
        let production = snapshot(
            "gs://asap-curated-cohort-pmdbs",
            vec![entry("metadata/STUDY.csv", "aaa"), entry("metadata/OLD.csv", "ddd")],
        );

        let diff = DiffResult::between(&staging, &production);
        assert_eq!(diff.added, vec!["metadata/NEW.csv"]);
        assert_eq!(diff.deleted, vec!["metadata/OLD.csv"]);
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn test_rename_is_add_plus_delete() {
        let staging = snapshot(
            "gs://asap-dev-cohort-pmdbs",
            vec![entry("metadata/SUBJECT_v2.csv", "aaa")],
        );
        let production = snapshot(
            "gs://asap-curated-cohort-pmdbs",
            vec![entry("metadata/SUBJECT.csv", "aaa")],
        );

        let diff = DiffResult::between(&staging, &production);
        assert_eq!(diff.added, vec!["metadata/SUBJECT_v2.csv"]);
        assert_eq!(diff.deleted, vec!["metadata/SUBJECT.csv"]);
    }

    #[test]
    fn test_digest_change_is_modified() {
        let staging = snapshot(
            "gs://asap-dev-cohort-pmdbs",
            vec![entry("metadata/STUDY.csv", "new-digest")],
        );
        let production = snapshot(
            "gs://asap-curated-cohort-pmdbs",
            vec![entry("metadata/STUDY.csv", "old-digest")],
        );

        let diff = DiffResult::between(&staging, &production);
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].name, "metadata/STUDY.csv");
        assert_eq!(diff.modified[0].staging_md5.as_deref(), Some("new-digest"));
        assert_eq!(diff.modified[0].production_md5.as_deref(), Some("old-digest"));
    }

    #[test]
    fn test_missing_digest_counts_as_modified() {
        let staging = snapshot(
            "gs://asap-dev-cohort-pmdbs",
            vec![ObjectEntry::new("metadata/STUDY.csv")],
        );
        let production = snapshot(
            "gs://asap-curated-cohort-pmdbs",
            vec![entry("metadata/STUDY.csv", "old-digest")],
        );

        let diff = DiffResult::between(&staging, &production);
        assert_eq!(diff.modified.len(), 1);
        assert!(diff.modified[0].staging_md5.is_none());
    }

    #[test]
    fn test_manifest_excluded_everywhere() {
        let staging = snapshot(
            "gs://asap-dev-cohort-pmdbs",
            vec![
                entry("harmonized/A.csv", "aaa"),
                entry("harmonized/B.csv", "bbb"),
                entry("harmonized/MANIFEST.tsv", "m-new"),
            ],
        );
        let production = snapshot(
            "gs://asap-curated-cohort-pmdbs",
            vec![entry("harmonized/A.csv", "aaa")],
        );

        let diff = DiffResult::between(&staging, &production);
        assert_eq!(diff.added, vec!["harmonized/B.csv"]);
        assert!(diff.deleted.is_empty());
        assert!(diff.modified.is_empty());
        assert_eq!(diff.unchanged, vec!["harmonized/A.csv"]);
    }

    #[test]
    fn test_first_release_marks_everything_added() {
        let staging = snapshot(
            "gs://asap-dev-cohort-pmdbs",
            vec![
                entry("harmonized/A.csv", "aaa"),
                entry("harmonized/MANIFEST.tsv", "mmm"),
            ],
        );

        let diff = DiffResult::first_release(&staging);
        assert_eq!(diff.added, vec!["harmonized/A.csv"]);
        assert!(diff.deleted.is_empty());
    }
}

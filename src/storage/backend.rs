use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bucket::BucketUrl;
use crate::error::{PromoteError, Result};

/// One entry from `gcloud storage hash --format=json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectHash {
    pub url: String,
    #[serde(default)]
    pub md5_hash: Option<String>,
    #[serde(default)]
    pub crc32c_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamBinding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default)]
    pub bindings: Vec<IamBinding>,
}

impl IamPolicy {
    pub fn has_member(&self, role: &str, member: &str) -> bool {
        self.bindings
            .iter()
            .filter(|b| b.role == role)
            .any(|b| b.members.iter().any(|m| m == member))
    }

    pub fn members_of(&self, role: &str) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|b| b.role == role)
            .flat_map(|b| b.members.iter().map(|m| m.as_str()))
            .collect()
    }
}

/// Every bucket operation the tooling performs, behind one seam so tests
/// can run against an in-memory store instead of a live project.
///
/// Path arguments follow `gcloud storage` conventions: a bare bucket URL
/// lists one level, a trailing `/**` matches every object below a prefix.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fails with `BucketNotFound` or `AccessDenied` if the bucket is
    /// unreachable. Used as an existence probe before heavier calls.
    async fn describe_bucket(&self, bucket: &BucketUrl) -> Result<()>;

    /// Raw `ls` output, one URL per line.
    async fn list(&self, path: &str) -> Result<String>;

    /// Like [`list`](Self::list), but a missing bucket or unmatched
    /// prefix becomes `Ok(None)` instead of an error. Permission and
    /// transport failures still surface as errors.
    async fn try_list(&self, path: &str) -> Result<Option<String>> {
        match self.list(path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(PromoteError::Storage(e)) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `(url, byte size)` pairs for every object matching the pattern.
    async fn object_sizes(&self, pattern: &str) -> Result<Vec<(String, u64)>>;

    async fn object_hashes(&self, pattern: &str) -> Result<Vec<ObjectHash>>;

    /// Full contents of a single object as UTF-8 text.
    async fn read_object(&self, url: &str) -> Result<String>;

    /// `src` may be a local path or an object URL.
    async fn copy(&self, src: &str, dest: &str, recursive: bool) -> Result<()>;

    async fn move_object(&self, src: &str, dest: &str) -> Result<()>;

    /// Recursive rsync from `src` to `dest`, returning the tool's stdout
    /// (the per-file copy plan). `dry_run` reports without mutating.
    async fn rsync(&self, src: &str, dest: &str, dry_run: bool) -> Result<String>;

    async fn remove_label(&self, bucket: &BucketUrl, label: &str) -> Result<()>;

    async fn get_iam_policy(&self, bucket: &BucketUrl) -> Result<IamPolicy>;

    async fn add_iam_binding(&self, bucket: &BucketUrl, member: &str, role: &str) -> Result<()>;

    /// Returns `false` when no matching binding existed, which the
    /// caller treats as already-done rather than a failure.
    async fn remove_iam_binding(&self, bucket: &BucketUrl, member: &str, role: &str)
        -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_has_member() {
        let policy = IamPolicy {
            bindings: vec![
                IamBinding {
                    role: "roles/storage.admin".to_string(),
                    members: vec![
                        "group:asap-team-hardy@dnastack.com".to_string(),
                        "serviceAccount:raw-admin-hardy@dnastack-asap-parkinsons.iam.gserviceaccount.com".to_string(),
                    ],
                },
                IamBinding {
                    role: "roles/storage.objectViewer".to_string(),
                    members: vec!["group:asap-cloud-readers@verily-bvdp.com".to_string()],
                },
            ],
        };

        assert!(policy.has_member("roles/storage.admin", "group:asap-team-hardy@dnastack.com"));
        assert!(!policy.has_member(
            "roles/storage.objectViewer",
            "group:asap-team-hardy@dnastack.com"
        ));
        assert_eq!(policy.members_of("roles/storage.admin").len(), 2);
        assert!(policy.members_of("roles/storage.objectAdmin").is_empty());
    }

    #[test]
    fn test_policy_parses_gcloud_json() {
        let raw = r#"{
            "bindings": [
                {"role": "roles/storage.admin", "members": ["group:asap-team-lee@dnastack.com"]}
            ],
            "etag": "CAE=",
            "version": 1
        }"#;

        let policy: IamPolicy = serde_json::from_str(raw).unwrap();
        assert_eq!(policy.bindings.len(), 1);
        assert!(policy.has_member("roles/storage.admin", "group:asap-team-lee@dnastack.com"));
    }

    #[test]
    fn test_object_hash_parses_without_crc() {
        let raw = r#"[{"digest_format": "base64", "md5_hash": "axSuqGvWctHWMSL5zWhmjg==", "url": "gs://b/metadata/STUDY.csv"}]"#;
        let hashes: Vec<ObjectHash> = serde_json::from_str(raw).unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0].md5_hash.as_deref(), Some("axSuqGvWctHWMSL5zWhmjg=="));
        assert!(hashes[0].crc32c_hash.is_none());
    }
}

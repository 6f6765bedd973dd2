mod backend;
mod gcloud;
mod mock;

pub use backend::{IamBinding, IamPolicy, ObjectHash, StorageBackend};
pub use gcloud::GcloudBackend;
pub use mock::MockStorage;

use std::collections::HashMap;

use crate::bucket::{BucketSnapshot, BucketUrl, ObjectEntry};
use crate::error::Result;

fn snapshot_pattern(bucket: &BucketUrl, prefix: Option<&str>) -> String {
    match prefix {
        Some(p) => format!("{}/{}/**", bucket, p.trim_matches('/')),
        None => format!("{}/**", bucket),
    }
}

async fn build_snapshot(
    backend: &dyn StorageBackend,
    bucket: &BucketUrl,
    prefix: Option<&str>,
    raw_listing: &str,
) -> Result<BucketSnapshot> {
    let pattern = snapshot_pattern(bucket, prefix);
    let base = format!("{}/", bucket);

    let sizes: HashMap<String, u64> = backend
        .object_sizes(&pattern)
        .await?
        .into_iter()
        .collect();
    let hashes: HashMap<String, String> = backend
        .object_hashes(&pattern)
        .await?
        .into_iter()
        .filter_map(|h| h.md5_hash.map(|md5| (h.url, md5)))
        .collect();

    let mut entries = Vec::new();
    for line in raw_listing.lines() {
        let line = line.trim();
        if line.is_empty() || line.ends_with(':') || line.ends_with('/') {
            continue;
        }
        let Some(name) = line.strip_prefix(&base) else {
            continue;
        };
        let mut entry = ObjectEntry::new(name);
        if let Some(size) = sizes.get(line) {
            entry = entry.with_size(*size);
        }
        if let Some(md5) = hashes.get(line) {
            entry = entry.with_md5(md5.clone());
        }
        entries.push(entry);
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(BucketSnapshot::new(
        bucket.clone(),
        prefix.map(|p| p.trim_matches('/').to_string()),
        entries,
    ))
}

/// Lists every object below `prefix` (or the whole bucket) along with
/// sizes and MD5 digests. Errors if nothing matches.
pub async fn take_snapshot(
    backend: &dyn StorageBackend,
    bucket: &BucketUrl,
    prefix: Option<&str>,
) -> Result<BucketSnapshot> {
    let pattern = snapshot_pattern(bucket, prefix);
    let raw = backend.list(&pattern).await?;
    build_snapshot(backend, bucket, prefix, &raw).await
}

/// Like [`take_snapshot`], but an absent bucket or unmatched prefix is
/// `Ok(None)` rather than an error.
pub async fn try_take_snapshot(
    backend: &dyn StorageBackend,
    bucket: &BucketUrl,
    prefix: Option<&str>,
) -> Result<Option<BucketSnapshot>> {
    let pattern = snapshot_pattern(bucket, prefix);
    match backend.try_list(&pattern).await? {
        Some(raw) => Ok(Some(build_snapshot(backend, bucket, prefix, &raw).await?)),
        None => Ok(None),
    }
}

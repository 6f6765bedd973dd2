use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::bucket::BucketUrl;
use crate::error::{GcsError, Result};

use super::backend::{IamBinding, IamPolicy, ObjectHash, StorageBackend};

#[derive(Debug, Default)]
struct MockBucket {
    objects: BTreeMap<String, Vec<u8>>,
    labels: BTreeMap<String, String>,
    bindings: Vec<(String, String)>,
}

/// In-memory stand-in for `gcloud storage`, emulating its listing,
/// wildcard, and error conventions closely enough that code written
/// against [`GcloudBackend`](super::GcloudBackend) behaves identically
/// under test.
#[derive(Debug, Default)]
pub struct MockStorage {
    buckets: Mutex<HashMap<String, MockBucket>>,
}

fn split_path(path: &str) -> (String, String) {
    let trimmed = path.trim_start_matches("gs://");
    match trimmed.split_once('/') {
        Some((bucket, rest)) => (bucket.to_string(), rest.to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

fn normalize_bucket(bucket: &str) -> String {
    bucket
        .trim_start_matches("gs://")
        .trim_end_matches('/')
        .to_string()
}

/// Not a real MD5; listings only ever compare digests for equality.
fn mock_md5(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    base64::engine::general_purpose::STANDARD.encode(&digest[..16])
}

fn direct_children(
    objects: &BTreeMap<String, Vec<u8>>,
    bucket: &str,
    prefix: &str,
) -> BTreeSet<String> {
    let mut lines = BTreeSet::new();
    for name in objects.keys() {
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            Some((dir, _)) => {
                lines.insert(format!("gs://{}/{}{}/", bucket, prefix, dir));
            }
            None => {
                lines.insert(format!("gs://{}/{}{}", bucket, prefix, rest));
            }
        }
    }
    lines
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MockBucket>> {
        self.buckets.lock().expect("mock storage poisoned")
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.lock().entry(normalize_bucket(bucket)).or_default();
    }

    pub fn put_object(&self, bucket: &str, name: &str, content: &[u8]) {
        self.lock()
            .entry(normalize_bucket(bucket))
            .or_default()
            .objects
            .insert(name.to_string(), content.to_vec());
    }

    pub fn add_label(&self, bucket: &str, key: &str, value: &str) {
        self.lock()
            .entry(normalize_bucket(bucket))
            .or_default()
            .labels
            .insert(key.to_string(), value.to_string());
    }

    pub fn add_binding(&self, bucket: &str, role: &str, member: &str) {
        let mut guard = self.lock();
        let entry = guard.entry(normalize_bucket(bucket)).or_default();
        let pair = (role.to_string(), member.to_string());
        if !entry.bindings.contains(&pair) {
            entry.bindings.push(pair);
        }
    }

    pub fn has_binding(&self, bucket: &str, role: &str, member: &str) -> bool {
        self.lock()
            .get(&normalize_bucket(bucket))
            .map(|b| {
                b.bindings
                    .iter()
                    .any(|(r, m)| r == role && m == member)
            })
            .unwrap_or(false)
    }

    pub fn object_names(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .get(&normalize_bucket(bucket))
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object_content(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(&normalize_bucket(bucket))
            .and_then(|b| b.objects.get(name).cloned())
    }

    pub fn labels(&self, bucket: &str) -> BTreeMap<String, String> {
        self.lock()
            .get(&normalize_bucket(bucket))
            .map(|b| b.labels.clone())
            .unwrap_or_default()
    }

    /// Objects matching a `gcloud storage` pattern: either an exact URL
    /// or a `prefix/**` wildcard.
    fn matched_objects(&self, pattern: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let (bucket_name, rest) = split_path(pattern);
        let guard = self.lock();
        let bucket = guard.get(&bucket_name).ok_or(GcsError::BucketNotFound {
            bucket: bucket_name.clone(),
        })?;

        let matched: Vec<(String, Vec<u8>)> = if let Some(stripped) = rest.strip_suffix("**") {
            bucket
                .objects
                .iter()
                .filter(|(name, _)| name.starts_with(stripped))
                .map(|(name, content)| {
                    (format!("gs://{}/{}", bucket_name, name), content.clone())
                })
                .collect()
        } else {
            bucket
                .objects
                .get(&rest)
                .map(|content| vec![(format!("gs://{}/{}", bucket_name, rest), content.clone())])
                .unwrap_or_default()
        };

        if matched.is_empty() {
            return Err(GcsError::ObjectNotFound {
                url: pattern.to_string(),
            }
            .into());
        }
        Ok(matched)
    }
}

#[async_trait]
impl StorageBackend for MockStorage {
    async fn describe_bucket(&self, bucket: &BucketUrl) -> Result<()> {
        let name = bucket.name().to_string();
        if self.lock().contains_key(&name) {
            Ok(())
        } else {
            Err(GcsError::BucketNotFound { bucket: name }.into())
        }
    }

    async fn list(&self, path: &str) -> Result<String> {
        let (bucket_name, rest) = split_path(path);
        let guard = self.lock();
        let bucket = guard.get(&bucket_name).ok_or(GcsError::BucketNotFound {
            bucket: bucket_name.clone(),
        })?;

        if let Some(prefix) = rest.strip_suffix("**") {
            let lines: Vec<String> = bucket
                .objects
                .keys()
                .filter(|name| name.starts_with(prefix))
                .map(|name| format!("gs://{}/{}", bucket_name, name))
                .collect();
            if lines.is_empty() {
                return Err(GcsError::ObjectNotFound {
                    url: path.to_string(),
                }
                .into());
            }
            return Ok(lines.join("\n") + "\n");
        }

        if rest.is_empty() {
            let lines = direct_children(&bucket.objects, &bucket_name, "");
            if lines.is_empty() {
                return Ok(String::new());
            }
            return Ok(lines.into_iter().collect::<Vec<_>>().join("\n") + "\n");
        }

        let mut lines = BTreeSet::new();
        if !rest.ends_with('/') && bucket.objects.contains_key(&rest) {
            lines.insert(format!("gs://{}/{}", bucket_name, rest));
        }
        let prefix = if rest.ends_with('/') {
            rest.clone()
        } else {
            format!("{}/", rest)
        };
        lines.extend(direct_children(&bucket.objects, &bucket_name, &prefix));

        if lines.is_empty() {
            return Err(GcsError::ObjectNotFound {
                url: path.to_string(),
            }
            .into());
        }
        Ok(lines.into_iter().collect::<Vec<_>>().join("\n") + "\n")
    }

    async fn object_sizes(&self, pattern: &str) -> Result<Vec<(String, u64)>> {
        Ok(self
            .matched_objects(pattern)?
            .into_iter()
            .map(|(url, content)| (url, content.len() as u64))
            .collect())
    }

    async fn object_hashes(&self, pattern: &str) -> Result<Vec<ObjectHash>> {
        Ok(self
            .matched_objects(pattern)?
            .into_iter()
            .map(|(url, content)| ObjectHash {
                url,
                md5_hash: Some(mock_md5(&content)),
                crc32c_hash: None,
            })
            .collect())
    }

    async fn read_object(&self, url: &str) -> Result<String> {
        let (bucket_name, rest) = split_path(url);
        let guard = self.lock();
        let content = guard
            .get(&bucket_name)
            .ok_or(GcsError::BucketNotFound {
                bucket: bucket_name.clone(),
            })?
            .objects
            .get(&rest)
            .ok_or(GcsError::ObjectNotFound {
                url: url.to_string(),
            })?;
        Ok(String::from_utf8_lossy(content).into_owned())
    }

    async fn copy(&self, src: &str, dest: &str, recursive: bool) -> Result<()> {
        if recursive {
            let sources = self.matched_objects(&format!("{}/**", src.trim_end_matches('/')))?;
            let src_prefix = {
                let (_, rest) = split_path(src);
                let rest = rest.trim_end_matches('/');
                if rest.is_empty() {
                    String::new()
                } else {
                    format!("{}/", rest)
                }
            };
            let (dest_bucket, dest_rest) = split_path(dest);
            for (url, content) in sources {
                let (_, name) = split_path(&url);
                let relative = name.strip_prefix(&src_prefix).unwrap_or(&name);
                let dest_name = format!("{}/{}", dest_rest.trim_end_matches('/'), relative);
                let mut guard = self.lock();
                guard
                    .get_mut(&dest_bucket)
                    .ok_or(GcsError::BucketNotFound {
                        bucket: dest_bucket.clone(),
                    })?
                    .objects
                    .insert(dest_name, content);
            }
            return Ok(());
        }

        let content = if let Some(object) = src.strip_prefix("gs://") {
            let (bucket_name, rest) = match object.split_once('/') {
                Some((b, r)) => (b.to_string(), r.to_string()),
                None => (object.to_string(), String::new()),
            };
            let guard = self.lock();
            guard
                .get(&bucket_name)
                .ok_or(GcsError::BucketNotFound {
                    bucket: bucket_name.clone(),
                })?
                .objects
                .get(&rest)
                .ok_or(GcsError::ObjectNotFound {
                    url: src.to_string(),
                })?
                .clone()
        } else {
            tokio::fs::read(src).await?
        };

        let (dest_bucket, dest_rest) = split_path(dest);
        let dest_name = if dest_rest.ends_with('/') || dest_rest.is_empty() {
            let base = src.rsplit('/').next().unwrap_or(src);
            format!("{}{}", dest_rest, base)
        } else {
            dest_rest
        };

        let mut guard = self.lock();
        guard
            .get_mut(&dest_bucket)
            .ok_or(GcsError::BucketNotFound {
                bucket: dest_bucket.clone(),
            })?
            .objects
            .insert(dest_name, content);
        Ok(())
    }

    async fn move_object(&self, src: &str, dest: &str) -> Result<()> {
        self.copy(src, dest, false).await?;
        let (bucket_name, rest) = split_path(src);
        let mut guard = self.lock();
        if let Some(bucket) = guard.get_mut(&bucket_name) {
            bucket.objects.remove(&rest);
        }
        Ok(())
    }

    async fn rsync(&self, src: &str, dest: &str, dry_run: bool) -> Result<String> {
        let (src_bucket, src_rest) = split_path(src);
        let (dest_bucket, dest_rest) = split_path(dest);
        let src_prefix = if src_rest.is_empty() {
            String::new()
        } else {
            format!("{}/", src_rest.trim_end_matches('/'))
        };
        let dest_prefix = if dest_rest.is_empty() {
            String::new()
        } else {
            format!("{}/", dest_rest.trim_end_matches('/'))
        };

        let sources: Vec<(String, Vec<u8>)> = {
            let guard = self.lock();
            let bucket = guard.get(&src_bucket).ok_or(GcsError::BucketNotFound {
                bucket: src_bucket.clone(),
            })?;
            bucket
                .objects
                .iter()
                .filter(|(name, _)| name.starts_with(&src_prefix))
                .map(|(name, content)| (name.clone(), content.clone()))
                .collect()
        };
        if sources.is_empty() {
            return Err(GcsError::ObjectNotFound {
                url: src.to_string(),
            }
            .into());
        }

        let mut lines = Vec::new();
        for (name, content) in sources {
            let relative = &name[src_prefix.len()..];
            let dest_name = format!("{}{}", dest_prefix, relative);

            let mut guard = self.lock();
            let dest = guard
                .get_mut(&dest_bucket)
                .ok_or(GcsError::BucketNotFound {
                    bucket: dest_bucket.clone(),
                })?;
            if dest.objects.get(&dest_name) == Some(&content) {
                continue;
            }

            let src_url = format!("gs://{}/{}", src_bucket, name);
            let dest_url = format!("gs://{}/{}", dest_bucket, dest_name);
            if dry_run {
                lines.push(format!("Would copy {} to {}", src_url, dest_url));
            } else {
                lines.push(format!("Copying {} to {}", src_url, dest_url));
                dest.objects.insert(dest_name, content);
            }
        }
        Ok(lines.join("\n"))
    }

    async fn remove_label(&self, bucket: &BucketUrl, label: &str) -> Result<()> {
        let name = bucket.name().to_string();
        let mut guard = self.lock();
        let entry = guard
            .get_mut(&name)
            .ok_or(GcsError::BucketNotFound { bucket: name })?;
        entry.labels.remove(label);
        Ok(())
    }

    async fn get_iam_policy(&self, bucket: &BucketUrl) -> Result<IamPolicy> {
        let name = bucket.name().to_string();
        let guard = self.lock();
        let entry = guard
            .get(&name)
            .ok_or(GcsError::BucketNotFound { bucket: name })?;

        let mut by_role: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (role, member) in &entry.bindings {
            by_role.entry(role.clone()).or_default().push(member.clone());
        }
        Ok(IamPolicy {
            bindings: by_role
                .into_iter()
                .map(|(role, members)| IamBinding { role, members })
                .collect(),
        })
    }

    async fn add_iam_binding(&self, bucket: &BucketUrl, member: &str, role: &str) -> Result<()> {
        let name = bucket.name().to_string();
        let mut guard = self.lock();
        let entry = guard
            .get_mut(&name)
            .ok_or(GcsError::BucketNotFound { bucket: name })?;
        let pair = (role.to_string(), member.to_string());
        if !entry.bindings.contains(&pair) {
            entry.bindings.push(pair);
        }
        Ok(())
    }

    async fn remove_iam_binding(
        &self,
        bucket: &BucketUrl,
        member: &str,
        role: &str,
    ) -> Result<bool> {
        let name = bucket.name().to_string();
        let mut guard = self.lock();
        let entry = guard
            .get_mut(&name)
            .ok_or(GcsError::BucketNotFound { bucket: name })?;
        let before = entry.bindings.len();
        entry
            .bindings
            .retain(|(r, m)| !(r == role && m == member));
        Ok(entry.bindings.len() < before)
    }
}

use super::url::BucketUrl;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One listed object, named relative to its bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl ObjectEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            md5: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_md5(mut self, md5: impl Into<String>) -> Self {
        self.md5 = Some(md5.into());
        self
    }
}

/// Point-in-time listing of a bucket, optionally scoped to a prefix.
/// Immutable once fetched; a fresh listing produces a fresh snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSnapshot {
    pub bucket: BucketUrl,
    pub prefix: Option<String>,
    pub entries: Vec<ObjectEntry>,
}

impl BucketSnapshot {
    pub fn new(bucket: BucketUrl, prefix: Option<String>, entries: Vec<ObjectEntry>) -> Self {
        Self {
            bucket,
            prefix,
            entries,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ObjectEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full `gs://` URL of an entry name.
    pub fn url_of(&self, name: &str) -> String {
        self.bucket.join(name)
    }

    /// Order-independent fingerprint of the listed names, sizes, and hashes.
    pub fn digest(&self) -> String {
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|e| {
                format!(
                    "{}\t{}\t{}",
                    e.name,
                    e.md5.as_deref().unwrap_or(""),
                    e.size.map(|s| s.to_string()).unwrap_or_default()
                )
            })
            .collect();
        lines.sort();

        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Single-level listing split into directory markers and file names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

impl Listing {
    pub fn contains_dir(&self, name: &str) -> bool {
        self.dirs.iter().any(|d| d == name)
    }

    pub fn contains_file(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

/// Splits raw `gcloud storage ls` output into directories and files,
/// stripping the listed path from each entry. A trailing slash denotes a
/// directory. Directory names keep their trailing slash.
pub fn parse_listing(raw: &str, base: &str) -> Listing {
    // Ensure only one trailing slash on the prefix to strip
    let prefix = format!("{}/", base.trim_end_matches('/'));
    let mut listing = Listing::default();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == prefix || trimmed.ends_with(':') {
            continue;
        }
        let name = trimmed.strip_prefix(&prefix).unwrap_or(trimmed);
        if name.is_empty() {
            continue;
        }
        if name.ends_with('/') {
            listing.dirs.push(name.to_string());
        } else {
            listing.files.push(name.to_string());
        }
    }

    listing
}

/// Final path segment of an object name or URL.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

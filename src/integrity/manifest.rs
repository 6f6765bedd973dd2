use std::collections::BTreeSet;

use semver::Version;

use crate::error::{PromoteError, Result};

/// One row of a workflow `MANIFEST.tsv`.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub filename: String,
    pub timestamp: Option<String>,
    pub workflow_version: Option<String>,
    pub workflow_release: Option<String>,
}

/// Rows gathered from every manifest a workflow prefix carries. A
/// dataset processed in batches leaves one manifest per run; queries
/// here treat them as a single table.
#[derive(Debug, Clone, Default)]
pub struct CombinedManifest {
    pub entries: Vec<ManifestEntry>,
}

impl CombinedManifest {
    /// Parses tab-separated manifest content. Columns may appear in any
    /// order; only `filename` is required.
    pub fn parse_tsv(content: &str) -> Result<Self> {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else {
            return Ok(Self::default());
        };

        let columns: Vec<&str> = header.split('\t').map(|c| c.trim()).collect();
        let position = |name: &str| columns.iter().position(|c| *c == name);
        let Some(filename_idx) = position("filename") else {
            return Err(PromoteError::Manifest(
                "manifest has no 'filename' column".to_string(),
            ));
        };
        let timestamp_idx = position("timestamp");
        let version_idx = position("workflow_version");
        let release_idx = position("workflow_release");

        let mut entries = Vec::new();
        for line in lines {
            let fields: Vec<&str> = line.split('\t').map(|f| f.trim()).collect();
            let field = |idx: Option<usize>| {
                idx.and_then(|i| fields.get(i))
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string())
            };
            let Some(filename) = field(Some(filename_idx)) else {
                continue;
            };
            entries.push(ManifestEntry {
                filename,
                timestamp: field(timestamp_idx),
                workflow_version: field(version_idx),
                workflow_release: field(release_idx),
            });
        }
        Ok(Self { entries })
    }

    pub fn merge(&mut self, other: CombinedManifest) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any manifest row names this file. Row filenames may
    /// carry path or suffix decorations, so this is a substring match.
    pub fn contains_filename(&self, base_name: &str) -> bool {
        self.entries.iter().any(|e| e.filename.contains(base_name))
    }

    /// Timestamp recorded for a file, from the first row naming it.
    pub fn timestamp_of(&self, base_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.filename.contains(base_name))
            .and_then(|e| e.timestamp.as_deref())
    }

    /// Unique processing timestamps, newest first. Values not starting
    /// with a digit are placeholder junk and are dropped.
    pub fn timestamps(&self) -> Vec<String> {
        let unique: BTreeSet<&str> = self
            .entries
            .iter()
            .filter_map(|e| e.timestamp.as_deref())
            .filter(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .collect();
        unique.into_iter().rev().map(|t| t.to_string()).collect()
    }

    /// Unique `(workflow_version, workflow_release)` pairs, sorted.
    pub fn workflow_pairs(&self) -> Vec<(String, String)> {
        let unique: BTreeSet<(String, String)> = self
            .entries
            .iter()
            .filter_map(|e| match (&e.workflow_version, &e.workflow_release) {
                (Some(v), Some(r)) => Some((v.clone(), r.clone())),
                _ => None,
            })
            .collect();
        unique.into_iter().collect()
    }

    /// Highest workflow version by semantic-version order, falling back
    /// to lexicographic order when nothing parses.
    pub fn latest_workflow_version(&self) -> Option<String> {
        let unique: BTreeSet<&str> = self
            .entries
            .iter()
            .filter_map(|e| e.workflow_version.as_deref())
            .collect();

        let mut best: Option<(Version, &str)> = None;
        for raw in &unique {
            let Some(parsed) = parse_lenient_version(raw) else {
                continue;
            };
            if best.as_ref().map(|(b, _)| parsed > *b).unwrap_or(true) {
                best = Some((parsed, raw));
            }
        }
        best.map(|(_, raw)| raw.to_string())
            .or_else(|| unique.into_iter().next_back().map(|v| v.to_string()))
    }
}

/// Accepts `v1.0`-style versions by stripping the prefix and padding to
/// three components.
fn parse_lenient_version(raw: &str) -> Option<Version> {
    let mut normalized = raw.trim_start_matches(['v', 'V']).to_string();
    while normalized.split('.').count() < 3 {
        normalized.push_str(".0");
    }
    Version::parse(&normalized).ok()
}

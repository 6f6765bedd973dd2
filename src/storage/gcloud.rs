use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::bucket::BucketUrl;
use crate::error::{parse_gcloud_error, spawn_failure, ErrorContext, GcsError, PromoteError, Result};

use super::backend::{IamPolicy, ObjectHash, StorageBackend};

/// Shells out to the `gcloud storage` CLI, inheriting whatever
/// credentials `gcloud auth` has active.
#[derive(Debug, Clone)]
pub struct GcloudBackend {
    binary: String,
    project: Option<String>,
}

impl GcloudBackend {
    pub fn new() -> Self {
        Self {
            binary: "gcloud".to_string(),
            project: None,
        }
    }

    /// Pins `--project` on every invocation, for commands that resolve
    /// resources outside the caller's default project.
    pub fn with_project(project: impl Into<String>) -> Self {
        Self {
            binary: "gcloud".to_string(),
            project: Some(project.into()),
        }
    }

    /// Overrides the `gcloud` binary, for SDK installs outside PATH.
    pub fn gcloud_bin(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, args: &[&str], context: ErrorContext) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command.args(args);
        if let Some(project) = &self.project {
            command.arg("--project").arg(project);
        }

        debug!("{} {}", self.binary, args.join(" "));

        let context = context.with_command(format!("{} {}", self.binary, args.join(" ")));
        let output = command
            .output()
            .await
            .map_err(|e| spawn_failure(&self.binary, &e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(parse_gcloud_error(&stderr, output.status.code(), context).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for GcloudBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds an [`ErrorContext`] out of a `gs://bucket/object` path.
fn context_for(operation: &str, path: &str) -> ErrorContext {
    let trimmed = path.trim_start_matches("gs://");
    let mut context = ErrorContext::new().with_operation(operation);
    match trimmed.split_once('/') {
        Some((bucket, object)) => {
            context = context.with_bucket(bucket);
            let object = object.trim_end_matches('*').trim_end_matches('/');
            if !object.is_empty() {
                context = context.with_object(object);
            }
        }
        None => {
            context = context.with_bucket(trimmed);
        }
    }
    context
}

#[async_trait]
impl StorageBackend for GcloudBackend {
    async fn describe_bucket(&self, bucket: &BucketUrl) -> Result<()> {
        let context = context_for("buckets describe", bucket.as_str());
        self.run(&["storage", "buckets", "describe", bucket.as_str()], context)
            .await?;
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<String> {
        let context = context_for("ls", path);
        self.run(&["storage", "ls", path], context).await
    }

    async fn object_sizes(&self, pattern: &str) -> Result<Vec<(String, u64)>> {
        let context = context_for("du", pattern);
        let raw = self.run(&["storage", "du", pattern], context).await?;

        let mut sizes = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(size), Some(url)) = (parts.next(), parts.next()) else {
                continue;
            };
            if url.ends_with('/') {
                continue;
            }
            let size = size.parse::<u64>().map_err(|_| {
                PromoteError::Storage(GcsError::CommandFailed {
                    command: format!("{} storage du {}", self.binary, pattern),
                    exit_code: None,
                    stderr: format!("unparseable du line: '{}'", line),
                })
            })?;
            sizes.push((url.to_string(), size));
        }
        Ok(sizes)
    }

    async fn object_hashes(&self, pattern: &str) -> Result<Vec<ObjectHash>> {
        let context = context_for("hash", pattern);
        let raw = self
            .run(&["storage", "hash", pattern, "--format=json"], context)
            .await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn read_object(&self, url: &str) -> Result<String> {
        let context = context_for("cat", url);
        self.run(&["storage", "cat", url], context).await
    }

    async fn copy(&self, src: &str, dest: &str, recursive: bool) -> Result<()> {
        let context = context_for("cp", dest);
        if recursive {
            self.run(&["storage", "cp", "--recursive", src, dest], context)
                .await?;
        } else {
            self.run(&["storage", "cp", src, dest], context).await?;
        }
        Ok(())
    }

    async fn move_object(&self, src: &str, dest: &str) -> Result<()> {
        let context = context_for("mv", src);
        self.run(&["storage", "mv", src, dest], context).await?;
        Ok(())
    }

    async fn rsync(&self, src: &str, dest: &str, dry_run: bool) -> Result<String> {
        let context = context_for("rsync", src);
        if dry_run {
            self.run(&["storage", "rsync", "-r", "--dry-run", src, dest], context)
                .await
        } else {
            self.run(&["storage", "rsync", "-r", src, dest], context).await
        }
    }

    async fn remove_label(&self, bucket: &BucketUrl, label: &str) -> Result<()> {
        let context = context_for("buckets update", bucket.as_str());
        let flag = format!("--remove-labels={}", label);
        self.run(
            &["storage", "buckets", "update", bucket.as_str(), &flag],
            context,
        )
        .await?;
        Ok(())
    }

    async fn get_iam_policy(&self, bucket: &BucketUrl) -> Result<IamPolicy> {
        let context = context_for("buckets get-iam-policy", bucket.as_str());
        let raw = self
            .run(
                &[
                    "storage",
                    "buckets",
                    "get-iam-policy",
                    bucket.as_str(),
                    "--format=json",
                ],
                context,
            )
            .await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn add_iam_binding(&self, bucket: &BucketUrl, member: &str, role: &str) -> Result<()> {
        let context = context_for("buckets add-iam-policy-binding", bucket.as_str());
        let member_flag = format!("--member={}", member);
        let role_flag = format!("--role={}", role);
        self.run(
            &[
                "storage",
                "buckets",
                "add-iam-policy-binding",
                bucket.as_str(),
                &member_flag,
                &role_flag,
            ],
            context,
        )
        .await?;
        Ok(())
    }

    async fn remove_iam_binding(
        &self,
        bucket: &BucketUrl,
        member: &str,
        role: &str,
    ) -> Result<bool> {
        let context = context_for("buckets remove-iam-policy-binding", bucket.as_str());
        let member_flag = format!("--member={}", member);
        let role_flag = format!("--role={}", role);
        let result = self
            .run(
                &[
                    "storage",
                    "buckets",
                    "remove-iam-policy-binding",
                    bucket.as_str(),
                    &member_flag,
                    &role_flag,
                ],
                context,
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(PromoteError::Storage(GcsError::CommandFailed { stderr, .. }))
                if stderr.contains("No policy binding found") =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_for_splits_bucket_and_object() {
        let context = context_for("ls", "gs://asap-dev-team-hardy-pmdbs/metadata/");
        assert_eq!(context.bucket.as_deref(), Some("asap-dev-team-hardy-pmdbs"));
        assert_eq!(context.object.as_deref(), Some("metadata"));
    }

    #[test]
    fn test_context_for_strips_wildcards() {
        let context = context_for("ls", "gs://asap-dev-cohort-pmdbs/harmonized/**");
        assert_eq!(context.bucket.as_deref(), Some("asap-dev-cohort-pmdbs"));
        assert_eq!(context.object.as_deref(), Some("harmonized"));
    }

    #[test]
    fn test_context_for_bare_bucket() {
        let context = context_for("buckets describe", "gs://asap-raw-team-lee-pmdbs");
        assert_eq!(context.bucket.as_deref(), Some("asap-raw-team-lee-pmdbs"));
        assert!(context.object.is_none());
    }
}

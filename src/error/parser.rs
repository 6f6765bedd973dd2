use super::gcs::GcsError;
use regex::Regex;

/// Classifies a failed `gcloud storage` invocation from its stderr output.
pub fn parse_gcloud_error(stderr: &str, exit_code: Option<i32>, context: ErrorContext) -> GcsError {
    let lower = stderr.to_lowercase();

    if lower.contains("active account")
        || lower.contains("reauthentication")
        || lower.contains("anonymous caller")
        || lower.contains("invalid_grant")
        || lower.contains("401")
    {
        return GcsError::AuthenticationFailed {
            reason: first_error_line(stderr),
        };
    }

    if lower.contains("403")
        || lower.contains("access denied")
        || lower.contains("permission")
        || lower.contains("forbidden")
        || lower.contains("does not have")
    {
        return GcsError::AccessDenied {
            resource: context.resource(),
            required_role: extract_role(stderr),
        };
    }

    if lower.contains("matched no objects") {
        let url = extract_gs_url(stderr)
            .or_else(|| context.object.clone())
            .unwrap_or_else(|| context.resource());
        return GcsError::ObjectNotFound { url };
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        return GcsError::RateLimited {
            message: first_error_line(stderr),
        };
    }

    if lower.contains("404") || lower.contains("not found") || lower.contains("does not exist") {
        if lower.contains("bucket") || context.object.is_none() {
            let bucket = extract_bucket_name(stderr)
                .or_else(|| context.bucket.clone())
                .unwrap_or_else(|| "unknown".to_string());
            return GcsError::BucketNotFound { bucket };
        }
        let url = extract_gs_url(stderr)
            .or_else(|| context.object.clone())
            .unwrap_or_else(|| context.resource());
        return GcsError::ObjectNotFound { url };
    }

    GcsError::CommandFailed {
        command: context.command_or_operation(),
        exit_code,
        stderr: truncate_stderr(stderr),
    }
}

/// Maps a spawn failure (the command never ran) to a typed error.
pub fn spawn_failure(binary: &str, err: &std::io::Error) -> GcsError {
    if err.kind() == std::io::ErrorKind::NotFound {
        GcsError::GcloudMissing {
            binary: binary.to_string(),
        }
    } else {
        GcsError::CommandFailed {
            command: binary.to_string(),
            exit_code: None,
            stderr: err.to_string(),
        }
    }
}

fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn extract_gs_url(stderr: &str) -> Option<String> {
    let re = Regex::new(r#"(gs://[^\s'",]+)"#).ok()?;
    re.captures(stderr)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', ':']).to_string())
}

fn extract_bucket_name(stderr: &str) -> Option<String> {
    let url = extract_gs_url(stderr)?;
    let rest = url.strip_prefix("gs://")?;
    let bucket = rest.split('/').next()?;
    if bucket.is_empty() {
        None
    } else {
        Some(bucket.to_string())
    }
}

fn extract_role(stderr: &str) -> Option<String> {
    let re = Regex::new(r"(roles/[A-Za-z0-9.]+)").ok()?;
    re.captures(stderr)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn truncate_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    // Keep first 500 chars as preview
    if trimmed.len() > 500 {
        let mut end = 500;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub bucket: Option<String>,
    pub object: Option<String>,
    pub command: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    /// Stores the bare bucket name; any gs:// prefix or trailing slash is stripped.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        let raw = bucket.into();
        let name = raw
            .strip_prefix("gs://")
            .unwrap_or(&raw)
            .trim_end_matches('/')
            .to_string();
        self.bucket = Some(name);
        self
    }

    pub fn with_object(mut self, url: impl Into<String>) -> Self {
        self.object = Some(url.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn resource(&self) -> String {
        if let Some(object) = &self.object {
            object.clone()
        } else if let Some(bucket) = &self.bucket {
            format!("gs://{bucket}")
        } else {
            "resource".to_string()
        }
    }

    fn command_or_operation(&self) -> String {
        self.command
            .clone()
            .or_else(|| self.operation.clone())
            .unwrap_or_else(|| "gcloud storage".to_string())
    }
}

use std::fmt;

#[derive(Debug, Clone)]
pub enum GcsError {
    AuthenticationFailed {
        reason: String,
    },

    BucketNotFound {
        bucket: String,
    },

    ObjectNotFound {
        url: String,
    },

    AccessDenied {
        resource: String,
        required_role: Option<String>,
    },

    RateLimited {
        message: String,
    },

    InvalidUrl {
        url: String,
        reason: String,
    },

    GcloudMissing {
        binary: String,
    },

    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl GcsError {
    pub fn suggestion(&self) -> String {
        match self {
            GcsError::AuthenticationFailed { .. } => {
                "Try:\n  \
                 • Run: gcloud auth login\n  \
                 • Check the active account: gcloud auth list\n  \
                 • Or set GOOGLE_APPLICATION_CREDENTIALS to your service account key file".to_string()
            }

            GcsError::BucketNotFound { bucket } => {
                format!(
                    "Verify the bucket exists:\n  \
                     • Run: gcloud storage buckets describe gs://{bucket}\n  \
                     • Check the team and dataset names for typos\n  \
                     • Confirm the bucket has been provisioned for this release"
                )
            }

            GcsError::ObjectNotFound { url } => {
                format!(
                    "Verify the path exists:\n  \
                     • Run: gcloud storage ls {url}\n  \
                     • Check the prefix spelling\n  \
                     • The listing may simply be empty for this dataset"
                )
            }

            GcsError::AccessDenied { resource, required_role } => {
                let role = required_role.as_deref().unwrap_or("roles/storage.objectViewer");
                format!(
                    "Request access to {resource}:\n  \
                     • Required role: {role}\n  \
                     • Contact the project admin\n  \
                     • Or run: gcloud storage buckets add-iam-policy-binding gs://BUCKET \\\n    \
                       --member=user:YOUR_EMAIL --role={role}"
                )
            }

            GcsError::RateLimited { .. } => {
                "Storage API rate limit reached:\n  \
                 • Wait and retry later\n  \
                 • Narrow the listing to a smaller prefix".to_string()
            }

            GcsError::InvalidUrl { .. } => {
                "Check the bucket URL:\n  \
                 • It must start with gs://\n  \
                 • Bucket names use lowercase letters, digits, and hyphens".to_string()
            }

            GcsError::GcloudMissing { binary } => {
                format!(
                    "The '{binary}' binary was not found:\n  \
                     • Install the Google Cloud SDK\n  \
                     • Ensure it is on PATH, or pass --gcloud-bin"
                )
            }

            GcsError::CommandFailed { .. } => {
                "The storage command failed:\n  \
                 • Re-run with --verbose to see the full invocation\n  \
                 • Check the stderr output above for details".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GcsError::AuthenticationFailed { .. } => "AUTH_FAILED",
            GcsError::BucketNotFound { .. } => "BUCKET_NOT_FOUND",
            GcsError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            GcsError::AccessDenied { .. } => "ACCESS_DENIED",
            GcsError::RateLimited { .. } => "RATE_LIMITED",
            GcsError::InvalidUrl { .. } => "INVALID_URL",
            GcsError::GcloudMissing { .. } => "GCLOUD_MISSING",
            GcsError::CommandFailed { .. } => "COMMAND_FAILED",
        }
    }

    /// Absent listings are a normal fallback path in several checks.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GcsError::BucketNotFound { .. } | GcsError::ObjectNotFound { .. }
        )
    }
}

impl fmt::Display for GcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcsError::AuthenticationFailed { reason } => {
                write!(f, "Authentication failed: {reason}")
            }

            GcsError::BucketNotFound { bucket } => {
                write!(f, "Bucket not found: gs://{bucket}")
            }

            GcsError::ObjectNotFound { url } => {
                write!(f, "No objects matched: {url}")
            }

            GcsError::AccessDenied { resource, required_role } => {
                write!(f, "Access denied to {resource}")?;
                if let Some(role) = required_role {
                    write!(f, " (requires {role})")?;
                }
                Ok(())
            }

            GcsError::RateLimited { message } => {
                write!(f, "Rate limited: {message}")
            }

            GcsError::InvalidUrl { url, reason } => {
                write!(f, "Invalid bucket URL '{url}': {reason}")
            }

            GcsError::GcloudMissing { binary } => {
                write!(f, "Storage CLI not found: {binary}")
            }

            GcsError::CommandFailed { command, exit_code, stderr } => {
                write!(f, "Command failed: {command}")?;
                if let Some(code) = exit_code {
                    write!(f, " (exit code {code})")?;
                }
                if !stderr.is_empty() {
                    write!(f, "\n\nstderr:\n  {stderr}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GcsError {}

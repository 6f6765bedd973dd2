use std::fmt;

use crate::bucket::{BucketUrl, TeamName};
use crate::config::AccessConfig;
use crate::error::{PromoteError, Result};
use crate::storage::StorageBackend;

const ADMIN_ROLE: &str = "roles/storage.admin";
const VIEWER_ROLE: &str = "roles/storage.objectViewer";
const CREATOR_ROLE: &str = "roles/storage.objectCreator";

/// One policy edit planned or applied during lockdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockdownAction {
    RemoveLabel { label: String },
    RevokeRole { member: String, role: String },
    GrantRole { member: String, role: String },
}

impl fmt::Display for LockdownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockdownAction::RemoveLabel { label } => write!(f, "remove label '{}'", label),
            LockdownAction::RevokeRole { member, role } => {
                write!(f, "revoke {} from {}", role, member)
            }
            LockdownAction::GrantRole { member, role } => {
                write!(f, "grant {} to {}", role, member)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockdownReport {
    pub bucket: BucketUrl,
    pub team: TeamName,
    pub actions: Vec<LockdownAction>,
    pub applied: bool,
}

/// Finalizes access once a raw bucket has cleared QC: the internal QC
/// label comes off and the contributing team drops from object admin to
/// read-plus-upload.
pub struct AccessManager<'a> {
    backend: &'a dyn StorageBackend,
    access: &'a AccessConfig,
}

impl<'a> AccessManager<'a> {
    pub fn new(backend: &'a dyn StorageBackend, access: &'a AccessConfig) -> Self {
        Self { backend, access }
    }

    pub async fn lockdown(&self, bucket: &BucketUrl, dry_run: bool) -> Result<LockdownReport> {
        let team = TeamName::from_bucket_name(bucket.name()).ok_or_else(|| {
            PromoteError::InvalidTeamName(format!(
                "could not extract a team from bucket '{bucket}'"
            ))
        })?;

        let policy = self.backend.get_iam_policy(bucket).await?;
        let members = [
            self.access.team_group_member(&team),
            self.access.upload_sa_member(&team),
        ];

        let mut actions = vec![LockdownAction::RemoveLabel {
            label: self.access.qc_label.clone(),
        }];
        for member in &members {
            if policy.has_member(ADMIN_ROLE, member) {
                actions.push(LockdownAction::RevokeRole {
                    member: member.clone(),
                    role: ADMIN_ROLE.to_string(),
                });
            }
            for role in [VIEWER_ROLE, CREATOR_ROLE] {
                if !policy.has_member(role, member) {
                    actions.push(LockdownAction::GrantRole {
                        member: member.clone(),
                        role: role.to_string(),
                    });
                }
            }
        }

        if !dry_run {
            for action in &actions {
                match action {
                    LockdownAction::RemoveLabel { label } => {
                        self.backend.remove_label(bucket, label).await?;
                    }
                    LockdownAction::RevokeRole { member, role } => {
                        // false means the binding vanished since the
                        // policy read, which leaves us where we wanted.
                        self.backend.remove_iam_binding(bucket, member, role).await?;
                    }
                    LockdownAction::GrantRole { member, role } => {
                        self.backend.add_iam_binding(bucket, member, role).await?;
                    }
                }
            }
        }

        Ok(LockdownReport {
            bucket: bucket.clone(),
            team,
            actions,
            applied: !dry_run,
        })
    }

    /// Grants the configured reader group view access, usually on a
    /// curated bucket after promotion. Returns false when the binding
    /// already existed.
    pub async fn grant_reader_access(&self, bucket: &BucketUrl, dry_run: bool) -> Result<bool> {
        let member = self.access.reader_member();
        let policy = self.backend.get_iam_policy(bucket).await?;
        if policy.has_member(VIEWER_ROLE, &member) {
            return Ok(false);
        }
        if !dry_run {
            self.backend
                .add_iam_binding(bucket, &member, VIEWER_ROLE)
                .await?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStorage;

    const RAW: &str = "asap-raw-team-hardy-pmdbs-bulk-rnaseq";
    const GROUP: &str = "group:asap-team-hardy@dnastack.com";
    const SA: &str =
        "serviceAccount:raw-admin-hardy@dnastack-asap-parkinsons.iam.gserviceaccount.com";

    fn bucket() -> BucketUrl {
        BucketUrl::parse(&format!("gs://{}", RAW)).unwrap()
    }

    fn seeded() -> MockStorage {
        let storage = MockStorage::new();
        storage.create_bucket(RAW);
        storage.add_label(RAW, "internal-qc-data", "true");
        storage.add_binding(RAW, ADMIN_ROLE, GROUP);
        storage.add_binding(RAW, ADMIN_ROLE, SA);
        storage
    }

    #[tokio::test]
    async fn test_lockdown_downgrades_team_access() {
        let storage = seeded();
        let access = AccessConfig::default();
        let manager = AccessManager::new(&storage, &access);

        let report = manager.lockdown(&bucket(), false).await.unwrap();

        assert!(report.applied);
        assert_eq!(report.team.as_str(), "hardy");
        assert!(!storage.labels(RAW).contains_key("internal-qc-data"));
        for member in [GROUP, SA] {
            assert!(!storage.has_binding(RAW, ADMIN_ROLE, member));
            assert!(storage.has_binding(RAW, VIEWER_ROLE, member));
            assert!(storage.has_binding(RAW, CREATOR_ROLE, member));
        }
    }

    #[tokio::test]
    async fn test_lockdown_dry_run_only_plans() {
        let storage = seeded();
        let access = AccessConfig::default();
        let manager = AccessManager::new(&storage, &access);

        let report = manager.lockdown(&bucket(), true).await.unwrap();

        assert!(!report.applied);
        // Label removal, two revokes, and four grants.
        assert_eq!(report.actions.len(), 7);
        assert!(storage.labels(RAW).contains_key("internal-qc-data"));
        assert!(storage.has_binding(RAW, ADMIN_ROLE, GROUP));
        assert!(!storage.has_binding(RAW, VIEWER_ROLE, GROUP));
    }

    #[tokio::test]
    async fn test_lockdown_is_idempotent() {
        let storage = seeded();
        let access = AccessConfig::default();
        let manager = AccessManager::new(&storage, &access);

        manager.lockdown(&bucket(), false).await.unwrap();
        let second = manager.lockdown(&bucket(), false).await.unwrap();

        let revokes = second
            .actions
            .iter()
            .filter(|a| matches!(a, LockdownAction::RevokeRole { .. }))
            .count();
        let grants = second
            .actions
            .iter()
            .filter(|a| matches!(a, LockdownAction::GrantRole { .. }))
            .count();
        assert_eq!(revokes, 0);
        assert_eq!(grants, 0);
        assert!(storage.has_binding(RAW, VIEWER_ROLE, GROUP));
    }

    #[tokio::test]
    async fn test_lockdown_rejects_unparseable_bucket() {
        let storage = MockStorage::new();
        storage.create_bucket("asap-raw-cohort-pmdbs-sc-rnaseq");
        let access = AccessConfig::default();
        let manager = AccessManager::new(&storage, &access);

        let err = manager
            .lockdown(
                &BucketUrl::parse("gs://asap-raw-cohort-pmdbs-sc-rnaseq").unwrap(),
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PromoteError::InvalidTeamName(_)));
    }

    #[tokio::test]
    async fn test_grant_reader_access() {
        let storage = MockStorage::new();
        storage.create_bucket("asap-curated-team-hardy-pmdbs-bulk-rnaseq");
        let curated = BucketUrl::parse("gs://asap-curated-team-hardy-pmdbs-bulk-rnaseq").unwrap();
        let access = AccessConfig::default();
        let manager = AccessManager::new(&storage, &access);

        assert!(manager.grant_reader_access(&curated, false).await.unwrap());
        assert!(storage.has_binding(
            "asap-curated-team-hardy-pmdbs-bulk-rnaseq",
            VIEWER_ROLE,
            "group:asap-cloud-readers@verily-bvdp.com"
        ));
        assert!(!manager.grant_reader_access(&curated, false).await.unwrap());
    }
}

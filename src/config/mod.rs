mod loader;

pub use loader::load_config;

use crate::bucket::{BucketUrl, DatasetId, StagingEnv, TeamName};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Release settings plus the injected naming, team roster, and access data.
/// Every field has a working default so most commands run without a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub naming: BucketNaming,
    #[serde(default = "default_teams")]
    pub teams: Vec<String>,
    #[serde(default)]
    pub access: AccessConfig,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            naming: BucketNaming::default(),
            teams: default_teams(),
            access: AccessConfig::default(),
        }
    }
}

impl PromotionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        loader::load_config(path)
    }

    pub fn is_known_team(&self, team: &TeamName) -> bool {
        self.teams
            .iter()
            .any(|t| matches!(TeamName::parse(t), Ok(known) if known == *team))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub release_version: String,
    #[serde(default)]
    pub dataset_names: Vec<String>,
}

/// Bucket naming convention: `{org}-{env}-{qualified dataset id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketNaming {
    #[serde(default = "default_org_prefix")]
    pub org_prefix: String,
    #[serde(default = "default_raw_env")]
    pub raw_env: String,
    #[serde(default = "default_curated_env")]
    pub curated_env: String,
}

impl Default for BucketNaming {
    fn default() -> Self {
        Self {
            org_prefix: default_org_prefix(),
            raw_env: default_raw_env(),
            curated_env: default_curated_env(),
        }
    }
}

impl BucketNaming {
    pub fn raw_bucket(&self, id: &DatasetId) -> Result<BucketUrl> {
        BucketUrl::from_name(&format!(
            "{}-{}-{}",
            self.org_prefix,
            self.raw_env,
            id.qualified()
        ))
    }

    pub fn staging_bucket(&self, env: StagingEnv, id: &DatasetId) -> Result<BucketUrl> {
        BucketUrl::from_name(&format!("{}-{}-{}", self.org_prefix, env, id.qualified()))
    }

    pub fn curated_bucket(&self, id: &DatasetId) -> Result<BucketUrl> {
        BucketUrl::from_name(&format!(
            "{}-{}-{}",
            self.org_prefix,
            self.curated_env,
            id.qualified()
        ))
    }
}

/// IAM identities and the QC label used when finalizing buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_qc_label")]
    pub qc_label: String,
    #[serde(default = "default_group_prefix")]
    pub team_group_prefix: String,
    #[serde(default = "default_group_domain")]
    pub team_group_domain: String,
    #[serde(default = "default_sa_prefix")]
    pub upload_sa_prefix: String,
    #[serde(default = "default_sa_domain")]
    pub upload_sa_domain: String,
    #[serde(default = "default_reader_group")]
    pub reader_group: String,
    #[serde(default = "default_project")]
    pub project: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            qc_label: default_qc_label(),
            team_group_prefix: default_group_prefix(),
            team_group_domain: default_group_domain(),
            upload_sa_prefix: default_sa_prefix(),
            upload_sa_domain: default_sa_domain(),
            reader_group: default_reader_group(),
            project: default_project(),
        }
    }
}

impl AccessConfig {
    /// IAM member string for a team's Google Group.
    pub fn team_group_member(&self, team: &TeamName) -> String {
        format!(
            "group:{}{}@{}",
            self.team_group_prefix, team, self.team_group_domain
        )
    }

    /// IAM member string for a team's upload service account.
    pub fn upload_sa_member(&self, team: &TeamName) -> String {
        format!(
            "serviceAccount:{}{}@{}",
            self.upload_sa_prefix, team, self.upload_sa_domain
        )
    }

    pub fn reader_member(&self) -> String {
        format!("group:{}", self.reader_group)
    }
}

fn default_teams() -> Vec<String> {
    [
        "cohort",
        "team-hafler",
        "team-hardy",
        "team-jakobsson",
        "team-lee",
        "team-scherzer",
        "team-sulzer",
        "team-voet",
        "team-wood",
        "team-biederer",
        "team-cragg",
        "team-edwards",
        "team-vila",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_org_prefix() -> String {
    "asap".to_string()
}

fn default_raw_env() -> String {
    "raw".to_string()
}

fn default_curated_env() -> String {
    "curated".to_string()
}

fn default_qc_label() -> String {
    "internal-qc-data".to_string()
}

fn default_group_prefix() -> String {
    "asap-team-".to_string()
}

fn default_group_domain() -> String {
    "dnastack.com".to_string()
}

fn default_sa_prefix() -> String {
    "raw-admin-".to_string()
}

fn default_sa_domain() -> String {
    "dnastack-asap-parkinsons.iam.gserviceaccount.com".to_string()
}

fn default_reader_group() -> String {
    "asap-cloud-readers@verily-bvdp.com".to_string()
}

fn default_project() -> String {
    "dnastack-asap-parkinsons".to_string()
}

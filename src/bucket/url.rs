use crate::error::{PromoteError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contributor team identifier, stored without the `team` prefix.
///
/// Dataset directories and IAM identities never carry the prefix, bucket
/// names re-attach it where the convention requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamName(String);

impl TeamName {
    pub fn parse(raw: &str) -> Result<Self> {
        let norm = raw.trim().to_lowercase();
        let stripped = norm
            .strip_prefix("team")
            .map(|rest| rest.trim_start_matches(['-', '_', ' ']))
            .unwrap_or(&norm);

        if stripped.is_empty() {
            return Err(PromoteError::InvalidTeamName(format!(
                "'{raw}' is empty after stripping the team prefix"
            )));
        }

        if !stripped
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(PromoteError::InvalidTeamName(format!(
                "'{raw}' may only contain lowercase letters, digits, and hyphens"
            )));
        }

        Ok(Self(stripped.to_string()))
    }

    /// Pulls the team out of a full bucket name such as
    /// `asap-raw-team-jakobsson-pmdbs-sn-rnaseq`.
    pub fn from_bucket_name(bucket: &str) -> Option<Self> {
        let re = Regex::new(r"team-(.*?)-(mouse|pmdbs|invitro)").ok()?;
        let caps = re.captures(bucket)?;
        Some(Self(caps.get(1)?.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_cohort(&self) -> bool {
        self.0 == "cohort"
    }
}

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team plus dataset name, the unit every bucket is named after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetId {
    team: TeamName,
    dataset: String,
}

impl DatasetId {
    pub fn new(team: &str, dataset: &str) -> Result<Self> {
        let team = TeamName::parse(team)?;
        let dataset = dataset.trim().to_lowercase();

        if dataset.is_empty() {
            return Err(PromoteError::Config("dataset name is empty".to_string()));
        }
        if !dataset
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(PromoteError::Config(format!(
                "dataset name '{dataset}' may only contain lowercase letters, digits, and hyphens"
            )));
        }

        Ok(Self { team, dataset })
    }

    /// Splits a combined `{team}-{dataset}` name as it appears in release
    /// configs, e.g. `hardy-pmdbs-bulk-rnaseq`.
    pub fn from_combined(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        let (team, dataset) = trimmed.split_once('-').ok_or_else(|| {
            PromoteError::Config(format!(
                "dataset name '{trimmed}' must look like '<team>-<dataset>'"
            ))
        })?;
        Self::new(team, dataset)
    }

    pub fn team(&self) -> &TeamName {
        &self.team
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// The name segment shared by every bucket for this dataset. Cohort
    /// datasets carry no `team-` prefix.
    pub fn qualified(&self) -> String {
        if self.team.is_cohort() {
            format!("cohort-{}", self.dataset)
        } else {
            format!("team-{}-{}", self.team, self.dataset)
        }
    }

    /// Underscore form used for generated file names.
    pub fn underscored(&self) -> String {
        self.qualified().replace('-', "_")
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

/// Pre-production environment a dataset is staged in before promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingEnv {
    Dev,
    Uat,
}

impl StagingEnv {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dev" => Ok(StagingEnv::Dev),
            "uat" => Ok(StagingEnv::Uat),
            other => Err(PromoteError::Config(format!(
                "unknown staging environment '{other}' (expected 'dev' or 'uat')"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StagingEnv::Dev => "dev",
            StagingEnv::Uat => "uat",
        }
    }
}

impl fmt::Display for StagingEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated `gs://` bucket URL without any object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketUrl(String);

impl BucketUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        let rest = trimmed.strip_prefix("gs://").ok_or_else(|| {
            PromoteError::InvalidBucketUrl(format!("'{raw}' must start with gs://"))
        })?;

        if rest.contains('/') {
            return Err(PromoteError::InvalidBucketUrl(format!(
                "'{raw}' must not contain an object path"
            )));
        }
        if rest.is_empty() {
            return Err(PromoteError::InvalidBucketUrl(format!(
                "'{raw}' has an empty bucket name"
            )));
        }
        if !rest
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
        {
            return Err(PromoteError::InvalidBucketUrl(format!(
                "'{raw}' contains characters outside [a-z0-9-._]"
            )));
        }

        Ok(Self(format!("gs://{rest}")))
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::parse(&format!("gs://{name}"))
    }

    /// The bare bucket name without the `gs://` scheme.
    pub fn name(&self) -> &str {
        self.0.trim_start_matches("gs://")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends an object path, normalizing the joining slash.
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for BucketUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_name_parse_plain() {
        assert_eq!(TeamName::parse("hardy").unwrap().as_str(), "hardy");
    }

    #[test]
    fn test_team_name_parse_strips_prefix() {
        assert_eq!(TeamName::parse("team-hardy").unwrap().as_str(), "hardy");
        assert_eq!(TeamName::parse("team_hardy").unwrap().as_str(), "hardy");
        assert_eq!(TeamName::parse("Team Hardy").unwrap().as_str(), "hardy");
        assert_eq!(TeamName::parse("TEAM-LEE").unwrap().as_str(), "lee");
    }

    #[test]
    fn test_team_name_parse_empty_after_strip() {
        assert!(TeamName::parse("team-").is_err());
        assert!(TeamName::parse("team").is_err());
        assert!(TeamName::parse("   ").is_err());
    }

    #[test]
    fn test_team_name_parse_rejects_invalid_chars() {
        assert!(TeamName::parse("har dy").is_err());
        assert!(TeamName::parse("hardy!").is_err());
    }

    #[test]
    fn test_team_name_from_bucket_name() {
        let team = TeamName::from_bucket_name("asap-raw-team-jakobsson-pmdbs-sn-rnaseq").unwrap();
        assert_eq!(team.as_str(), "jakobsson");

        let team = TeamName::from_bucket_name("asap-dev-team-cragg-mouse-spatial-visium").unwrap();
        assert_eq!(team.as_str(), "cragg");

        assert!(TeamName::from_bucket_name("asap-dev-cohort-pmdbs-sc-rnaseq").is_none());
    }

    #[test]
    fn test_team_name_is_cohort() {
        assert!(TeamName::parse("cohort").unwrap().is_cohort());
        assert!(!TeamName::parse("hardy").unwrap().is_cohort());
    }

    #[test]
    fn test_dataset_id_qualified() {
        let id = DatasetId::new("team-hardy", "pmdbs-bulk-rnaseq").unwrap();
        assert_eq!(id.qualified(), "team-hardy-pmdbs-bulk-rnaseq");
        assert_eq!(id.underscored(), "team_hardy_pmdbs_bulk_rnaseq");
    }

    #[test]
    fn test_dataset_id_cohort_has_no_team_prefix() {
        let id = DatasetId::new("cohort", "pmdbs-sc-rnaseq").unwrap();
        assert_eq!(id.qualified(), "cohort-pmdbs-sc-rnaseq");
    }

    #[test]
    fn test_dataset_id_rejects_empty_dataset() {
        assert!(DatasetId::new("hardy", "").is_err());
        assert!(DatasetId::new("hardy", "  ").is_err());
    }

    #[test]
    fn test_dataset_id_from_combined() {
        let id = DatasetId::from_combined("hardy-pmdbs-bulk-rnaseq").unwrap();
        assert_eq!(id.team().as_str(), "hardy");
        assert_eq!(id.dataset(), "pmdbs-bulk-rnaseq");
        assert_eq!(id.qualified(), "team-hardy-pmdbs-bulk-rnaseq");
    }

    #[test]
    fn test_dataset_id_from_combined_cohort() {
        let id = DatasetId::from_combined("cohort-pmdbs-bulk-rnaseq").unwrap();
        assert_eq!(id.qualified(), "cohort-pmdbs-bulk-rnaseq");
    }

    #[test]
    fn test_dataset_id_from_combined_rejects_single_segment() {
        assert!(DatasetId::from_combined("hardy").is_err());
    }

    #[test]
    fn test_staging_env_parse() {
        assert_eq!(StagingEnv::parse("dev").unwrap(), StagingEnv::Dev);
        assert_eq!(StagingEnv::parse("UAT").unwrap(), StagingEnv::Uat);
        assert!(StagingEnv::parse("prod").is_err());
    }

    #[test]
    fn test_staging_env_display() {
        assert_eq!(StagingEnv::Dev.to_string(), "dev");
        assert_eq!(StagingEnv::Uat.to_string(), "uat");
    }

    #[test]
    fn test_bucket_url_parse() {
        let url = BucketUrl::parse("gs://asap-raw-team-hardy-pmdbs-bulk-rnaseq").unwrap();
        assert_eq!(url.as_str(), "gs://asap-raw-team-hardy-pmdbs-bulk-rnaseq");
        assert_eq!(url.name(), "asap-raw-team-hardy-pmdbs-bulk-rnaseq");
    }

    #[test]
    fn test_bucket_url_parse_strips_trailing_slash() {
        let url = BucketUrl::parse("gs://bucket/").unwrap();
        assert_eq!(url.as_str(), "gs://bucket");
    }

    #[test]
    fn test_bucket_url_parse_rejects_bad_input() {
        assert!(BucketUrl::parse("s3://bucket").is_err());
        assert!(BucketUrl::parse("gs://").is_err());
        assert!(BucketUrl::parse("gs://bucket/path").is_err());
        assert!(BucketUrl::parse("gs://Bad_Bucket!").is_err());
    }

    #[test]
    fn test_bucket_url_from_name() {
        let url = BucketUrl::from_name("asap-curated-cohort-pmdbs-sc-rnaseq").unwrap();
        assert_eq!(url.as_str(), "gs://asap-curated-cohort-pmdbs-sc-rnaseq");
    }

    #[test]
    fn test_bucket_url_join() {
        let url = BucketUrl::parse("gs://bucket").unwrap();
        assert_eq!(url.join("metadata/"), "gs://bucket/metadata/");
        assert_eq!(url.join("/metadata/"), "gs://bucket/metadata/");
        assert_eq!(url.join("workflow/**"), "gs://bucket/workflow/**");
    }
}

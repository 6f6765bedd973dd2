use crate::error::{PromoteError, Result};
use std::fs;
use std::path::Path;

use super::PromotionConfig;

/// Loads a promotion config from a JSON or YAML file, picked by extension.
pub fn load_config(path: impl AsRef<Path>) -> Result<PromotionConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|_| PromoteError::ConfigFileNotFound(path.display().to_string()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        _ => Err(PromoteError::Config(format!(
            "unsupported config extension for '{}' (expected .json, .yaml, or .yml)",
            path.display()
        ))),
    }
}

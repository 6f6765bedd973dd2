mod checker;
mod manifest;

pub use checker::{
    CheckStatus, CheckTableRow, FileCheck, IntegrityChecker, IntegrityReport,
    WorkflowInventory, EMPTY_FILE_THRESHOLD,
};
pub use manifest::{CombinedManifest, ManifestEntry};

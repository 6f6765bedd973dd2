pub mod error;
pub mod bucket;
pub mod config;
pub mod storage;
pub mod validate;
pub mod diff;
pub mod integrity;
pub mod report;
pub mod promote;
pub mod transfer;

pub use error::{GcsError, PromoteError, Result};
pub use bucket::{base_name, parse_listing, BucketSnapshot, BucketUrl, DatasetId, Listing, ObjectEntry, StagingEnv, TeamName};
pub use config::{load_config, AccessConfig, BucketNaming, GeneralConfig, PromotionConfig};
pub use storage::{take_snapshot, try_take_snapshot, GcloudBackend, IamBinding, IamPolicy, MockStorage, ObjectHash, StorageBackend};
pub use validate::{BucketLayout, MetadataFilesCheck, StructureReport, StructureRules, StructureValidator};
pub use diff::{format_diff, format_manifest_diff, has_manifest_changes, DiffResult, ModifiedFile};
pub use integrity::{
    CheckStatus, CheckTableRow, CombinedManifest, FileCheck, IntegrityChecker,
    IntegrityReport, ManifestEntry, WorkflowInventory, EMPTY_FILE_THRESHOLD,
};
pub use report::{EnvSummary, PromotionReport};
pub use promote::{AccessManager, LockdownAction, LockdownReport, PromoteOptions, PromoteOutcome, Promoter};
pub use transfer::{ReleaseTransfer, TransferItem, TransferOutcome};

mod checker;
mod rules;

pub use checker::{BucketLayout, MetadataFilesCheck, StructureReport, StructureValidator};
pub use rules::StructureRules;

mod listing;
mod url;

pub use listing::{base_name, parse_listing, BucketSnapshot, Listing, ObjectEntry};
pub use url::{BucketUrl, DatasetId, StagingEnv, TeamName};

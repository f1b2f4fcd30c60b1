//! Distribution API operations, one struct per resource type

pub mod blob_operations;
pub mod manifest_operations;

pub use blob_operations::{BlobOperations, BlobSource, UploadOutcome};
pub use manifest_operations::{ExistenceProbe, FetchedManifest, ManifestOperations};

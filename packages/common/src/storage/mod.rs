mod error;
mod keys;
mod traits;

pub mod memory;

#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use keys::{ObjectKind, object_key, version_prefix};
pub use traits::{
    BoxReader, DeleteReport, ObjectMetadata, ObjectStore, StoredObject, UploadReceipt,
};

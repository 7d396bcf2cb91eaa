//! External service clients

pub mod extraction;
pub mod object_storage;
pub mod privacy;

pub use extraction::{ExtractionClient, ExtractionError, ReceiptExtractor};
pub use object_storage::{AssetStore, StorageClient, StorageError};

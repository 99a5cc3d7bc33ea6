//! Source object addressing

pub mod path;

pub use path::{PathMetadataExtractor, StorageLocator};

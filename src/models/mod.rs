//! Models module
//!
//! Core data structures passed between pipeline stages. Everything here lives
//! for a single invocation only.

pub mod dataset;
pub mod enums;
pub mod partition_spec;

pub use dataset::{Column, ColumnType, Dataset, DatasetError, Value};
pub use enums::*;
pub use partition_spec::PartitionSpec;

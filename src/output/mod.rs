//! Generated file storage.

pub mod store;

pub use store::{OutputStore, PendingOutput, DEFAULT_PREFIX, OUTPUT_SUFFIX};

//! Mount namespace handling for spawned children.

pub mod storage;

pub use storage::{mount_external_storage, StorageLayout};

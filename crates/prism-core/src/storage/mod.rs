//! Storage layer
//!
//! History persistence talks to a minimal key-value contract so the core
//! never assumes a specific storage technology.
//!
//! ## Backends
//!
//! - [`MemoryStorage`]: process-local map, used for tests and ephemeral sessions
//! - [`FileStorage`]: one file per key inside a directory, written atomically

pub mod error;
pub mod file;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Minimal key-value contract for persisted blobs
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete the value stored under `key`; missing keys are not an error
    fn remove(&self, key: &str) -> StorageResult<()>;
}

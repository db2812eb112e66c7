//! Where texture bytes come from.
//!
//! The cache asks a `FileSource` whether a key exists (on the caller's
//! thread, before anything is queued) and reads it (on the worker thread).

mod disk;
mod memory;

pub use disk::DiskSource;
pub use memory::MemorySource;

use std::io;

use crate::cache::CacheKey;

/// Read-only byte store addressed by [`CacheKey`].
///
/// Implementations are shared between the owning thread and the decode
/// worker, so they must be `Send + Sync`.
pub trait FileSource: Send + Sync {
    fn exists(&self, key: &CacheKey) -> bool;

    fn read_all(&self, key: &CacheKey) -> io::Result<Vec<u8>>;
}

//! Asynchronous texture cache.
//!
//! Pipeline for a miss:
//! `load_async` → request queue → decode worker → result queue →
//! dispatcher (scheduler tick, owning thread) → upload → cache table →
//! callback.
//!
//! The worker only reads and decodes; every GPU upload and every change to
//! the cache table happens on the thread that owns the [`TextureCache`].

mod config;
mod error;
mod inner;
mod key;
mod queue;
mod stats;
mod texture;
mod texture_cache;
mod worker;


pub use config::TextureCacheConfig;
pub use error::LoadError;
pub use key::CacheKey;
pub use queue::{Callback, WorkerState};
pub use stats::CacheStats;
pub use texture::{Texture, TextureHandle};
pub use texture_cache::{LoadStatus, TextureCache, TextureCacheBuilder};

//! tessel engine crate.
//!
//! Owns texture loading for the engine: decoding, GPU upload and the
//! asynchronous, reference-counted texture cache, plus the per-frame
//! scheduler the cache hooks into.

pub mod cache;
pub mod decode;
pub mod device;
pub mod logging;
pub mod source;
pub mod time;
pub mod upload;

pub use cache::{CacheKey, LoadError, LoadStatus, TextureCache, TextureHandle};

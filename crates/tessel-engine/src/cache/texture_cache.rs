use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::decode::{DecodedImage, Decoder, ImageDecoder};
use crate::source::{DiskSource, FileSource};
use crate::time::Scheduler;
use crate::upload::TextureUploader;

use super::error::describe;
use super::inner::CacheInner;
use super::queue::{Callback, WorkerState};
use super::{CacheKey, CacheStats, LoadError, TextureCacheConfig, TextureHandle};

/// How `load_async` handled a request.
///
/// Informational only; the callback is the delivery channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadStatus {
    /// Already cached; the callback has run with the handle.
    Cached,
    /// Queued for the decode worker; the callback runs on a later tick.
    Queued,
    /// Could not be queued (missing resource, cache shut down, worker could
    /// not start); the callback has run with `None`.
    Unavailable,
}

/// Asynchronous, reference-counted texture cache.
///
/// Misses are read and decoded on a single background worker, then uploaded
/// on the owning thread by a dispatcher that the cache registers with the
/// [`Scheduler`] only while requests are outstanding. The cache is `!Send`:
/// every upload and every table mutation happens on the thread that built it.
///
/// Dropping the cache shuts the worker down first; [`shutdown`](Self::shutdown)
/// does the same explicitly and may be called any number of times.
pub struct TextureCache<U: TextureUploader> {
    inner: Rc<RefCell<CacheInner<U>>>,
}

type Handle<U> = TextureHandle<<U as TextureUploader>::Texture>;

impl<U: TextureUploader + 'static> TextureCache<U> {
    /// Cache reading from `source` with the default [`ImageDecoder`].
    pub fn new(uploader: U, source: impl FileSource + 'static, scheduler: &Scheduler) -> Self {
        Self::builder(uploader).source(source).build(scheduler)
    }

    pub fn builder(uploader: U) -> TextureCacheBuilder<U> {
        TextureCacheBuilder {
            uploader,
            decoder: None,
            source: None,
            config: TextureCacheConfig::default(),
        }
    }

    pub fn config(&self) -> TextureCacheConfig {
        self.inner.borrow().config.clone()
    }

    // ── lookup ────────────────────────────────────────────────────────────

    /// Returns the cached texture for `key`. Never loads.
    pub fn get(&self, key: impl Into<CacheKey>) -> Option<Handle<U>> {
        self.inner.borrow().shared.get(&key.into())
    }

    pub fn contains(&self, key: impl Into<CacheKey>) -> bool {
        self.inner.borrow().shared.lock_table().contains_key(&key.into())
    }

    /// Number of cached textures.
    pub fn len(&self) -> usize {
        self.inner.borrow().shared.lock_table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all cached textures, sorted.
    pub fn keys(&self) -> Vec<CacheKey> {
        let this = self.inner.borrow();
        let mut keys: Vec<CacheKey> = this.shared.lock_table().keys().cloned().collect();
        keys.sort();
        keys
    }

    // ── loading ───────────────────────────────────────────────────────────

    /// Loads `key` on the calling thread, which must own the render context.
    ///
    /// Returns `None` on any failure and caches nothing in that case. See
    /// [`try_load_sync`](Self::try_load_sync) for the reason.
    pub fn load_sync(&self, key: impl Into<CacheKey>) -> Option<Handle<U>> {
        match self.try_load_sync(key) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("{}", describe(&e));
                None
            }
        }
    }

    /// Like [`load_sync`](Self::load_sync), reporting why a load failed.
    pub fn try_load_sync(&self, key: impl Into<CacheKey>) -> Result<Handle<U>, LoadError> {
        let key = key.into();
        let mut this = self.inner.borrow_mut();
        if let Some(handle) = this.shared.get(&key) {
            return Ok(handle);
        }

        let image = this.read_and_decode(&key)?;
        this.install(&key, &image)
    }

    /// Loads `key` in the background and calls `callback` with the result.
    ///
    /// - cached: `callback` runs before this returns, nothing is decoded
    /// - missing from the source: `callback(None)` runs before this returns;
    ///   no worker is started and no dispatcher scheduled
    /// - otherwise the request is queued and `callback` runs exactly once on
    ///   a later scheduler tick, unless cancelled first
    ///
    /// A `None` delivery does not say why: missing, decode failure, upload
    /// failure and a duplicate request that was resolved before its twin
    /// finished uploading all look the same. Use
    /// [`try_load_sync`](Self::try_load_sync) when the reason matters.
    ///
    /// Concurrent requests for the same key are coalesced opportunistically:
    /// the decoder runs at least once and at most once per request.
    pub fn load_async<F>(&self, key: impl Into<CacheKey>, callback: F) -> LoadStatus
    where
        F: FnOnce(Option<Handle<U>>) + Send + 'static,
    {
        let key = key.into();
        let callback: Callback<U::Texture> = Box::new(callback);
        let weak = Rc::downgrade(&self.inner);

        let (callback, handle, status) = {
            let mut this = self.inner.borrow_mut();

            if let Some(handle) = this.shared.get(&key) {
                (callback, Some(handle), LoadStatus::Cached)
            } else if this.shut_down {
                log::warn!("texture cache is shut down; not loading {key}");
                (callback, None, LoadStatus::Unavailable)
            } else if !this.source.exists(&key) {
                log::debug!("texture not found: {key}");
                (callback, None, LoadStatus::Unavailable)
            } else {
                match this.enqueue(weak, key, callback) {
                    Ok(()) => return LoadStatus::Queued,
                    Err((callback, e)) => {
                        log::error!("failed to start texture decode worker: {e}");
                        (callback, None, LoadStatus::Unavailable)
                    }
                }
            }
        };

        callback(handle);
        status
    }

    /// Uploads an already decoded image under `key`.
    ///
    /// If `key` is cached, the existing texture is returned and `image` is
    /// discarded.
    pub fn insert_image(&self, key: impl Into<CacheKey>, image: &DecodedImage) -> Result<Handle<U>, LoadError> {
        self.inner.borrow_mut().install(&key.into(), image)
    }

    /// Reads, decodes and uploads `key` again, replacing any cached entry.
    ///
    /// Handles to the previous texture stay valid; they simply stop being
    /// the cached one. On failure the previous entry is kept.
    pub fn reload(&self, key: impl Into<CacheKey>) -> Result<Handle<U>, LoadError> {
        let key = key.into();
        let mut this = self.inner.borrow_mut();
        let image = this.read_and_decode(&key)?;
        let handle = this.upload(&key, &image)?;

        let previous = this.shared.lock_table().insert(key, handle.clone());
        drop(this);
        drop(previous);
        Ok(handle)
    }

    // ── cancellation ──────────────────────────────────────────────────────

    /// Suppresses the callbacks of every queued or decoded-but-undispatched
    /// request for `key`. Returns how many callbacks were dropped.
    ///
    /// Decoding already under way is not interrupted, and the result is still
    /// uploaded and cached when it is dispatched.
    pub fn cancel(&self, key: impl Into<CacheKey>) -> usize {
        let key = key.into();
        let cleared = self
            .inner
            .borrow()
            .shared
            .lock_queues()
            .cancel_where(|k| *k == key);
        if cleared > 0 {
            log::debug!("cancelled {cleared} request(s) for {key}");
        }
        cleared
    }

    /// [`cancel`](Self::cancel) for every pending request.
    pub fn cancel_all(&self) -> usize {
        let cleared = self.inner.borrow().shared.lock_queues().cancel_where(|_| true);
        if cleared > 0 {
            log::debug!("cancelled {cleared} request(s)");
        }
        cleared
    }

    // ── eviction ──────────────────────────────────────────────────────────

    /// Drops every texture nobody outside the cache references. Returns the
    /// number of textures removed.
    pub fn evict_unused(&self) -> usize {
        let evicted: Vec<Handle<U>> = {
            let this = self.inner.borrow();
            let mut table = this.shared.lock_table();
            let unused: Vec<CacheKey> = table
                .iter()
                .filter(|(_, handle)| Arc::strong_count(handle) == 1)
                .map(|(key, _)| key.clone())
                .collect();
            unused.iter().filter_map(|key| table.remove(key)).collect()
        };

        if !evicted.is_empty() {
            log::debug!("evicted {} unused texture(s)", evicted.len());
        }
        evicted.len()
    }

    /// Drops every cached texture. Returns the number removed.
    pub fn remove_all(&self) -> usize {
        let removed = {
            let this = self.inner.borrow();
            let mut table = this.shared.lock_table();
            std::mem::take(&mut *table)
        };
        removed.len()
    }

    /// Drops the texture cached under `key`.
    pub fn remove_key(&self, key: impl Into<CacheKey>) -> bool {
        let removed = self.inner.borrow().shared.lock_table().remove(&key.into());
        removed.is_some()
    }

    /// Drops the cache's reference to `handle`, whatever key it is under.
    pub fn remove_entry(&self, handle: &Handle<U>) -> bool {
        let removed = {
            let this = self.inner.borrow();
            let mut table = this.shared.lock_table();
            let key = table
                .iter()
                .find(|(_, cached)| Arc::ptr_eq(cached, handle))
                .map(|(key, _)| key.clone());
            key.and_then(|key| table.remove(&key))
        };
        removed.is_some()
    }

    // ── diagnostics ───────────────────────────────────────────────────────

    pub fn stats(&self) -> CacheStats {
        let this = self.inner.borrow();

        let (textures, bytes, in_use) = {
            let table = this.shared.lock_table();
            let bytes = table.values().map(|t| t.byte_len()).sum();
            let in_use = table.values().filter(|t| Arc::strong_count(t) > 1).count();
            (table.len(), bytes, in_use)
        };
        let (queued, ready) = {
            let queues = this.shared.lock_queues();
            (queues.pending(), queues.results.len())
        };

        CacheStats {
            textures,
            bytes,
            in_use,
            outstanding: this.outstanding,
            queued,
            ready,
            dispatching: this.scheduler.is_scheduled(this.task),
        }
    }

    /// Async requests issued and not yet dispatched.
    pub fn outstanding(&self) -> usize {
        self.inner.borrow().outstanding
    }

    /// Whether the dispatcher is registered with the scheduler.
    pub fn is_dispatching(&self) -> bool {
        let this = self.inner.borrow();
        this.scheduler.is_scheduled(this.task)
    }

    /// State of the decode worker, `None` if it was never started.
    pub fn worker_state(&self) -> Option<WorkerState> {
        self.inner.borrow().worker_state()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.borrow().shut_down
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Stops the decode worker and blocks until it has exited.
    ///
    /// Requests already queued are decoded first; their results are still
    /// delivered by later ticks. New misses are answered with `None`.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        self.inner.borrow_mut().shutdown();
    }
}

/// Builder for [`TextureCache`].
pub struct TextureCacheBuilder<U> {
    uploader: U,
    decoder: Option<Arc<dyn Decoder>>,
    source: Option<Arc<dyn FileSource>>,
    config: TextureCacheConfig,
}

impl<U: TextureUploader + 'static> TextureCacheBuilder<U> {
    /// Decoder used by the worker and by synchronous loads.
    /// Defaults to [`ImageDecoder`].
    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Where bytes are read from. Defaults to the current directory.
    pub fn source(mut self, source: impl FileSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn config(mut self, config: TextureCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the cache. Its dispatcher will be registered with `scheduler`
    /// whenever async requests are outstanding.
    pub fn build(self, scheduler: &Scheduler) -> TextureCache<U> {
        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(ImageDecoder) as Arc<dyn Decoder>);
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(DiskSource::new(".")) as Arc<dyn FileSource>);

        TextureCache {
            inner: Rc::new(RefCell::new(CacheInner::new(
                self.config,
                self.uploader,
                decoder,
                source,
                scheduler.clone(),
            ))),
        }
    }
}

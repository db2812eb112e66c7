use std::cell::RefCell;
use std::io;
use std::rc::Weak;
use std::sync::Arc;

use crate::decode::{DecodedImage, Decoder};
use crate::source::FileSource;
use crate::time::{FrameTime, Scheduler, TaskKey};
use crate::upload::TextureUploader;

use super::error::describe;
use super::queue::{Callback, DecodedPayload, PendingRequest, Shared, WorkerState};
use super::worker::Worker;
use super::{CacheKey, LoadError, Texture, TextureCacheConfig, TextureHandle};

type Handle<U> = TextureHandle<<U as TextureUploader>::Texture>;

/// Result of a dispatcher step: the callback (if not cancelled) and what it
/// should receive.
pub(crate) type Delivery<U> = (
    Option<Callback<<U as TextureUploader>::Texture>>,
    Option<Handle<U>>,
);

/// Owning-thread half of the texture cache.
pub(crate) struct CacheInner<U: TextureUploader> {
    pub config: TextureCacheConfig,
    pub uploader: U,
    pub decoder: Arc<dyn Decoder>,
    pub source: Arc<dyn FileSource>,
    pub shared: Arc<Shared<U::Texture>>,
    pub scheduler: Scheduler,
    pub task: TaskKey,
    worker: Option<Worker>,
    worker_started: bool,
    /// Async requests enqueued and not yet dispatched.
    pub outstanding: usize,
    next_id: u64,
    pub shut_down: bool,
}

impl<U: TextureUploader> CacheInner<U> {
    pub fn new(
        config: TextureCacheConfig,
        uploader: U,
        decoder: Arc<dyn Decoder>,
        source: Arc<dyn FileSource>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            config,
            uploader,
            decoder,
            source,
            shared: Arc::new(Shared::new()),
            scheduler,
            task: TaskKey::unique(),
            worker: None,
            worker_started: false,
            outstanding: 0,
            next_id: 0,
            shut_down: false,
        }
    }

    pub fn worker_state(&self) -> Option<WorkerState> {
        self.worker_started.then(|| self.shared.state())
    }

    /// Reads and decodes `key` on the calling thread.
    pub fn read_and_decode(&self, key: &CacheKey) -> Result<DecodedImage, LoadError> {
        if !self.source.exists(key) {
            return Err(LoadError::NotFound(key.clone()));
        }
        let bytes = self.source.read_all(key).map_err(|source| LoadError::Read {
            key: key.clone(),
            source,
        })?;
        self.decoder
            .decode(key, &bytes)
            .map_err(|source| LoadError::Decode {
                key: key.clone(),
                source,
            })
    }

    /// Uploads `image` without touching the table.
    pub fn upload(&mut self, key: &CacheKey, image: &DecodedImage) -> Result<Handle<U>, LoadError> {
        let gpu = self
            .uploader
            .upload(key, image)
            .map_err(|source| LoadError::Upload {
                key: key.clone(),
                source,
            })?;

        Ok(Arc::new(Texture::new(
            key.clone(),
            image.width(),
            image.height(),
            image.byte_len(),
            gpu,
        )))
    }

    /// Uploads and caches `image` unless `key` is already cached, in which
    /// case the existing entry wins and nothing is uploaded.
    pub fn install(&mut self, key: &CacheKey, image: &DecodedImage) -> Result<Handle<U>, LoadError> {
        if let Some(existing) = self.shared.get(key) {
            return Ok(existing);
        }

        let handle = self.upload(key, image)?;
        self.shared.lock_table().insert(key.clone(), handle.clone());
        Ok(handle)
    }

    /// Queues an async request, starting the worker and scheduling the
    /// dispatcher as needed. On failure the callback is handed back.
    pub fn enqueue(
        &mut self,
        this: Weak<RefCell<Self>>,
        key: CacheKey,
        callback: Callback<U::Texture>,
    ) -> Result<(), (Callback<U::Texture>, io::Error)>
    where
        U: 'static,
    {
        if self.worker.is_none() {
            let spawned = Worker::spawn(
                &self.config.worker_name,
                self.shared.clone(),
                self.decoder.clone(),
                self.source.clone(),
            );
            match spawned {
                Ok(worker) => {
                    self.worker = Some(worker);
                    self.worker_started = true;
                }
                Err(e) => return Err((callback, e)),
            }
        }

        if self.outstanding == 0 {
            self.scheduler.schedule(self.task, dispatcher(this));
            log::debug!("texture dispatcher scheduled");
        }
        self.outstanding += 1;

        let id = self.next_id;
        self.next_id += 1;
        self.shared.push_request(PendingRequest {
            id,
            key,
            callback: Some(callback),
        });
        Ok(())
    }

    /// Pops one decoded result and resolves it to a handle.
    pub fn dispatch_one(&mut self) -> Option<Delivery<U>> {
        let DecodedPayload { request, image } = self.shared.pop_result()?;
        let key = &request.key;

        let handle = match image {
            Some(image) => match self.install(key, &image) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("{}", describe(&e));
                    None
                }
            },
            None => self.shared.get(key),
        };

        Some((request.callback, handle))
    }

    /// Accounts for one delivered request; unschedules the dispatcher when
    /// nothing is outstanding.
    pub fn finish_request(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.outstanding == 0 {
            self.scheduler.unschedule(self.task);
            log::debug!("texture dispatcher unscheduled");
        }
    }

    /// Stops and joins the worker. Idempotent.
    ///
    /// Requests already queued are still decoded before the worker exits.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.shared.request_quit();
        if let Some(mut worker) = self.worker.take() {
            worker.join();
        }
        log::debug!("texture cache shut down");
    }
}

impl<U: TextureUploader> Drop for CacheInner<U> {
    fn drop(&mut self) {
        // The worker must be gone before the shared queues and table are.
        self.shutdown();
        self.scheduler.unschedule(self.task);
    }
}

/// Scheduler tick function for a cache. Holds only a weak reference, so a
/// dropped cache turns it into a no-op until it is unscheduled.
fn dispatcher<U>(this: Weak<RefCell<CacheInner<U>>>) -> impl FnMut(&FrameTime) + 'static
where
    U: TextureUploader + 'static,
{
    move |_| {
        if let Some(inner) = this.upgrade() {
            dispatch(&inner);
        }
    }
}

/// Runs one dispatcher tick. Callbacks are invoked with no borrow held.
pub(crate) fn dispatch<U: TextureUploader>(inner: &RefCell<CacheInner<U>>) {
    let per_tick = inner.borrow().config.results_per_tick.max(1);

    for _ in 0..per_tick {
        let delivery = match inner.try_borrow_mut() {
            Ok(mut this) => this.dispatch_one(),
            Err(_) => {
                log::warn!("texture dispatcher re-entered; deferring to next tick");
                return;
            }
        };
        let Some((callback, handle)) = delivery else {
            break;
        };

        if let Some(callback) = callback {
            callback(handle);
        }
        inner.borrow_mut().finish_request();
    }
}

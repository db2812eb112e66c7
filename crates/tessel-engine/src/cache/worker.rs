use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};

use crate::decode::{DecodedImage, Decoder};
use crate::source::FileSource;

use crate::cache::CacheKey;

use super::queue::{Shared, WorkerState};

/// The single background decode thread.
pub(crate) struct Worker {
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn<T>(
        name: &str,
        shared: Arc<Shared<T>>,
        decoder: Arc<dyn Decoder>,
        source: Arc<dyn FileSource>,
    ) -> io::Result<Self>
    where
        T: Send + Sync + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&shared, decoder.as_ref(), source.as_ref()))?;

        log::debug!("texture decode worker `{name}` started");
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Blocks until the thread has returned. The quit flag must already be
    /// set, otherwise this waits forever.
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            log::error!("texture decode worker panicked");
        }
    }
}

fn run<T>(shared: &Shared<T>, decoder: &dyn Decoder, source: &dyn FileSource) {
    while let Some((id, key)) = next_request(shared) {
        let image = if shared.is_resolving(&key) {
            log::debug!("skipping decode of {key}: already resolving");
            None
        } else {
            shared.set_state(WorkerState::Decoding);
            load(id, &key, decoder, source)
        };

        shared.complete(image);
    }

    shared.set_state(WorkerState::Terminated);
    log::debug!("texture decode worker stopped");
}

/// Takes the next request in flight, sleeping while the queue is empty.
/// Returns `None` once the queue is drained and quit has been requested.
fn next_request<T>(shared: &Shared<T>) -> Option<(u64, CacheKey)> {
    let mut queues = shared.lock_queues();
    shared.set_state(WorkerState::Draining);
    loop {
        if let Some(job) = Shared::begin_next(&mut queues) {
            return Some(job);
        }
        if queues.quit {
            shared.set_state(WorkerState::ShuttingDown);
            return None;
        }

        shared.set_state(WorkerState::Idle);
        queues = shared
            .wake
            .wait(queues)
            .unwrap_or_else(PoisonError::into_inner);
        shared.set_state(WorkerState::Draining);
    }
}

fn load(id: u64, key: &CacheKey, decoder: &dyn Decoder, source: &dyn FileSource) -> Option<DecodedImage> {
    let bytes = match source.read_all(key) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("failed to read texture {key}: {e}");
            return None;
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(key, &bytes))) {
        Ok(Ok(image)) => {
            log::debug!("decoded {key} ({}x{}) for request #{id}", image.width(), image.height());
            Some(image)
        }
        Ok(Err(e)) => {
            log::warn!("failed to decode texture {key}: {e}");
            None
        }
        Err(_) => {
            log::error!("decoder panicked on texture {key}");
            None
        }
    }
}

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::decode::DecodedImage;

use super::{CacheKey, TextureHandle};

/// Completion callback of an asynchronous load.
///
/// Runs on the thread that owns the cache, during a scheduler tick or inside
/// `load_async` itself. It is parked in the shared request/result queues in
/// the meantime, hence `Send`.
pub type Callback<T> = Box<dyn FnOnce(Option<TextureHandle<T>>) + Send + 'static>;

pub(crate) struct PendingRequest<T> {
    pub id: u64,
    pub key: CacheKey,
    /// Cleared by cancellation; consumers skip the call when empty.
    pub callback: Option<Callback<T>>,
}

pub(crate) struct DecodedPayload<T> {
    pub request: PendingRequest<T>,
    /// `None`: decode failed or was skipped as a duplicate. The dispatcher
    /// resolves the key through the cache table instead.
    pub image: Option<DecodedImage>,
}

pub(crate) struct Queues<T> {
    pub requests: VecDeque<PendingRequest<T>>,
    /// Request the worker is decoding. It stays here, under the queue lock,
    /// so it can still be cancelled.
    pub in_flight: Option<PendingRequest<T>>,
    pub results: VecDeque<DecodedPayload<T>>,
    pub quit: bool,
}

impl<T> Queues<T> {
    /// Requests waiting for, or held by, the worker.
    pub fn pending(&self) -> usize {
        self.requests.len() + usize::from(self.in_flight.is_some())
    }

    /// Clears the callback slot of every undispatched request matching
    /// `filter`, including the one being decoded.
    pub fn cancel_where(&mut self, mut filter: impl FnMut(&CacheKey) -> bool) -> usize {
        let requests = self.requests.iter_mut();
        let in_flight = self.in_flight.iter_mut();
        let results = self.results.iter_mut().map(|p| &mut p.request);

        let mut cleared = 0;
        for req in requests.chain(in_flight).chain(results) {
            if filter(&req.key) && req.callback.take().is_some() {
                cleared += 1;
            }
        }
        cleared
    }
}

/// Lifecycle of the decode worker.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum WorkerState {
    /// Blocked on the condition variable, waiting for work.
    Idle = 0,
    /// Woken; popping the next request.
    Draining = 1,
    /// Reading and decoding a request.
    Decoding = 2,
    /// Quit flag observed with an empty queue.
    ShuttingDown = 3,
    /// Thread has returned.
    Terminated = 4,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Draining,
            2 => WorkerState::Decoding,
            3 => WorkerState::ShuttingDown,
            _ => WorkerState::Terminated,
        }
    }
}

/// State shared between the owning thread and the decode worker.
///
/// Lock discipline: `queues` and `table` are never held at the same time.
pub(crate) struct Shared<T> {
    queues: Mutex<Queues<T>>,
    /// Signalled on every enqueue, every result and on shutdown.
    pub wake: Condvar,
    /// Written only by the owning thread; read by the worker's duplicate check.
    table: Mutex<HashMap<CacheKey, TextureHandle<T>>>,
    state: AtomicU8,
}

impl<T> Shared<T> {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Queues {
                requests: VecDeque::new(),
                in_flight: None,
                results: VecDeque::new(),
                quit: false,
            }),
            wake: Condvar::new(),
            table: Mutex::new(HashMap::new()),
            state: AtomicU8::new(WorkerState::Idle as u8),
        }
    }

    pub fn lock_queues(&self) -> MutexGuard<'_, Queues<T>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_table(&self) -> MutexGuard<'_, HashMap<CacheKey, TextureHandle<T>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<TextureHandle<T>> {
        self.lock_table().get(key).cloned()
    }

    pub fn push_request(&self, request: PendingRequest<T>) {
        self.lock_queues().requests.push_back(request);
        self.wake.notify_one();
    }

    /// Moves the next request into the in-flight slot and returns its id
    /// and key. Does not block.
    pub fn begin_next(queues: &mut Queues<T>) -> Option<(u64, CacheKey)> {
        let request = queues.requests.pop_front()?;
        let job = (request.id, request.key.clone());
        queues.in_flight = Some(request);
        Some(job)
    }

    /// Publishes the in-flight request's outcome to the result queue.
    pub fn complete(&self, image: Option<DecodedImage>) {
        {
            let mut queues = self.lock_queues();
            match queues.in_flight.take() {
                Some(request) => queues.results.push_back(DecodedPayload { request, image }),
                None => log::error!("decode finished with no request in flight"),
            }
        }
        self.wake.notify_all();
    }

    pub fn pop_result(&self) -> Option<DecodedPayload<T>> {
        self.lock_queues().results.pop_front()
    }

    /// True when `key` is already cached or a decoded result for it is
    /// waiting to be dispatched. Requests still in the request queue are not
    /// inspected.
    pub fn is_resolving(&self, key: &CacheKey) -> bool {
        if self.lock_table().contains_key(key) {
            return true;
        }
        self.lock_queues().results.iter().any(|p| p.request.key == *key)
    }

    pub fn request_quit(&self) {
        self.lock_queues().quit = true;
        self.wake.notify_all();
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn request(id: u64, key: &str, hits: &Arc<AtomicUsize>) -> PendingRequest<()> {
        let hits = hits.clone();
        PendingRequest {
            id,
            key: CacheKey::from(key),
            callback: Some(Box::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })),
        }
    }

    #[test]
    fn cancel_clears_matching_slots_everywhere() {
        let hits = Arc::new(AtomicUsize::new(0));
        let shared = Shared::<()>::new();
        shared.push_request(request(0, "a.png", &hits));
        shared.push_request(request(1, "b.png", &hits));
        shared.push_request(request(2, "a.png", &hits));
        shared
            .lock_queues()
            .results
            .push_back(DecodedPayload { request: request(3, "a.png", &hits), image: None });

        // Request 0 is being decoded.
        let job = Shared::begin_next(&mut shared.lock_queues());
        assert_eq!(job, Some((0, CacheKey::from("a.png"))));

        let a = CacheKey::from("a.png");
        assert_eq!(shared.lock_queues().cancel_where(|k| *k == a), 3);
        // Already cleared slots are not counted twice.
        assert_eq!(shared.lock_queues().cancel_where(|k| *k == a), 0);

        let q = shared.lock_queues();
        assert!(q.in_flight.as_ref().is_some_and(|r| r.callback.is_none()));
        assert!(q.requests[0].callback.is_some());
        assert!(q.requests[1].callback.is_none());
        assert!(q.results[0].request.callback.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn complete_moves_in_flight_to_results() {
        let hits = Arc::new(AtomicUsize::new(0));
        let shared = Shared::<()>::new();
        shared.push_request(request(7, "a.png", &hits));
        Shared::begin_next(&mut shared.lock_queues());
        assert_eq!(shared.lock_queues().pending(), 1);

        shared.complete(None);

        let q = shared.lock_queues();
        assert_eq!(q.pending(), 0);
        assert_eq!(q.results.len(), 1);
        assert_eq!(q.results[0].request.id, 7);
    }

    #[test]
    fn resolving_sees_results_but_not_requests() {
        let hits = Arc::new(AtomicUsize::new(0));
        let shared = Shared::<()>::new();
        shared.push_request(request(0, "queued.png", &hits));
        shared
            .lock_queues()
            .results
            .push_back(DecodedPayload { request: request(1, "done.png", &hits), image: None });

        assert!(shared.is_resolving(&CacheKey::from("done.png")));
        assert!(!shared.is_resolving(&CacheKey::from("queued.png")));
    }

    #[test]
    fn worker_state_round_trips_through_atomic() {
        let shared = Shared::<()>::new();
        shared.set_state(WorkerState::Decoding);
        assert_eq!(shared.state(), WorkerState::Decoding);
    }
}

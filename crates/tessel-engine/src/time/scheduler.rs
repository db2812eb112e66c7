use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{FrameClock, FrameTime};

/// Identity of a scheduled tick function.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TaskKey(u64);

impl TaskKey {
    /// Returns a key no other call has returned in this process.
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

type TickFn = Box<dyn FnMut(&FrameTime)>;

enum Command {
    Schedule(TaskKey, TickFn),
    Unschedule(TaskKey),
}

struct SchedulerState {
    clock: FrameClock,
    tasks: Vec<(TaskKey, TickFn)>,
    /// Keys that are scheduled as of now, including buffered changes.
    active: HashSet<TaskKey>,
    /// Changes requested while a tick is running.
    deferred: Vec<Command>,
    ticking: bool,
}

impl SchedulerState {
    fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Schedule(key, f) => {
                if let Some(slot) = self.tasks.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = f;
                } else {
                    self.tasks.push((key, f));
                }
            }
            Command::Unschedule(key) => self.tasks.retain(|(k, _)| *k != key),
        }
    }

    fn submit(&mut self, cmd: Command) {
        if self.ticking {
            self.deferred.push(cmd);
        } else {
            self.apply(cmd);
        }
    }
}

/// Per-frame tick registry.
///
/// The host calls [`tick`](Self::tick) once per frame; every scheduled
/// function then runs once, in scheduling order. `Scheduler` is a cheap
/// `Rc` handle: clones share the same task list, so subsystems can keep a
/// clone and (un)schedule themselves.
///
/// Changes made from inside a tick function are buffered and applied once the
/// tick finishes, the same way runtime commands are applied after a frame
/// callback returns. An unschedule takes effect immediately for tasks that
/// have not run yet in the current tick.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_clock(FrameClock::new())
    }

    pub fn with_clock(clock: FrameClock) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerState {
                clock,
                tasks: Vec::new(),
                active: HashSet::new(),
                deferred: Vec::new(),
                ticking: false,
            })),
        }
    }

    /// Registers `f` to run every tick under `key`, replacing any function
    /// already registered under the same key.
    pub fn schedule<F>(&self, key: TaskKey, f: F)
    where
        F: FnMut(&FrameTime) + 'static,
    {
        let mut state = self.inner.borrow_mut();
        state.active.insert(key);
        state.submit(Command::Schedule(key, Box::new(f)));
    }

    /// Removes the function registered under `key`. Unknown keys are ignored.
    pub fn unschedule(&self, key: TaskKey) {
        let mut state = self.inner.borrow_mut();
        if state.active.remove(&key) {
            state.submit(Command::Unschedule(key));
        }
    }

    pub fn is_scheduled(&self, key: TaskKey) -> bool {
        self.inner.borrow().active.contains(&key)
    }

    /// Number of scheduled tasks.
    pub fn len(&self) -> usize {
        self.inner.borrow().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advances the clock and runs every scheduled function once.
    ///
    /// A nested call from inside a tick function advances the clock but runs
    /// nothing.
    pub fn tick(&self) -> FrameTime {
        let (ft, mut tasks) = {
            let mut state = self.inner.borrow_mut();
            let ft = state.clock.tick();
            if state.ticking {
                log::warn!("Scheduler::tick called re-entrantly; skipping tasks");
                return ft;
            }
            state.ticking = true;
            (ft, std::mem::take(&mut state.tasks))
        };

        for (key, f) in tasks.iter_mut() {
            if !self.inner.borrow().active.contains(key) {
                continue;
            }
            f(&ft);
        }

        let mut state = self.inner.borrow_mut();
        state.ticking = false;
        state.tasks = tasks;
        let deferred = std::mem::take(&mut state.deferred);
        for cmd in deferred {
            state.apply(cmd);
        }
        ft
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

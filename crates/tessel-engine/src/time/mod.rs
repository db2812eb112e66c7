//! Time subsystem.
//!
//! - `FrameClock` produces clamped per-frame timing snapshots
//! - `Scheduler` runs registered tick functions once per host frame; the
//!   texture cache's dispatcher registers itself here while it has work

mod frame_clock;
mod scheduler;

pub use frame_clock::{FrameClock, FrameTime};
pub use scheduler::{Scheduler, TaskKey};

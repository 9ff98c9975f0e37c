//! Cooperative runtime: the scheduler seam and the event loop.

/// Event loop implementation.
pub mod event_loop;
/// Timer queue.
pub mod timers;

use std::time::Duration;

pub use event_loop::{EventLoop, EventLoopConfig, LoopWaker};
pub use timers::TimerId;

/// One-shot timer primitive consumed by timer sources and the timing
/// operators.
///
/// Tasks run on the scheduler's own thread, one at a time, each as a fresh
/// synchronous re-entry.
pub trait Scheduler {
    /// Time elapsed since the scheduler was created.
    fn now(&self) -> Duration;

    /// Runs `task` once after `delay`.
    ///
    /// A deadline past the end of the clock's range is never reached: the
    /// task is dropped and the returned id is already inert.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerId;

    /// Cancels a scheduled task. Returns true if it had not fired yet.
    fn cancel(&self, id: TimerId) -> bool;
}

/// An endpoint the event loop polls for externally produced items.
pub trait Pump {
    /// Delivers up to `budget` pending items. Returns how many were delivered.
    fn pump(&self, budget: usize) -> usize;

    /// False once the endpoint is closed and should be forgotten.
    fn is_open(&self) -> bool;
}

//! Simple source constructors.
//!
//! Synchronous sources check for cancellation before every value so a
//! consumer that cancels from inside its handler stops the loop immediately.
//! Timer sources arm a task on a `Scheduler` and release it on cancellation,
//! including the case where cancellation happens before the timer is armed.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::core::{Emitter, Observable};
use crate::error::StreamError;
use crate::runtime::{Scheduler, TimerId};

/// Emits every item of `items` in order, then completes.
pub fn from_iter<I>(items: I) -> Observable<I::Item>
where
    I: IntoIterator + Clone + 'static,
    I::Item: 'static,
{
    Observable::new(move |emitter: Emitter<I::Item>| {
        for item in items.clone() {
            if emitter.is_closed() || !emitter.emit_value(item) {
                return Ok(());
            }
        }
        emitter.emit_completed();
        Ok(())
    })
}

/// Emits the given values, then completes.
pub fn of<T, const N: usize>(values: [T; N]) -> Observable<T>
where
    T: Clone + 'static,
{
    from_iter(values)
}

/// Completes immediately without values.
#[must_use]
pub fn empty<T: 'static>() -> Observable<T> {
    Observable::new(|emitter: Emitter<T>| {
        emitter.emit_completed();
        Ok(())
    })
}

/// Never emits and never terminates.
#[must_use]
pub fn never<T: 'static>() -> Observable<T> {
    Observable::new(|_emitter: Emitter<T>| Ok(()))
}

/// Fails immediately with `error`.
#[must_use]
pub fn fail<T: 'static>(error: StreamError) -> Observable<T> {
    Observable::new(move |emitter: Emitter<T>| {
        emitter.emit_failed(error.clone());
        Ok(())
    })
}

/// Builds a fresh observable per subscription.
pub fn defer<T, F>(factory: F) -> Observable<T>
where
    T: 'static,
    F: Fn() -> Result<Observable<T>, StreamError> + 'static,
{
    Observable::new(move |emitter: Emitter<T>| {
        factory()?.run(emitter);
        Ok(())
    })
}

/// Emits `0` after `delay`, then completes.
pub fn timer<S>(scheduler: &S, delay: Duration) -> Observable<u64>
where
    S: Scheduler + Clone + 'static,
{
    let scheduler = scheduler.clone();
    Observable::new(move |emitter: Emitter<u64>| {
        if emitter.is_closed() {
            return Ok(());
        }

        let fire = emitter.clone();
        let id = scheduler.schedule(
            delay,
            Box::new(move || {
                if fire.emit_value(0) {
                    fire.emit_completed();
                }
            }),
        );

        let scheduler = scheduler.clone();
        emitter.add_finalizer(move || {
            scheduler.cancel(id);
        });
        Ok(())
    })
}

/// Minimum period for `interval`.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct IntervalState<S> {
    scheduler: S,
    emitter: Emitter<u64>,
    period: Duration,
    count: Cell<u64>,
    armed: Cell<Option<TimerId>>,
}

fn arm_interval<S: Scheduler + 'static>(state: &Rc<IntervalState<S>>) {
    if state.emitter.is_closed() {
        return;
    }
    let next = Rc::clone(state);
    let id = state.scheduler.schedule(
        state.period,
        Box::new(move || {
            next.armed.set(None);
            let n = next.count.get();
            next.count.set(n + 1);
            if next.emitter.emit_value(n) {
                arm_interval(&next);
            }
        }),
    );
    state.armed.set(Some(id));
}

/// Emits `0, 1, 2, ...` every `period` (at least one millisecond).
pub fn interval<S>(scheduler: &S, period: Duration) -> Observable<u64>
where
    S: Scheduler + Clone + 'static,
{
    let scheduler = scheduler.clone();
    let period = period.max(MIN_INTERVAL);
    Observable::new(move |emitter: Emitter<u64>| {
        let state = Rc::new(IntervalState {
            scheduler: scheduler.clone(),
            emitter: emitter.clone(),
            period,
            count: Cell::new(0),
            armed: Cell::new(None),
        });
        arm_interval(&state);

        emitter.add_finalizer(move || {
            if let Some(id) = state.armed.take() {
                state.scheduler.cancel(id);
            }
        });
        Ok(())
    })
}

//! The flatten engine behind merge, concat, exhaust and switch.
//!
//! One outer subscription feeds projected inner observables. The policy only
//! decides what happens to an outer value when inners are already active:
//! queue it (merge with a limit), drop it (exhaust) or cancel the active
//! inner (switch). The result completes once the outer has completed, the
//! queue is empty and no inner is active; the first failure anywhere fails
//! the result and cancels everything else through the token tree.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::rc::{Rc, Weak};

use crate::core::{CancelToken, Emitter, Observable, Observer};
use crate::error::StreamError;
use crate::sources::from_iter;

type Project<T, R> = dyn Fn(T) -> Result<Observable<R>, StreamError>;

#[derive(Debug, Clone, Copy)]
enum FlattenPolicy {
    Merge { limit: Option<NonZeroUsize> },
    Exhaust,
    Switch,
}

struct FlattenState<T, R> {
    policy: FlattenPolicy,
    project: Rc<Project<T, R>>,
    downstream: Emitter<R>,
    active: RefCell<Vec<(u64, CancelToken)>>,
    queue: RefCell<VecDeque<T>>,
    next_id: Cell<u64>,
    outer_done: Cell<bool>,
    draining: Cell<bool>,
}

impl<T: 'static, R: 'static> FlattenState<T, R> {
    fn has_capacity(&self) -> bool {
        match self.policy {
            FlattenPolicy::Merge { limit: Some(limit) } => {
                self.active.borrow().len() < limit.get()
            }
            _ => true,
        }
    }

    fn on_outer_value(self: &Rc<Self>, value: T) {
        if self.downstream.is_closed() {
            return;
        }

        match self.policy {
            FlattenPolicy::Merge { limit: None } => self.subscribe_inner(value),
            FlattenPolicy::Merge { .. } => {
                self.queue.borrow_mut().push_back(value);
                self.drain();
            }
            FlattenPolicy::Exhaust => {
                let busy = !self.active.borrow().is_empty();
                if !busy {
                    self.subscribe_inner(value);
                }
            }
            FlattenPolicy::Switch => {
                let previous = std::mem::take(&mut *self.active.borrow_mut());
                for (_, token) in previous {
                    token.cancel();
                }
                self.subscribe_inner(value);
            }
        }
    }

    /// Starts queued inners while there is capacity. Re-entrant calls (an
    /// inner completing synchronously inside `subscribe_inner`) return early
    /// and leave the work to the outer loop. Unbounded merge never queues.
    fn drain(self: &Rc<Self>) {
        if self.draining.replace(true) {
            return;
        }

        while !self.downstream.is_closed() && self.has_capacity() {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(value) => self.subscribe_inner(value),
                None => break,
            }
        }

        self.draining.set(false);
        self.maybe_complete();
    }

    fn subscribe_inner(self: &Rc<Self>, value: T) {
        let inner = match (self.project)(value) {
            Ok(inner) => inner,
            Err(error) => {
                self.downstream.emit_failed(error);
                return;
            }
        };

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let token = self.downstream.token().child();
        self.active.borrow_mut().push((id, token.clone()));

        inner.subscribe_with(
            token,
            InnerObserver {
                state: Rc::clone(self),
                id,
            },
        );
    }

    fn on_inner_completed(self: &Rc<Self>, id: u64) {
        {
            let mut active = self.active.borrow_mut();
            if let Some(idx) = active.iter().position(|(aid, _)| *aid == id) {
                active.remove(idx);
            }
        }
        self.drain();
    }

    fn on_outer_completed(self: &Rc<Self>) {
        self.outer_done.set(true);
        self.maybe_complete();
    }

    fn maybe_complete(&self) {
        let idle = self.outer_done.get()
            && self.active.borrow().is_empty()
            && self.queue.borrow().is_empty();
        if idle {
            self.downstream.emit_completed();
        }
    }

    fn release(&self) {
        self.active.borrow_mut().clear();
        self.queue.borrow_mut().clear();
    }
}

struct OuterObserver<T, R> {
    state: Rc<FlattenState<T, R>>,
}

impl<T: 'static, R: 'static> Observer<T> for OuterObserver<T, R> {
    fn on_value(&self, value: T) -> Result<(), StreamError> {
        self.state.on_outer_value(value);
        Ok(())
    }

    fn on_completed(&self) {
        self.state.on_outer_completed();
    }

    fn on_failed(&self, error: StreamError) {
        self.state.downstream.emit_failed(error);
    }
}

struct InnerObserver<T, R> {
    state: Rc<FlattenState<T, R>>,
    id: u64,
}

impl<T: 'static, R: 'static> Observer<R> for InnerObserver<T, R> {
    fn on_value(&self, value: R) -> Result<(), StreamError> {
        self.state.downstream.emit_value(value);
        Ok(())
    }

    fn on_completed(&self) {
        self.state.on_inner_completed(self.id);
    }

    fn on_failed(&self, error: StreamError) {
        self.state.downstream.emit_failed(error);
    }
}

impl<T: 'static> Observable<T> {
    fn flatten_with<R: 'static>(
        &self,
        policy: FlattenPolicy,
        project: Rc<Project<T, R>>,
    ) -> Observable<R> {
        let source = self.clone();
        Observable::new(move |downstream: Emitter<R>| {
            let state = Rc::new(FlattenState {
                policy,
                project: Rc::clone(&project),
                downstream: downstream.clone(),
                active: RefCell::new(Vec::new()),
                queue: RefCell::new(VecDeque::new()),
                next_id: Cell::new(0),
                outer_done: Cell::new(false),
                draining: Cell::new(false),
            });

            let weak: Weak<FlattenState<T, R>> = Rc::downgrade(&state);
            downstream.add_finalizer(move || {
                if let Some(state) = weak.upgrade() {
                    state.release();
                }
            });

            source.subscribe_with(downstream.token().child(), OuterObserver { state });
            Ok(())
        })
    }

    /// Subscribes to the projection of every value concurrently and merges
    /// their values.
    pub fn merge_map<R: 'static>(&self, f: impl Fn(T) -> Observable<R> + 'static) -> Observable<R> {
        self.try_merge_map(move |v| Ok(f(v)))
    }

    /// `merge_map` with a fallible projection; `Err` fails the result.
    pub fn try_merge_map<R: 'static>(
        &self,
        f: impl Fn(T) -> Result<Observable<R>, StreamError> + 'static,
    ) -> Observable<R> {
        self.flatten_with(FlattenPolicy::Merge { limit: None }, Rc::new(f))
    }

    /// `merge_map` with at most `limit` inners active; further values wait
    /// in a FIFO queue.
    pub fn merge_map_with_limit<R: 'static>(
        &self,
        limit: NonZeroUsize,
        f: impl Fn(T) -> Observable<R> + 'static,
    ) -> Observable<R> {
        self.flatten_with(
            FlattenPolicy::Merge { limit: Some(limit) },
            Rc::new(move |v| Ok::<_, StreamError>(f(v))),
        )
    }

    /// Subscribes to the projection of every value one at a time, in order.
    pub fn concat_map<R: 'static>(
        &self,
        f: impl Fn(T) -> Observable<R> + 'static,
    ) -> Observable<R> {
        self.try_concat_map(move |v| Ok(f(v)))
    }

    /// `concat_map` with a fallible projection; `Err` fails the result.
    pub fn try_concat_map<R: 'static>(
        &self,
        f: impl Fn(T) -> Result<Observable<R>, StreamError> + 'static,
    ) -> Observable<R> {
        self.flatten_with(
            FlattenPolicy::Merge {
                limit: Some(NonZeroUsize::MIN),
            },
            Rc::new(f),
        )
    }

    /// Projects a value only when no inner is active; values arriving while
    /// an inner runs are dropped.
    pub fn exhaust_map<R: 'static>(
        &self,
        f: impl Fn(T) -> Observable<R> + 'static,
    ) -> Observable<R> {
        self.flatten_with(FlattenPolicy::Exhaust, Rc::new(move |v| Ok::<_, StreamError>(f(v))))
    }

    /// Projects every value, cancelling the previously active inner.
    pub fn switch_map<R: 'static>(
        &self,
        f: impl Fn(T) -> Observable<R> + 'static,
    ) -> Observable<R> {
        self.flatten_with(FlattenPolicy::Switch, Rc::new(move |v| Ok::<_, StreamError>(f(v))))
    }
}

impl<T: 'static> Observable<Observable<T>> {
    /// Merges every inner observable.
    #[must_use]
    pub fn merge_all(&self) -> Observable<T> {
        self.merge_map(|inner| inner)
    }

    /// Subscribes to every inner observable one after another.
    #[must_use]
    pub fn concat_all(&self) -> Observable<T> {
        self.concat_map(|inner| inner)
    }
}

/// Subscribes to every source at once and merges their values.
pub fn merge<T: 'static>(sources: impl IntoIterator<Item = Observable<T>>) -> Observable<T> {
    let sources: Vec<Observable<T>> = sources.into_iter().collect();
    from_iter(sources).merge_all()
}

/// Subscribes to each source after the previous one completes.
pub fn concat<T: 'static>(sources: impl IntoIterator<Item = Observable<T>>) -> Observable<T> {
    let sources: Vec<Observable<T>> = sources.into_iter().collect();
    from_iter(sources).concat_all()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::core::Notification;
    use crate::hub::{Hub, Subject};
    use crate::sources::{empty, fail, never, of};
    use crate::testing::Recorder;

    #[test]
    fn concat_map_subscriptions_are_independent() {
        let doubled = of([1, 2, 3]).concat_map(|v| of([v * 2]));
        let expected = vec![
            Notification::Value(2),
            Notification::Value(4),
            Notification::Value(6),
            Notification::Completed,
        ];

        for _ in 0..2 {
            let recorder = Recorder::new();
            doubled.subscribe(recorder.clone());
            assert_eq!(recorder.notifications(), expected);
        }
    }

    #[test]
    fn concat_waits_for_each_inner() {
        let first = Subject::new();
        let second = Subject::new();
        let recorder = Recorder::new();
        concat([first.to_observable(), second.to_observable()]).subscribe(recorder.clone());

        second.push_value(0);
        first.push_value(1);
        assert_eq!(second.consumer_count(), 0);

        first.push_completed();
        second.push_value(2);
        second.push_completed();

        assert_eq!(
            recorder.notifications(),
            vec![
                Notification::Value(1),
                Notification::Value(2),
                Notification::Completed
            ]
        );
    }

    #[test]
    fn merge_limit_queues_in_fifo_order() {
        let inners: Vec<Subject<i32>> = (0..3).map(|_| Subject::new()).collect();
        let hubs = inners.clone();
        let recorder = Recorder::new();
        of([0usize, 1, 2])
            .merge_map_with_limit(NonZeroUsize::new(2).unwrap(), move |i| hubs[i].to_observable())
            .subscribe(recorder.clone());

        assert_eq!(inners[0].consumer_count(), 1);
        assert_eq!(inners[1].consumer_count(), 1);
        assert_eq!(inners[2].consumer_count(), 0);

        inners[1].push_completed();
        assert_eq!(inners[2].consumer_count(), 1);

        inners[2].push_value(7);
        inners[0].push_completed();
        inners[2].push_completed();
        assert_eq!(
            recorder.notifications(),
            vec![Notification::Value(7), Notification::Completed]
        );
    }

    #[test]
    fn exhaust_drops_values_while_busy() {
        let outer = Subject::new();
        let inner = Subject::new();
        let hub = inner.clone();
        let recorder = Recorder::new();
        outer
            .to_observable()
            .exhaust_map(move |v: i32| hub.to_observable().map(move |x: i32| v * 10 + x))
            .subscribe(recorder.clone());

        outer.push_value(1);
        outer.push_value(2);
        inner.push_value(1);
        assert_eq!(recorder.values(), vec![11]);
        assert_eq!(inner.consumer_count(), 1);
    }

    #[test]
    fn switch_cancels_previous_inner() {
        let outer = Subject::new();
        let a = Subject::new();
        let b = Subject::new();
        let (ha, hb) = (a.clone(), b.clone());
        let recorder = Recorder::new();
        outer
            .to_observable()
            .switch_map(move |v: i32| {
                if v == 0 {
                    ha.to_observable()
                } else {
                    hb.to_observable()
                }
            })
            .subscribe(recorder.clone());

        outer.push_value(0);
        a.push_value(1);
        outer.push_value(1);
        assert_eq!(a.consumer_count(), 0);
        a.push_value(2);
        b.push_value(3);
        outer.push_completed();
        assert!(!recorder.is_completed());
        b.push_completed();

        assert_eq!(
            recorder.notifications(),
            vec![
                Notification::Value(1),
                Notification::Value(3),
                Notification::Completed
            ]
        );
    }

    #[test]
    fn projection_error_fails_and_cancels_siblings() {
        let live = Subject::<i32>::new();
        let hub = live.clone();
        let recorder = Recorder::new();
        of([0, 1])
            .try_merge_map(move |v| {
                if v == 0 {
                    Ok(hub.to_observable())
                } else {
                    Err(StreamError::projection("bad value"))
                }
            })
            .subscribe(recorder.clone());

        assert_eq!(
            recorder.notifications(),
            vec![Notification::Failed(StreamError::projection("bad value"))]
        );
        assert_eq!(live.consumer_count(), 0);
    }

    #[test]
    fn inner_failure_wins_over_completion() {
        let recorder = Recorder::new();
        merge([of([1]), fail(StreamError::upstream("inner")), of([2])])
            .subscribe(recorder.clone());
        assert_eq!(
            recorder.notifications(),
            vec![
                Notification::Value(1),
                Notification::Failed(StreamError::upstream("inner"))
            ]
        );
    }

    #[test]
    fn empty_outer_completes_and_never_inner_keeps_open() {
        let recorder = Recorder::new();
        empty::<i32>().merge_map(|v| of([v])).subscribe(recorder.clone());
        assert_eq!(recorder.notifications(), vec![Notification::Completed]);

        let pending = Recorder::new();
        of([1]).merge_map(|_| never::<i32>()).subscribe(pending.clone());
        assert!(pending.is_empty());
    }

    #[test]
    fn reentrant_outer_values_are_drained_iteratively() {
        let outer = Subject::new();
        let feed = outer.clone();
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let recorder = Recorder::new();
        outer
            .to_observable()
            .concat_map(|v: u32| of([v]))
            .tap(move |v| {
                s.set(s.get() + 1);
                if *v < 1000 {
                    feed.push_value(v + 1);
                }
            })
            .subscribe(recorder.clone());

        outer.push_value(0);
        assert_eq!(seen.get(), 1001);
        assert_eq!(recorder.values().last(), Some(&1000));
    }

    #[test]
    fn unbounded_merge_subscribes_reentrant_values_depth_first() {
        let outer = Subject::new();
        let feed = outer.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        outer
            .to_observable()
            .merge_map(|v: i32| of([v, v + 100]))
            .subscribe(crate::core::Consumer::new(move |v: i32| {
                log.borrow_mut().push(v);
                if v == 1 {
                    feed.push_value(2);
                }
            }));

        outer.push_value(1);
        assert_eq!(*seen.borrow(), vec![1, 2, 102, 101]);
    }
}

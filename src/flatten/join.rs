//! Latest-value joins.
//!
//! Every source writes its latest value into a slot. Once every slot holds a
//! value, each further value emits a snapshot of all slots. A source that
//! completes without ever filling its slot makes a snapshot impossible, so
//! the result completes at once and cancels the remaining sources.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::{Emitter, Observable, Observer};
use crate::error::StreamError;

struct JoinState<S, Out> {
    downstream: Emitter<Out>,
    slots: RefCell<S>,
    filled: RefCell<Vec<bool>>,
    completed: Cell<usize>,
    snapshot: fn(&S) -> Option<Out>,
}

impl<S, Out> JoinState<S, Out> {
    fn new(
        downstream: Emitter<Out>,
        slots: S,
        arity: usize,
        snapshot: fn(&S) -> Option<Out>,
    ) -> Self {
        Self {
            downstream,
            slots: RefCell::new(slots),
            filled: RefCell::new(vec![false; arity]),
            completed: Cell::new(0),
            snapshot,
        }
    }

    fn arity(&self) -> usize {
        self.filled.borrow().len()
    }
}

struct Slot<S, Out, V> {
    state: Rc<JoinState<S, Out>>,
    index: usize,
    store: fn(&mut S, usize, V),
}

impl<S, Out, V> Observer<V> for Slot<S, Out, V> {
    fn on_value(&self, value: V) -> Result<(), StreamError> {
        (self.store)(&mut *self.state.slots.borrow_mut(), self.index, value);
        self.state.filled.borrow_mut()[self.index] = true;

        let snapshot = (self.state.snapshot)(&*self.state.slots.borrow());
        if let Some(out) = snapshot {
            self.state.downstream.emit_value(out);
        }
        Ok(())
    }

    fn on_completed(&self) {
        let had_value = self.state.filled.borrow()[self.index];
        if !had_value {
            self.state.downstream.emit_completed();
            return;
        }

        let done = self.state.completed.get() + 1;
        self.state.completed.set(done);
        if done == self.state.arity() {
            self.state.downstream.emit_completed();
        }
    }

    fn on_failed(&self, error: StreamError) {
        self.state.downstream.emit_failed(error);
    }
}

fn join_slot<S: 'static, Out: 'static, V: 'static>(
    state: &Rc<JoinState<S, Out>>,
    index: usize,
    source: &Observable<V>,
    store: fn(&mut S, usize, V),
) {
    if state.downstream.is_closed() {
        return;
    }
    source.subscribe_with(
        state.downstream.token().child(),
        Slot {
            state: Rc::clone(state),
            index,
            store,
        },
    );
}

/// Joins the latest values of every source into a `Vec`, in source order.
///
/// An empty input completes immediately without subscribing anything.
pub fn combine_latest<T: Clone + 'static>(
    sources: impl IntoIterator<Item = Observable<T>>,
) -> Observable<Vec<T>> {
    let sources: Vec<Observable<T>> = sources.into_iter().collect();
    Observable::new(move |downstream: Emitter<Vec<T>>| {
        if sources.is_empty() {
            downstream.emit_completed();
            return Ok(());
        }

        let slots: Vec<Option<T>> = vec![None; sources.len()];
        let state = Rc::new(JoinState::new(downstream, slots, sources.len(), |slots| {
            slots.iter().cloned().collect()
        }));
        for (index, source) in sources.iter().enumerate() {
            join_slot(&state, index, source, |slots, i, v| slots[i] = Some(v));
        }
        Ok(())
    })
}

/// Joins the latest values of two sources of different types.
pub fn combine_latest2<A, B>(a: &Observable<A>, b: &Observable<B>) -> Observable<(A, B)>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let (a, b) = (a.clone(), b.clone());
    Observable::new(move |downstream: Emitter<(A, B)>| {
        let state = Rc::new(JoinState::new(
            downstream,
            (None::<A>, None::<B>),
            2,
            |(a, b)| Some((a.clone()?, b.clone()?)),
        ));
        join_slot(&state, 0, &a, |slots, _, v| slots.0 = Some(v));
        join_slot(&state, 1, &b, |slots, _, v| slots.1 = Some(v));
        Ok(())
    })
}

/// Joins the latest values of three sources of different types.
pub fn combine_latest3<A, B, C>(
    a: &Observable<A>,
    b: &Observable<B>,
    c: &Observable<C>,
) -> Observable<(A, B, C)>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
{
    let (a, b, c) = (a.clone(), b.clone(), c.clone());
    Observable::new(move |downstream: Emitter<(A, B, C)>| {
        let state = Rc::new(JoinState::new(
            downstream,
            (None::<A>, None::<B>, None::<C>),
            3,
            |(a, b, c)| Some((a.clone()?, b.clone()?, c.clone()?)),
        ));
        join_slot(&state, 0, &a, |slots, _, v| slots.0 = Some(v));
        join_slot(&state, 1, &b, |slots, _, v| slots.1 = Some(v));
        join_slot(&state, 2, &c, |slots, _, v| slots.2 = Some(v));
        Ok(())
    })
}

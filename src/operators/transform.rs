//! Element-wise transform operators.
//!
//! Every operator here is one upstream subscription feeding one downstream
//! guard. Per-subscription state lives in an operator struct created fresh by
//! a factory on every subscribe. Operators return a `Step` instead of emitting
//! directly, so no operator state is borrowed while downstream code runs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::{Emitter, Observable, Observer};
use crate::error::StreamError;
use crate::sources::from_iter;

/// What an operator wants done with one upstream value.
pub(crate) enum Step<R> {
    Skip,
    Emit(R),
    /// Emit, then complete.
    EmitLast(R),
    Complete,
    Fail(StreamError),
}

/// Per-subscription operator state.
pub(crate) trait Operator<T, R> {
    fn next(&self, value: T) -> Step<R>;

    /// Value to emit right before forwarding upstream completion.
    fn finish(&self) -> Option<R> {
        None
    }
}

struct Lifted<R, Op> {
    op: Op,
    downstream: Emitter<R>,
}

impl<T, R, Op: Operator<T, R>> Observer<T> for Lifted<R, Op> {
    fn on_value(&self, value: T) -> Result<(), StreamError> {
        match self.op.next(value) {
            Step::Skip => {}
            Step::Emit(v) => {
                self.downstream.emit_value(v);
            }
            Step::EmitLast(v) => {
                if self.downstream.emit_value(v) {
                    self.downstream.emit_completed();
                }
            }
            Step::Complete => self.downstream.emit_completed(),
            Step::Fail(e) => self.downstream.emit_failed(e),
        }
        Ok(())
    }

    fn on_completed(&self) {
        if let Some(last) = self.op.finish() {
            if !self.downstream.emit_value(last) {
                return;
            }
        }
        self.downstream.emit_completed();
    }

    fn on_failed(&self, error: StreamError) {
        self.downstream.emit_failed(error);
    }
}

impl<T: 'static> Observable<T> {
    /// Applies an operator created fresh for every subscription.
    pub(crate) fn lift<R, Op, F>(&self, factory: F) -> Observable<R>
    where
        R: 'static,
        Op: Operator<T, R> + 'static,
        F: Fn() -> Op + 'static,
    {
        let source = self.clone();
        Observable::new(move |downstream: Emitter<R>| {
            let upstream = downstream.token().child();
            source.subscribe_with(
                upstream,
                Lifted {
                    op: factory(),
                    downstream,
                },
            );
            Ok(())
        })
    }

    /// Transforms every value.
    pub fn map<R: 'static>(&self, f: impl Fn(T) -> R + 'static) -> Observable<R> {
        let f = Rc::new(f);
        self.lift(move || Map { f: Rc::clone(&f) })
    }

    /// Transforms every value with a fallible function; `Err` fails the
    /// stream.
    pub fn try_map<R: 'static>(
        &self,
        f: impl Fn(T) -> Result<R, StreamError> + 'static,
    ) -> Observable<R> {
        let f = Rc::new(f);
        self.lift(move || TryMap { f: Rc::clone(&f) })
    }

    /// Keeps values matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Observable<T> {
        let predicate = Rc::new(predicate);
        self.lift(move || Filter {
            predicate: Rc::clone(&predicate),
        })
    }

    /// Runs a side effect for every value and passes it through.
    pub fn tap(&self, effect: impl Fn(&T) + 'static) -> Observable<T> {
        let effect = Rc::new(effect);
        self.lift(move || Tap {
            effect: Rc::clone(&effect),
        })
    }

    /// Emits the running accumulation of every value.
    pub fn scan<A>(&self, seed: A, f: impl Fn(A, T) -> A + 'static) -> Observable<A>
    where
        A: Clone + 'static,
    {
        let f = Rc::new(f);
        self.lift(move || Scan {
            acc: RefCell::new(Some(seed.clone())),
            f: Rc::clone(&f),
            emit_each: true,
        })
    }

    /// Emits the final accumulation once upstream completes.
    pub fn reduce<A>(&self, seed: A, f: impl Fn(A, T) -> A + 'static) -> Observable<A>
    where
        A: Clone + 'static,
    {
        let f = Rc::new(f);
        self.lift(move || Scan {
            acc: RefCell::new(Some(seed.clone())),
            f: Rc::clone(&f),
            emit_each: false,
        })
    }

    /// Emits the first `count` values, then completes and cancels upstream.
    #[must_use]
    pub fn take(&self, count: usize) -> Observable<T> {
        if count == 0 {
            return crate::sources::empty();
        }
        self.lift(move || Take {
            remaining: Cell::new(count),
        })
    }

    /// Drops the first `count` values.
    #[must_use]
    pub fn skip(&self, count: usize) -> Observable<T> {
        self.lift(move || Skip {
            remaining: Cell::new(count),
        })
    }

    /// Emits values while `predicate` holds, then completes.
    pub fn take_while(&self, predicate: impl Fn(&T) -> bool + 'static) -> Observable<T> {
        let predicate = Rc::new(predicate);
        self.lift(move || TakeWhile {
            predicate: Rc::clone(&predicate),
        })
    }

    /// Drops every value and forwards only termination.
    #[must_use]
    pub fn ignore_elements<R: 'static>(&self) -> Observable<R> {
        self.lift(|| IgnoreElements)
    }

    /// Prepends `values` before the upstream values.
    pub fn start_with<I>(&self, values: I) -> Observable<T>
    where
        I: IntoIterator<Item = T> + Clone + 'static,
    {
        crate::flatten::concat([from_iter(values), self.clone()])
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Drops values equal to the previously emitted one.
    #[must_use]
    pub fn distinct_until_changed(&self) -> Observable<T> {
        self.lift(|| DistinctUntilChanged {
            last: RefCell::new(None),
        })
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Emits `(previous, current)` for every value after the first.
    #[must_use]
    pub fn pairwise(&self) -> Observable<(T, T)> {
        self.lift(|| Pairwise {
            last: RefCell::new(None),
        })
    }
}

struct Map<F> {
    f: Rc<F>,
}

impl<T, R, F: Fn(T) -> R> Operator<T, R> for Map<F> {
    fn next(&self, value: T) -> Step<R> {
        Step::Emit((self.f)(value))
    }
}

struct TryMap<F> {
    f: Rc<F>,
}

impl<T, R, F: Fn(T) -> Result<R, StreamError>> Operator<T, R> for TryMap<F> {
    fn next(&self, value: T) -> Step<R> {
        match (self.f)(value) {
            Ok(v) => Step::Emit(v),
            Err(e) => Step::Fail(e),
        }
    }
}

struct Filter<P> {
    predicate: Rc<P>,
}

impl<T, P: Fn(&T) -> bool> Operator<T, T> for Filter<P> {
    fn next(&self, value: T) -> Step<T> {
        if (self.predicate)(&value) {
            Step::Emit(value)
        } else {
            Step::Skip
        }
    }
}

struct Tap<E> {
    effect: Rc<E>,
}

impl<T, E: Fn(&T)> Operator<T, T> for Tap<E> {
    fn next(&self, value: T) -> Step<T> {
        (self.effect)(&value);
        Step::Emit(value)
    }
}

struct Scan<A, F> {
    acc: RefCell<Option<A>>,
    f: Rc<F>,
    emit_each: bool,
}

impl<T, A: Clone, F: Fn(A, T) -> A> Operator<T, A> for Scan<A, F> {
    fn next(&self, value: T) -> Step<A> {
        let Some(acc) = self.acc.borrow_mut().take() else {
            return Step::Skip;
        };
        let acc = (self.f)(acc, value);
        *self.acc.borrow_mut() = Some(acc.clone());
        if self.emit_each {
            Step::Emit(acc)
        } else {
            Step::Skip
        }
    }

    fn finish(&self) -> Option<A> {
        if self.emit_each {
            None
        } else {
            self.acc.borrow_mut().take()
        }
    }
}

struct Take {
    remaining: Cell<usize>,
}

impl<T> Operator<T, T> for Take {
    fn next(&self, value: T) -> Step<T> {
        match self.remaining.get() {
            0 => Step::Complete,
            1 => {
                self.remaining.set(0);
                Step::EmitLast(value)
            }
            n => {
                self.remaining.set(n - 1);
                Step::Emit(value)
            }
        }
    }
}

struct Skip {
    remaining: Cell<usize>,
}

impl<T> Operator<T, T> for Skip {
    fn next(&self, value: T) -> Step<T> {
        let n = self.remaining.get();
        if n > 0 {
            self.remaining.set(n - 1);
            Step::Skip
        } else {
            Step::Emit(value)
        }
    }
}

struct TakeWhile<P> {
    predicate: Rc<P>,
}

impl<T, P: Fn(&T) -> bool> Operator<T, T> for TakeWhile<P> {
    fn next(&self, value: T) -> Step<T> {
        if (self.predicate)(&value) {
            Step::Emit(value)
        } else {
            Step::Complete
        }
    }
}

struct IgnoreElements;

impl<T, R> Operator<T, R> for IgnoreElements {
    fn next(&self, _value: T) -> Step<R> {
        Step::Skip
    }
}

struct DistinctUntilChanged<T> {
    last: RefCell<Option<T>>,
}

impl<T: Clone + PartialEq> Operator<T, T> for DistinctUntilChanged<T> {
    fn next(&self, value: T) -> Step<T> {
        let mut last = self.last.borrow_mut();
        if last.as_ref() == Some(&value) {
            return Step::Skip;
        }
        *last = Some(value.clone());
        Step::Emit(value)
    }
}

struct Pairwise<T> {
    last: RefCell<Option<T>>,
}

impl<T: Clone> Operator<T, (T, T)> for Pairwise<T> {
    fn next(&self, value: T) -> Step<(T, T)> {
        match self.last.borrow_mut().replace(value.clone()) {
            Some(prev) => Step::Emit((prev, value)),
            None => Step::Skip,
        }
    }
}

//! Hubs that replay recent values to new consumers.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::core::{Emitter, Observable, Terminal};
use crate::error::{ArgumentError, StreamError};

use super::shared::{deliver_terminal, HubCore};
use super::{impl_hub_observer, Hub};

struct ReplayInner<T> {
    core: Rc<HubCore<T>>,
    buffer: RefCell<VecDeque<T>>,
    capacity: usize,
    pushed: Cell<u64>,
}

/// Multicast hub that replays the last `capacity` values to each new
/// consumer before live delivery.
pub struct ReplaySubject<T> {
    inner: Rc<ReplayInner<T>>,
}

impl<T> Clone for ReplaySubject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> ReplaySubject<T> {
    /// Creates a hub retaining up to `capacity` values.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError::InvalidArgument` when `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, ArgumentError> {
        if capacity == 0 {
            return Err(ArgumentError::invalid(
                "capacity",
                "replay capacity must be at least 1",
            ));
        }
        Ok(Self {
            inner: Rc::new(ReplayInner {
                core: HubCore::new(),
                buffer: RefCell::new(VecDeque::with_capacity(capacity)),
                capacity,
                pushed: Cell::new(0),
            }),
        })
    }

    /// Maximum number of retained values.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl<T: Clone + 'static> ReplaySubject<T> {
    /// The currently retained values, oldest first.
    #[must_use]
    pub fn buffered(&self) -> Vec<T> {
        self.inner.buffer.borrow().iter().cloned().collect()
    }
}

impl<T: Clone + 'static> Hub<T> for ReplaySubject<T> {
    fn push_value(&self, value: T) {
        if self.inner.core.is_terminated() {
            return;
        }
        {
            let mut buffer = self.inner.buffer.borrow_mut();
            if buffer.len() == self.inner.capacity {
                buffer.pop_front();
            }
            buffer.push_back(value.clone());
        }
        self.inner.pushed.set(self.inner.pushed.get() + 1);
        self.inner.core.deliver(&value);
    }

    fn push_completed(&self) {
        self.inner.core.terminate(Terminal::Completed);
    }

    fn push_failed(&self, error: StreamError) {
        self.inner.core.terminate(Terminal::Failed(error));
    }

    fn to_observable(&self) -> Observable<T> {
        let inner = Rc::clone(&self.inner);
        Observable::new(move |emitter: Emitter<T>| {
            if let Some(terminal) = inner.core.terminal() {
                deliver_terminal(&emitter, &terminal);
                return Ok(());
            }

            // Values pushed while replaying (possibly by this consumer) are
            // buffered but not yet delivered to it; keep replaying until the
            // buffer stops growing, then go live.
            let mut next_seq = inner.pushed.get() - inner.buffer.borrow().len() as u64;
            loop {
                let pending: Vec<T> = {
                    let buffer = inner.buffer.borrow();
                    let pushed = inner.pushed.get();
                    let oldest = pushed - buffer.len() as u64;
                    let skip = usize::try_from(next_seq.saturating_sub(oldest))
                        .unwrap_or(usize::MAX);
                    next_seq = pushed;
                    buffer.iter().skip(skip).cloned().collect()
                };
                if pending.is_empty() {
                    break;
                }
                for value in pending {
                    if !emitter.emit_value(value) {
                        return Ok(());
                    }
                }
            }

            // A replayed value may have terminated the hub re-entrantly.
            match inner.core.terminal() {
                Some(terminal) => deliver_terminal(&emitter, &terminal),
                None => inner.core.register(emitter),
            }
            Ok(())
        })
    }

    fn terminal(&self) -> Option<Terminal> {
        self.inner.core.terminal()
    }

    fn consumer_count(&self) -> usize {
        self.inner.core.consumer_count()
    }
}

impl<T> fmt::Debug for ReplaySubject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplaySubject")
            .field("capacity", &self.inner.capacity)
            .field("buffered", &self.inner.buffer.borrow().len())
            .finish_non_exhaustive()
    }
}

struct BehaviorInner<T> {
    core: Rc<HubCore<T>>,
    current: RefCell<T>,
    version: Cell<u64>,
}

/// Multicast hub seeded with a value; new consumers first receive the most
/// recent value.
pub struct BehaviorSubject<T> {
    inner: Rc<BehaviorInner<T>>,
}

impl<T> Clone for BehaviorSubject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> BehaviorSubject<T> {
    /// Creates a hub whose current value is `seed`.
    #[must_use]
    pub fn new(seed: T) -> Self {
        Self {
            inner: Rc::new(BehaviorInner {
                core: HubCore::new(),
                current: RefCell::new(seed),
                version: Cell::new(0),
            }),
        }
    }

    /// The most recent value (the seed if nothing was pushed).
    #[must_use]
    pub fn value(&self) -> T {
        self.inner.current.borrow().clone()
    }
}

impl<T: Clone + 'static> Hub<T> for BehaviorSubject<T> {
    fn push_value(&self, value: T) {
        if self.inner.core.is_terminated() {
            return;
        }
        *self.inner.current.borrow_mut() = value.clone();
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.core.deliver(&value);
    }

    fn push_completed(&self) {
        self.inner.core.terminate(Terminal::Completed);
    }

    fn push_failed(&self, error: StreamError) {
        self.inner.core.terminate(Terminal::Failed(error));
    }

    fn to_observable(&self) -> Observable<T> {
        let inner = Rc::clone(&self.inner);
        Observable::new(move |emitter: Emitter<T>| {
            if let Some(terminal) = inner.core.terminal() {
                deliver_terminal(&emitter, &terminal);
                return Ok(());
            }

            // Re-emit until the current value is stable, so a consumer that
            // pushes while attaching still ends up seeing the latest value.
            loop {
                let version = inner.version.get();
                let current = inner.current.borrow().clone();
                if !emitter.emit_value(current) {
                    return Ok(());
                }
                if inner.version.get() == version || inner.core.is_terminated() {
                    break;
                }
            }

            match inner.core.terminal() {
                Some(terminal) => deliver_terminal(&emitter, &terminal),
                None => inner.core.register(emitter),
            }
            Ok(())
        })
    }

    fn terminal(&self) -> Option<Terminal> {
        self.inner.core.terminal()
    }

    fn consumer_count(&self) -> usize {
        self.inner.core.consumer_count()
    }
}

impl_hub_observer!(ReplaySubject, BehaviorSubject);

impl<T> fmt::Debug for BehaviorSubject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorSubject").finish_non_exhaustive()
    }
}

//! The completion-only hub.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::core::{Emitter, Observable, Terminal};
use crate::error::StreamError;

use super::shared::{deliver_terminal, HubCore};
use super::{impl_hub_observer, Hub};

struct AsyncInner<T> {
    core: Rc<HubCore<T>>,
    last: RefCell<Option<T>>,
}

/// Hub that delivers only the final value, and only once it completes.
///
/// Values pushed before completion are remembered but not delivered. On
/// completion every consumer receives the last value (if any) followed by
/// `Completed`. A failure discards the remembered value.
pub struct AsyncSubject<T> {
    inner: Rc<AsyncInner<T>>,
}

impl<T> Clone for AsyncSubject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> AsyncSubject<T> {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(AsyncInner {
                core: HubCore::new(),
                last: RefCell::new(None),
            }),
        }
    }
}

impl<T: 'static> Default for AsyncSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver_final<T>(emitter: &Emitter<T>, last: Option<T>) {
    if let Some(value) = last {
        if !emitter.emit_value(value) {
            return;
        }
    }
    emitter.emit_completed();
}

impl<T: Clone + 'static> Hub<T> for AsyncSubject<T> {
    fn push_value(&self, value: T) {
        if self.inner.core.is_terminated() {
            return;
        }
        *self.inner.last.borrow_mut() = Some(value);
    }

    fn push_completed(&self) {
        let Some(targets) = self.inner.core.close(Terminal::Completed) else {
            return;
        };
        let last = self.inner.last.borrow().clone();
        for emitter in targets {
            deliver_final(&emitter, last.clone());
        }
    }

    fn push_failed(&self, error: StreamError) {
        if self.inner.core.is_terminated() {
            return;
        }
        self.inner.last.borrow_mut().take();
        self.inner.core.terminate(Terminal::Failed(error));
    }

    fn to_observable(&self) -> Observable<T> {
        let inner = Rc::clone(&self.inner);
        Observable::new(move |emitter: Emitter<T>| {
            match inner.core.terminal() {
                Some(Terminal::Completed) => {
                    let last = inner.last.borrow().clone();
                    deliver_final(&emitter, last);
                }
                Some(failed) => deliver_terminal(&emitter, &failed),
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

impl_hub_observer!(AsyncSubject);

impl<T> fmt::Debug for AsyncSubject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSubject").finish_non_exhaustive()
    }
}

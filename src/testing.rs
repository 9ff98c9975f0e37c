//! Test helpers.
//!
//! `Recorder` is an observer that logs every notification it receives. It is
//! used by the crate's own tests and benchmarks and is handy for asserting on
//! stream output in downstream code.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::{Notification, Observer};
use crate::error::StreamError;

type Reject<T> = Box<dyn Fn(&T) -> bool>;

struct RecorderState<T> {
    log: Vec<Notification<T>>,
    reject: Option<Reject<T>>,
}

/// Observer that records notifications in arrival order.
pub struct Recorder<T> {
    state: Rc<RefCell<RecorderState<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Recorder<T> {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RecorderState {
                log: Vec::new(),
                reject: None,
            })),
        }
    }

    /// Creates a recorder whose value handler fails when it sees `value`.
    #[must_use]
    pub fn failing_on(value: T) -> Self
    where
        T: PartialEq + 'static,
    {
        let recorder = Self::new();
        recorder.state.borrow_mut().reject = Some(Box::new(move |v: &T| *v == value));
        recorder
    }

    /// Takes every notification recorded so far, leaving the log empty.
    #[must_use]
    pub fn drain(&self) -> Vec<Notification<T>> {
        std::mem::take(&mut self.state.borrow_mut().log)
    }

    /// Number of `Completed` plus `Failed` notifications seen.
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.state.borrow().log.iter().filter(|n| n.is_terminal()).count()
    }

    /// True if a `Completed` notification was seen.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state
            .borrow()
            .log
            .iter()
            .any(|n| matches!(n, Notification::Completed))
    }

    /// The first failure seen, if any.
    #[must_use]
    pub fn failure(&self) -> Option<StreamError> {
        self.state.borrow().log.iter().find_map(|n| match n {
            Notification::Failed(e) => Some(e.clone()),
            _ => None,
        })
    }

    /// Number of notifications recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().log.len()
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().log.is_empty()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.state.borrow_mut().log.clear();
    }
}

impl<T: Clone> Recorder<T> {
    /// Every notification recorded so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification<T>> {
        self.state.borrow().log.clone()
    }

    /// Every value recorded so far.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.state
            .borrow()
            .log
            .iter()
            .filter_map(|n| match n {
                Notification::Value(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<T> Observer<T> for Recorder<T> {
    fn on_value(&self, value: T) -> Result<(), StreamError> {
        let mut state = self.state.borrow_mut();
        if state.reject.as_ref().is_some_and(|reject| reject(&value)) {
            return Err(StreamError::handler("recorder rejected value"));
        }
        state.log.push(Notification::Value(value));
        Ok(())
    }

    fn on_completed(&self) {
        self.state.borrow_mut().log.push(Notification::Completed);
    }

    fn on_failed(&self, error: StreamError) {
        self.state.borrow_mut().log.push(Notification::Failed(error));
    }
}

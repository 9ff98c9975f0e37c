//! The subscription lifecycle guard.
//!
//! Every producer receives an `Emitter` instead of the raw consumer. The
//! emitter enforces the channel contract:
//! - at most one terminal notification, and nothing after it;
//! - nothing after cancellation;
//! - a consumer handler error becomes `Failed` and cancels the source;
//! - finalizers run exactly once, on cancellation or after the terminal
//!   notification, whichever comes first.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::StreamError;

use super::cancel::{CallbackId, CancelToken};
use super::notification::Notification;
use super::observer::Observer;

struct EmitterInner<T> {
    observer: Box<dyn Observer<T>>,
    terminated: Cell<bool>,
    token: CancelToken,
}

/// Guarded handle a producer uses to push notifications to one consumer.
pub struct Emitter<T> {
    inner: Rc<EmitterInner<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Emitter<T> {
    pub(crate) fn new(observer: Box<dyn Observer<T>>, token: CancelToken) -> Self {
        Self {
            inner: Rc::new(EmitterInner {
                observer,
                terminated: Cell::new(false),
                token,
            }),
        }
    }

    /// Delivers a value synchronously.
    ///
    /// Returns whether the subscription is still open afterwards, so
    /// synchronous producers can stop as soon as the consumer cancels.
    pub fn emit_value(&self, value: T) -> bool {
        if self.is_closed() {
            return false;
        }

        if let Err(error) = self.inner.observer.on_value(value) {
            tracing::debug!(error = %error, "consumer handler failed; failing subscription");
            self.emit_failed(error);
            return false;
        }

        !self.is_closed()
    }

    /// Delivers successful termination, then closes the subscription.
    pub fn emit_completed(&self) {
        if self.is_closed() {
            return;
        }
        self.inner.terminated.set(true);
        self.inner.observer.on_completed();
        self.inner.token.cancel();
    }

    /// Delivers failed termination, then closes the subscription.
    pub fn emit_failed(&self, error: StreamError) {
        if self.is_closed() {
            return;
        }
        self.inner.terminated.set(true);
        self.inner.observer.on_failed(error);
        self.inner.token.cancel();
    }

    /// Delivers any notification.
    pub fn emit(&self, notification: Notification<T>) -> bool {
        match notification {
            Notification::Value(v) => self.emit_value(v),
            Notification::Completed => {
                self.emit_completed();
                false
            }
            Notification::Failed(e) => {
                self.emit_failed(e);
                false
            }
        }
    }

    /// True once a terminal notification was delivered or cancellation was
    /// requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.terminated.get() || self.inner.token.is_cancelled()
    }

    /// True once a terminal notification was delivered.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.get()
    }

    /// The subscription's cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.inner.token
    }

    /// Registers cleanup to run exactly once when the subscription closes.
    pub fn add_finalizer(&self, finalizer: impl FnOnce() + 'static) -> CallbackId {
        self.inner.token.on_cancel(finalizer)
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("terminated", &self.inner.terminated.get())
            .field("token", &self.inner.token)
            .finish_non_exhaustive()
    }
}

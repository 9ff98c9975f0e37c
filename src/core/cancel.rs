//! Cooperative cancellation tokens.
//!
//! A `CancelToken` is level-triggered: once cancelled it stays cancelled, and
//! every callback registered on it runs at most once. Tokens form a tree via
//! `child()`; cancelling a parent cancels all of its live children, while a
//! child that is cancelled on its own detaches from the parent so long-lived
//! parents do not accumulate callbacks from finished inner subscriptions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Handle returned by `CancelToken::on_cancel`, used to unregister a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

struct TokenInner {
    cancelled: Cell<bool>,
    next_id: Cell<u64>,
    callbacks: RefCell<Vec<(CallbackId, Box<dyn FnOnce()>)>>,
}

/// Shared cancellation flag with once-only callbacks.
#[derive(Clone)]
pub struct CancelToken {
    inner: Rc<TokenInner>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TokenInner {
                cancelled: Cell::new(false),
                next_id: Cell::new(0),
                callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Requests cancellation.
    ///
    /// Idempotent. Callbacks run in registration order; callbacks registered
    /// while this call is running are executed immediately.
    pub fn cancel(&self) {
        if self.inner.cancelled.replace(true) {
            return;
        }

        let callbacks = std::mem::take(&mut *self.inner.callbacks.borrow_mut());
        for (_, callback) in callbacks {
            callback();
        }
    }

    /// Registers a callback to run when the token is cancelled.
    ///
    /// If the token is already cancelled the callback runs before this call
    /// returns.
    pub fn on_cancel(&self, callback: impl FnOnce() + 'static) -> CallbackId {
        let id = CallbackId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        if self.is_cancelled() {
            callback();
            return id;
        }

        self.inner.callbacks.borrow_mut().push((id, Box::new(callback)));
        id
    }

    /// Unregisters a callback. Returns true if it was still pending.
    pub fn remove(&self, id: CallbackId) -> bool {
        let mut callbacks = self.inner.callbacks.borrow_mut();
        let before = callbacks.len();
        callbacks.retain(|(cid, _)| *cid != id);
        callbacks.len() != before
    }

    /// Creates a token that is cancelled together with this one.
    #[must_use]
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }

        let weak_child = Rc::downgrade(&child.inner);
        let key = self.on_cancel(move || {
            if let Some(inner) = weak_child.upgrade() {
                CancelToken { inner }.cancel();
            }
        });

        let weak_parent: Weak<TokenInner> = Rc::downgrade(&self.inner);
        child.on_cancel(move || {
            if let Some(inner) = weak_parent.upgrade() {
                CancelToken { inner }.remove(key);
            }
        });

        child
    }

    /// Number of callbacks still waiting for cancellation.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("pending_callbacks", &self.pending_callbacks())
            .finish()
    }
}

//! The notification channel: `Observable` and `Subscription`.

use std::fmt;
use std::rc::Rc;

use crate::error::StreamError;

use super::cancel::CancelToken;
use super::emitter::Emitter;
use super::observer::Observer;

type Setup<T> = dyn Fn(Emitter<T>) -> Result<(), StreamError>;

/// A cold, push-based source of `T` values.
///
/// An `Observable` is a reusable recipe: every `subscribe` call runs the
/// producer setup again with a fresh guard and fresh per-subscription state.
/// Cloning is cheap and shares the recipe, not any subscription.
pub struct Observable<T> {
    setup: Rc<Setup<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            setup: Rc::clone(&self.setup),
        }
    }
}

impl<T: 'static> Observable<T> {
    /// Creates an observable from a producer setup.
    ///
    /// The setup runs synchronously inside `subscribe`. Returning `Err` is
    /// equivalent to calling `emit_failed` on the emitter.
    pub fn new(setup: impl Fn(Emitter<T>) -> Result<(), StreamError> + 'static) -> Self {
        Self {
            setup: Rc::new(setup),
        }
    }

    /// Subscribes with a fresh cancellation token.
    pub fn subscribe(&self, observer: impl Observer<T> + 'static) -> Subscription {
        self.subscribe_with(CancelToken::new(), observer)
    }

    /// Subscribes using a caller-provided token.
    ///
    /// Combinators pass a child of their own downstream token so that
    /// cancelling the downstream tears down every upstream subscription.
    pub fn subscribe_with(
        &self,
        token: CancelToken,
        observer: impl Observer<T> + 'static,
    ) -> Subscription {
        let emitter = Emitter::new(Box::new(observer), token.clone());
        self.run(emitter);
        Subscription { token }
    }

    /// Runs the producer setup against an existing guard.
    pub(crate) fn run(&self, emitter: Emitter<T>) {
        if emitter.is_closed() {
            return;
        }
        if let Err(error) = (self.setup)(emitter.clone()) {
            emitter.emit_failed(error);
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

/// Consumer-side handle of one live subscription.
///
/// Dropping the handle does not cancel the subscription; call `cancel`.
#[derive(Debug, Clone)]
pub struct Subscription {
    token: CancelToken,
}

impl Subscription {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the subscription terminated or was cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The subscription's cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

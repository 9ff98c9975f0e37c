//! The consumer side of the notification channel.

use std::fmt;

use crate::error::StreamError;

/// Capability implemented by everything that can receive notifications.
///
/// Handlers take `&self`: delivery is reentrant, so an observer may be
/// called again (depth-first) while one of its handlers is still running.
/// Implementations keep their mutable state behind `Cell`/`RefCell` and must
/// not hold a borrow across a call that can emit.
pub trait Observer<T> {
    /// Receives a value. Returning `Err` fails the subscription: the guard
    /// delivers the error to `on_failed` and cancels the source.
    fn on_value(&self, value: T) -> Result<(), StreamError>;

    /// Receives successful termination.
    fn on_completed(&self) {}

    /// Receives failed termination. The default reports the failure as
    /// unhandled.
    fn on_failed(&self, error: StreamError) {
        report_unhandled(&error);
    }
}

/// Unhandled failures are logged and otherwise dropped; they never panic.
pub(crate) fn report_unhandled(error: &StreamError) {
    tracing::error!(error = %error, "unhandled stream failure");
}

type ValueFn<T> = Box<dyn Fn(T) -> Result<(), StreamError>>;

/// Closure-based observer.
///
/// ```
/// use kyrorx::{of, Consumer};
///
/// let sub = of([1, 2, 3]).subscribe(
///     Consumer::new(|v: i32| println!("{v}"))
///         .with_completed(|| println!("done")),
/// );
/// assert!(sub.is_closed());
/// ```
pub struct Consumer<T> {
    value: ValueFn<T>,
    completed: Option<Box<dyn Fn()>>,
    failed: Option<Box<dyn Fn(StreamError)>>,
}

impl<T> Consumer<T> {
    /// Creates a consumer from an infallible value handler.
    pub fn new(value: impl Fn(T) + 'static) -> Self {
        Self {
            value: Box::new(move |v| {
                value(v);
                Ok(())
            }),
            completed: None,
            failed: None,
        }
    }

    /// Creates a consumer whose value handler may fail.
    pub fn try_new(value: impl Fn(T) -> Result<(), StreamError> + 'static) -> Self {
        Self {
            value: Box::new(value),
            completed: None,
            failed: None,
        }
    }

    /// Sets the completion handler.
    #[must_use]
    pub fn with_completed(mut self, completed: impl Fn() + 'static) -> Self {
        self.completed = Some(Box::new(completed));
        self
    }

    /// Sets the failure handler.
    #[must_use]
    pub fn with_failed(mut self, failed: impl Fn(StreamError) + 'static) -> Self {
        self.failed = Some(Box::new(failed));
        self
    }
}

impl<T> Observer<T> for Consumer<T> {
    fn on_value(&self, value: T) -> Result<(), StreamError> {
        (self.value)(value)
    }

    fn on_completed(&self) {
        if let Some(completed) = &self.completed {
            completed();
        }
    }

    fn on_failed(&self, error: StreamError) {
        match &self.failed {
            Some(failed) => failed(error),
            None => report_unhandled(&error),
        }
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("completed", &self.completed.is_some())
            .field("failed", &self.failed.is_some())
            .finish_non_exhaustive()
    }
}

//! Multicast hubs (subjects).
//!
//! A hub is both a consumer (it implements `Observer`, so an upstream source
//! can feed it) and a producer to any number of dynamically attached
//! consumers. Variants differ only in what a new consumer sees on attach:
//!
//! | Type | Replayed on attach |
//! |---|---|
//! | `Subject` | nothing |
//! | `ReplaySubject` | the last K values |
//! | `BehaviorSubject` | the current value (seeded) |
//! | `AsyncSubject` | the final value, once completed |
//! | `BroadcastSubject` | nothing; values cross to other same-named hubs |
//!
//! Once a hub is terminal every attached consumer receives the terminal
//! notification, and later attachers receive only that notification
//! (`AsyncSubject` additionally replays its final value).

/// Lets a hub be fed by an upstream source: `source.subscribe(hub.clone())`.
macro_rules! impl_hub_observer {
    ($($hub:ident),* $(,)?) => {$(
        impl<T: Clone + 'static> $crate::core::Observer<T> for $hub<T> {
            fn on_value(&self, value: T) -> Result<(), $crate::error::StreamError> {
                $crate::hub::Hub::push_value(self, value);
                Ok(())
            }

            fn on_completed(&self) {
                $crate::hub::Hub::push_completed(self);
            }

            fn on_failed(&self, error: $crate::error::StreamError) {
                $crate::hub::Hub::push_failed(self, error);
            }
        }
    )*};
}

pub(crate) use impl_hub_observer;

mod async_subject;
#[cfg(feature = "broadcast")]
mod broadcast;
pub(crate) mod shared;
mod replay;
mod subject;

pub use async_subject::AsyncSubject;
#[cfg(feature = "broadcast")]
pub use broadcast::BroadcastSubject;
pub use replay::{BehaviorSubject, ReplaySubject};
pub use subject::Subject;

use crate::core::{Notification, Observable, Observer, Subscription, Terminal};
use crate::error::StreamError;

/// Operations shared by every hub variant.
pub trait Hub<T: 'static> {
    /// Pushes a value to the attached consumers. Ignored once terminal.
    fn push_value(&self, value: T);

    /// Completes the hub. Only the first terminal push has an effect.
    fn push_completed(&self);

    /// Fails the hub. Only the first terminal push has an effect.
    fn push_failed(&self, error: StreamError);

    /// An observable whose subscribers attach to this hub.
    fn to_observable(&self) -> Observable<T>;

    /// The recorded terminal state, if any.
    fn terminal(&self) -> Option<Terminal>;

    /// Number of currently attached consumers.
    fn consumer_count(&self) -> usize;

    /// Attaches a consumer.
    fn attach<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T> + 'static,
        Self: Sized,
    {
        self.to_observable().subscribe(observer)
    }

    /// Pushes any notification.
    fn push(&self, notification: Notification<T>) {
        match notification {
            Notification::Value(v) => self.push_value(v),
            Notification::Completed => self.push_completed(),
            Notification::Failed(e) => self.push_failed(e),
        }
    }
}

//! Core notification contract.
//!
//! - `Observable` is the notification channel: a reusable producer recipe.
//! - `Emitter` is the lifecycle guard handed to the producer.
//! - `Observer` is the consumer capability.
//! - `CancelToken` carries cancellation from consumer to producer.

/// Cancellation tokens.
pub mod cancel;
/// Lifecycle guard.
pub mod emitter;
/// Observable and subscription handle.
pub mod observable;
/// Observer trait and closure consumer.
pub mod observer;
/// Notification types.
pub mod notification;

pub use cancel::{CallbackId, CancelToken};
pub use emitter::Emitter;
pub use notification::{Notification, Terminal};
pub use observable::{Observable, Subscription};
pub use observer::{Consumer, Observer};

//! # kyrorx - Push-Based Reactive Streams
//!
//! kyrorx is a single-threaded, cooperative reactive-stream runtime. A
//! producer emits a sequence of values terminated by exactly one of
//! *completed* or *failed*; consumers subscribe to receive them and may
//! cancel at any time.
//!
//! ## Core Concepts
//!
//! - **Observable**: A cold recipe; every subscription runs the producer anew
//! - **Emitter**: The guard a producer pushes through; it enforces exactly-once termination
//! - **CancelToken**: Cooperative cancellation, arranged as a tree across combinators
//! - **Hub**: A multicast subject, optionally replaying recent values
//! - **EventLoop**: Timers and cross-context pumps on a real or virtual clock
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use kyrorx::{of, EventLoop, Hub, Subject};
//!
//! let doubled = of([1, 2, 3]).concat_map(|v| of([v * 2]));
//! assert_eq!(doubled.to_vec().unwrap(), vec![2, 4, 6]);
//!
//! let lp = EventLoop::virtual_time();
//! let clicks = Subject::new();
//! let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! clicks
//!     .to_observable()
//!     .debounce(&lp, Duration::from_millis(100))
//!     .subscribe(kyrorx::Consumer::new(move |v: i32| sink.borrow_mut().push(v)));
//!
//! clicks.push_value(1);
//! clicks.push_value(2);
//! lp.advance_by(Duration::from_millis(100));
//! assert_eq!(*seen.borrow(), vec![2]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Notification protocol
pub mod core;
pub mod error;

// Runtime and sources
pub mod runtime;
pub mod sources;

// Combinators
pub mod flatten;
pub mod operators;
pub mod timing;

// Multicast
pub mod hub;
#[cfg(feature = "broadcast")]
pub mod transport;

pub mod testing;

pub use crate::core::{
    CallbackId, CancelToken, Consumer, Emitter, Notification, Observable, Observer, Subscription,
    Terminal,
};
pub use error::{ArgumentError, RxError, RxResult, StreamError};
pub use flatten::{combine_latest, combine_latest2, combine_latest3, concat, merge, race};
#[cfg(feature = "broadcast")]
pub use hub::BroadcastSubject;
pub use hub::{AsyncSubject, BehaviorSubject, Hub, ReplaySubject, Subject};
pub use runtime::{EventLoop, EventLoopConfig, LoopWaker, Pump, Scheduler, TimerId};
pub use sources::{defer, empty, fail, from_iter, interval, never, of, timer};
pub use timing::Window;
#[cfg(feature = "broadcast")]
pub use transport::{BroadcastChannel, BroadcastConfig};

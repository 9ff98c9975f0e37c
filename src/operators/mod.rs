//! Operators defined as inherent methods on `Observable`.
//!
//! The flattening combinators live in `crate::flatten` and the timing
//! operators in `crate::timing`; this module holds the single-subscription
//! operators they are composed from.

/// `take_until`, `to_vec` and notification callbacks.
pub mod control;
/// `share`.
pub mod multicast;
/// Element-wise transforms.
pub mod transform;

//! Combinators that flatten many sources into one.
//!
//! `engine` holds the shared merge/concat/exhaust/switch machinery exposed as
//! `Observable` methods; `race` and `join` are free-standing multi-source
//! combinators. Every combinator keeps its tracking state in a struct created
//! fresh per subscription.

mod engine;
mod join;
mod race;

pub use engine::{concat, merge};
pub use join::{combine_latest, combine_latest2, combine_latest3};
pub use race::race;

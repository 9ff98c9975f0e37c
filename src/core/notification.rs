//! Notification and terminal-state types.

use crate::error::StreamError;

/// One event delivered along a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T> {
    /// A value.
    Value(T),
    /// Successful termination.
    Completed,
    /// Failed termination.
    Failed(StreamError),
}

impl<T> Notification<T> {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    /// Returns the value, if this is a `Value` notification.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// The terminal state recorded by a hub or guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// The stream completed.
    Completed,
    /// The stream failed.
    Failed(StreamError),
}

impl<T> From<Terminal> for Notification<T> {
    fn from(terminal: Terminal) -> Self {
        match terminal {
            Terminal::Completed => Self::Completed,
            Terminal::Failed(e) => Self::Failed(e),
        }
    }
}

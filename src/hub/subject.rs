//! The plain multicast hub.

use std::fmt;
use std::rc::Rc;

use crate::core::{Emitter, Observable, Terminal};
use crate::error::StreamError;

use super::shared::{deliver_terminal, HubCore};
use super::{impl_hub_observer, Hub};

/// Multicast hub with no replay: consumers see only what is pushed after
/// they attach.
pub struct Subject<T> {
    core: Rc<HubCore<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: 'static> Subject<T> {
    /// Creates a hub with no consumers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: HubCore::new(),
        }
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Hub<T> for Subject<T> {
    fn push_value(&self, value: T) {
        self.core.deliver(&value);
    }

    fn push_completed(&self) {
        self.core.terminate(Terminal::Completed);
    }

    fn push_failed(&self, error: StreamError) {
        self.core.terminate(Terminal::Failed(error));
    }

    fn to_observable(&self) -> Observable<T> {
        let core = Rc::clone(&self.core);
        Observable::new(move |emitter: Emitter<T>| {
            match core.terminal() {
                Some(terminal) => deliver_terminal(&emitter, &terminal),
                None => core.register(emitter),
            }
            Ok(())
        })
    }

    fn terminal(&self) -> Option<Terminal> {
        self.core.terminal()
    }

    fn consumer_count(&self) -> usize {
        self.core.consumer_count()
    }
}

impl_hub_observer!(Subject);

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject").finish_non_exhaustive()
    }
}

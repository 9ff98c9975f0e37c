//! Consumer bookkeeping shared by every hub variant.
//!
//! Delivery iterates over a snapshot of the consumer list, so consumers may
//! attach, detach, cancel or push into the hub from inside their handlers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::{Emitter, Terminal};

pub(crate) struct HubCore<T> {
    consumers: RefCell<Vec<(u64, Emitter<T>)>>,
    next_id: Cell<u64>,
    terminal: RefCell<Option<Terminal>>,
}

impl<T: 'static> HubCore<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            consumers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            terminal: RefCell::new(None),
        })
    }

    pub(crate) fn terminal(&self) -> Option<Terminal> {
        self.terminal.borrow().clone()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminal.borrow().is_some()
    }

    pub(crate) fn consumer_count(&self) -> usize {
        self.consumers.borrow().len()
    }

    fn snapshot(&self) -> Vec<Emitter<T>> {
        self.consumers
            .borrow()
            .iter()
            .map(|(_, emitter)| emitter.clone())
            .collect()
    }

    /// Delivers `value` to every consumer attached at the time of the call.
    pub(crate) fn deliver(&self, value: &T)
    where
        T: Clone,
    {
        if self.is_terminated() {
            return;
        }
        for emitter in self.snapshot() {
            emitter.emit_value(value.clone());
        }
    }

    /// Adds a consumer; it is removed again when its subscription closes.
    pub(crate) fn register(self: &Rc<Self>, emitter: Emitter<T>) {
        if emitter.is_closed() {
            return;
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.consumers.borrow_mut().push((id, emitter.clone()));

        let weak = Rc::downgrade(self);
        emitter.add_finalizer(move || {
            if let Some(core) = weak.upgrade() {
                let removed = {
                    let mut consumers = core.consumers.borrow_mut();
                    consumers
                        .iter()
                        .position(|(cid, _)| *cid == id)
                        .map(|idx| consumers.remove(idx))
                };
                drop(removed);
            }
        });
    }

    /// Records the terminal state and hands back the consumers that must
    /// receive it. Returns `None` if the hub was already terminal.
    pub(crate) fn close(&self, terminal: Terminal) -> Option<Vec<Emitter<T>>> {
        {
            let mut slot = self.terminal.borrow_mut();
            if slot.is_some() {
                return None;
            }
            *slot = Some(terminal);
        }

        let consumers = std::mem::take(&mut *self.consumers.borrow_mut());
        Some(consumers.into_iter().map(|(_, emitter)| emitter).collect())
    }

    /// Closes the hub and delivers the terminal state to every consumer.
    pub(crate) fn terminate(&self, terminal: Terminal) -> bool {
        let Some(targets) = self.close(terminal.clone()) else {
            return false;
        };
        for emitter in targets {
            deliver_terminal(&emitter, &terminal);
        }
        true
    }
}

pub(crate) fn deliver_terminal<T>(emitter: &Emitter<T>, terminal: &Terminal) {
    match terminal {
        Terminal::Completed => emitter.emit_completed(),
        Terminal::Failed(error) => emitter.emit_failed(error.clone()),
    }
}

//! Reference-counted multicasting.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::{CancelToken, Emitter, Observable};
use crate::hub::{Hub, Subject};

struct ShareState<T> {
    source: Observable<T>,
    subject: RefCell<Option<Subject<T>>>,
    connection: RefCell<Option<CancelToken>>,
    refcount: Cell<usize>,
}

impl<T: Clone + 'static> ShareState<T> {
    fn release(&self) {
        let remaining = self.refcount.get().saturating_sub(1);
        self.refcount.set(remaining);
        if remaining > 0 {
            return;
        }

        self.subject.borrow_mut().take();
        let connection = self.connection.borrow_mut().take();
        if let Some(token) = connection {
            token.cancel();
        }
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Shares one upstream subscription among all current subscribers.
    ///
    /// The upstream is subscribed when the first subscriber arrives and
    /// cancelled when the last one leaves. After the upstream terminates the
    /// next subscriber starts a fresh upstream subscription.
    #[must_use]
    pub fn share(&self) -> Observable<T> {
        let state = Rc::new(ShareState {
            source: self.clone(),
            subject: RefCell::new(None),
            connection: RefCell::new(None),
            refcount: Cell::new(0),
        });

        Observable::new(move |downstream: Emitter<T>| {
            let subject = state
                .subject
                .borrow_mut()
                .get_or_insert_with(Subject::new)
                .clone();

            state.refcount.set(state.refcount.get() + 1);
            let releasing = Rc::clone(&state);
            downstream.add_finalizer(move || releasing.release());

            subject.to_observable().run(downstream.clone());
            if downstream.is_closed() {
                return Ok(());
            }

            let connect = state.connection.borrow().is_none();
            if connect {
                let token = CancelToken::new();
                *state.connection.borrow_mut() = Some(token.clone());
                state.source.subscribe_with(token, subject);
            }
            Ok(())
        })
    }
}

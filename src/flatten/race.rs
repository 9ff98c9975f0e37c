//! First-source-wins selection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::{CancelToken, Emitter, Observable, Observer};
use crate::error::StreamError;

struct RaceState<T> {
    downstream: Emitter<T>,
    winner: Cell<Option<usize>>,
    tokens: RefCell<Vec<(usize, CancelToken)>>,
    empty_completions: Cell<usize>,
    total: usize,
}

impl<T> RaceState<T> {
    /// Returns true if `index` is (now) the winner.
    fn claim(&self, index: usize) -> bool {
        match self.winner.get() {
            Some(winner) => winner == index,
            None => {
                self.winner.set(Some(index));
                let losers: Vec<CancelToken> = self
                    .tokens
                    .borrow_mut()
                    .drain(..)
                    .filter(|(i, _)| *i != index)
                    .map(|(_, token)| token)
                    .collect();
                for token in losers {
                    token.cancel();
                }
                true
            }
        }
    }
}

struct Contender<T> {
    state: Rc<RaceState<T>>,
    index: usize,
}

impl<T> Observer<T> for Contender<T> {
    fn on_value(&self, value: T) -> Result<(), StreamError> {
        if self.state.claim(self.index) {
            self.state.downstream.emit_value(value);
        }
        Ok(())
    }

    fn on_completed(&self) {
        match self.state.winner.get() {
            Some(winner) if winner == self.index => self.state.downstream.emit_completed(),
            Some(_) => {}
            None => {
                let done = self.state.empty_completions.get() + 1;
                self.state.empty_completions.set(done);
                if done == self.state.total {
                    self.state.downstream.emit_completed();
                }
            }
        }
    }

    fn on_failed(&self, error: StreamError) {
        if self.state.claim(self.index) {
            self.state.downstream.emit_failed(error);
        }
    }
}

/// Mirrors whichever source first delivers a value or a failure.
///
/// Sources are subscribed in order; once a winner exists the remaining
/// sources are cancelled, and sources not yet subscribed never are. A source
/// completing without a value never wins. If every source completes without
/// a value the result completes, and an empty input completes immediately.
pub fn race<T: 'static>(sources: impl IntoIterator<Item = Observable<T>>) -> Observable<T> {
    let sources: Vec<Observable<T>> = sources.into_iter().collect();
    Observable::new(move |downstream: Emitter<T>| {
        if sources.is_empty() {
            downstream.emit_completed();
            return Ok(());
        }

        let state = Rc::new(RaceState {
            downstream: downstream.clone(),
            winner: Cell::new(None),
            tokens: RefCell::new(Vec::with_capacity(sources.len())),
            empty_completions: Cell::new(0),
            total: sources.len(),
        });

        for (index, source) in sources.iter().enumerate() {
            if downstream.is_closed() || state.winner.get().is_some() {
                break;
            }
            let token = downstream.token().child();
            state.tokens.borrow_mut().push((index, token.clone()));
            source.subscribe_with(
                token,
                Contender {
                    state: Rc::clone(&state),
                    index,
                },
            );
        }
        Ok(())
    })
}

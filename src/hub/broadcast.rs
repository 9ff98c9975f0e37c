//! The cross-context hub.

use std::fmt;
use std::rc::{Rc, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::{CancelToken, Emitter, Observable, Observer, Terminal};
use crate::error::{RxResult, StreamError};
use crate::runtime::{EventLoop, Pump};
use crate::transport::{BroadcastChannel, BroadcastConfig};

use super::shared::{deliver_terminal, HubCore};
use super::Hub;

struct BroadcastInner<T> {
    core: Rc<HubCore<T>>,
    channel: BroadcastChannel,
    token: CancelToken,
}

impl<T: DeserializeOwned + Clone + 'static> BroadcastInner<T> {
    fn fail_locally(&self, error: StreamError) {
        self.core.terminate(Terminal::Failed(error));
        self.token.cancel();
    }
}

impl<T: DeserializeOwned + Clone + 'static> Pump for BroadcastInner<T> {
    fn pump(&self, budget: usize) -> usize {
        let mut delivered = 0;
        while delivered < budget && !self.core.is_terminated() {
            let Some(payload) = self.channel.try_recv() else {
                break;
            };
            delivered += 1;

            match serde_json::from_str::<T>(&payload) {
                Ok(value) => self.core.deliver(&value),
                Err(err) => {
                    tracing::warn!(
                        channel = %self.channel.name(),
                        error = %err,
                        "undecodable broadcast payload"
                    );
                    self.fail_locally(StreamError::serialization(err.to_string()));
                }
            }
        }
        delivered
    }

    fn is_open(&self) -> bool {
        !self.channel.is_closed()
    }
}

/// Hub whose values travel to every other `BroadcastSubject` opened under the
/// same name, on this thread or any other.
///
/// Values are JSON-encoded on push and decoded on receipt. A local push is
/// never delivered to this instance's own consumers. Received values are
/// delivered when the owning `EventLoop` polls the hub. Terminal pushes stay
/// local and close the channel.
pub struct BroadcastSubject<T> {
    inner: Rc<BroadcastInner<T>>,
}

impl<T> Clone for BroadcastSubject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> BroadcastSubject<T>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    /// Opens a hub on the channel `name`, pumped by `event_loop`.
    ///
    /// # Errors
    ///
    /// Returns `RxError::Argument` if `name` is empty.
    pub fn open(name: &str, event_loop: &EventLoop) -> RxResult<Self> {
        Self::open_with_config(name, event_loop, &BroadcastConfig::default())
    }

    /// Opens a hub with an explicit channel configuration.
    ///
    /// # Errors
    ///
    /// Returns `RxError::Argument` if `name` is empty.
    pub fn open_with_config(
        name: &str,
        event_loop: &EventLoop,
        cfg: &BroadcastConfig,
    ) -> RxResult<Self> {
        let channel = BroadcastChannel::open(name, cfg, Some(event_loop.waker()))?;
        let inner = Rc::new(BroadcastInner {
            core: HubCore::new(),
            channel,
            token: CancelToken::new(),
        });

        let weak = Rc::downgrade(&inner);
        inner.token.on_cancel(move || {
            if let Some(inner) = weak.upgrade() {
                inner.channel.close();
            }
        });

        let pump: Weak<dyn Pump> = Rc::downgrade(&inner) as Weak<BroadcastInner<T>>;
        event_loop.register_pump(pump);

        Ok(Self { inner })
    }

    /// Closes the channel. Attached consumers stay attached but receive
    /// nothing further from other contexts.
    pub fn close(&self) {
        self.inner.token.cancel();
    }

    /// True once the channel is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.channel.is_closed()
    }

    /// The channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.channel.name()
    }
}

impl<T> Hub<T> for BroadcastSubject<T>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    fn push_value(&self, value: T) {
        if self.inner.core.is_terminated() {
            return;
        }

        let payload = match serde_json::to_string(&value) {
            Ok(payload) => payload,
            Err(err) => {
                self.inner
                    .fail_locally(StreamError::serialization(err.to_string()));
                return;
            }
        };

        if let Err(err) = self.inner.channel.post(&payload) {
            tracing::debug!(error = %err, "push on closed broadcast hub ignored");
        }
    }

    fn push_completed(&self) {
        self.inner.core.terminate(Terminal::Completed);
        self.inner.token.cancel();
    }

    fn push_failed(&self, error: StreamError) {
        self.inner.fail_locally(error);
    }

    fn to_observable(&self) -> Observable<T> {
        let core = Rc::clone(&self.inner.core);
        Observable::new(move |emitter: Emitter<T>| {
            match core.terminal() {
                Some(terminal) => deliver_terminal(&emitter, &terminal),
                None => core.register(emitter),
            }
            Ok(())
        })
    }

    fn terminal(&self) -> Option<Terminal> {
        self.inner.core.terminal()
    }

    fn consumer_count(&self) -> usize {
        self.inner.core.consumer_count()
    }
}

impl<T> Observer<T> for BroadcastSubject<T>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    fn on_value(&self, value: T) -> Result<(), StreamError> {
        self.push_value(value);
        Ok(())
    }

    fn on_completed(&self) {
        self.push_completed();
    }

    fn on_failed(&self, error: StreamError) {
        self.push_failed(error);
    }
}

impl<T> fmt::Debug for BroadcastSubject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastSubject")
            .field("channel", &self.inner.channel)
            .finish_non_exhaustive()
    }
}

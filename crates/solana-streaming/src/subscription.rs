//! Subscription handles.
//!
//! A subscription starts pending while its subscribe request is in flight and
//! only becomes a handle once the remote side acknowledges it with an id. The
//! handle is then `Active` until an unsubscribe (or, by default, a parameter
//! update) closes it.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::envelope::{self, Envelope, SubscriptionId};
use crate::error::{DecodeError, Error, Result};
use crate::registry::ReceiverKey;

/// Method used to change the parameters of a live subscription.
pub const UPDATE_SUBSCRIPTION_PARAMS: &str = "updateSubscriptionParams";

/// What a successful parameter update does to the handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateParamsMode {
    /// Close the handle like an unsubscribe; the caller must subscribe again.
    #[default]
    Teardown,
    /// Keep the handle live, moving it to the id returned by the update if
    /// the remote side assigned a new one.
    Rebind,
}

/// Lifecycle state of a subscription handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Notifications are being delivered.
    Active,
    /// The subscription was torn down; no further notifications arrive.
    Closed,
}

#[derive(Debug, Deserialize)]
struct SubscribeAck {
    #[serde(default)]
    message: String,
    #[serde(default)]
    subscription_id: SubscriptionId,
}

/// A live stream of notifications decoded as `N`, whose parameters can be
/// replaced with a `P`.
pub struct Subscription<N, P = Value> {
    id: SubscriptionId,
    state: SubscriptionState,
    messages: mpsc::Receiver<Envelope>,
    // Notifications pulled off `messages` while a request on this handle was
    // in flight, in arrival order.
    backlog: VecDeque<Envelope>,
    connection: Arc<Connection>,
    unsubscribe_method: String,
    _marker: PhantomData<fn(P) -> N>,
}

impl<N, P> Subscription<N, P>
where
    N: DeserializeOwned,
    P: Serialize,
{
    /// Subscribe with `method` and wrap the acknowledged id in a handle.
    ///
    /// Nothing is registered unless the remote side acknowledges the
    /// subscription with a non-zero id.
    pub(crate) async fn open(
        connection: Arc<Connection>,
        method: &str,
        unsubscribe_method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let result = connection.call(method, params, cancel).await?;
        let ack: SubscribeAck = envelope::decode_payload(result, "result")?;
        if ack.subscription_id == 0 {
            return Err(DecodeError::MissingPayload("subscription_id").into());
        }

        // Notifications sent between the acknowledgment and this registration
        // have no receiver yet and are dropped.
        let messages = connection.register_subscription(ack.subscription_id)?;
        info!(
            "Subscribed to {} as {} {}",
            method, ack.subscription_id, ack.message
        );

        Ok(Self {
            id: ack.subscription_id,
            state: SubscriptionState::Active,
            messages,
            backlog: VecDeque::new(),
            connection,
            unsubscribe_method: unsubscribe_method.to_string(),
            _marker: PhantomData,
        })
    }

    /// The id assigned by the remote side.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Wait for the next notification.
    ///
    /// Cancelling only abandons this wait; the subscription stays active.
    ///
    /// # Errors
    ///
    /// - [`Error::SubscriptionClosed`] once the handle is closed
    /// - [`Error::ConnectionLost`] once the connection has died
    /// - [`Error::Cancelled`] if `cancel` fires first
    /// - [`Error::Decoding`] if the notification has no params or they do
    ///   not fit `N`
    pub async fn receive(&mut self, cancel: &CancellationToken) -> Result<N> {
        if self.state == SubscriptionState::Closed {
            return Err(Error::SubscriptionClosed);
        }
        self.connection.ensure_live()?;

        let envelope = if let Some(envelope) = self.backlog.pop_front() {
            envelope
        } else {
            self.next_message(cancel).await?
        };

        if let Some(err) = envelope.remote_error() {
            return Err(err);
        }
        envelope.decode_params()
    }

    async fn next_message(&mut self, cancel: &CancellationToken) -> Result<Envelope> {
        tokio::select! {
            biased;
            message = self.messages.recv() => match message {
                Some(envelope) => Ok(envelope),
                None => {
                    self.state = SubscriptionState::Closed;
                    self.connection.ensure_live()?;
                    Err(Error::SubscriptionClosed)
                }
            },
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = self.connection.terminated() => Err(self.connection.lost()),
        }
    }

    /// Ask the remote side to stop the subscription, then close the handle.
    ///
    /// Any pending or later [`receive`](Self::receive) observes the closure.
    /// On failure the handle stays active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSubscription`] if the handle is already closed, or
    /// any error of the underlying request.
    pub async fn unsubscribe(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.state == SubscriptionState::Closed {
            return Err(Error::NoSubscription);
        }

        let params = json!({ "subscription_id": self.id });
        let method = self.unsubscribe_method.clone();
        self.call_draining(&method, params, cancel).await?;

        self.teardown();
        Ok(())
    }

    /// Change the parameters of the subscription.
    ///
    /// With [`UpdateParamsMode::Teardown`] a successful update closes the
    /// handle and the caller must subscribe again. With
    /// [`UpdateParamsMode::Rebind`] the handle stays active and notifications
    /// received while the update was in flight are still returned by
    /// [`receive`](Self::receive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSubscription`] if the handle is already closed,
    /// [`Error::Encoding`] if `params` cannot be serialized, or any error of
    /// the underlying request.
    pub async fn update_params(&mut self, params: &P, cancel: &CancellationToken) -> Result<()> {
        if self.state == SubscriptionState::Closed {
            return Err(Error::NoSubscription);
        }

        let payload = json!({
            "subscription_id": self.id,
            "params": envelope::to_payload(params)?,
        });
        let result = self
            .call_draining(UPDATE_SUBSCRIPTION_PARAMS, payload, cancel)
            .await?;

        match self.connection.config().update_params_mode {
            UpdateParamsMode::Teardown => {
                self.teardown();
                Ok(())
            }
            UpdateParamsMode::Rebind => self.rebind(result),
        }
    }

    /// Issue a request about this subscription while moving its pending
    /// notifications into the backlog.
    ///
    /// The reader blocks on a full subscription buffer, and the reply to
    /// this request queues behind it on the wire.
    async fn call_draining(
        &mut self,
        method: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        let connection = Arc::clone(&self.connection);
        let call = connection.call(method, Some(params), cancel);
        tokio::pin!(call);

        loop {
            tokio::select! {
                biased;
                result = &mut call => return result,
                message = self.messages.recv() => match message {
                    Some(envelope) => self.backlog.push_back(envelope),
                    None => return call.await,
                },
            }
        }
    }

    fn rebind(&mut self, result: Option<Value>) -> Result<()> {
        let new_id = result
            .as_ref()
            .and_then(|result| result.get("subscription_id"))
            .and_then(Value::as_u64)
            .filter(|id| *id != 0 && *id != self.id);

        let Some(new_id) = new_id else {
            debug!("Subscription {} kept its id after update", self.id);
            return Ok(());
        };

        self.connection
            .unregister(&ReceiverKey::Subscription(self.id));
        match self.connection.register_subscription(new_id) {
            Ok(messages) => {
                info!("Subscription {} rebound to {}", self.id, new_id);
                self.messages.close();
                while let Ok(envelope) = self.messages.try_recv() {
                    self.backlog.push_back(envelope);
                }
                self.messages = messages;
                self.id = new_id;
                Ok(())
            }
            Err(e) => {
                warn!("Could not rebind subscription {}: {}", self.id, e);
                self.messages.close();
                self.state = SubscriptionState::Closed;
                Err(e)
            }
        }
    }
}

impl<N, P> Subscription<N, P> {
    fn teardown(&mut self) {
        self.connection
            .unregister(&ReceiverKey::Subscription(self.id));
        self.messages.close();
        self.backlog.clear();
        self.state = SubscriptionState::Closed;
        info!("Subscription {} closed", self.id);
    }
}

impl<N, P> Drop for Subscription<N, P> {
    fn drop(&mut self) {
        if self.state == SubscriptionState::Active {
            debug!("Dropping active subscription {} without unsubscribing", self.id);
            self.connection
                .unregister(&ReceiverKey::Subscription(self.id));
        }
    }
}

impl<N, P> fmt::Debug for Subscription<N, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("backlog", &self.backlog.len())
            .field("unsubscribe_method", &self.unsubscribe_method)
            .finish_non_exhaustive()
    }
}

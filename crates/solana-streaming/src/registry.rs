//! Correlation registry mapping receiver keys to delivery channels.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use tokio::sync::{mpsc, oneshot};

use crate::envelope::{Envelope, RequestId, Route, SubscriptionId};
use crate::error::{Error, Result};

/// Key under which a waiting receiver is registered.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ReceiverKey {
    /// A synchronous call waiting for its reply.
    Request(RequestId),
    /// A subscription waiting for notifications.
    Subscription(SubscriptionId),
}

impl fmt::Display for ReceiverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(id) => write!(f, "request {id}"),
            Self::Subscription(id) => write!(f, "subscription {id}"),
        }
    }
}

/// Delivery channel for a registered receiver.
#[derive(Debug)]
pub enum Delivery {
    /// Consumed by exactly one reply, then gone.
    Once(oneshot::Sender<Envelope>),
    /// Buffered stream of notifications, kept until unsubscribe.
    Stream(mpsc::Sender<Envelope>),
}

/// Which receivers a global error is handed to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlobalErrorPolicy {
    /// Deliver to a single arbitrary registered receiver.
    #[default]
    FirstReceiver,
    /// Deliver to every registered receiver.
    Broadcast,
}

/// Receivers keyed by request or subscription id.
///
/// Lives behind the connection's registry lock; the map itself never leaves
/// this type.
#[derive(Debug, Default)]
pub struct Registry {
    receivers: HashMap<ReceiverKey, Delivery>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `delivery` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateReceiver`] if `key` is already taken; the
    /// existing receiver is left untouched.
    pub fn register(&mut self, key: ReceiverKey, delivery: Delivery) -> Result<()> {
        if self.receivers.contains_key(&key) {
            return Err(Error::DuplicateReceiver(key));
        }
        self.receivers.insert(key, delivery);
        Ok(())
    }

    /// Register a one-shot receiver under the first free request id drawn
    /// from `next_id`, and return that id.
    ///
    /// Drawn ids that are already taken are skipped, so an existing waiter
    /// is never displaced.
    pub fn insert_request(
        &mut self,
        sender: oneshot::Sender<Envelope>,
        mut next_id: impl FnMut() -> RequestId,
    ) -> RequestId {
        loop {
            let id = next_id();
            if let Entry::Vacant(entry) = self.receivers.entry(ReceiverKey::Request(id)) {
                entry.insert(Delivery::Once(sender));
                return id;
            }
        }
    }

    /// Remove the receiver under `key`. Removing an absent key is a no-op.
    pub fn unregister(&mut self, key: &ReceiverKey) -> Option<Delivery> {
        self.receivers.remove(key)
    }

    /// Whether a receiver is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &ReceiverKey) -> bool {
        self.receivers.contains_key(key)
    }

    /// Number of registered receivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    /// Whether no receivers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Resolve the delivery targets for an inbound envelope.
    ///
    /// One-shot receivers are taken out of the registry since they can only
    /// be used once; their owners unregister idempotently afterwards.
    /// Stream receivers stay registered and a sender clone is returned.
    pub fn lookup_matching(&mut self, route: Route, policy: GlobalErrorPolicy) -> Vec<Target> {
        match route {
            Route::Notification(id) => self.take(ReceiverKey::Subscription(id)).into_iter().collect(),
            Route::Response(id) => self.take(ReceiverKey::Request(id)).into_iter().collect(),
            Route::GlobalError => {
                let keys: Vec<ReceiverKey> = match policy {
                    GlobalErrorPolicy::FirstReceiver => {
                        self.receivers.keys().next().copied().into_iter().collect()
                    }
                    GlobalErrorPolicy::Broadcast => self.receivers.keys().copied().collect(),
                };
                keys.into_iter().filter_map(|key| self.take(key)).collect()
            }
            Route::Unroutable => Vec::new(),
        }
    }

    fn take(&mut self, key: ReceiverKey) -> Option<Target> {
        let delivery = match self.receivers.remove(&key)? {
            Delivery::Once(sender) => TargetDelivery::Once(sender),
            Delivery::Stream(sender) => {
                let delivery = TargetDelivery::Stream(sender.clone());
                self.receivers.insert(key, Delivery::Stream(sender));
                delivery
            }
        };
        Some(Target { key, delivery })
    }
}

/// A resolved delivery target, usable outside the registry lock.
#[derive(Debug)]
pub struct Target {
    /// Key the target was registered under.
    pub key: ReceiverKey,
    delivery: TargetDelivery,
}

#[derive(Debug)]
enum TargetDelivery {
    Once(oneshot::Sender<Envelope>),
    Stream(mpsc::Sender<Envelope>),
}

impl Target {
    /// Hand `envelope` to the receiver.
    ///
    /// One-shot delivery never waits. Stream delivery waits only while the
    /// subscription buffer is full. Returns `false` if the receiver is gone.
    pub async fn deliver(self, envelope: Envelope) -> bool {
        match self.delivery {
            TargetDelivery::Once(sender) => sender.send(envelope).is_ok(),
            TargetDelivery::Stream(sender) => match sender.try_send(envelope) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(envelope)) => {
                    sender.send(envelope).await.is_ok()
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
        }
    }

    /// Hand `envelope` to the receiver without ever waiting.
    ///
    /// Returns `false` if the receiver is gone or its buffer is full; the
    /// envelope is dropped in both cases.
    pub fn try_deliver(self, envelope: Envelope) -> bool {
        match self.delivery {
            TargetDelivery::Once(sender) => sender.send(envelope).is_ok(),
            TargetDelivery::Stream(sender) => sender.try_send(envelope).is_ok(),
        }
    }
}

//! A live connection: write path, correlation registry, and terminal state.

use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ClientConfig;
use crate::dispatch;
use crate::envelope::{self, Envelope, RequestId, Route, SubscriptionId};
use crate::error::{Error, Result, TerminalError};
use crate::registry::{Delivery, ReceiverKey, Registry};
use crate::transport::{FrameReader, FrameWriter};

/// Largest request id handed out. Ids are drawn uniformly from `1..=MAX_REQUEST_ID`.
pub const MAX_REQUEST_ID: RequestId = i32::MAX as RequestId;

/// Shared state of one connection.
///
/// The registry lock is never held across an await point; the writer lock
/// serializes whole frames.
pub struct Connection {
    config: ClientConfig,
    writer: tokio::sync::Mutex<Box<dyn FrameWriter>>,
    registry: Mutex<Registry>,
    terminal: OnceLock<TerminalError>,
    terminated: CancellationToken,
}

impl Connection {
    /// Wrap an established transport and start its dispatch loop.
    pub(crate) fn start(
        config: ClientConfig,
        writer: Box<dyn FrameWriter>,
        reader: Box<dyn FrameReader>,
    ) -> Arc<Self> {
        let connection = Arc::new(Self {
            config,
            writer: tokio::sync::Mutex::new(writer),
            registry: Mutex::new(Registry::new()),
            terminal: OnceLock::new(),
            terminated: CancellationToken::new(),
        });

        tokio::spawn(dispatch::run(Arc::clone(&connection), reader));

        connection
    }

    /// The terminal error, once one has been recorded.
    pub(crate) fn terminal_error(&self) -> Option<TerminalError> {
        self.terminal.get().cloned()
    }

    /// Record why the connection died. The first recorded reason wins.
    pub(crate) fn set_terminal(&self, reason: TerminalError) {
        match self.terminal.set(reason) {
            Ok(()) => info!("Connection terminated: {}", self.lost()),
            Err(ignored) => debug!("Connection already terminated, ignoring: {}", ignored),
        }
        self.terminated.cancel();
    }

    /// Resolves once the connection has a terminal error.
    pub(crate) async fn terminated(&self) {
        self.terminated.cancelled().await;
    }

    /// The error returned to callers of a dead connection.
    pub(crate) fn lost(&self) -> Error {
        Error::ConnectionLost(self.terminal_error().unwrap_or(TerminalError::Closed))
    }

    /// Fail fast when the connection is already dead.
    pub(crate) fn ensure_live(&self) -> Result<()> {
        match self.terminal.get() {
            Some(reason) => Err(Error::ConnectionLost(reason.clone())),
            None => Ok(()),
        }
    }

    pub(crate) const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn registered_receivers(&self) -> usize {
        self.registry.lock().len()
    }

    pub(crate) fn is_registered(&self, key: &ReceiverKey) -> bool {
        self.registry.lock().contains(key)
    }

    /// Register a buffered stream receiver for `id`.
    pub(crate) fn register_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<mpsc::Receiver<Envelope>> {
        let (tx, rx) = mpsc::channel(self.config.subscription_buffer.max(1));
        self.registry
            .lock()
            .register(ReceiverKey::Subscription(id), Delivery::Stream(tx))?;
        Ok(rx)
    }

    /// Remove a receiver. Absent keys are ignored.
    pub(crate) fn unregister(&self, key: &ReceiverKey) {
        if self.registry.lock().unregister(key).is_some() {
            debug!("Unregistered receiver for {}", key);
        }
    }

    /// Encode and write one envelope.
    pub(crate) async fn send(&self, envelope: &Envelope) -> Result<()> {
        self.ensure_live()?;

        let frame = envelope::encode(envelope).inspect_err(|e| error!("Encode failed: {}", e))?;
        debug!("Sending frame: {}", frame);

        let mut writer = self.writer.lock().await;
        writer.write_frame(frame).await.map_err(|e| {
            error!("Write failed: {}", e);
            Error::Write(e)
        })
    }

    /// Issue a request and wait for its reply.
    ///
    /// The reply's result payload is returned as-is. The wait ends on the
    /// first of: reply, cancellation, connection death, or the request
    /// timeout. The request's receiver is unregistered on every exit path.
    #[instrument(skip(self, params, cancel))]
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        self.ensure_live()?;

        let (tx, rx) = oneshot::channel();
        let guard = self.register_request(tx);
        let request_id = guard.id;

        self.send(&Envelope::request(request_id, method, params))
            .await?;

        let timeout = self.config.request_timeout;
        let reply = tokio::select! {
            biased;
            reply = rx => reply.map_err(|_| self.lost())?,
            () = cancel.cancelled() => return Err(Error::Cancelled),
            () = self.terminated() => return Err(self.lost()),
            () = tokio::time::sleep(timeout) => {
                error!("Request {} timed out after {:?}", request_id, timeout);
                return Err(Error::Timeout(timeout));
            }
        };
        drop(guard);

        if let Some(err) = reply.remote_error() {
            warn!("Request {} rejected: {}", request_id, err);
            return Err(err);
        }

        Ok(reply.result)
    }

    /// Write a close frame and mark the connection closed.
    pub(crate) async fn close(&self) -> Result<()> {
        self.set_terminal(TerminalError::Closed);
        let mut writer = self.writer.lock().await;
        writer.close().await.map_err(Error::Write)
    }

    /// Route one decoded envelope to its receivers.
    ///
    /// Breaks when the envelope was a global error; the caller must stop
    /// reading.
    pub(crate) async fn dispatch(&self, envelope: Envelope) -> ControlFlow<()> {
        let route = envelope.route();
        let targets = self
            .registry
            .lock()
            .lookup_matching(route, self.config.global_error_policy);

        if route == Route::GlobalError {
            let error = envelope.error.clone().unwrap_or_default();
            warn!(
                "Global error {}: {} delivered to {} receiver(s)",
                error.code,
                error.message,
                targets.len()
            );
            // The loop stops here, so a full subscription buffer drops the
            // error instead of holding back the terminal state.
            for target in targets {
                let key = target.key;
                if !target.try_deliver(envelope.clone()) {
                    debug!("Global error not delivered to {}", key);
                }
            }
            self.set_terminal(TerminalError::RemoteFault {
                code: error.code,
                message: error.message,
            });
            return ControlFlow::Break(());
        }

        if targets.is_empty() {
            debug!("No receiver for {:?}, dropping", route);
        }
        for target in targets {
            let key = target.key;
            // A full subscription buffer must not outlive the connection.
            tokio::select! {
                delivered = target.deliver(envelope.clone()) => {
                    if !delivered {
                        debug!("Receiver for {} is gone", key);
                    }
                }
                () = self.terminated() => return ControlFlow::Break(()),
            }
        }

        ControlFlow::Continue(())
    }

    fn register_request(&self, tx: oneshot::Sender<Envelope>) -> RequestGuard<'_> {
        let id = self.registry.lock().insert_request(tx, random_request_id);
        RequestGuard {
            connection: self,
            id,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.config.endpoint)
            .field("terminal", &self.terminal.get())
            .finish_non_exhaustive()
    }
}

fn random_request_id() -> RequestId {
    rand::thread_rng().gen_range(1..=MAX_REQUEST_ID)
}

/// Unregisters a request receiver when the call ends, however it ends.
struct RequestGuard<'a> {
    connection: &'a Connection,
    id: RequestId,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.connection.unregister(&ReceiverKey::Request(self.id));
    }
}

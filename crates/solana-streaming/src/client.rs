//! Streaming client.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::envelope::{self, SubscriptionId};
use crate::error::{Error, Result, TerminalError};
use crate::registry::{GlobalErrorPolicy, ReceiverKey};
use crate::subscription::{Subscription, UpdateParamsMode};
use crate::topics::{
    LatestBlock, LatestBlockSubscription, NewPairSubscribeParams, NewPairs, NewPairsSubscription,
    SwapSubscribeParams, Swaps, SwapsSubscription, Topic,
};
use crate::transport::{Credentials, Transport, WebSocketTransport};

/// Builder for creating clients.
#[derive(Debug)]
pub struct ClientBuilder {
    api_key: Option<String>,
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Create a new client builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: None,
            config: ClientConfig::default(),
            transport: None,
        }
    }

    /// Set the API key presented when connecting.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the endpoint to dial.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set how long requests wait for their reply.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the per-subscription notification buffer.
    #[must_use]
    pub const fn subscription_buffer(mut self, capacity: usize) -> Self {
        self.config.subscription_buffer = capacity;
        self
    }

    /// Set who receives errors bound to no request or subscription.
    #[must_use]
    pub const fn global_error_policy(mut self, policy: GlobalErrorPolicy) -> Self {
        self.config.global_error_policy = policy;
        self
    }

    /// Set what a successful parameter update does to a subscription.
    #[must_use]
    pub const fn update_params_mode(mut self, mode: UpdateParamsMode) -> Self {
        self.config.update_params_mode = mode;
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `transport` instead of WebSockets.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        self.transport = Some(transport);
        self
    }

    /// Build the client. No connection is made until [`Client::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if no API key was given or the
    /// endpoint is not a valid URL.
    pub fn build(self) -> Result<Client> {
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::InvalidConfig("API key not specified".to_string()))?;
        let endpoint = Url::parse(&self.config.endpoint)
            .map_err(|e| Error::InvalidConfig(format!("invalid endpoint: {e}")))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(WebSocketTransport::new()),
        };

        Ok(Client {
            endpoint,
            credentials: Credentials::new(api_key),
            config: self.config,
            transport,
            connection: RwLock::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Client multiplexing requests and subscriptions over one connection.
#[derive(Debug)]
pub struct Client {
    endpoint: Url,
    credentials: Credentials,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    connection: RwLock<Option<Arc<Connection>>>,
    // Held across the liveness check, the dial and the swap.
    connect_lock: tokio::sync::Mutex<()>,
}

impl Client {
    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client for the hosted service with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `api_key` is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Establish the connection and start reading from it.
    ///
    /// A client whose previous connection died may connect again; existing
    /// subscriptions stay bound to the dead connection. Concurrent calls are
    /// serialized, so only one of them dials.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyConnected`] if a live connection exists
    /// - [`Error::RateLimitExceeded`] if the handshake was refused for rate limiting
    /// - [`Error::Connect`] for any other dial failure
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn connect(&self) -> Result<()> {
        let _connecting = self.connect_lock.lock().await;
        if self
            .current()
            .is_some_and(|connection| connection.terminal_error().is_none())
        {
            return Err(Error::AlreadyConnected);
        }

        let (writer, reader) = self
            .transport
            .connect(&self.endpoint, &self.credentials)
            .await
            .inspect_err(|e| error!("Dial failed: {}", e))?;

        let connection = Connection::start(self.config.clone(), writer, reader);
        let previous = self.connection.write().replace(connection);
        if let Some(previous) = previous {
            previous.set_terminal(TerminalError::Closed);
        }

        info!("Connected to {}", self.endpoint);
        Ok(())
    }

    /// Close the connection. Closing a client that never connected is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the close frame could not be written.
    pub async fn close(&self) -> Result<()> {
        let Some(connection) = self.current() else {
            return Ok(());
        };
        connection.close().await
    }

    /// Why the current connection died, if it has.
    #[must_use]
    pub fn terminal_error(&self) -> Option<TerminalError> {
        self.current()
            .and_then(|connection| connection.terminal_error())
    }

    /// Whether the current connection has died.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminal_error().is_some()
    }

    /// Number of receivers currently waiting on the connection.
    #[must_use]
    pub fn registered_receivers(&self) -> usize {
        self.current()
            .map_or(0, |connection| connection.registered_receivers())
    }

    /// Whether a subscription receiver is registered for `id`.
    #[must_use]
    pub fn has_subscription(&self, id: SubscriptionId) -> bool {
        self.current()
            .is_some_and(|connection| connection.is_registered(&ReceiverKey::Subscription(id)))
    }

    /// Issue a request and decode its result as `R`.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] if the remote side rejected the request
    /// - [`Error::Timeout`] if no reply arrived in time
    /// - [`Error::Cancelled`] if `cancel` fired first
    /// - [`Error::ConnectionLost`] if the connection died
    /// - [`Error::Decoding`] if the result is missing or does not fit `R`
    pub async fn call<R>(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let result = self.connected()?.call(method, params, cancel).await?;
        envelope::decode_payload(result, "result")
    }

    /// Subscribe to topic `T`.
    ///
    /// # Errors
    ///
    /// Any error of the subscribe request, or [`Error::Decoding`] if the
    /// acknowledgment carries no subscription id.
    pub async fn subscribe<T>(
        &self,
        params: Option<&T::Params>,
        cancel: &CancellationToken,
    ) -> Result<Subscription<T::Notification, T::Params>>
    where
        T: Topic,
    {
        let params = params.map(envelope::to_payload).transpose()?;
        Subscription::open(self.connected()?, T::SUBSCRIBE, T::UNSUBSCRIBE, params, cancel).await
    }

    /// Subscribe with explicit method names, decoding notifications as `N`.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub async fn subscribe_raw<N>(
        &self,
        method: &str,
        unsubscribe_method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Subscription<N>>
    where
        N: DeserializeOwned,
    {
        Subscription::open(self.connected()?, method, unsubscribe_method, params, cancel).await
    }

    /// Subscribe to new trading pairs.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub async fn subscribe_new_pairs(
        &self,
        params: Option<&NewPairSubscribeParams>,
        cancel: &CancellationToken,
    ) -> Result<NewPairsSubscription> {
        self.subscribe::<NewPairs>(params, cancel).await
    }

    /// Subscribe to swaps.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub async fn subscribe_swaps(
        &self,
        params: Option<&SwapSubscribeParams>,
        cancel: &CancellationToken,
    ) -> Result<SwapsSubscription> {
        self.subscribe::<Swaps>(params, cancel).await
    }

    /// Subscribe to the latest processed block.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub async fn subscribe_latest_block(
        &self,
        params: Option<&NewPairSubscribeParams>,
        cancel: &CancellationToken,
    ) -> Result<LatestBlockSubscription> {
        self.subscribe::<LatestBlock>(params, cancel).await
    }

    fn current(&self) -> Option<Arc<Connection>> {
        self.connection.read().clone()
    }

    fn connected(&self) -> Result<Arc<Connection>> {
        let connection = self.current().ok_or(Error::NotConnected)?;
        connection.ensure_live()?;
        Ok(connection)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.set_terminal(TerminalError::Closed);
        }
    }
}

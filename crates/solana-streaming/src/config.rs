//! Client configuration.

use std::time::Duration;

use crate::registry::GlobalErrorPolicy;
use crate::subscription::UpdateParamsMode;

/// Endpoint of the hosted service.
pub const DEFAULT_ENDPOINT: &str = "wss://api.solanastreaming.com";

/// How long a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Notifications buffered per subscription before the reader waits.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 32;

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint to dial.
    pub endpoint: String,
    /// How long a request waits for its reply.
    pub request_timeout: Duration,
    /// Per-subscription notification buffer. Values below one are raised to one.
    pub subscription_buffer: usize,
    /// Who receives an error that is bound to no request or subscription.
    pub global_error_policy: GlobalErrorPolicy,
    /// What a successful parameter update does to the subscription handle.
    pub update_params_mode: UpdateParamsMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
            global_error_policy: GlobalErrorPolicy::default(),
            update_params_mode: UpdateParamsMode::default(),
        }
    }
}

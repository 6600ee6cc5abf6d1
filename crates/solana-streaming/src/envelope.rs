//! Wire envelope and its JSON codec.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, Error, Result};

/// Correlation identifier of a request. Zero means absent.
pub type RequestId = i64;

/// Identifier assigned by the remote side to a subscription. Zero means absent.
pub type SubscriptionId = u64;

/// Error object carried by an envelope.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct ErrorObject {
    /// Error code. Zero is treated as "no error" on responses.
    #[serde(default)]
    pub code: i64,
    /// Human-readable description.
    #[serde(default)]
    pub message: String,
}

/// The unit exchanged on the wire in both directions.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Envelope {
    /// Request id, `0` for notifications.
    #[serde(default)]
    pub id: RequestId,

    /// Subscription id, `0` when the envelope is not a notification.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub subscription_id: SubscriptionId,

    /// Request method or notification name.
    #[serde(default)]
    pub method: String,

    /// Request arguments or notification payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Response payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error reported by the remote side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

const fn is_zero(value: &SubscriptionId) -> bool {
    *value == 0
}

/// How the dispatch loop should treat an inbound envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// An error bound to neither a request nor a subscription.
    GlobalError,
    /// A notification for a subscription.
    Notification(SubscriptionId),
    /// A reply to a request.
    Response(RequestId),
    /// Nothing to route on.
    Unroutable,
}

impl Envelope {
    /// Build an outgoing request envelope.
    #[must_use]
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            ..Self::default()
        }
    }

    /// Classify the envelope for routing.
    ///
    /// Notifications win over responses when both ids are present.
    #[must_use]
    pub fn route(&self) -> Route {
        if self.id == 0 && self.subscription_id == 0 {
            return match &self.error {
                Some(error) if !error.message.is_empty() => Route::GlobalError,
                _ => Route::Unroutable,
            };
        }

        if self.subscription_id != 0 {
            Route::Notification(self.subscription_id)
        } else {
            Route::Response(self.id)
        }
    }

    /// The remote error carried by this envelope.
    ///
    /// Replies only count as failed when the code is non-zero; a global error
    /// counts whenever it is routed as one.
    #[must_use]
    pub fn remote_error(&self) -> Option<Error> {
        let global = self.route() == Route::GlobalError;
        self.error
            .as_ref()
            .filter(|error| error.code != 0 || global)
            .map(|error| Error::Remote {
                code: error.code,
                message: error.message.clone(),
            })
    }

    /// Decode the result payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingPayload`] if there is no result, or
    /// [`DecodeError::Malformed`] if it does not fit `T`.
    pub fn decode_result<T: DeserializeOwned>(self) -> Result<T> {
        decode_payload(self.result, "result")
    }

    /// Decode the params payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingPayload`] if there are no params, or
    /// [`DecodeError::Malformed`] if they do not fit `T`.
    pub fn decode_params<T: DeserializeOwned>(self) -> Result<T> {
        decode_payload(self.params, "params")
    }
}

pub(crate) fn decode_payload<T: DeserializeOwned>(
    payload: Option<Value>,
    name: &'static str,
) -> Result<T> {
    let payload = payload.ok_or(DecodeError::MissingPayload(name))?;
    serde_json::from_value(payload)
        .map_err(DecodeError::Malformed)
        .map_err(Into::into)
}

/// Serialize an envelope into a text frame.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if a payload cannot be serialized.
pub fn encode(envelope: &Envelope) -> Result<String> {
    serde_json::to_string(envelope).map_err(Error::Encoding)
}

/// Parse a text frame into an envelope.
///
/// # Errors
///
/// Returns [`Error::Decoding`] if the frame is not a well-formed envelope.
pub fn decode(frame: &str) -> Result<Envelope> {
    serde_json::from_str(frame)
        .map_err(DecodeError::Malformed)
        .map_err(Into::into)
}

/// Serialize caller-supplied parameters into a payload.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if `params` cannot be represented as JSON.
pub fn to_payload<P: Serialize + ?Sized>(params: &P) -> Result<Value> {
    serde_json::to_value(params).map_err(Error::Encoding)
}

//! WebSocket transport.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use super::{Credentials, FrameReader, FrameWriter, Transport, TransportError};

/// Header carrying the API key during the handshake.
pub const API_KEY_HEADER: &str = "x-api-key";

/// User agent announced during the handshake.
pub const USER_AGENT: &str = "solana-streaming-client-rust";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport over `ws://` or `wss://` endpoints.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
    ) -> Result<(Box<dyn FrameWriter>, Box<dyn FrameReader>), TransportError> {
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }

        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        let api_key = HeaderValue::from_str(&credentials.api_key)
            .map_err(|e| TransportError::ConnectionFailed(format!("invalid API key: {e}")))?;
        request.headers_mut().insert(API_KEY_HEADER, api_key);
        request
            .headers_mut()
            .insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));

        debug!("Connecting to WebSocket at {}", endpoint);

        let (stream, _) = connect_async(request).await.map_err(handshake_error)?;
        let (sink, stream) = stream.split();

        Ok((
            Box::new(WebSocketWriter { sink }),
            Box::new(WebSocketReader { stream }),
        ))
    }
}

fn handshake_error(err: WsError) -> TransportError {
    match err {
        WsError::Http(response) => {
            let body = response
                .body()
                .as_deref()
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .unwrap_or_default();
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                TransportError::RateLimited(body)
            } else {
                TransportError::ConnectionFailed(format!(
                    "handshake rejected with {}: {body}",
                    response.status()
                ))
            }
        }
        WsError::Io(e) => TransportError::Io(e),
        other => TransportError::ConnectionFailed(other.to_string()),
    }
}

struct WebSocketWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for WebSocketWriter {
    async fn write_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::text(frame))
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))
    }
}

struct WebSocketReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WebSocketReader {
    async fn read_frame(&mut self) -> Result<String, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(text),
                    Err(_) => warn!("Dropping non-UTF-8 binary frame of {} bytes", data.len()),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("WebSocket closed by peer: {:?}", frame);
                    return Err(TransportError::ConnectionClosed);
                }
                // Ping and pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError::Io(std::io::Error::other(e))),
                None => return Err(TransportError::ConnectionClosed),
            }
        }
    }
}

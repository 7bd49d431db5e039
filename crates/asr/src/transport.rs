//! Duplex transport abstraction and the WebSocket implementation.
//!
//! The driver only ever sees the two halves below, so tests can run the
//! whole streaming pipeline over in-memory channels.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{AsrError, Result};

/// Outbound half of a duplex transport.
pub trait TransportSink: Send {
    /// Sends one binary message.
    fn send(
        &mut self,
        data: Vec<u8>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>>;

    /// Closes the outbound side.
    fn close(
        &mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>>;
}

/// Inbound half of a duplex transport.
pub trait TransportStream: Send {
    /// Receives the next binary message; `None` means the peer closed.
    fn recv(
        &mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Vec<u8>>>> + Send + '_>>;
}

type WsInner = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound WebSocket half.
pub struct WsSink {
    inner: SplitSink<WsInner, Message>,
}

/// Inbound WebSocket half.
pub struct WsStream {
    inner: SplitStream<WsInner>,
}

/// WebSocket transport connector.
pub struct WsTransport;

impl WsTransport {
    /// Connects and upgrades within `timeout`, sending the given extra
    /// headers on the upgrade request.
    pub async fn connect(
        url: &str,
        headers: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<(WsSink, WsStream)> {
        let mut request = url
            .into_client_request()
            .map_err(|e| AsrError::Transport(format!("invalid websocket url: {e}")))?;

        for (name, value) in headers {
            let value = HeaderValue::from_str(value)
                .map_err(|e| AsrError::Transport(format!("invalid header value: {e}")))?;
            request.headers_mut().insert(*name, value);
        }

        debug!(%url, "connecting websocket");
        let (ws, response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| AsrError::Timeout("websocket connect".to_string()))??;
        debug!(status = %response.status(), "websocket connected");

        let (sink, stream) = ws.split();
        Ok((WsSink { inner: sink }, WsStream { inner: stream }))
    }
}

impl TransportSink for WsSink {
    fn send(
        &mut self,
        data: Vec<u8>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            trace!(bytes = data.len(), "sending binary message");
            self.inner
                .send(Message::Binary(data))
                .await
                .map_err(AsrError::from)
        })
    }

    fn close(
        &mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.inner.close().await.map_err(AsrError::from) })
    }
}

impl TransportStream for WsStream {
    fn recv(
        &mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Vec<u8>>>> + Send + '_>>
    {
        Box::pin(async move {
            loop {
                match self.inner.next().await {
                    Some(Ok(Message::Binary(data))) => {
                        trace!(bytes = data.len(), "received binary message");
                        return Ok(Some(data));
                    }
                    // Control frames are handled by the protocol layer;
                    // text frames never occur on this endpoint.
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Text(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    Some(Ok(Message::Frame(_))) => continue,
                    Some(Err(e)) => return Err(AsrError::from(e)),
                }
            }
        })
    }
}

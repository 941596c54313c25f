// ============================================
// File: crates/sealpost-transport/src/ws.rs
// ============================================
//! # WebSocket Transport
//!
//! ## Creation Reason
//! Clients reach the relay over WebSocket. This module upgrades accepted
//! TCP streams, dials the relay from clients, and adapts the split stream
//! to [`FrameSource`] / [`FrameSink`].
//!
//! ## Frame Handling
//! | Incoming     | Result                                   |
//! |--------------|------------------------------------------|
//! | Text         | returned                                 |
//! | Binary       | returned if valid UTF-8, else rejected   |
//! | Ping / Pong  | skipped (tungstenite answers pings)      |
//! | Close / EOF  | `Ok(None)`                               |
//!
//! ## Last Modified
//! v0.1.0 - Initial WebSocket transport

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{FrameSink, FrameSource};

/// Receiving half of a WebSocket.
pub struct WsFrameSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Sending half of a WebSocket.
pub struct WsFrameSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    closed: bool,
}

/// Splits an established WebSocket into frame halves.
pub fn split<S>(ws: WebSocketStream<S>) -> (WsFrameSink<S>, WsFrameSource<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (sink, stream) = ws.split();
    (
        WsFrameSink {
            sink,
            closed: false,
        },
        WsFrameSource { stream },
    )
}

/// Performs the server side of the WebSocket upgrade on an accepted socket.
///
/// # Errors
/// `Handshake` if the client does not complete a valid upgrade.
pub async fn accept(stream: TcpStream) -> Result<(WsFrameSink<TcpStream>, WsFrameSource<TcpStream>)> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(TransportError::handshake)?;
    Ok(split(ws))
}

/// Dials a relay at `url` (`ws://host:port/`).
///
/// # Errors
/// `Handshake` if the connection or upgrade fails.
pub async fn connect(
    url: &str,
) -> Result<(
    WsFrameSink<MaybeTlsStream<TcpStream>>,
    WsFrameSource<MaybeTlsStream<TcpStream>>,
)> {
    let (ws, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(TransportError::handshake)?;
    debug!(url = %url, "WebSocket connected");
    Ok(split(ws))
}

#[async_trait]
impl<S> FrameSource for WsFrameSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<String>> {
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(data)) => {
                    return String::from_utf8(data).map(Some).map_err(|_| {
                        TransportError::UnsupportedFrame {
                            kind: "binary".into(),
                        }
                    });
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                    trace!("Skipping control frame");
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Peer sent close frame");
                    return Ok(None);
                }
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<S> FrameSink for WsFrameSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sink
            .send(Message::Text(frame))
            .await
            .map_err(|e| TransportError::SendFailed {
                reason: e.to_string(),
            })
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.sink.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed {
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_accept_and_connect_exchange_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut sink, mut source) = accept(stream).await.unwrap();
            let frame = source.recv().await.unwrap().unwrap();
            sink.send(format!("echo:{frame}")).await.unwrap();
            sink.close().await.unwrap();
        });

        let (mut sink, mut source) = connect(&format!("ws://{addr}/")).await.unwrap();
        sink.send("ping".to_string()).await.unwrap();
        assert_eq!(source.recv().await.unwrap().as_deref(), Some("echo:ping"));
        assert_eq!(source.recv().await.unwrap(), None);

        server.await.unwrap();
    }
}

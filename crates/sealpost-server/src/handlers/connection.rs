// ============================================
// File: crates/sealpost-server/src/handlers/connection.rs
// ============================================
//! # Connection Handler
//!
//! ## Creation Reason
//! Drives one client connection from handshake to close, independent of
//! the transport underneath (WebSocket in production, mock in tests).
//!
//! ## Connection State Machine
//! ```text
//! ┌─────────────────┐  auth ok   ┌───────────────┐  peer close / idle /   ┌────────┐
//! │ Unauthenticated │ ─────────► │ Authenticated │ ─────────────────────► │ Closed │
//! └────────┬────────┘            └───────────────┘  shutdown / I/O error  └────────┘
//!          │ bad token / not auth / timeout                                   ▲
//!          └──────────── error{authentication_failed} ────────────────────────┘
//! ```
//!
//! ## Main Loop
//! ```text
//! tokio::select! {
//!     shutdown        → close
//!     idle deadline   → close
//!     inbound frame   → dispatch → reply on this connection
//!     outbound queue  → deliveries targeted at this connection
//!     presence event  → userStatus (onlineUsers after a lag)
//! }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `disconnect` runs on every exit path after a successful handshake
//! - A bad frame is answered with an error and the loop continues; only
//!   transport failures end an authenticated connection
//! - Replies (acks, history, lookups) go straight to this sink. Nothing
//!   targeted at one connection ever goes through presence
//! - Any inbound frame or any successful delivery/presence write keeps the
//!   connection alive; a receive-only client is not idle while traffic flows
//! - A lagged presence subscriber is resynced with a fresh `onlineUsers`
//!
//! ## Last Modified
//! v0.1.0 - Initial connection handler

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use sealpost_common::ConnectionId;
use sealpost_core::protocol::{ClientFrame, FrameCodec, ServerFrame, PROTOCOL_VERSION};
use sealpost_transport::{FrameSink, FrameSource};

use crate::error::{Result, ServerError};
use crate::services::auth::AuthenticatedUser;
use crate::services::relay::{Attachment, RelayRouter};

/// Per-connection timing and size limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Time allowed for the `auth` frame
    pub handshake_timeout: Duration,
    /// Close after this long without an inbound frame
    pub idle_timeout: Duration,
    /// Largest accepted frame
    pub max_frame_bytes: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
            max_frame_bytes: sealpost_core::protocol::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Handshake did not produce an identity
    Rejected,
    /// Peer closed the transport
    PeerClosed,
    /// No traffic in either direction within the idle timeout
    Idle,
    /// Server shutdown
    Shutdown,
}

/// Serves connections against one router.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    router: Arc<RelayRouter>,
    codec: FrameCodec,
    limits: ConnectionLimits,
}

impl ConnectionHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(router: Arc<RelayRouter>, limits: ConnectionLimits) -> Self {
        Self {
            router,
            codec: FrameCodec::new(limits.max_frame_bytes),
            limits,
        }
    }

    /// Router this handler dispatches to.
    #[must_use]
    pub fn router(&self) -> &Arc<RelayRouter> {
        &self.router
    }

    /// Runs one connection to completion.
    ///
    /// # Errors
    /// Transport errors after the handshake; the connection is deregistered
    /// either way.
    pub async fn run<R, W>(
        &self,
        mut source: R,
        mut sink: W,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<CloseReason>
    where
        R: FrameSource,
        W: FrameSink,
    {
        let user = tokio::select! {
            _ = shutdown.recv() => return Ok(CloseReason::Shutdown),
            result = self.handshake(&mut source) => result,
        };

        let user = match user {
            Ok(user) => user,
            Err(e) => {
                debug!(error = %e, "Handshake failed");
                let _ = self.write(&mut sink, &e.to_error_frame()).await;
                let _ = sink.close().await;
                return Ok(CloseReason::Rejected);
            }
        };

        let mut attachment = self.router.connect(&user);
        let id = attachment.id;

        let result = self
            .serve(&user, &mut attachment, &mut source, &mut sink, &mut shutdown)
            .await;

        self.router.disconnect(user.id, id);
        let _ = sink.close().await;

        match &result {
            Ok(reason) => info!(user_id = %user.id, connection = %id, reason = ?reason, "Connection closed"),
            Err(e) => warn!(user_id = %user.id, connection = %id, error = %e, "Connection failed"),
        }
        result
    }

    /// Reads and verifies the first frame.
    async fn handshake<R: FrameSource>(&self, source: &mut R) -> Result<AuthenticatedUser> {
        let first = tokio::time::timeout(self.limits.handshake_timeout, source.recv())
            .await
            .map_err(|_| ServerError::authentication_failed("handshake timed out"))?
            .map_err(|e| ServerError::authentication_failed(e.to_string()))?
            .ok_or_else(|| ServerError::authentication_failed("closed before auth"))?;

        match self.codec.decode_client(&first) {
            Ok(ClientFrame::Auth { token }) => self.router.authenticate(&token).await,
            Ok(other) => Err(ServerError::authentication_failed(format!(
                "first frame was {}",
                other.kind()
            ))),
            Err(e) => Err(ServerError::authentication_failed(e.to_string())),
        }
    }

    /// Authenticated phase.
    async fn serve<R, W>(
        &self,
        user: &AuthenticatedUser,
        attachment: &mut Attachment,
        source: &mut R,
        sink: &mut W,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<CloseReason>
    where
        R: FrameSource,
        W: FrameSink,
    {
        self.write(
            sink,
            &ServerFrame::Authenticated {
                user_id: user.id,
                protocol_version: PROTOCOL_VERSION,
            },
        )
        .await?;
        self.write(sink, &ServerFrame::OnlineUsers(std::mem::take(&mut attachment.online)))
            .await?;

        let idle = tokio::time::sleep(self.limits.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(CloseReason::Shutdown),

                () = &mut idle => {
                    debug!(user_id = %user.id, connection = %attachment.id, "Idle timeout");
                    return Ok(CloseReason::Idle);
                }

                inbound = source.recv() => {
                    let Some(text) = inbound? else {
                        return Ok(CloseReason::PeerClosed);
                    };
                    idle.as_mut().reset(Instant::now() + self.limits.idle_timeout);
                    if let Some(reply) = self.dispatch(user, attachment.id, &text).await {
                        self.write(sink, &reply).await?;
                    }
                }

                Some(frame) = attachment.outbound.recv() => {
                    self.write(sink, &frame).await?;
                    idle.as_mut().reset(Instant::now() + self.limits.idle_timeout);
                }

                event = attachment.presence.recv() => {
                    let frame = match event {
                        Ok(event) => ServerFrame::from(event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(user_id = %user.id, connection = %attachment.id, skipped, "Presence subscriber lagged, resending snapshot");
                            ServerFrame::OnlineUsers(self.router.presence().snapshot())
                        }
                        Err(RecvError::Closed) => return Ok(CloseReason::Shutdown),
                    };
                    self.write(sink, &frame).await?;
                    idle.as_mut().reset(Instant::now() + self.limits.idle_timeout);
                }
            }
        }
    }

    /// Handles one inbound frame and returns the reply, if any.
    async fn dispatch(
        &self,
        user: &AuthenticatedUser,
        connection: ConnectionId,
        text: &str,
    ) -> Option<ServerFrame> {
        let frame = match self.codec.decode_client(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(user_id = %user.id, connection = %connection, error = %e, "Rejected frame");
                return Some(ServerError::from(e).to_error_frame());
            }
        };

        trace!(user_id = %user.id, connection = %connection, kind = frame.kind(), "Frame received");

        match self.handle(user, frame).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                debug!(user_id = %user.id, connection = %connection, error = %e, "Request failed");
                Some(e.to_error_frame())
            }
        }
    }

    async fn handle(&self, user: &AuthenticatedUser, frame: ClientFrame) -> Result<ServerFrame> {
        match frame {
            ClientFrame::Auth { .. } => Err(ServerError::bad_request("already authenticated")),
            ClientFrame::SendMessage(message) => self
                .router
                .send_message(user, message)
                .await
                .map(ServerFrame::MessageSent),
            ClientFrame::FetchMessages { with_user } => self
                .router
                .fetch_history(user, with_user)
                .await
                .map(ServerFrame::Messages),
            ClientFrame::PublicKey { user_id } => self
                .router
                .lookup_public_key(user_id)
                .await
                .map(ServerFrame::PublicKey),
            ClientFrame::AuditMessages => self.router.audit_log(user).await.map(ServerFrame::AuditLog),
            ClientFrame::SetDisabled { user_id, disabled } => self
                .router
                .set_disabled(user, user_id, disabled)
                .await
                .map(|updated| ServerFrame::UserUpdated {
                    user_id: updated.id,
                    disabled: updated.disabled,
                }),
        }
    }

    async fn write<W: FrameSink>(&self, sink: &mut W, frame: &ServerFrame) -> Result<()> {
        let text = self.codec.encode(frame)?;
        sink.send(text).await?;
        Ok(())
    }
}

//! The streaming session: connect, authorize, subscribe, then render frames
//! until something ends the stream.
//!
//! ```text
//! Connecting -> Authorizing -> Subscribing -> Streaming -> Terminated(reason)
//! ```
//!
//! The handshake is two sends with no acknowledgement in between; the server
//! never confirms either step, so a bad token only shows up later as an
//! invalid response or a closed socket.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::config::SessionContext;
use crate::error::{Error, Result};
use crate::observability::{
    STREAM_CANCELLED, STREAM_CONNECT_ERRORS, STREAM_DECODE_ERRORS, STREAM_DURATION, STREAM_FRAMES,
    STREAM_INVALID_RESPONSES, STREAM_MESSAGES, STREAM_SESSIONS,
};
use crate::render::{Renderer, render_message};
use crate::types::{Channel, ControlFrame, InboundEvent};

/// The socket type produced by [`StreamSession::connect`].
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Opening the socket.
    Connecting,
    /// Sending the `authorize` frame.
    Authorizing,
    /// Sending the `open channel` frame.
    Subscribing,
    /// Receiving and rendering frames.
    Streaming,
    /// Done; the socket has been released.
    Terminated(Termination),
}

impl SessionState {
    /// Returns true once the session has ended.
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Authorizing => write!(f, "authorizing"),
            SessionState::Subscribing => write!(f, "subscribing"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Terminated(reason) => write!(f, "terminated ({reason})"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone)]
pub enum Termination {
    /// The server closed the socket.
    RemoteClosed,
    /// The user interrupted the session.
    Cancelled,
    /// A frame was not a JSON object.
    DecodeError(Error),
    /// A frame had no usable payload; carries the best diagnostic available.
    InvalidResponse(String),
    /// The socket broke, or a frame could not be handled locally.
    Failed(Error),
}

impl Termination {
    /// Returns true for endings that are not errors: a remote close or a
    /// user interrupt.
    pub fn is_clean(&self) -> bool {
        matches!(self, Termination::RemoteClosed | Termination::Cancelled)
    }

    /// Convert into `Ok(())` for clean endings and the matching error
    /// otherwise.
    pub fn into_result(self) -> Result<()> {
        match self {
            Termination::RemoteClosed | Termination::Cancelled => Ok(()),
            Termination::DecodeError(err) | Termination::Failed(err) => Err(err),
            Termination::InvalidResponse(message) => Err(Error::invalid_response(message)),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::RemoteClosed => write!(f, "closed by server"),
            Termination::Cancelled => write!(f, "cancelled by user"),
            Termination::DecodeError(err) => write!(f, "{err}"),
            Termination::InvalidResponse(message) => {
                write!(f, "invalid response: {message}")
            }
            Termination::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// A single streaming session over one socket.
///
/// The session owns the socket for its whole life and closes it on every exit
/// path out of [`StreamSession::run`].
pub struct StreamSession<S> {
    context: SessionContext,
    channel: Option<Channel>,
    socket: S,
    state: SessionState,
    last_sender: Option<String>,
}

impl StreamSession<WsStream> {
    /// Open the socket named by the context.
    ///
    /// Nothing is retried; a failure here is a [`Error::Connection`].
    pub async fn connect(context: SessionContext) -> Result<Self> {
        STREAM_SESSIONS.click();
        tracing::debug!(url = %context.ws_url(), state = %SessionState::Connecting, "opening socket");
        let (socket, _) = connect_async(context.ws_url().as_str())
            .await
            .map_err(|e| {
                STREAM_CONNECT_ERRORS.click();
                Error::connection(
                    format!("could not connect to {}: {e}", context.ws_url()),
                    Some(Box::new(e)),
                )
            })?;
        Ok(Self::with_socket(context, socket))
    }
}

impl<S> StreamSession<S>
where
    S: Stream<Item = std::result::Result<WsMessage, WsError>>
        + Sink<WsMessage, Error = WsError>
        + Unpin,
{
    /// Wrap an already-open socket.  [`StreamSession::run`] moves it on to
    /// the handshake.
    pub fn with_socket(context: SessionContext, socket: S) -> Self {
        Self {
            context,
            channel: None,
            socket,
            state: SessionState::Connecting,
            last_sender: None,
        }
    }

    /// Attach the resolved channel so the welcome banner can name it.
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// The context the session was built from.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The id of the sender of the last rendered message.
    pub fn last_sender(&self) -> Option<&str> {
        self.last_sender.as_deref()
    }

    /// Handshake, then render frames until the stream ends or `cancel` fires.
    ///
    /// The socket is closed before this returns, whatever the reason.
    pub async fn run(
        &mut self,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Termination {
        if let SessionState::Terminated(reason) = &self.state {
            return Termination::Failed(Error::connection(
                format!("session already terminated: {reason}"),
                None,
            ));
        }
        let start = Instant::now();
        let termination = self.drive(renderer, cancel).await;
        self.release().await;
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        report(renderer, &termination);
        self.transition(SessionState::Terminated(termination.clone()));
        termination
    }

    async fn drive(&mut self, renderer: &mut dyn Renderer, cancel: &CancellationToken) -> Termination {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(),
            result = self.handshake() => {
                if let Err(err) = result {
                    return Termination::Failed(err);
                }
            }
        }
        renderer.print_info("Success!");
        if let Some(channel) = &self.channel {
            renderer.print_info(&format!(
                "You are now connected to channel '{}' owned by {}",
                channel.name, channel.owner
            ));
        }

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(),
                frame = self.socket.next() => frame,
            };
            let frame = match frame {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    return Termination::Failed(Error::connection(
                        format!("socket read failed: {err}"),
                        Some(Box::new(err)),
                    ));
                }
                None => return Termination::RemoteClosed,
            };
            if let Some(termination) = self.handle(frame, renderer) {
                return termination;
            }
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        self.transition(SessionState::Authorizing);
        let authorize = ControlFrame::authorize(self.context.token());
        self.send(&authorize).await?;

        self.transition(SessionState::Subscribing);
        let open_channel = ControlFrame::open_channel(self.context.channel_id());
        self.send(&open_channel).await?;

        self.transition(SessionState::Streaming);
        Ok(())
    }

    async fn send(&mut self, frame: &ControlFrame) -> Result<()> {
        let text = frame.encode()?;
        tracing::debug!(command = frame.command(), "sending control frame");
        self.socket
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| {
                Error::connection(
                    format!("could not send '{}': {e}", frame.command()),
                    Some(Box::new(e)),
                )
            })
    }

    fn handle(&mut self, frame: WsMessage, renderer: &mut dyn Renderer) -> Option<Termination> {
        match frame {
            WsMessage::Text(text) => self.handle_text(text.as_str(), renderer),
            WsMessage::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => self.handle_text(text, renderer),
                Err(err) => {
                    STREAM_DECODE_ERRORS.click();
                    Some(Termination::DecodeError(Error::decode(
                        "binary frame is not UTF-8",
                        String::from_utf8_lossy(&bytes),
                        Some(Box::new(err)),
                    )))
                }
            },
            WsMessage::Close(close) => {
                tracing::debug!(?close, "server closed the socket");
                Some(Termination::RemoteClosed)
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => None,
        }
    }

    fn handle_text(&mut self, text: &str, renderer: &mut dyn Renderer) -> Option<Termination> {
        STREAM_FRAMES.click();
        tracing::debug!(frame = text, "received frame");
        let event = match InboundEvent::decode(text) {
            Ok(event) => event,
            Err(err) => {
                STREAM_DECODE_ERRORS.click();
                return Some(Termination::DecodeError(err));
            }
        };
        match event {
            InboundEvent::Message { payload, .. } => {
                let rendered = match render_message(
                    &payload,
                    self.last_sender.as_deref(),
                    self.context.time_format(),
                ) {
                    Ok(rendered) => rendered,
                    Err(err) => return Some(Termination::Failed(err)),
                };
                renderer.print_lines(&rendered.lines);
                self.last_sender = Some(rendered.last_sender);
                STREAM_MESSAGES.click();
                None
            }
            invalid @ InboundEvent::Invalid { .. } => {
                STREAM_INVALID_RESPONSES.click();
                Some(Termination::InvalidResponse(invalid.diagnostic()))
            }
        }
    }

    async fn release(&mut self) {
        if let Err(err) = self.socket.close().await {
            tracing::debug!(error = %err, "socket was already closed");
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = %self.state, to = %next, channel_id = self.context.channel_id(), "session state");
        match &next {
            SessionState::Terminated(reason) if reason.is_clean() => {
                tracing::info!(%reason, "stream session ended");
            }
            SessionState::Terminated(reason) => {
                tracing::warn!(%reason, "stream session failed");
            }
            _ => {}
        }
        self.state = next;
    }
}

/// Drive `work` to completion unless `cancel` fires first.
///
/// Cancellation is checked before `work` is polled, so an already-cancelled
/// token never starts it.
pub async fn unless_cancelled<F: Future>(cancel: &CancellationToken, work: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = work => Some(output),
    }
}

fn cancelled() -> Termination {
    STREAM_CANCELLED.click();
    Termination::Cancelled
}

/// Tell the user why the stream ended.
fn report(renderer: &mut dyn Renderer, termination: &Termination) {
    match termination {
        Termination::RemoteClosed => {
            renderer.print_lines(&[String::new()]);
            renderer.print_notice("Connection closed by server. Exiting");
        }
        Termination::Cancelled => {
            renderer.print_lines(&[String::new()]);
            renderer.print_notice("Keyboard Interrupt sent. Exiting");
        }
        Termination::InvalidResponse(diagnostic) => {
            renderer.print_lines(&[String::new()]);
            let (first, rest) = match diagnostic.split_once('\n') {
                Some((first, rest)) => (first, Some(rest)),
                None => (diagnostic.as_str(), None),
            };
            renderer.print_notice(&format!("Invalid websocket response returned. {first}"));
            if let Some(rest) = rest {
                let lines: Vec<String> = rest.lines().map(String::from).collect();
                renderer.print_lines(&lines);
            }
            renderer.print_notice("Exiting");
        }
        Termination::DecodeError(err) => {
            renderer.print_lines(&[String::new()]);
            renderer.print_notice(&format!("Could not read websocket frame. {err}"));
            renderer.print_notice("Exiting");
        }
        Termination::Failed(err) => {
            renderer.print_error(&err.to_string());
        }
    }
}

use super::core::{HandlerRequest, HandlerResponse};
use crate::error::{panic_message, DispatchError};
use crate::handlers::WebSocketHandler;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// A WebSocket data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// Transport side of an upgraded connection.
pub trait WebSocketConnection {
    fn send(&mut self, msg: WsMessage) -> anyhow::Result<()>;

    fn close(&mut self, code: u16, reason: &str) -> anyhow::Result<()>;

    /// Bytes queued but not yet written.
    fn buffered_amount(&self) -> usize {
        0
    }
}

/// Connection handle passed to WebSocket callbacks.
pub struct WsContext<'a> {
    request: &'a HandlerRequest,
    conn: &'a mut dyn WebSocketConnection,
}

impl<'a> WsContext<'a> {
    pub fn new(request: &'a HandlerRequest, conn: &'a mut dyn WebSocketConnection) -> Self {
        Self { request, conn }
    }

    /// The upgrade request, with its route and params.
    #[must_use]
    pub fn request(&self) -> &HandlerRequest {
        self.request
    }

    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.request.get_path_param(name)
    }

    pub fn send(&mut self, msg: WsMessage) -> anyhow::Result<()> {
        self.conn.send(msg)
    }

    pub fn send_text(&mut self, text: impl Into<String>) -> anyhow::Result<()> {
        self.conn.send(WsMessage::Text(text.into()))
    }

    pub fn close(&mut self, code: u16, reason: &str) -> anyhow::Result<()> {
        self.conn.close(code, reason)
    }

    #[must_use]
    pub fn buffered_amount(&self) -> usize {
        self.conn.buffered_amount()
    }
}

/// An accepted upgrade bound to its route's callback set.
///
/// The transport calls [`open`](Self::open) once, then
/// [`message`](Self::message)/[`drain`](Self::drain) as events arrive, and
/// [`close`](Self::close) last. A callback that errors or panics yields
/// [`DispatchError::HandlerFault`]; the session itself stays usable.
pub struct WebSocketSession {
    handler: Arc<dyn WebSocketHandler>,
    request: HandlerRequest,
    handshake: HandlerResponse,
    closed: bool,
}

impl WebSocketSession {
    pub(crate) fn new(
        handler: Arc<dyn WebSocketHandler>,
        request: HandlerRequest,
        handshake: HandlerResponse,
    ) -> Self {
        Self {
            handler,
            request,
            handshake,
            closed: false,
        }
    }

    #[must_use]
    pub fn handshake_response(&self) -> &HandlerResponse {
        &self.handshake
    }

    #[must_use]
    pub fn request(&self) -> &HandlerRequest {
        &self.request
    }

    #[must_use]
    pub fn route_id(&self) -> &str {
        self.request.route_id()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn open(&mut self, conn: &mut dyn WebSocketConnection) -> Result<(), DispatchError> {
        let handler = Arc::clone(&self.handler);
        self.run("open", conn, |ws| handler.open(ws))
    }

    pub fn message(
        &mut self,
        conn: &mut dyn WebSocketConnection,
        msg: WsMessage,
    ) -> Result<(), DispatchError> {
        let handler = Arc::clone(&self.handler);
        self.run("message", conn, move |ws| handler.message(ws, msg))
    }

    pub fn drain(&mut self, conn: &mut dyn WebSocketConnection) -> Result<(), DispatchError> {
        let handler = Arc::clone(&self.handler);
        self.run("drain", conn, |ws| handler.drain(ws))
    }

    /// Deliver the close event. Later events are ignored.
    pub fn close(
        &mut self,
        conn: &mut dyn WebSocketConnection,
        code: u16,
        reason: &str,
    ) -> Result<(), DispatchError> {
        let handler = Arc::clone(&self.handler);
        let result = self.run("close", conn, |ws| handler.close(ws, code, reason));
        self.closed = true;
        result
    }

    fn run<F>(
        &mut self,
        event: &'static str,
        conn: &mut dyn WebSocketConnection,
        callback: F,
    ) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut WsContext<'_>) -> anyhow::Result<()>,
    {
        if self.closed {
            debug!(route_id = %self.route_id(), event, "Event after close ignored");
            return Ok(());
        }
        let mut ws = WsContext::new(&self.request, conn);
        let message = match catch_unwind(AssertUnwindSafe(|| callback(&mut ws))) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => format!("{event}: {e:#}"),
            Err(panic) => format!("{event} panicked: {}", panic_message(panic.as_ref())),
        };
        error!(
            request_id = %self.request.request_id,
            route_id = %self.route_id(),
            event,
            error = %message,
            "WebSocket callback failed"
        );
        Err(DispatchError::HandlerFault {
            route_id: self.request.route.id.clone(),
            message,
        })
    }
}

impl fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("route_id", &self.request.route.id)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

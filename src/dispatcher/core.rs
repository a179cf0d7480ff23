//! Dispatcher core module - hot path for request dispatch.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use super::websocket::WebSocketSession;
use crate::error::{panic_message, DispatchError};
use crate::handlers::{HandlerCache, HandlerLoader, HandlerModule};
use crate::ids::RequestId;
use crate::registry::RouteRegistry;
use crate::router::{ParamVec, RouteMatch};
use crate::table::{RouteDeclaration, RouteMethod};
use http::Method;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage. Names are `Arc<str>` since the same few
/// names repeat across requests.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Header carrying the correlation id in and out.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn find_header<'a>(headers: &'a HeaderVec, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// A request as the transport hands it to the dispatcher, before routing.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    /// Origin-form target (`/path?query`) or an absolute URL.
    pub target: String,
    pub headers: HeaderVec,
    pub body: Option<Value>,
}

impl IncomingRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderVec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `Upgrade: websocket`, compared case-insensitively.
    #[must_use]
    pub fn is_websocket_upgrade(&self) -> bool {
        self.get_header("upgrade")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
    }
}

/// Request data passed to a handler entry point.
///
/// Carries the matched declaration and the parsed URL alongside the
/// extracted parameters.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    pub method: Method,
    /// Request path as matched (no query string)
    pub path: String,
    /// Fully parsed request URL
    pub url: Url,
    /// Declaration this request resolved to
    pub route: Arc<RouteDeclaration>,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    /// Request body parsed as JSON (if present)
    pub body: Option<Value>,
}

impl HandlerRequest {
    #[must_use]
    pub fn route_id(&self) -> &str {
        &self.route.id
    }

    /// Get a path parameter by name
    ///
    /// Uses "last write wins" semantics: if duplicate parameter names exist
    /// at different path depths (e.g., `/org/{id}/team/{team_id}/user/{id}`),
    /// returns the last occurrence.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name (last occurrence wins)
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Note: This allocates - use get_path_param() in hot paths
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Note: This allocates - use get_query_param() in hot paths
    #[must_use]
    pub fn query_params_map(&self) -> HashMap<String, String> {
        self.query_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Status, headers and JSON body returned to the transport.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create an error response
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Default acceptance of a WebSocket upgrade.
    #[must_use]
    pub fn switching_protocols() -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("upgrade"), "websocket".to_string()));
        headers.push((Arc::from("connection"), "Upgrade".to_string()));
        Self {
            status: 101,
            headers,
            body: Value::Null,
        }
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// What the transport should do with a dispatched request.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Send this response and finish.
    Response(HandlerResponse),
    /// The handshake was accepted: send the handshake response, then drive
    /// the session with the connection's events.
    Upgrade(WebSocketSession),
}

impl DispatchOutcome {
    /// Response to write first: the handler's response or the handshake.
    #[must_use]
    pub fn response(&self) -> &HandlerResponse {
        match self {
            DispatchOutcome::Response(resp) => resp,
            DispatchOutcome::Upgrade(session) => session.handshake_response(),
        }
    }
}

/// Resolves requests against the registry and invokes the cached handler.
///
/// Owns no global state: the route index lives in the injected registry and
/// loaded modules live in this dispatcher's [`HandlerCache`].
pub struct Dispatcher {
    registry: Arc<RouteRegistry>,
    handlers: HandlerCache,
    base_url: Url,
}

impl Dispatcher {
    /// `base_url` resolves origin-form targets (`/users?x=1`) into full URLs.
    pub fn new(registry: Arc<RouteRegistry>, loader: Arc<dyn HandlerLoader>, base_url: Url) -> Self {
        Self {
            registry,
            handlers: HandlerCache::new(loader),
            base_url,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerCache {
        &self.handlers
    }

    /// Swap in a freshly loaded route index. In-flight requests keep their snapshot.
    pub fn reload(&self) -> anyhow::Result<usize> {
        self.registry.reload()
    }

    /// Dispatch a request; every fault is logged and turned into a generic response.
    pub fn dispatch(&self, req: IncomingRequest) -> DispatchOutcome {
        let request_id = RequestId::from_header_or_new(req.get_header(REQUEST_ID_HEADER));
        match self.dispatch_with_request_id(request_id, req) {
            Ok(outcome) => outcome,
            Err(err) => {
                log_dispatch_error(request_id, &err);
                let mut resp = err.into_response();
                resp.set_header(REQUEST_ID_HEADER, request_id.to_string());
                DispatchOutcome::Response(resp)
            }
        }
    }

    /// Like [`dispatch`](Self::dispatch) but hands the typed error back to the caller.
    pub fn try_dispatch(&self, req: IncomingRequest) -> Result<DispatchOutcome, DispatchError> {
        let request_id = RequestId::from_header_or_new(req.get_header(REQUEST_ID_HEADER));
        self.dispatch_with_request_id(request_id, req)
    }

    fn dispatch_with_request_id(
        &self,
        request_id: RequestId,
        req: IncomingRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let url = self
            .base_url
            .join(&req.target)
            .map_err(|e| DispatchError::InvalidTarget {
                target: req.target.clone(),
                reason: e.to_string(),
            })?;

        let upgrade = req.is_websocket_upgrade();
        let method = if upgrade {
            RouteMethod::WebSocket
        } else {
            RouteMethod::from_http(&req.method).ok_or_else(|| DispatchError::NotFound {
                method: req.method.to_string(),
                path: url.path().to_string(),
            })?
        };

        let index = self.registry.snapshot();
        let route_match = index
            .resolve(method, url.path())?
            .ok_or_else(|| DispatchError::NotFound {
                method: method.to_string(),
                path: url.path().to_string(),
            })?;

        let module = self.load_module(&route_match)?;
        let request = build_request(request_id, req, url, route_match);

        if upgrade {
            self.upgrade(module, request)
        } else {
            self.invoke(&module, request).map(DispatchOutcome::Response)
        }
    }

    fn load_module(&self, route_match: &RouteMatch) -> Result<Arc<HandlerModule>, DispatchError> {
        let route = &route_match.route;
        self.handlers
            .get_or_load(&route.handler)
            .map_err(|e| DispatchError::HandlerUnavailable {
                route_id: route.id.clone(),
                handler: route.handler.to_string(),
                cause: e.to_string(),
            })
    }

    fn invoke(
        &self,
        module: &HandlerModule,
        request: HandlerRequest,
    ) -> Result<HandlerResponse, DispatchError> {
        let route = Arc::clone(&request.route);
        let Some(entry) = module.entry.as_ref() else {
            return Err(DispatchError::HandlerUnavailable {
                route_id: route.id.clone(),
                handler: route.handler.to_string(),
                cause: "module exports no entry point".to_string(),
            });
        };

        let request_id = request.request_id;
        info!(
            request_id = %request_id,
            route_id = %route.id,
            handler = %route.handler,
            method = %request.method,
            path = %request.path,
            "Request dispatched to handler"
        );

        let start = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| entry.handle(request)));
        let latency = start.elapsed();

        let mut resp = match result {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                return Err(DispatchError::HandlerFault {
                    route_id: route.id.clone(),
                    message: format!("{e:#}"),
                })
            }
            Err(panic) => {
                return Err(DispatchError::HandlerFault {
                    route_id: route.id.clone(),
                    message: format!("panicked: {}", panic_message(panic.as_ref())),
                })
            }
        };

        info!(
            request_id = %request_id,
            route_id = %route.id,
            status = resp.status,
            latency_ms = latency.as_millis() as u64,
            "Handler response"
        );
        resp.set_header(REQUEST_ID_HEADER, request_id.to_string());
        Ok(resp)
    }

    fn upgrade(
        &self,
        module: Arc<HandlerModule>,
        request: HandlerRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let route = Arc::clone(&request.route);
        let Some(ws) = module.websocket.as_ref() else {
            return Err(DispatchError::HandlerUnavailable {
                route_id: route.id.clone(),
                handler: route.handler.to_string(),
                cause: "module exports no WebSocket callbacks".to_string(),
            });
        };

        let handshake = catch_unwind(AssertUnwindSafe(|| ws.handshake(&request))).map_err(
            |panic| DispatchError::HandlerFault {
                route_id: route.id.clone(),
                message: format!("handshake panicked: {}", panic_message(panic.as_ref())),
            },
        )?;

        if handshake.status != 101 {
            info!(
                request_id = %request.request_id,
                route_id = %route.id,
                status = handshake.status,
                "WebSocket upgrade rejected by handler"
            );
            return Ok(DispatchOutcome::Response(handshake));
        }

        info!(
            request_id = %request.request_id,
            route_id = %route.id,
            handler = %route.handler,
            path = %request.path,
            "WebSocket upgrade accepted"
        );
        Ok(DispatchOutcome::Upgrade(WebSocketSession::new(
            Arc::clone(ws),
            request,
            handshake,
        )))
    }
}

fn build_request(
    request_id: RequestId,
    req: IncomingRequest,
    url: Url,
    route_match: RouteMatch,
) -> HandlerRequest {
    let query_params: ParamVec = url
        .query_pairs()
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect();
    HandlerRequest {
        request_id,
        method: req.method,
        path: url.path().to_string(),
        url,
        route: route_match.route,
        path_params: route_match.path_params,
        query_params,
        headers: req.headers,
        body: req.body,
    }
}

fn log_dispatch_error(request_id: RequestId, err: &DispatchError) {
    match err {
        DispatchError::NotFound { method, path } => {
            warn!(request_id = %request_id, method = %method, path = %path, "No route matched");
        }
        DispatchError::InvalidTarget { target, reason } => {
            debug!(request_id = %request_id, target = %target, reason = %reason, "Invalid request target");
        }
        DispatchError::HandlerUnavailable {
            route_id,
            handler,
            cause,
        } => {
            error!(
                request_id = %request_id,
                route_id = %route_id,
                handler = %handler,
                cause = %cause,
                "Handler unavailable"
            );
        }
        DispatchError::HandlerFault { route_id, message } => {
            error!(
                request_id = %request_id,
                route_id = %route_id,
                error = %message,
                "Handler fault caught at dispatch boundary"
            );
        }
        DispatchError::ParamMismatch {
            route_id,
            template,
            path,
        } => {
            error!(
                request_id = %request_id,
                route_id = %route_id,
                template = %template,
                path = %path,
                "Matched route disagrees with request path shape"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_header_is_case_insensitive() {
        let req = IncomingRequest::new(Method::GET, "/ws").with_header("Upgrade", "WebSocket");
        assert!(req.is_websocket_upgrade());
        let plain = IncomingRequest::new(Method::GET, "/ws").with_header("Upgrade", "h2c");
        assert!(!plain.is_websocket_upgrade());
    }

    #[test]
    fn set_header_replaces_existing() {
        let mut resp = HandlerResponse::json(200, serde_json::json!({}));
        resp.set_header("Content-Type", "text/plain".to_string());
        assert_eq!(resp.get_header("content-type"), Some("text/plain"));
        assert_eq!(resp.headers.len(), 1);
    }

    #[test]
    fn switching_protocols_is_101() {
        let resp = HandlerResponse::switching_protocols();
        assert_eq!(resp.status, 101);
        assert_eq!(resp.get_header("upgrade"), Some("websocket"));
    }
}

//! Error taxonomy shared by the dispatcher and the suggester.
//!
//! Dispatch-time faults are recovered into a generic [`HandlerResponse`]; the
//! underlying cause is logged, never sent to the client.

use crate::dispatcher::HandlerResponse;
use crate::table::RouteMethod;
use serde::Serialize;
use std::path::PathBuf;

/// Why a request could not be served.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No declaration matches the request.
    #[error("no route for {method} {path}")]
    NotFound { method: String, path: String },

    /// The request target could not be parsed into a URL.
    #[error("invalid request target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// The handler module could not be loaded or lacks the needed entry point.
    #[error("handler '{handler}' for route '{route_id}' is unavailable: {cause}")]
    HandlerUnavailable {
        route_id: String,
        handler: String,
        cause: String,
    },

    /// The handler raised (returned an error or panicked) while executing.
    #[error("handler for route '{route_id}' failed: {message}")]
    HandlerFault { route_id: String, message: String },

    /// Matched template and request path disagree on segment count.
    #[error("route '{route_id}' matched '{path}' but template '{template}' has a different shape")]
    ParamMismatch {
        route_id: String,
        template: String,
        path: String,
    },
}

impl DispatchError {
    /// HTTP status surfaced to the client.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::NotFound { .. } => 404,
            DispatchError::InvalidTarget { .. } => 400,
            DispatchError::HandlerUnavailable { .. } => 503,
            DispatchError::HandlerFault { .. } | DispatchError::ParamMismatch { .. } => 500,
        }
    }

    /// True for faults the server owns (as opposed to a bad client request).
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        self.status() >= 500
    }

    /// Generic client-facing response. Server faults never leak their cause.
    #[must_use]
    pub fn into_response(self) -> HandlerResponse {
        let message = match &self {
            DispatchError::NotFound { .. } => "Not Found",
            DispatchError::InvalidTarget { .. } => "Bad Request",
            DispatchError::HandlerUnavailable { .. } => "Service Unavailable",
            DispatchError::HandlerFault { .. } | DispatchError::ParamMismatch { .. } => {
                "Internal Server Error"
            }
        };
        HandlerResponse::error(self.status(), message)
    }
}

/// A single candidate that could not be written. The rest of the batch is unaffected.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MaterializationFailure {
    pub method: RouteMethod,
    pub path: String,
    pub file: PathBuf,
    pub reason: String,
}

/// Why the log loader fell back to its synthetic sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum LogSourceUnavailable {
    #[error("invalid log glob '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("no log files matched '{pattern}'")]
    NoFiles { pattern: String },
    #[error("{files} log file(s) matched but no line was a valid record")]
    NoValidRecords { files: usize },
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

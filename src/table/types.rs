use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Method a declaration binds to: an HTTP verb, or the WebSocket sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
    /// Sentinel for routes served through a WebSocket upgrade.
    WebSocket,
}

impl RouteMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Head => "HEAD",
            RouteMethod::Trace => "TRACE",
            RouteMethod::WebSocket => "WS",
        }
    }

    #[must_use]
    pub fn is_websocket(&self) -> bool {
        matches!(self, RouteMethod::WebSocket)
    }

    /// Map an HTTP method onto a route method. `CONNECT` and extension verbs have no routes.
    #[must_use]
    pub fn from_http(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::GET => Some(RouteMethod::Get),
            http::Method::POST => Some(RouteMethod::Post),
            http::Method::PUT => Some(RouteMethod::Put),
            http::Method::DELETE => Some(RouteMethod::Delete),
            http::Method::PATCH => Some(RouteMethod::Patch),
            http::Method::OPTIONS => Some(RouteMethod::Options),
            http::Method::HEAD => Some(RouteMethod::Head),
            http::Method::TRACE => Some(RouteMethod::Trace),
            _ => None,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(RouteMethod::Get),
            "POST" => Ok(RouteMethod::Post),
            "PUT" => Ok(RouteMethod::Put),
            "DELETE" => Ok(RouteMethod::Delete),
            "PATCH" => Ok(RouteMethod::Patch),
            "OPTIONS" => Ok(RouteMethod::Options),
            "HEAD" => Ok(RouteMethod::Head),
            "TRACE" => Ok(RouteMethod::Trace),
            "WS" | "WEBSOCKET" => Ok(RouteMethod::WebSocket),
            other => anyhow::bail!("unknown route method '{other}'"),
        }
    }
}

impl Serialize for RouteMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RouteMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque reference to the module implementing a route, e.g. `users::get_user`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerRef(String);

impl HandlerRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split `module::name` into `(Some("module"), "name")`; bare refs have no module.
    #[must_use]
    pub fn split_module(&self) -> (Option<&str>, &str) {
        match self.0.rsplit_once("::") {
            Some((module, name)) => (Some(module), name),
            None => (None, self.0.as_str()),
        }
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for HandlerRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One entry of the declarative route table.
///
/// Declarations are never mutated after load; a changed route is a new
/// declaration that replaces the old one on the next registry reload.
/// Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    pub id: String,
    pub method: RouteMethod,
    /// Path template; `{name}` segments bind one path segment each.
    pub path: String,
    pub handler: HandlerRef,
    /// Capability tag, passed through unexamined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Only flagged declarations are checked by the cross-validator.
    #[serde(default)]
    pub sourcemap: bool,
}

impl RouteDeclaration {
    /// Index key used by the exact-match fast path.
    #[must_use]
    pub fn key(&self) -> String {
        route_key(self.method, &self.path)
    }

    #[must_use]
    pub fn is_templated(&self) -> bool {
        self.path.split('/').any(is_placeholder)
    }
}

#[must_use]
pub fn route_key(method: RouteMethod, path: &str) -> String {
    format!("{}:{}", method.as_str(), path)
}

/// A `{name}` segment spanning the whole path segment.
#[must_use]
pub fn is_placeholder(segment: &str) -> bool {
    placeholder_name(segment).is_some()
}

#[must_use]
pub fn placeholder_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty() && !name.contains(['{', '}']))
}

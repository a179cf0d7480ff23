//! Handler stub rendering. Pure: no file-system access.

use crate::table::RouteMethod;
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};

/// Prefix of the one-line machine-readable header in every generated stub.
pub const SCAFFOLD_MARKER: &str = "// routeloop:scaffold ";

const HANDLER_TEMPLATE: &str = r#"{{ marker }}
//! Suggested handler for `{{ method }} {{ path_doc }}`.
//!
//! Generated from access logs with confidence {{ score_display }}. Replace the
//! body with real logic; until then the route answers with a scaffold response.

use routeloop::dispatcher::{HandlerRequest, HandlerResponse};

pub const RESOURCE: &str = {{ resource_literal }};
pub const ORIGINAL_PATH: &str = {{ path_literal }};
pub const METHOD: &str = {{ method_literal }};
pub const CONFIDENCE: f64 = {{ score_literal }};

pub fn handle(req: HandlerRequest) -> anyhow::Result<HandlerResponse> {
    Ok(HandlerResponse::json(
        200,
        serde_json::json!({
            "route_id": req.route_id(),
            "resource": RESOURCE,
            "scaffold": true,
            "confidence": CONFIDENCE,
            "method": METHOD,
            "path": ORIGINAL_PATH,
        }),
    ))
}
"#;

/// Everything a stub is rendered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerStub {
    pub resource_name: String,
    pub score: f64,
    pub original_path: String,
    pub method: RouteMethod,
}

impl HandlerStub {
    pub fn new(method: RouteMethod, original_path: &str, score: f64) -> Self {
        Self {
            resource_name: resource_name(original_path),
            score,
            original_path: original_path.to_string(),
            method,
        }
    }
}

/// Last non-empty path segment, braces stripped; `root` for `/`.
#[must_use]
pub fn resource_name(path: &str) -> String {
    path.split('/')
        .rev()
        .find(|s| !s.is_empty())
        .map(|s| s.trim_start_matches('{').trim_end_matches('}').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "root".to_string())
}

/// Render the Rust source for a stub.
///
/// Values that land in Rust string literals are pre-escaped with `{:?}`, so
/// arbitrary paths from logs cannot break out of the literal.
pub fn render_handler(stub: &HandlerStub) -> anyhow::Result<String> {
    let marker = format!("{SCAFFOLD_MARKER}{}", serde_json::to_string(stub)?);
    let path_doc = format!("{:?}", stub.original_path);
    let mut env = Environment::new();
    env.add_template("handler.rs", HANDLER_TEMPLATE)?;
    let rendered = env.get_template("handler.rs")?.render(context! {
        marker => marker,
        method => stub.method.as_str(),
        path_doc => path_doc.trim_matches('"'),
        score_display => format!("{:.3}", stub.score),
        resource_literal => format!("{:?}", stub.resource_name),
        path_literal => format!("{:?}", stub.original_path),
        method_literal => format!("{:?}", stub.method.as_str()),
        score_literal => format!("{:?}", stub.score),
    })?;
    Ok(rendered)
}

/// Read the stub record back out of rendered source.
#[must_use]
pub fn parse_scaffold_marker(source: &str) -> Option<HandlerStub> {
    source
        .lines()
        .find_map(|line| line.strip_prefix(SCAFFOLD_MARKER))
        .and_then(|json| serde_json::from_str(json).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_is_last_segment() {
        assert_eq!(resource_name("/api/v1/users/audit"), "audit");
        assert_eq!(resource_name("/orders/"), "orders");
        assert_eq!(resource_name("/users/{id}"), "id");
        assert_eq!(resource_name("/"), "root");
    }

    #[test]
    fn rendered_stub_embeds_metadata_and_marker() {
        let stub = HandlerStub::new(RouteMethod::Get, "/api/v1/users/audit", 0.93);
        let src = render_handler(&stub).unwrap();
        assert!(src.starts_with(SCAFFOLD_MARKER));
        assert!(src.contains(r#"pub const RESOURCE: &str = "audit";"#));
        assert!(src.contains(r#"pub const ORIGINAL_PATH: &str = "/api/v1/users/audit";"#));
        assert!(src.contains(r#"pub const METHOD: &str = "GET";"#));
        assert!(src.contains("pub const CONFIDENCE: f64 = 0.93;"));
        assert_eq!(parse_scaffold_marker(&src), Some(stub));
    }

    #[test]
    fn hostile_path_stays_inside_literal() {
        let stub = HandlerStub::new(RouteMethod::Post, "/x\";\nfn evil() {}//", 0.9);
        let src = render_handler(&stub).unwrap();
        assert!(!src.contains("\nfn evil() {}"));
        assert_eq!(parse_scaffold_marker(&src).unwrap().original_path, stub.original_path);
    }

    #[test]
    fn missing_marker_is_none() {
        assert!(parse_scaffold_marker("fn main() {}").is_none());
    }
}

//! Cross-validation of route declarations against their handler modules.
//!
//! Only declarations flagged `sourcemap: true` are checked. A check passes
//! when the handler reference loads and exports what the route needs: an
//! entry point for HTTP verbs, WebSocket callbacks for `WS` routes.

use crate::error::panic_message;
use crate::handlers::{HandlerLoader, HandlerModule};
use crate::router::RouteIndex;
use crate::table::RouteDeclaration;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteCheck {
    pub route_id: String,
    pub handler: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<RouteCheck>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RouteCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

fn missing_export(route: &RouteDeclaration, module: &HandlerModule) -> Option<&'static str> {
    if route.method.is_websocket() {
        (!module.has_websocket()).then_some("module exports no WebSocket callbacks")
    } else {
        (!module.has_entry()).then_some("module exports no entry point")
    }
}

fn check_route(route: &RouteDeclaration, loader: &dyn HandlerLoader) -> RouteCheck {
    let loaded = catch_unwind(AssertUnwindSafe(|| loader.load(&route.handler)));
    let reason = match loaded {
        Ok(Ok(module)) => missing_export(route, &module).map(str::to_string),
        Ok(Err(e)) => Some(e.to_string()),
        Err(panic) => Some(format!("loader panicked: {}", panic_message(panic.as_ref()))),
    };
    RouteCheck {
        route_id: route.id.clone(),
        handler: route.handler.to_string(),
        passed: reason.is_none(),
        reason,
    }
}

/// Check every `sourcemap` declaration in the index.
///
/// Modules are loaded directly, not through a cache, so each check sees the
/// current state of the handler source.
pub fn validate_routes(index: &RouteIndex, loader: &dyn HandlerLoader) -> ValidationReport {
    let checks: Vec<RouteCheck> = index
        .declarations()
        .iter()
        .filter(|r| r.sourcemap)
        .map(|r| check_route(r, loader))
        .collect();
    for failed in checks.iter().filter(|c| !c.passed) {
        warn!(
            route_id = %failed.route_id,
            handler = %failed.handler,
            reason = ?failed.reason,
            "Route failed cross-validation"
        );
    }
    info!(
        checked = checks.len(),
        failed = checks.iter().filter(|c| !c.passed).count(),
        "Route cross-validation complete"
    );
    ValidationReport { checks }
}

pub fn print_report(report: &ValidationReport) {
    if report.is_ok() {
        println!("✅ {} sourcemap route(s) validated", report.checks.len());
        return;
    }
    let failures: Vec<&RouteCheck> = report.failures().collect();
    eprintln!(
        "\n❌ Route validation failed. {} of {} route(s) did not resolve:\n",
        failures.len(),
        report.checks.len()
    );
    for check in failures {
        eprintln!(
            "[{}] {}: {}",
            check.route_id,
            check.handler,
            check.reason.as_deref().unwrap_or("unknown")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{HandlerResponse, WsContext, WsMessage};
    use crate::handlers::{HandlerCatalog, WebSocketHandler};

    struct Echo;

    impl WebSocketHandler for Echo {
        fn open(&self, _ws: &mut WsContext<'_>) -> anyhow::Result<()> {
            Ok(())
        }

        fn message(&self, ws: &mut WsContext<'_>, msg: WsMessage) -> anyhow::Result<()> {
            ws.send(msg)
        }
    }

    fn index() -> RouteIndex {
        let routes: Vec<RouteDeclaration> = serde_json::from_value(serde_json::json!([
            { "id": "ok", "method": "GET", "path": "/ok", "handler": "app::ok", "sourcemap": true },
            { "id": "missing", "method": "GET", "path": "/missing", "handler": "app::missing", "sourcemap": true },
            { "id": "ws_wrong", "method": "WS", "path": "/ws", "handler": "app::ok", "sourcemap": true },
            { "id": "ws_ok", "method": "WS", "path": "/chat", "handler": "app::chat", "sourcemap": true },
            { "id": "ignored", "method": "GET", "path": "/ignored", "handler": "app::nope" }
        ]))
        .unwrap();
        RouteIndex::new(routes).unwrap()
    }

    #[test]
    fn reports_per_route_pass_fail() {
        let mut catalog = HandlerCatalog::new();
        catalog.register_entry("app::ok", |_req| Ok(HandlerResponse::json(200, serde_json::json!({}))));
        catalog.register("app::chat", || Ok(HandlerModule::with_websocket(Echo)));

        let report = validate_routes(&index(), &catalog);
        let outcome: Vec<(&str, bool)> = report
            .checks
            .iter()
            .map(|c| (c.route_id.as_str(), c.passed))
            .collect();
        assert_eq!(
            outcome,
            vec![("ok", true), ("missing", false), ("ws_wrong", false), ("ws_ok", true)]
        );
        assert!(!report.is_ok());
        assert_eq!(report.failures().count(), 2);
    }
}

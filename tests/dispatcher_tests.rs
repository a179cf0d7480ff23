//! Integration tests for the request dispatcher
//!
//! # Test Coverage
//!
//! - Exact and templated routes reach the right handler with the right params
//! - Unmatched requests get a generic 404
//! - Handler errors and panics become a 500 that never leaks the cause
//! - Unknown handler references become a 503
//! - `Upgrade: websocket` requests resolve against `WS` routes and return a session
//! - Concurrent first requests load a handler module exactly once

use http::Method;
use routeloop::dispatcher::{
    DispatchOutcome, Dispatcher, HandlerRequest, HandlerResponse, IncomingRequest, WsContext,
    WsMessage, REQUEST_ID_HEADER,
};
use routeloop::error::DispatchError;
use routeloop::handlers::{HandlerCatalog, HandlerModule, WebSocketHandler};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

mod common;
use common::fixtures::{base_url, registry, USERS_TABLE};
use common::tracing_util::TestTracing;
use common::ws::RecordingConnection;

struct ChatRoom;

impl WebSocketHandler for ChatRoom {
    fn open(&self, ws: &mut WsContext<'_>) -> anyhow::Result<()> {
        let room = ws.get_path_param("room").unwrap_or("lobby").to_string();
        ws.send_text(format!("joined {room}"))
    }

    fn message(&self, ws: &mut WsContext<'_>, msg: WsMessage) -> anyhow::Result<()> {
        match msg {
            WsMessage::Text(text) if text == "boom" => panic!("room exploded"),
            other => ws.send(other),
        }
    }
}

fn catalog() -> HandlerCatalog {
    let mut catalog = HandlerCatalog::new();
    catalog
        .register_entry("users::list", |_req: HandlerRequest| {
            Ok(HandlerResponse::json(200, json!({ "users": ["ada", "grace"] })))
        })
        .register_entry("users::get", |req: HandlerRequest| {
            Ok(HandlerResponse::json(
                200,
                json!({
                    "id": req.get_path_param("id"),
                    "verbose": req.get_query_param("verbose"),
                }),
            ))
        })
        .register_entry("users::post", |req: HandlerRequest| {
            Ok(HandlerResponse::json(200, json!(req.path_params_map())))
        })
        .register_entry("faults::explode", |req: HandlerRequest| {
            if req.get_query_param("panic").is_some() {
                panic!("secret connection string leaked");
            }
            Err(anyhow::anyhow!("database password rejected"))
        })
        .register("chat::room", || Ok(HandlerModule::with_websocket(ChatRoom)));
    catalog
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(registry(USERS_TABLE), Arc::new(catalog()), base_url())
}

fn response(outcome: DispatchOutcome) -> HandlerResponse {
    match outcome {
        DispatchOutcome::Response(resp) => resp,
        DispatchOutcome::Upgrade(session) => panic!("unexpected upgrade for {}", session.route_id()),
    }
}

#[test]
fn test_dispatch_exact_route() {
    let _tracing = TestTracing::init();
    let resp = response(dispatcher().dispatch(IncomingRequest::new(Method::GET, "/users")));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["users"][1], "grace");
    assert!(resp.get_header(REQUEST_ID_HEADER).is_some());
}

#[test]
fn test_dispatch_pattern_route_with_query() {
    let resp = response(
        dispatcher().dispatch(IncomingRequest::new(Method::GET, "/users/42?verbose=true")),
    );
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["id"], "42");
    assert_eq!(resp.body["verbose"], "true");
}

#[test]
fn test_dispatch_multiple_params() {
    let resp = response(
        dispatcher().dispatch(IncomingRequest::new(Method::GET, "/users/7/posts/99")),
    );
    assert_eq!(resp.body["user_id"], "7");
    assert_eq!(resp.body["post_id"], "99");
}

#[test]
fn test_unmatched_request_is_404() {
    let d = dispatcher();
    let resp = response(d.dispatch(IncomingRequest::new(Method::DELETE, "/users/42")));
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body["error"], "Not Found");

    let err = d
        .try_dispatch(IncomingRequest::new(Method::GET, "/nowhere"))
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound { .. }));
}

#[test]
fn test_handler_error_is_generic_500() {
    let _tracing = TestTracing::init();
    let d = dispatcher();
    let resp = response(d.dispatch(IncomingRequest::new(Method::POST, "/explode")));
    assert_eq!(resp.status, 500);
    assert!(!resp.body.to_string().contains("password"));

    let panicked = response(d.dispatch(IncomingRequest::new(Method::POST, "/explode?panic=1")));
    assert_eq!(panicked.status, 500);
    assert!(!panicked.body.to_string().contains("secret"));

    // The dispatcher stays usable after a handler panic.
    let ok = response(d.dispatch(IncomingRequest::new(Method::GET, "/users")));
    assert_eq!(ok.status, 200);
}

#[test]
fn test_unknown_handler_is_503() {
    let d = dispatcher();
    let err = d
        .try_dispatch(IncomingRequest::new(Method::GET, "/broken"))
        .unwrap_err();
    match &err {
        DispatchError::HandlerUnavailable {
            route_id, handler, ..
        } => {
            assert_eq!(route_id, "broken");
            assert_eq!(handler, "faults::missing");
        }
        other => panic!("expected HandlerUnavailable, got {other:?}"),
    }
    assert_eq!(err.status(), 503);
}

#[test]
fn test_request_id_is_propagated() {
    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let resp = response(
        dispatcher()
            .dispatch(IncomingRequest::new(Method::GET, "/nowhere").with_header(REQUEST_ID_HEADER, id)),
    );
    assert_eq!(resp.get_header(REQUEST_ID_HEADER), Some(id));
}

#[test]
fn test_websocket_upgrade_session() {
    let _tracing = TestTracing::init();
    let outcome = dispatcher().dispatch(
        IncomingRequest::new(Method::GET, "/chat/rust")
            .with_header("Upgrade", "websocket")
            .with_header("Connection", "Upgrade"),
    );
    let DispatchOutcome::Upgrade(mut session) = outcome else {
        panic!("expected an upgrade");
    };
    assert_eq!(session.route_id(), "chat");
    assert_eq!(session.handshake_response().status, 101);

    let mut conn = RecordingConnection::default();
    session.open(&mut conn).unwrap();
    session
        .message(&mut conn, WsMessage::Text("hello".into()))
        .unwrap();
    assert_eq!(
        conn.sent,
        vec![
            WsMessage::Text("joined rust".into()),
            WsMessage::Text("hello".into())
        ]
    );

    let err = session
        .message(&mut conn, WsMessage::Text("boom".into()))
        .unwrap_err();
    assert!(matches!(err, DispatchError::HandlerFault { .. }));

    session.close(&mut conn, 1000, "bye").unwrap();
    assert!(session.is_closed());
    session
        .message(&mut conn, WsMessage::Text("late".into()))
        .unwrap();
    assert_eq!(conn.sent.len(), 2);
}

#[test]
fn test_plain_get_does_not_hit_ws_route() {
    let resp = response(dispatcher().dispatch(IncomingRequest::new(Method::GET, "/chat/rust")));
    assert_eq!(resp.status, 404);
}

#[test]
fn test_concurrent_first_requests_load_once() {
    const THREADS: usize = 12;
    let loads = Arc::new(AtomicUsize::new(0));
    let mut catalog = HandlerCatalog::new();
    let counter = Arc::clone(&loads);
    catalog.register("users::get", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        Ok(HandlerModule::from_fn(|req: HandlerRequest| {
            Ok(HandlerResponse::json(200, json!({ "id": req.get_path_param("id") })))
        }))
    });
    let d = Arc::new(Dispatcher::new(
        registry(USERS_TABLE),
        Arc::new(catalog),
        base_url(),
    ));

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let d = Arc::clone(&d);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let outcome = d.dispatch(IncomingRequest::new(Method::GET, format!("/users/{i}")));
                outcome.response().status
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 200);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(d.handlers().loaded_count(), 1);
}

use super::core::path_to_regex;
use super::*;
use crate::error::DispatchError;
use crate::table::{RouteDeclaration, RouteMethod};
use serde_json::json;
use std::collections::HashMap;

fn routes(value: serde_json::Value) -> Vec<RouteDeclaration> {
    serde_json::from_value(value).unwrap()
}

fn sample_index() -> RouteIndex {
    RouteIndex::new(routes(json!([
        { "id": "list_users", "method": "GET", "path": "/users", "handler": "users::list" },
        { "id": "get_user", "method": "GET", "path": "/users/{id}", "handler": "users::get" },
        { "id": "get_post", "method": "GET", "path": "/users/{user_id}/posts/{post_id}", "handler": "posts::get" },
        { "id": "create_user", "method": "POST", "path": "/users", "handler": "users::create" },
        { "id": "feed", "method": "WS", "path": "/feed/{room}", "handler": "feed::live" }
    ])))
    .unwrap()
}

#[test]
fn test_root_path() {
    let re = path_to_regex("/").unwrap();
    assert!(re.is_match("/"));
    assert!(!re.is_match("/x"));
}

#[test]
fn test_parameterized_path() {
    let re = path_to_regex("/items/{id}").unwrap();
    assert!(re.is_match("/items/123"));
    assert!(!re.is_match("/items/"));
    assert!(!re.is_match("/items/1/2"));
}

#[test]
fn test_literal_segments_are_escaped() {
    let re = path_to_regex("/files/report.v1").unwrap();
    assert!(re.is_match("/files/report.v1"));
    assert!(!re.is_match("/files/reportXv1"));
}

#[test]
fn test_trailing_slash_is_significant() {
    let index = sample_index();
    assert!(index.find(RouteMethod::Get, "/users").is_some());
    assert!(index.find(RouteMethod::Get, "/users/").is_none());
}

#[test]
fn test_literal_routes_use_exact_strategy() {
    let index = sample_index();
    for route in index.declarations().iter().filter(|r| !r.is_templated()) {
        let m = index.resolve(route.method, &route.path).unwrap().unwrap();
        assert_eq!(m.strategy, MatchStrategy::Exact);
        assert_eq!(m.route.id, route.id);
    }
}

#[test]
fn test_extracts_expected_params() {
    let index = sample_index();
    let m = index
        .resolve(RouteMethod::Get, "/users/7/posts/abc")
        .unwrap()
        .unwrap();
    assert_eq!(m.route.id, "get_post");
    assert_eq!(m.strategy, MatchStrategy::Pattern);
    let expected: HashMap<String, String> = [("user_id", "7"), ("post_id", "abc")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(m.path_params_map(), expected);
}

#[test]
fn test_segment_count_mismatch_never_matches() {
    let index = sample_index();
    assert!(index.resolve(RouteMethod::Get, "/users/7/posts").unwrap().is_none());
    assert!(index.resolve(RouteMethod::Get, "/users/7/posts/a/b").unwrap().is_none());
}

#[test]
fn test_method_partitions_routes() {
    let index = sample_index();
    assert!(index.resolve(RouteMethod::Delete, "/users/1").unwrap().is_none());
    assert!(index.resolve(RouteMethod::Get, "/feed/lobby").unwrap().is_none());
    let ws = index.resolve(RouteMethod::WebSocket, "/feed/lobby").unwrap().unwrap();
    assert_eq!(ws.get_path_param("room"), Some("lobby"));
}

#[test]
fn test_overlapping_templates_resolve_in_declaration_order() {
    let decls = routes(json!([
        { "id": "by_slug", "method": "GET", "path": "/docs/{slug}", "handler": "docs::slug" },
        { "id": "by_id", "method": "GET", "path": "/docs/{id}", "handler": "docs::id" }
    ]));
    for _ in 0..20 {
        let index = RouteIndex::new(decls.clone()).unwrap();
        let m = index.resolve(RouteMethod::Get, "/docs/intro").unwrap().unwrap();
        assert_eq!(m.route.id, "by_slug");
    }
}

#[test]
fn test_exact_beats_earlier_template() {
    let index = RouteIndex::new(routes(json!([
        { "id": "any", "method": "GET", "path": "/users/{id}", "handler": "users::get" },
        { "id": "me", "method": "GET", "path": "/users/me", "handler": "users::me" }
    ])))
    .unwrap();
    let m = index.resolve(RouteMethod::Get, "/users/me").unwrap().unwrap();
    assert_eq!(m.route.id, "me");
    assert_eq!(m.strategy, MatchStrategy::Exact);
}

#[test]
fn test_duplicate_keys_keep_first_declaration() {
    let index = RouteIndex::new(routes(json!([
        { "id": "first", "method": "GET", "path": "/a", "handler": "m::first" },
        { "id": "second", "method": "GET", "path": "/a", "handler": "m::second" }
    ])))
    .unwrap();
    assert_eq!(index.find(RouteMethod::Get, "/a").unwrap().0.id, "first");
    assert_eq!(index.len(), 2);
}

#[test]
fn test_covers_path_ignores_method() {
    let index = sample_index();
    assert!(index.covers_path("/users"));
    assert!(index.covers_path("/users/99"));
    assert!(index.covers_path("/feed/general"));
    assert!(!index.covers_path("/api/v1/users/audit"));
}

#[test]
fn test_param_mismatch_is_internal_fault() {
    let decl = &routes(json!([
        { "id": "x", "method": "GET", "path": "/a/{b}", "handler": "m::x" }
    ]))[0];
    let err = extract_params(decl, "/a/b/c").unwrap_err();
    assert!(matches!(err, DispatchError::ParamMismatch { .. }));
    assert!(err.is_server_fault());
}

//! Rollback and clean against a real materialization run
//!
//! A hand-written file sitting where the suggester wants to write is backed
//! up, not lost; `rollback` brings it back byte-for-byte and `clean` only
//! removes stubs that were freshly created.

use routeloop::atomic_write::backup_path;
use routeloop::router::RouteIndex;
use routeloop::suggest::{
    clean, restore_backup, rollback, LogEntry, LogLoad, LogSource, MaterializerConfig,
    SelectorConfig, SuggestPipeline,
};
use routeloop::table::{load_route_table, RouteMethod};
use std::fs;

const HAND_WRITTEN: &str = "// hand-tuned audit handler\npub fn handle() {}\n";

fn logs(paths: &[&str]) -> LogLoad {
    LogLoad {
        entries: paths
            .iter()
            .map(|p| LogEntry::new(RouteMethod::Get, *p, 200))
            .collect(),
        source: LogSource::Files {
            files: 1,
            skipped: 0,
        },
    }
}

fn pipeline(dir: &std::path::Path) -> SuggestPipeline {
    SuggestPipeline::new(
        "unused",
        100,
        SelectorConfig::default(),
        MaterializerConfig {
            generated_dir: dir.join("suggested"),
            generated_module: "suggested".to_string(),
            default_auth: "authenticated".to_string(),
            route_table: Some(dir.join("routes.generated.yaml")),
        },
        Some(1),
    )
}

#[test]
fn test_rollback_restores_overwritten_handler() {
    let dir = tempfile::tempdir().unwrap();
    let handlers = dir.path().join("suggested");
    fs::create_dir_all(&handlers).unwrap();
    let audit = handlers.join("get_api_v1_users_audit.rs");
    fs::write(&audit, HAND_WRITTEN).unwrap();

    let report = pipeline(dir.path()).run_with_logs(
        logs(&["/api/v1/users/audit", "/api/v1/orders/history"]),
        &RouteIndex::default(),
        false,
    );
    let batch = report.materialized.unwrap();
    assert_eq!(batch.written.len(), 2);
    let backed_up: Vec<_> = batch.written.iter().filter(|w| w.backed_up).collect();
    assert_eq!(backed_up.len(), 1);
    assert_eq!(backed_up[0].file, audit);
    assert!(backup_path(&audit).is_file());
    assert_ne!(fs::read_to_string(&audit).unwrap(), HAND_WRITTEN);

    let restored = rollback(&handlers).unwrap();
    assert_eq!(restored.restored, vec![audit.clone()]);
    assert!(restored.failures.is_empty());
    assert_eq!(fs::read_to_string(&audit).unwrap(), HAND_WRITTEN);
    assert!(!backup_path(&audit).exists());

    // The fresh stub had no backup, so rollback left it; clean removes it.
    let history = handlers.join("get_api_v1_orders_history.rs");
    assert!(history.is_file());
    let cleaned = clean(&handlers).unwrap();
    assert_eq!(cleaned.removed, vec![history.clone()]);
    assert!(!history.exists());
    assert!(audit.is_file());
}

#[test]
fn test_table_backup_restores_previous_generation() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("routes.generated.yaml");

    pipeline(dir.path()).run_with_logs(
        logs(&["/api/v1/users/audit"]),
        &RouteIndex::default(),
        false,
    );
    assert!(!backup_path(&table).exists());

    let existing = RouteIndex::new(load_route_table(&table).unwrap()).unwrap();
    pipeline(dir.path()).run_with_logs(logs(&["/api/v2/reports/summary"]), &existing, false);
    assert_eq!(load_route_table(&table).unwrap().len(), 2);

    assert!(restore_backup(&table).unwrap());
    let routes = load_route_table(&table).unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path, "/api/v1/users/audit");
    assert!(!restore_backup(&table).unwrap());
}

#[test]
fn test_rollback_and_clean_on_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(rollback(&missing).unwrap().restored.is_empty());
    assert!(clean(&missing).unwrap().removed.is_empty());
}

#![allow(dead_code)]

pub mod temp_files {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Creates a uniquely named file in its own temp dir; the dir lives as long as the returned guard.
    pub fn create_temp_table(content: &str) -> (tempfile::TempDir, PathBuf) {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!(
            "routes_{}_{}_{}.yaml",
            std::process::id(),
            counter,
            nanos
        ));
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }
}

pub mod fixtures {
    use routeloop::registry::RouteRegistry;
    use routeloop::table::{parse_route_table, RouteDeclaration};
    use std::sync::Arc;

    pub const BASE_URL: &str = "http://localhost:8080";

    pub const USERS_TABLE: &str = r#"routes:
  - id: list_users
    method: GET
    path: /users
    handler: "users::list"
  - id: get_user
    method: GET
    path: /users/{id}
    handler: "users::get"
  - id: get_user_post
    method: GET
    path: /users/{user_id}/posts/{post_id}
    handler: "users::post"
  - id: explode
    method: POST
    path: /explode
    handler: "faults::explode"
  - id: broken
    method: GET
    path: /broken
    handler: "faults::missing"
  - id: chat
    method: WS
    path: /chat/{room}
    handler: "chat::room"
"#;

    pub fn declarations(yaml: &str) -> Vec<RouteDeclaration> {
        let value: serde_json::Value = serde_yaml::from_str(yaml).unwrap();
        parse_route_table(value).unwrap()
    }

    pub fn registry(yaml: &str) -> Arc<RouteRegistry> {
        Arc::new(RouteRegistry::from_declarations(declarations(yaml)).unwrap())
    }

    pub fn base_url() -> url::Url {
        url::Url::parse(BASE_URL).unwrap()
    }
}

pub mod ws {
    use routeloop::dispatcher::{WebSocketConnection, WsMessage};

    /// Connection double that records everything the handler sends.
    #[derive(Debug, Default)]
    pub struct RecordingConnection {
        pub sent: Vec<WsMessage>,
        pub closed: Option<(u16, String)>,
    }

    impl WebSocketConnection for RecordingConnection {
        fn send(&mut self, msg: WsMessage) -> anyhow::Result<()> {
            if self.closed.is_some() {
                anyhow::bail!("connection closed");
            }
            self.sent.push(msg);
            Ok(())
        }

        fn close(&mut self, code: u16, reason: &str) -> anyhow::Result<()> {
            self.closed = Some((code, reason.to_string()));
            Ok(())
        }
    }
}

pub mod tracing_util {
    /// Scoped subscriber writing through the test harness so logs show on failure.
    pub struct TestTracing {
        _guard: tracing::subscriber::DefaultGuard,
    }

    impl TestTracing {
        pub fn init() -> Self {
            let subscriber = tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(tracing::Level::DEBUG)
                .finish();
            Self {
                _guard: tracing::subscriber::set_default(subscriber),
            }
        }
    }
}

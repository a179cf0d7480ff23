use super::types::{Handler, HandlerLoader, HandlerModule, LoadError};
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::suggest::template::{parse_scaffold_marker, HandlerStub};
use crate::table::HandlerRef;
use anyhow::Context;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves generated stubs straight from the generated-handlers directory.
///
/// `<module>::<name>` resolves to `<dir>/<name>.rs`. The file is read once, at
/// load time, and its scaffold marker decides the response. References in
/// any other module are `NotFound` so a [`super::ChainLoader`] can move on.
#[derive(Debug, Clone)]
pub struct ScaffoldLoader {
    dir: PathBuf,
    module: String,
}

impl ScaffoldLoader {
    pub fn new(dir: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            module: module.into(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn file_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.rs"))
    }

    fn read_stub(&self, name: &str) -> anyhow::Result<HandlerStub> {
        if !is_valid_handler_name(name) {
            anyhow::bail!("'{name}' is not a valid generated handler name");
        }
        let file = self.file_for(name);
        let source = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read generated handler {file:?}"))?;
        parse_scaffold_marker(&source)
            .with_context(|| format!("{file:?} has no scaffold marker"))
    }
}

/// `[a-z0-9_]+`, the shape of every name the materializer writes.
#[must_use]
pub fn is_valid_handler_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl HandlerLoader for ScaffoldLoader {
    fn load(&self, handler: &HandlerRef) -> Result<HandlerModule, LoadError> {
        let (module, name) = handler.split_module();
        if module != Some(self.module.as_str()) {
            return Err(LoadError::NotFound(handler.clone()));
        }
        let stub = self.read_stub(name).map_err(|source| LoadError::Failed {
            handler: handler.clone(),
            source,
        })?;
        debug!(handler = %handler, resource = %stub.resource_name, "Scaffold handler loaded");
        Ok(HandlerModule::with_entry(ScaffoldHandler { stub }))
    }
}

/// Placeholder entry point for a generated route.
#[derive(Debug, Clone)]
pub struct ScaffoldHandler {
    stub: HandlerStub,
}

impl Handler for ScaffoldHandler {
    fn handle(&self, req: HandlerRequest) -> anyhow::Result<HandlerResponse> {
        Ok(HandlerResponse::json(
            200,
            json!({
                "route_id": req.route_id(),
                "resource": self.stub.resource_name,
                "scaffold": true,
                "confidence": self.stub.score,
                "method": self.stub.method,
                "path": self.stub.original_path,
                "params": req.path_params_map(),
                "query": req.query_params_map(),
            }),
        ))
    }
}

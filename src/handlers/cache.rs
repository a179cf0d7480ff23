use super::types::{HandlerLoader, HandlerModule, LoadError};
use crate::error::panic_message;
use crate::table::HandlerRef;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

type Slot = Arc<OnceCell<Arc<HandlerModule>>>;

/// Process-lifetime cache of loaded handler modules with single-flight loading.
///
/// The map stores a cell per reference *before* the load runs. Racing callers
/// clone the same cell and block on it, so the loader runs at most once per
/// reference even on a cold cache. A failed load leaves the cell empty and
/// the next caller retries.
pub struct HandlerCache {
    loader: Arc<dyn HandlerLoader>,
    slots: DashMap<HandlerRef, Slot>,
}

impl HandlerCache {
    pub fn new(loader: Arc<dyn HandlerLoader>) -> Self {
        Self {
            loader,
            slots: DashMap::new(),
        }
    }

    /// Return the cached module or load it, waiting on any in-flight load.
    pub fn get_or_load(&self, handler: &HandlerRef) -> Result<Arc<HandlerModule>, LoadError> {
        if let Some(module) = self
            .slots
            .get(handler)
            .and_then(|slot| slot.value().get().cloned())
        {
            return Ok(module);
        }

        // Clone the slot out so the shard lock is released before loading.
        let slot: Slot = Arc::clone(self.slots.entry(handler.clone()).or_default().value());
        slot.get_or_try_init(|| self.load_once(handler))
            .map(Arc::clone)
    }

    fn load_once(&self, handler: &HandlerRef) -> Result<Arc<HandlerModule>, LoadError> {
        let started = Instant::now();
        debug!(handler = %handler, "Loading handler module");
        let loaded = catch_unwind(AssertUnwindSafe(|| self.loader.load(handler)))
            .unwrap_or_else(|panic| {
                Err(LoadError::Failed {
                    handler: handler.clone(),
                    source: anyhow::anyhow!("loader panicked: {}", panic_message(panic.as_ref())),
                })
            });
        match loaded {
            Ok(module) => {
                info!(
                    handler = %handler,
                    entry = module.has_entry(),
                    websocket = module.has_websocket(),
                    load_time_us = started.elapsed().as_micros() as u64,
                    "Handler module loaded"
                );
                Ok(Arc::new(module))
            }
            Err(e) => {
                error!(handler = %handler, error = %e, "Handler module load failed");
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn is_loaded(&self, handler: &HandlerRef) -> bool {
        self.slots
            .get(handler)
            .is_some_and(|slot| slot.value().get().is_some())
    }

    /// Number of successfully loaded modules.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }
}

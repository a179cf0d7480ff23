use crate::dispatcher::{HandlerRequest, HandlerResponse, WsContext, WsMessage};
use crate::table::HandlerRef;
use std::fmt;
use std::sync::Arc;

/// Callable entry point of a handler module.
pub trait Handler: Send + Sync {
    fn handle(&self, req: HandlerRequest) -> anyhow::Result<HandlerResponse>;
}

impl<F> Handler for F
where
    F: Fn(HandlerRequest) -> anyhow::Result<HandlerResponse> + Send + Sync,
{
    fn handle(&self, req: HandlerRequest) -> anyhow::Result<HandlerResponse> {
        self(req)
    }
}

/// WebSocket callback set exported by a handler module.
///
/// The dispatcher hands the upgrade to [`handshake`](Self::handshake); the
/// transport then drives `open`/`message`/`drain`/`close` through a
/// [`crate::dispatcher::WebSocketSession`].
pub trait WebSocketHandler: Send + Sync {
    /// Response to the upgrade request. Defaults to `101 Switching Protocols`.
    fn handshake(&self, _req: &HandlerRequest) -> HandlerResponse {
        HandlerResponse::switching_protocols()
    }

    fn open(&self, ws: &mut WsContext<'_>) -> anyhow::Result<()>;

    fn message(&self, ws: &mut WsContext<'_>, msg: WsMessage) -> anyhow::Result<()>;

    fn close(&self, _ws: &mut WsContext<'_>, _code: u16, _reason: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the connection's send buffer has drained.
    fn drain(&self, _ws: &mut WsContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A loaded handler module: an entry point, WebSocket callbacks, or both.
#[derive(Clone, Default)]
pub struct HandlerModule {
    pub entry: Option<Arc<dyn Handler>>,
    pub websocket: Option<Arc<dyn WebSocketHandler>>,
}

impl HandlerModule {
    pub fn with_entry(handler: impl Handler + 'static) -> Self {
        Self {
            entry: Some(Arc::new(handler)),
            websocket: None,
        }
    }

    /// Module whose entry point is a plain function or closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(HandlerRequest) -> anyhow::Result<HandlerResponse> + Send + Sync + 'static,
    {
        Self::with_entry(f)
    }

    pub fn with_websocket(handler: impl WebSocketHandler + 'static) -> Self {
        Self {
            entry: None,
            websocket: Some(Arc::new(handler)),
        }
    }

    /// Add WebSocket callbacks to a module that already has an entry point.
    #[must_use]
    pub fn and_websocket(mut self, handler: impl WebSocketHandler + 'static) -> Self {
        self.websocket = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn has_entry(&self) -> bool {
        self.entry.is_some()
    }

    #[must_use]
    pub fn has_websocket(&self) -> bool {
        self.websocket.is_some()
    }
}

impl fmt::Debug for HandlerModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerModule")
            .field("entry", &self.entry.is_some())
            .field("websocket", &self.websocket.is_some())
            .finish()
    }
}

/// Why a handler reference could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// This loader does not know the reference; a chained loader may.
    #[error("no handler module registered for '{0}'")]
    NotFound(HandlerRef),
    /// The module exists but loading it failed.
    #[error("failed to load handler module '{handler}': {source:#}")]
    Failed {
        handler: HandlerRef,
        #[source]
        source: anyhow::Error,
    },
}

/// Turns a handler reference into a loaded module.
///
/// Loading may do I/O; callers go through [`crate::handlers::HandlerCache`]
/// so each reference is loaded at most once.
pub trait HandlerLoader: Send + Sync {
    fn load(&self, handler: &HandlerRef) -> Result<HandlerModule, LoadError>;
}

type Factory = dyn Fn() -> anyhow::Result<HandlerModule> + Send + Sync;

/// Static catalog of handler factories keyed by reference.
#[derive(Default)]
pub struct HandlerCatalog {
    factories: std::collections::HashMap<HandlerRef, Arc<Factory>>,
}

impl HandlerCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A later registration for the same reference replaces the earlier one.
    pub fn register<F>(&mut self, handler: impl Into<HandlerRef>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<HandlerModule> + Send + Sync + 'static,
    {
        self.factories.insert(handler.into(), Arc::new(factory));
        self
    }

    /// Register a function as a module with only an entry point.
    pub fn register_entry<F>(&mut self, handler: impl Into<HandlerRef>, entry: F) -> &mut Self
    where
        F: Fn(HandlerRequest) -> anyhow::Result<HandlerResponse> + Clone + Send + Sync + 'static,
    {
        self.register(handler, move || Ok(HandlerModule::from_fn(entry.clone())))
    }

    #[must_use]
    pub fn contains(&self, handler: &HandlerRef) -> bool {
        self.factories.contains_key(handler)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl HandlerLoader for HandlerCatalog {
    fn load(&self, handler: &HandlerRef) -> Result<HandlerModule, LoadError> {
        let factory = self
            .factories
            .get(handler)
            .ok_or_else(|| LoadError::NotFound(handler.clone()))?;
        factory().map_err(|source| LoadError::Failed {
            handler: handler.clone(),
            source,
        })
    }
}

/// Tries each loader in order; moves on only when a loader reports `NotFound`.
#[derive(Default)]
pub struct ChainLoader {
    loaders: Vec<Arc<dyn HandlerLoader>>,
}

impl ChainLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, loader: Arc<dyn HandlerLoader>) -> Self {
        self.loaders.push(loader);
        self
    }
}

impl HandlerLoader for ChainLoader {
    fn load(&self, handler: &HandlerRef) -> Result<HandlerModule, LoadError> {
        for loader in &self.loaders {
            match loader.load(handler) {
                Err(LoadError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(LoadError::NotFound(handler.clone()))
    }
}

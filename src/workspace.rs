//! Workspace component admission.
//!
//! Some inbound commands name a UI component bundle that must be fetched and
//! initialized asynchronously before the command can be meaningfully handled
//! (`workspace_component` names a bundle; board commands for it may already
//! be in flight behind it). The [`ComponentManager`] owns that choreography:
//! it handles `workspace_component`, closes the dependency gate for the
//! duration of the load, and releases it on success, failure or timeout.
//! The gate must never deadlock, so a failed load still releases it and the
//! command then dispatches against a possibly-missing handler.
//!
//! Loading and injecting are the embedder's concern (fetching a script
//! bundle, mounting a widget); the manager drives them through the
//! [`ComponentLoader`] seam. A bundle is fetched once per session; repeat
//! requests for a loaded component re-inject without touching the gate.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::dispatch::CommandRouter;
use crate::error::{Error, Result};
use crate::identifiers::HandlerId;
use crate::protocol::names;
use crate::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Deadline for a component load before the gate entry is force-cleared.
///
/// A load that never finishes would otherwise stall all inbound dispatch
/// permanently.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ComponentLoader
// ============================================================================

/// Fetches and mounts named component bundles.
///
/// Implemented by the embedder: `load` fetches and initializes the bundle
/// (once per session), `inject` mounts the component into the workspace
/// (every time the server asks for it).
#[async_trait]
pub trait ComponentLoader: Send + Sync {
    /// Fetches and initializes the named bundle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ComponentLoad`] (or any embedder error) on failure;
    /// the manager logs it and releases the gate regardless.
    async fn load(&self, name: &str) -> Result<()>;

    /// Mounts the component into the workspace.
    ///
    /// # Errors
    ///
    /// Returns an embedder error on failure; logged, never fatal.
    async fn inject(&self, name: &str) -> Result<()>;
}

// ============================================================================
// ComponentState
// ============================================================================

/// Which bundles are loaded or in flight.
struct ComponentState {
    /// Successfully loaded bundles.
    loaded: FxHashSet<String>,
    /// Loads currently in flight.
    loading: FxHashSet<String>,
}

// ============================================================================
// ComponentManager
// ============================================================================

/// Handles `workspace_component` commands and gates dispatch while bundles
/// load.
pub struct ComponentManager {
    /// Router carrying the dependency gate.
    router: Arc<CommandRouter>,
    /// Embedder's load/inject implementation.
    loader: Arc<dyn ComponentLoader>,
    /// Load bookkeeping.
    state: Mutex<ComponentState>,
    /// Force-clear deadline for a single load.
    load_timeout: Duration,
    /// Registration token for `detach`.
    handler: Mutex<Option<HandlerId>>,
}

impl ComponentManager {
    /// Creates a manager bound to a router.
    #[must_use]
    pub fn new(
        router: Arc<CommandRouter>,
        loader: Arc<dyn ComponentLoader>,
        load_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            router,
            loader,
            state: Mutex::new(ComponentState {
                loaded: FxHashSet::default(),
                loading: FxHashSet::default(),
            }),
            load_timeout,
            handler: Mutex::new(None),
        })
    }

    /// Creates a manager wired to a session's router and load deadline.
    #[must_use]
    pub fn for_session(session: &Session, loader: Arc<dyn ComponentLoader>) -> Arc<Self> {
        Self::new(
            Arc::clone(session.router()),
            loader,
            session.load_timeout(),
        )
    }

    /// Registers the `workspace_component` handler.
    pub fn attach(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let id = self.router.register(
            names::WORKSPACE_COMPONENT,
            Arc::new(move |msg| {
                let name = msg.get_str("name");
                if name.is_empty() {
                    return Err(Error::decode("workspace_component frame without a name"));
                }
                manager.request(name);
                Ok(())
            }),
        );

        *self.handler.lock() = Some(id);
    }

    /// Unregisters the `workspace_component` handler.
    pub fn detach(&self) {
        if let Some(id) = self.handler.lock().take() {
            self.router.unregister(id);
        }
    }

    /// Returns `true` if the named bundle has loaded.
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.state.lock().loaded.contains(name)
    }

    /// Handles one component request.
    fn request(self: &Arc<Self>, name: String) {
        {
            let mut state = self.state.lock();

            if state.loaded.contains(&name) {
                debug!(%name, "component already loaded, re-injecting");
                let manager = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(error) = manager.loader.inject(&name).await {
                        warn!(%name, %error, "component injection failed");
                    }
                });
                return;
            }

            if !state.loading.insert(name.clone()) {
                debug!(%name, "component load already in flight");
                return;
            }
        }

        self.router.begin_load(&name);

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_load(&name).await;
            manager.state.lock().loading.remove(&name);
            manager.router.complete_load(&name);
        });
    }

    /// Drives one load to success, failure or force-clear.
    async fn run_load(&self, name: &str) {
        match timeout(self.load_timeout, self.loader.load(name)).await {
            Ok(Ok(())) => {
                self.state.lock().loaded.insert(name.to_string());
                debug!(name, "component loaded");

                if let Err(error) = self.loader.inject(name).await {
                    warn!(name, %error, "component injection failed");
                }
            }
            Ok(Err(error)) => {
                warn!(name, %error, "component load failed, releasing gate");
            }
            Err(_) => {
                let error = Error::load_timeout(name, self.load_timeout.as_millis() as u64);
                warn!(name, %error, "stalled component load force-cleared");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

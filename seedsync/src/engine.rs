//! Engine
//!
//! [`Engine`] owns the store, the transport and every handler subscription.
//! It is the entry point for embedding the sync engine:
//!
//! ```ignore
//! use seedsync::{Engine, EngineConfig, Point};
//! use seedsync::state::Action;
//!
//! let engine = Engine::start(EngineConfig::from_config_file(&config))?;
//! engine.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
//! engine.wait_idle().await;
//! println!("{:?}", engine.state().run_configuration.elevation);
//! engine.shutdown();
//! ```
//!
//! The engine must be created inside a Tokio runtime; handler work is spawned
//! onto that runtime, which may be current-thread or multi-thread. A result
//! is checked against its subscription's live generation under the store's
//! write lock, so a superseded firing cannot write after a newer one.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigFile, TraitFunction, VariableConfig};
use crate::expr::{ArithmeticEngine, ExpressionEngine};
use crate::resync::{Registration, Watcher};
use crate::state::{Action, AppState};
use crate::store::{Dispatcher, Store};
use crate::sync::{register_all, SyncContext};
use crate::transport::{ClientSettings, HttpClient, ReqwestClient, Transport, TransportError};

/// Errors from starting the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Everything the engine needs to start.
#[derive(Clone)]
pub struct EngineConfig {
    pub client: ClientSettings,
    pub api_root: String,
    pub latitude_variable: String,
    pub variables: Vec<VariableConfig>,
    pub trait_functions: Vec<TraitFunction>,
    pub expression_engine: Arc<dyn ExpressionEngine>,
}

impl EngineConfig {
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            client: config.server.client_settings(),
            api_root: config.server.api_root.clone(),
            latitude_variable: config.engine.latitude_variable.clone(),
            variables: config.variables.clone(),
            trait_functions: config.traits.clone(),
            expression_engine: Arc::new(ArithmeticEngine::new()),
        }
    }

    /// Replace the formula evaluator.
    pub fn with_expression_engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
        self.expression_engine = engine;
        self
    }

    fn sync_context(&self) -> SyncContext {
        SyncContext {
            api_root: self.api_root.clone(),
            latitude_variable: self.latitude_variable.clone(),
            variables: self.variables.clone(),
            trait_functions: self.trait_functions.clone(),
            engine: Arc::clone(&self.expression_engine),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config_file(&ConfigFile::default())
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("client", &self.client)
            .field("api_root", &self.api_root)
            .field("latitude_variable", &self.latitude_variable)
            .field("variables", &self.variables.len())
            .field("trait_functions", &self.trait_functions.len())
            .finish_non_exhaustive()
    }
}

/// A running sync engine.
pub struct Engine {
    store: Store<AppState, Action>,
    transport: Transport,
    context: Arc<SyncContext>,
    registrations: Mutex<Vec<Registration>>,
}

impl Engine {
    /// Start against the configured backend.
    pub fn start(config: EngineConfig) -> Result<Self, EngineError> {
        let client = ReqwestClient::with_settings(config.client.clone())?;
        Self::with_client(config, Arc::new(client))
    }

    /// Start with a caller-supplied HTTP client.
    pub fn with_client(config: EngineConfig, client: Arc<dyn HttpClient>) -> Result<Self, EngineError> {
        info!(api_root = %config.api_root, "starting sync engine");

        let transport = Transport::from_current(client)?;
        let store = Store::new(AppState::new(config.trait_functions.clone()));
        let context = Arc::new(config.sync_context());

        let watcher = Watcher::new(&store, &transport);
        let registrations = register_all(&watcher, &context);

        let engine = Self {
            store,
            transport,
            context,
            registrations: Mutex::new(registrations),
        };

        // Every subscription records the initial snapshot.
        engine.dispatch(Action::Initialize);

        info!(
            subscriptions = engine.registrations.lock().len(),
            "sync engine started"
        );
        Ok(engine)
    }

    pub fn dispatch(&self, action: Action) {
        debug!(?action, "dispatch");
        self.store.dispatch(action);
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AppState {
        self.store.get_state()
    }

    pub fn select<T>(&self, selector: impl FnOnce(&AppState) -> T) -> T {
        self.store.select(selector)
    }

    pub fn store(&self) -> &Store<AppState, Action> {
        &self.store
    }

    pub fn dispatcher(&self) -> Dispatcher<Action> {
        self.store.dispatcher()
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Number of times each subscription has fired, by name.
    pub fn firings(&self) -> Vec<(&'static str, u64)> {
        self.registrations
            .lock()
            .iter()
            .map(|r| (r.name(), r.firings()))
            .collect()
    }

    /// Number of handler tasks still running.
    pub fn in_flight(&self) -> usize {
        self.transport.in_flight()
    }

    /// Resolves once every spawned handler task has settled, including tasks
    /// spawned by results dispatched along the way.
    pub async fn wait_idle(&self) {
        self.transport.wait_idle().await;
    }

    /// Stop every subscription and abandon handler work still in flight.
    ///
    /// Abandoned tasks dispatch nothing. Calling this twice is harmless.
    pub fn shutdown(&self) {
        let registrations: Vec<Registration> = self.registrations.lock().drain(..).collect();
        if registrations.is_empty() && self.transport.is_shut_down() {
            return;
        }

        let count = registrations.len();
        for registration in registrations {
            registration.unsubscribe();
        }
        self.transport.shutdown();
        info!(subscriptions = count, "sync engine stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.transport.is_shut_down()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Effect handlers
//!
//! Each submodule registers one or more subscriptions that keep a family of
//! derived data in step with the run configuration:
//!
//! - [`point`]: regions and elevation of the selected point
//! - [`variables`]: variable values, transfer limits, popup values
//! - [`zones`]: available species, matching seed zones, zone geometry
//! - [`legends`]: legends of the active map layers
//! - [`popup`]: region, elevation, values and zones at the popup location
//! - [`functions`]: values of custom functions
//! - [`traits`]: values of configured traits
//!
//! Handlers share one shape. A pure selector picks the inputs they depend on.
//! When those change, the handler checks its preconditions, works out which
//! items actually need refetching (see [`diff`]), dispatches a request action
//! per item and spawns the guarded fetch. Each item settles independently to
//! a value or to `None`, and results of a superseded firing are dropped.

pub mod bridge;
pub mod diff;
pub mod functions;
pub mod legends;
pub mod point;
pub mod popup;
pub mod traits;
pub mod variables;
pub mod zones;

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::arcgis::{identify_url, IdentifyResponse};
use crate::config::{ConfigFile, TraitFunction, VariableConfig};
use crate::expr::{ArithmeticEngine, ExpressionEngine, ExpressionError};
use crate::point::Point;
use crate::resync::{Io, Registration, Watcher};
use crate::state::{Action, AppState};
use crate::store::{Store, WeakStore};
use crate::transport::TransportError;

/// Errors an effect handler can report to the watcher.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Precondition not met: {0}")]
    Precondition(String),
}

/// Settings and collaborators shared by every handler.
pub struct SyncContext {
    /// Prefix of the seed source REST API, with leading and trailing slash.
    pub api_root: String,
    /// Variable resolved from the point's latitude.
    pub latitude_variable: String,
    /// Variable catalog, used for legend labels.
    pub variables: Vec<VariableConfig>,
    pub trait_functions: Vec<TraitFunction>,
    pub engine: Arc<dyn ExpressionEngine>,
}

impl SyncContext {
    pub fn from_config(config: &ConfigFile, engine: Arc<dyn ExpressionEngine>) -> Self {
        Self {
            api_root: config.server.api_root.clone(),
            latitude_variable: config.engine.latitude_variable.clone(),
            variables: config.variables.clone(),
            trait_functions: config.traits.clone(),
            engine,
        }
    }

    /// URL of an endpoint of the seed source API.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    pub fn multiplier(&self, variable: &str) -> Option<f64> {
        self.variables
            .iter()
            .find(|v| v.name == variable)
            .map(|v| v.multiplier)
    }

    pub fn trait_function(&self, name: &str) -> Option<&TraitFunction> {
        self.trait_functions.iter().find(|f| f.name == name)
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::from_config(&ConfigFile::default(), Arc::new(ArithmeticEngine::new()))
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("api_root", &self.api_root)
            .field("latitude_variable", &self.latitude_variable)
            .field("variables", &self.variables.len())
            .field("trait_functions", &self.trait_functions.len())
            .finish_non_exhaustive()
    }
}

/// Read access to the current state from inside handlers.
///
/// Holds the store weakly, since handlers are owned by the store's listeners.
#[derive(Clone)]
pub(crate) struct StateReader(WeakStore<AppState, Action>);

impl StateReader {
    pub(crate) fn new(store: &Store<AppState, Action>) -> Self {
        Self(store.downgrade())
    }

    /// Project the current state, or `None` once the store is gone.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&AppState) -> T) -> Option<T> {
        self.0.upgrade().map(|store| store.select(f))
    }
}

/// Register every handler family.
pub fn register_all(watcher: &Watcher<AppState, Action>, ctx: &Arc<SyncContext>) -> Vec<Registration> {
    let mut registrations = Vec::new();
    registrations.extend(point::register(watcher, ctx));
    registrations.extend(variables::register(watcher, ctx));
    registrations.extend(zones::register(watcher, ctx));
    registrations.extend(legends::register(watcher, ctx));
    registrations.extend(popup::register(watcher, ctx));
    registrations.extend(functions::register(watcher, ctx));
    registrations.extend(traits::register(watcher, ctx));
    debug!(count = registrations.len(), "sync handlers registered");
    registrations
}

/// `{"results": [{"name": ..}, ..]}` from the regions endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct RegionsResponse {
    #[serde(default)]
    results: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    name: String,
}

impl RegionsResponse {
    pub(crate) fn names(self) -> Vec<String> {
        self.results.into_iter().map(|r| r.name).collect()
    }
}

/// URL of the regions containing a point.
pub(crate) fn regions_url(ctx: &SyncContext, point: &Point) -> String {
    format!(
        "{}?{}",
        ctx.api_url("regions/"),
        crate::transport::url_encode(&[("point", point.query_value())])
    )
}

/// Raster value of a map service at a point.
pub(crate) async fn identify(io: &Io, service: &str, point: &Point) -> Result<Option<f64>, TransportError> {
    let response: IdentifyResponse = io.get_json(&identify_url(service, point)).await?;
    Ok(response.pixel_value())
}

/// Turn a fetch result into the value to dispatch.
///
/// `None` means the result is stale and nothing may be dispatched. Failures
/// become `Some(None)`, clearing the item.
pub(crate) fn settle<T>(subscription: &str, item: &str, result: Result<Option<T>, TransportError>) -> Option<Option<T>> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_stale() => {
            debug!(subscription, item, "stale result dropped");
            None
        }
        Err(e) => {
            warn!(subscription, item, error = %e, "fetch failed");
            Some(None)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared harness for handler tests.

    use super::*;
    use crate::transport::{MockHttpClient, Transport};

    pub(crate) struct Harness {
        pub mock: Arc<MockHttpClient>,
        pub store: Store<AppState, Action>,
        pub watcher: Watcher<AppState, Action>,
        pub ctx: Arc<SyncContext>,
    }

    impl Harness {
        /// Must be called from inside a Tokio runtime.
        pub(crate) fn new(state: AppState) -> Self {
            Self::with_context(state, SyncContext::default())
        }

        pub(crate) fn with_context(state: AppState, ctx: SyncContext) -> Self {
            let mock = Arc::new(MockHttpClient::new());
            let transport = Transport::from_current(mock.clone()).unwrap();
            let store = Store::new(state);
            let watcher = Watcher::new(&store, &transport);
            Self {
                mock,
                store,
                watcher,
                ctx: Arc::new(ctx),
            }
        }

        pub(crate) fn dispatch(&self, action: Action) {
            self.store.dispatch(action);
        }

        pub(crate) async fn settle(&self) {
            self.watcher.transport().wait_idle().await;
        }

        pub(crate) fn state(&self) -> AppState {
            self.store.get_state()
        }
    }

    /// Identify response carrying a single pixel value.
    pub(crate) fn pixel(value: f64) -> serde_json::Value {
        serde_json::json!({"results": [{"attributes": {"Pixel value": value}}]})
    }

    pub(crate) fn regions(names: &[&str]) -> serde_json::Value {
        let results: Vec<_> = names.iter().map(|n| serde_json::json!({"name": n})).collect();
        serde_json::json!({ "results": results })
    }
}

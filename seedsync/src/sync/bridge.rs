//! Formula evaluation over fetched climate values.
//!
//! A formula is evaluated only once every variable it references has a value.
//! The latitude variable comes from the point itself; every other variable is
//! read from its map service concurrently, through the same guarded [`Io`].
//! Any missing input makes the whole result `None`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use super::{identify, SyncContext};
use crate::arcgis::service_name;
use crate::point::Point;
use crate::resync::Io;
use crate::state::{Action, Climate, Objective};
use crate::store::Dispatcher;
use crate::transport::TransportError;

/// Where and under which climate a formula is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaInputs {
    pub objective: Objective,
    pub climate: Climate,
    pub region: String,
    pub point: Point,
}

/// Evaluate `formula` at the given inputs.
///
/// Returns `Ok(None)` when the formula cannot be parsed, an input is
/// unavailable, evaluation fails or the result is not finite. Returns
/// [`TransportError::Stale`] when the firing behind `io` has been superseded,
/// in which case the caller must not dispatch anything.
pub async fn evaluate_formula(
    ctx: &SyncContext,
    io: &Io,
    formula: &str,
    inputs: &FormulaInputs,
) -> Result<Option<f64>, TransportError> {
    let names = match ctx.engine.names(formula) {
        Ok(names) => names,
        Err(e) => {
            debug!(formula, error = %e, "formula variables could not be determined");
            return Ok(None);
        }
    };

    let fetches = names.iter().map(|name| async move {
        if *name == ctx.latitude_variable {
            return Ok::<_, TransportError>((name.clone(), inputs.point.lat()));
        }

        let service = service_name(name, inputs.objective, &inputs.climate, &inputs.region);
        match identify(io, &service, &inputs.point).await? {
            Some(value) => Ok((name.clone(), value)),
            None => Err(TransportError::Decode {
                url: service,
                reason: "no pixel value at point".to_string(),
            }),
        }
    });

    let context: HashMap<String, f64> = match try_join_all(fetches).await {
        Ok(values) => values.into_iter().collect(),
        Err(e) if e.is_stale() || !io.is_current() => {
            return Err(TransportError::Stale {
                generation: io.generation(),
            });
        }
        Err(e) => {
            debug!(formula, error = %e, "formula input unavailable");
            return Ok(None);
        }
    };

    match ctx.engine.evaluate(formula, &context) {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        Ok(value) => {
            debug!(formula, value, "formula result is not finite");
            Ok(None)
        }
        Err(e) => {
            debug!(formula, error = %e, "formula evaluation failed");
            Ok(None)
        }
    }
}

/// Evaluate `formula` in the background and dispatch the action built from
/// its result, unless the firing has been superseded by then.
pub(crate) fn spawn_evaluation<F>(
    subscription: &'static str,
    ctx: &Arc<SyncContext>,
    io: &Io,
    dispatch: &Dispatcher<Action>,
    formula: String,
    inputs: Arc<FormulaInputs>,
    settled: F,
) where
    F: FnOnce(Option<f64>) -> Action + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    let dispatch = dispatch.clone();
    let task_io = io.clone();
    io.spawn(async move {
        match evaluate_formula(&ctx, &task_io, &formula, &inputs).await {
            // Results that needed no request are checked here too.
            Ok(value) => {
                if task_io.dispatch(&dispatch, settled(value)) {
                    debug!(subscription, formula = %formula, ?value, "formula settled");
                }
            }
            Err(_) => debug!(subscription, formula = %formula, "stale evaluation dropped"),
        }
    });
}

//! End-to-end scenarios for the sync engine.
//!
//! The engine runs against a scripted HTTP client whose held requests are
//! released by the test in any order, so late and out-of-order responses can
//! be reproduced deterministically on a current-thread runtime.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use seedsync::state::{Action, AppState};
use seedsync::transport::{BoxFuture, HttpClient, Request, Response, TransportError};
use seedsync::{Engine, EngineConfig, Point};

enum Reply {
    Json(u16, Value),
    Hold,
}

struct Parked {
    url: String,
    tx: oneshot::Sender<(u16, Value)>,
}

/// HTTP client answering from scripted routes; held routes wait for release.
#[derive(Default)]
struct GatedClient {
    routes: Mutex<Vec<(String, Reply)>>,
    parked: Mutex<VecDeque<Parked>>,
    seen: Mutex<Vec<String>>,
}

impl GatedClient {
    fn respond(&self, pattern: &str, status: u16, body: Value) {
        self.routes.lock().push((pattern.to_string(), Reply::Json(status, body)));
    }

    fn hold(&self, pattern: &str) {
        self.routes.lock().push((pattern.to_string(), Reply::Hold));
    }

    fn release(&self, pattern: &str, status: u16, body: Value) {
        let parked = {
            let mut queue = self.parked.lock();
            let index = queue
                .iter()
                .position(|p| p.url.contains(pattern))
                .unwrap_or_else(|| panic!("no parked request matches {}", pattern));
            queue.remove(index)
        };
        if let Some(p) = parked {
            let _ = p.tx.send((status, body));
        }
    }

    fn parked(&self, pattern: &str) -> usize {
        self.parked.lock().iter().filter(|p| p.url.contains(pattern)).count()
    }

    fn count(&self, pattern: &str) -> usize {
        self.seen.lock().iter().filter(|u| u.contains(pattern)).count()
    }
}

fn response(url: &str, status: u16, body: &Value) -> Result<Response, TransportError> {
    Ok(Response::new(url, status, body.to_string().into_bytes()))
}

impl HttpClient for GatedClient {
    fn send<'a>(&'a self, request: Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        let url = request.url;
        self.seen.lock().push(url.clone());

        let reply = {
            let routes = self.routes.lock();
            routes.iter().find(|(p, _)| url.contains(p)).map(|(_, r)| match r {
                Reply::Json(status, body) => Reply::Json(*status, body.clone()),
                Reply::Hold => Reply::Hold,
            })
        };

        match reply {
            Some(Reply::Json(status, body)) => {
                let result = response(&url, status, &body);
                Box::pin(async move { result })
            }
            Some(Reply::Hold) => {
                let (tx, rx) = oneshot::channel();
                self.parked.lock().push_back(Parked { url: url.clone(), tx });
                Box::pin(async move {
                    match rx.await {
                        Ok((status, body)) => response(&url, status, &body),
                        Err(_) => Err(TransportError::Request {
                            url,
                            reason: "released without reply".to_string(),
                        }),
                    }
                })
            }
            None => {
                let result = response(&url, 404, &json!({}));
                Box::pin(async move { result })
            }
        }
    }
}

fn pixel(value: f64) -> Value {
    json!({"results": [{"attributes": {"Pixel value": value}}]})
}

fn start(client: &Arc<GatedClient>) -> Engine {
    client.respond("/sst/regions/", 200, json!({"results": [{"name": "west2"}]}));
    client.respond("west2_dem", 200, pixel(250.0));
    Engine::with_client(EngineConfig::default(), client.clone()).unwrap()
}

/// Let spawned tasks run until `condition` holds.
async fn until(condition: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

fn value(state: &AppState, name: &str) -> Option<f64> {
    state.run_configuration.variable(name).and_then(|v| v.value)
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_second_point_wins_over_late_first_response() {
    let client = Arc::new(GatedClient::default());
    client.hold("west2_1961_1990Y_MAT/");
    client.respond("west2_1961_1990Y_MAP/", 200, pixel(800.0));
    let engine = start(&client);

    engine.dispatch(Action::AddVariables(names(&["MAT", "MAP"])));
    engine.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
    until(|| client.parked("-123") == 1).await;

    engine.dispatch(Action::SetPoint(Point::from_lat_lon(46.0, -122.0)));
    until(|| client.parked("-122") == 1).await;

    client.release("-122", 200, pixel(130.0));
    client.release("-123", 200, pixel(125.0));
    engine.wait_idle().await;

    let state = engine.state();
    assert_eq!(state.run_configuration.region.as_deref(), Some("west2"));
    assert_eq!(value(&state, "MAT"), Some(130.0));
    assert_eq!(value(&state, "MAP"), Some(800.0));
    assert!(!state.run_configuration.variable("MAT").unwrap().is_fetching);
}

#[tokio::test]
async fn test_late_failure_never_clears_newer_value() {
    let client = Arc::new(GatedClient::default());
    client.hold("west2_1961_1990Y_MAT/");
    let engine = start(&client);

    engine.dispatch(Action::AddVariables(names(&["MAT"])));
    engine.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
    until(|| client.parked("-123") == 1).await;
    engine.dispatch(Action::SetPoint(Point::from_lat_lon(46.0, -122.0)));
    until(|| client.parked("-122") == 1).await;

    client.release("-122", 200, pixel(130.0));
    client.release("-123", 500, json!({}));
    engine.wait_idle().await;

    assert_eq!(value(&engine.state(), "MAT"), Some(130.0));
}

#[tokio::test]
async fn test_added_variable_fetches_exactly_once() {
    let client = Arc::new(GatedClient::default());
    client.respond("_MAT/", 200, pixel(125.0));
    client.respond("_MAP/", 200, pixel(800.0));
    client.respond("_TD/", 200, pixel(210.0));
    client.respond("_MCMT/", 200, pixel(-45.0));
    let engine = start(&client);

    engine.dispatch(Action::AddVariables(names(&["MAT", "MAP", "TD"])));
    engine.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
    engine.wait_idle().await;
    let before = client.count("MapServer/identify");

    engine.dispatch(Action::AddVariables(names(&["MCMT"])));
    engine.wait_idle().await;

    assert_eq!(client.count("MapServer/identify"), before + 1);
    assert_eq!(client.count("_MCMT/"), 1);
    let state = engine.state();
    assert_eq!(value(&state, "MCMT"), Some(-45.0));
    assert_eq!(value(&state, "MAT"), Some(125.0));
}

#[tokio::test]
async fn test_failed_item_leaves_siblings_populated() {
    let client = Arc::new(GatedClient::default());
    client.respond("_MAT/", 200, pixel(125.0));
    client.respond("_MAP/", 500, json!({"detail": "boom"}));
    client.respond("_TD/", 200, pixel(210.0));
    let engine = start(&client);

    engine.dispatch(Action::AddVariables(names(&["MAT", "MAP", "TD"])));
    engine.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
    engine.wait_idle().await;

    let state = engine.state();
    assert_eq!(value(&state, "MAT"), Some(125.0));
    assert_eq!(value(&state, "MAP"), None);
    assert_eq!(value(&state, "TD"), Some(210.0));
    assert!(state.run_configuration.variables.iter().all(|v| !v.is_fetching));
}

#[tokio::test]
async fn test_formula_with_failed_input_is_none() {
    let client = Arc::new(GatedClient::default());
    client.respond("_MAT/", 200, pixel(125.0));
    client.respond("_MAP/", 500, json!({}));
    let engine = start(&client);

    engine.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
    engine.wait_idle().await;
    engine.dispatch(Action::CreateFunction {
        name: "sum".to_string(),
        func: "MAT + MAP".to_string(),
    });
    engine.dispatch(Action::CreateFunction {
        name: "warmth".to_string(),
        func: "MAT / 10 + LAT".to_string(),
    });
    engine.wait_idle().await;

    let state = engine.state();
    let functions = &state.run_configuration.custom_functions;
    assert_eq!(functions[0].value, None);
    assert_eq!(functions[1].value, Some(57.5));
    assert!(functions.iter().all(|f| !f.is_fetching));
}

#[tokio::test]
async fn test_shutdown_drops_pending_results() {
    let client = Arc::new(GatedClient::default());
    client.hold("_MAT/");
    let engine = start(&client);

    engine.dispatch(Action::AddVariables(names(&["MAT"])));
    engine.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
    until(|| client.parked("_MAT/") == 1).await;

    engine.shutdown();
    engine.wait_idle().await;

    let mat = engine.state().run_configuration.variables[0].clone();
    assert_eq!(mat.value, None);
    assert!(mat.is_fetching);
}

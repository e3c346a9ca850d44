//! Scripted geocoder/router doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use navigator::error::{NavError, Result};
use navigator::geocoding::Geocoder;
use navigator::location::{LocationProvider, SimulatedSensor, WatchOptions};
use navigator::routing::{route_from_polyline, RouteProvider};
use navigator::workflow::{NavState, NavigationWorkflow};
use navigator::{Coordinate, PlaceMatch, Route};
use tokio::sync::watch;

/// Encodes (38.5,-120.2), (40.7,-120.95), (43.252,-126.453).
pub const FIXTURE_POLYLINE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

pub fn coord(lon: f64, lat: f64) -> Coordinate {
    Coordinate::new(lon, lat).expect("valid test coordinate")
}

pub fn berlin() -> Coordinate {
    coord(13.405, 52.52)
}

/// The fixture polyline as `(lon, lat)` coordinates.
pub fn fixture_coordinates() -> Vec<Coordinate> {
    vec![
        coord(-120.2, 38.5),
        coord(-120.95, 40.7),
        coord(-126.453, 43.252),
    ]
}

pub fn fixture_route() -> Route {
    route_from_polyline(FIXTURE_POLYLINE).expect("fixture decodes")
}

pub fn assert_close(actual: &[Coordinate], expected: &[Coordinate]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a.lon() - e.lon()).abs() < 1e-9 && (a.lat() - e.lat()).abs() < 1e-9,
            "{a:?} != {e:?}"
        );
    }
}

/// Records the workflow state at the moment a service is called.
#[derive(Default)]
struct StateProbe {
    state: OnceLock<watch::Receiver<NavState>>,
    seen: Mutex<Vec<NavState>>,
}

impl StateProbe {
    fn record(&self) {
        if let Some(state) = self.state.get() {
            let current = *state.borrow();
            self.seen.lock().unwrap().push(current);
        }
    }
}

/// Answers each call with the next scripted reply; hangs once the script
/// runs out.
#[derive(Default)]
pub struct ScriptedGeocoder {
    replies: Mutex<VecDeque<Result<PlaceMatch>>>,
    queries: Mutex<Vec<String>>,
    probe: StateProbe,
}

impl ScriptedGeocoder {
    pub fn new(replies: Vec<Result<PlaceMatch>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn observe(&self, state: watch::Receiver<NavState>) {
        let _ = self.probe.state.set(state);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn seen_states(&self) -> Vec<NavState> {
        self.probe.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for ScriptedGeocoder {
    async fn geocode(&self, query: &str) -> Result<PlaceMatch> {
        self.queries.lock().unwrap().push(query.to_string());
        self.probe.record();
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply,
            None => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct ScriptedRouter {
    replies: Mutex<VecDeque<Result<Route>>>,
    calls: Mutex<Vec<(Coordinate, Coordinate)>>,
    probe: StateProbe,
}

impl ScriptedRouter {
    pub fn new(replies: Vec<Result<Route>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn observe(&self, state: watch::Receiver<NavState>) {
        let _ = self.probe.state.set(state);
    }

    pub fn calls(&self) -> Vec<(Coordinate, Coordinate)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn seen_states(&self) -> Vec<NavState> {
        self.probe.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RouteProvider for ScriptedRouter {
    async fn route(&self, start: Coordinate, destination: Coordinate) -> Result<Route> {
        self.calls.lock().unwrap().push((start, destination));
        self.probe.record();
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply,
            None => std::future::pending().await,
        }
    }
}

pub struct Harness {
    pub workflow: NavigationWorkflow,
    pub sensor: Arc<SimulatedSensor>,
    pub geocoder: Arc<ScriptedGeocoder>,
    pub router: Arc<ScriptedRouter>,
}

pub fn harness(
    sensor: SimulatedSensor,
    geocodes: Vec<Result<PlaceMatch>>,
    routes: Vec<Result<Route>>,
) -> Harness {
    let sensor = Arc::new(sensor);
    let geocoder = Arc::new(ScriptedGeocoder::new(geocodes));
    let router = Arc::new(ScriptedRouter::new(routes));
    let location = LocationProvider::new(sensor.clone(), WatchOptions::default());
    let workflow = NavigationWorkflow::new(geocoder.clone(), router.clone(), location);
    geocoder.observe(workflow.watch_state());
    router.observe(workflow.watch_state());
    Harness {
        workflow,
        sensor,
        geocoder,
        router,
    }
}

pub fn not_found(query: &str) -> Result<PlaceMatch> {
    Err(NavError::NotFound(query.to_string()))
}

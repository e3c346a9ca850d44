//! Map screen workflow: locate the user, take a destination (map tap or
//! text search), geocode when needed, request a route and publish it.
//!
//! ```text
//! Idle -> LocatingUser -> Ready -> SearchingDestination -> RoutingInFlight -> RouteDisplayed
//!                           ^  \________________________________^                  |
//!                           |___________________ new destination ___________________|
//! ```
//!
//! Every failure is caught here, logged, and published as a [`Notice`];
//! failures never clear unrelated state such as the displayed route or the
//! last fix.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use shared::{Coordinate, LocationSample, Route};
use tokio::sync::{broadcast, watch};

use crate::error::NavError;
use crate::geocoding::{normalize_query, Geocoder};
use crate::location::{LocationProvider, Subscription};
use crate::map_view::MapTap;
use crate::routing::{approximate_distance_km, RouteProvider};

const NOTICE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NavState {
    Idle,
    LocatingUser,
    Ready,
    SearchingDestination,
    RoutingInFlight,
    RouteDisplayed,
}

impl NavState {
    /// Whether a new destination may be submitted. The UI disables its
    /// search control otherwise.
    pub fn accepts_destination(self) -> bool {
        matches!(self, NavState::Ready | NavState::RouteDisplayed)
    }

    fn is_in_flight(self) -> bool {
        matches!(
            self,
            NavState::SearchingDestination | NavState::RoutingInFlight
        )
    }
}

/// A message for the user, e.g. shown as an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl From<&NavError> for Notice {
    fn from(err: &NavError) -> Self {
        Self {
            title: err.title().to_string(),
            message: err.to_string(),
        }
    }
}

/// What a user action ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Located(Coordinate),
    Displayed,
    Failed(Notice),
    /// The action was not valid in the current state (not yet located,
    /// already mounted, screen gone).
    Ignored,
    /// The screen was unmounted while the action was in flight.
    Abandoned,
}

/// Cancels the location subscription, abandons in-flight requests and
/// returns the workflow to [`NavState::Idle`]. Cloneable so that whoever
/// owns the screen lifecycle can trigger it while the workflow itself is
/// busy awaiting a request.
#[derive(Clone)]
pub struct UnmountHandle {
    mounted: Arc<watch::Sender<bool>>,
    subscription: Arc<Mutex<Option<Subscription>>>,
    state: Arc<watch::Sender<NavState>>,
    sample: Arc<watch::Sender<Option<LocationSample>>>,
}

impl UnmountHandle {
    fn new(
        state: Arc<watch::Sender<NavState>>,
        sample: Arc<watch::Sender<Option<LocationSample>>>,
    ) -> Self {
        let (mounted, _) = watch::channel(false);
        Self {
            mounted: Arc::new(mounted),
            subscription: Arc::new(Mutex::new(None)),
            state,
            sample,
        }
    }

    pub fn unmount(&self) {
        let was_mounted = self.mounted.send_replace(false);
        self.replace_subscription(None);
        // Samples from this session must not outlive it.
        self.sample.send_if_modified(|sample| sample.take().is_some());
        publish_state(&self.state, NavState::Idle);
        if was_mounted {
            tracing::info!("map screen unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        *self.mounted.borrow()
    }

    fn mount(&self) {
        self.mounted.send_replace(true);
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.mounted.subscribe()
    }

    fn replace_subscription(&self, next: Option<Subscription>) {
        let previous = {
            let mut slot = self
                .subscription
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, next)
        };
        // Dropping a subscription cancels it.
        drop(previous);
    }
}

fn publish_state(state: &watch::Sender<NavState>, next: NavState) {
    state.send_if_modified(|state| {
        if *state == next {
            return false;
        }
        tracing::debug!("navigation {:?} -> {:?}", state, next);
        *state = next;
        true
    });
}

/// Resolves to `None` as soon as the screen is unmounted, dropping `work`.
async fn unless_unmounted<F: Future>(
    mut mounted: watch::Receiver<bool>,
    work: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = mounted.wait_for(|mounted| !*mounted) => None,
        output = work => Some(output),
    }
}

pub struct NavigationWorkflow {
    geocoder: Arc<dyn Geocoder>,
    router: Arc<dyn RouteProvider>,
    location: LocationProvider,
    fix: Option<Coordinate>,
    state: Arc<watch::Sender<NavState>>,
    route: watch::Sender<Option<Route>>,
    sample: Arc<watch::Sender<Option<LocationSample>>>,
    notices: broadcast::Sender<Notice>,
    lifecycle: UnmountHandle,
}

impl NavigationWorkflow {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RouteProvider>,
        location: LocationProvider,
    ) -> Self {
        let (state, _) = watch::channel(NavState::Idle);
        let (route, _) = watch::channel(None);
        let (sample, _) = watch::channel(None);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let state = Arc::new(state);
        let sample = Arc::new(sample);
        let lifecycle = UnmountHandle::new(Arc::clone(&state), Arc::clone(&sample));
        Self {
            geocoder,
            router,
            location,
            fix: None,
            state,
            route,
            sample,
            notices,
            lifecycle,
        }
    }

    pub fn state(&self) -> NavState {
        *self.state.borrow()
    }

    pub fn route(&self) -> Option<Route> {
        self.route.borrow().clone()
    }

    pub fn latest_sample(&self) -> Option<LocationSample> {
        *self.sample.borrow()
    }

    /// Where a route would start: the newest streamed sample, else the fix.
    pub fn current_location(&self) -> Option<Coordinate> {
        self.latest_sample()
            .map(|sample| sample.coordinate)
            .or(self.fix)
    }

    pub fn can_select_destination(&self) -> bool {
        self.lifecycle.is_mounted() && self.state().accepts_destination()
    }

    pub fn watch_state(&self) -> watch::Receiver<NavState> {
        self.state.subscribe()
    }

    pub fn watch_route(&self) -> watch::Receiver<Option<Route>> {
        self.route.subscribe()
    }

    pub fn watch_location(&self) -> watch::Receiver<Option<LocationSample>> {
        self.sample.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn unmount_handle(&self) -> UnmountHandle {
        self.lifecycle.clone()
    }

    /// Screen mount: permission, continuing subscription, then a one-shot fix.
    pub async fn mount(&mut self) -> Outcome {
        if self.state() != NavState::Idle {
            tracing::debug!("mount ignored in state {:?}", self.state());
            return Outcome::Ignored;
        }
        self.lifecycle.mount();
        self.fix = None;
        self.set_state(NavState::LocatingUser);

        let granted = match unless_unmounted(
            self.lifecycle.watch(),
            self.location.request_permission(),
        )
        .await
        {
            Some(granted) => granted,
            None => return self.abandoned(),
        };
        if !granted {
            return self.locating_failed(NavError::PermissionDenied);
        }

        let sample = Arc::clone(&self.sample);
        match self.location.subscribe(move |update| {
            sample.send_replace(Some(update));
        }) {
            Ok(subscription) => self.lifecycle.replace_subscription(Some(subscription)),
            Err(err) => return self.locating_failed(err),
        }

        match unless_unmounted(self.lifecycle.watch(), self.location.current_fix()).await {
            None => self.abandoned(),
            Some(Err(err)) => self.locating_failed(err),
            Some(Ok(fix)) => {
                tracing::info!("located at {:.5},{:.5}", fix.lon(), fix.lat());
                self.fix = Some(fix);
                self.set_state(NavState::Ready);
                Outcome::Located(fix)
            }
        }
    }

    /// Text search: geocode the query, then route to the first match.
    pub async fn search(&mut self, query: &str) -> Outcome {
        if !self.selection_allowed() {
            return Outcome::Ignored;
        }
        let query = match normalize_query(query) {
            Ok(query) => query,
            Err(err) => return Outcome::Failed(self.notify(&err)),
        };
        let Some(start) = self.begin_selection() else {
            return Outcome::Ignored;
        };

        self.set_state(NavState::SearchingDestination);
        let place = match unless_unmounted(self.lifecycle.watch(), self.geocoder.geocode(query))
            .await
        {
            None => return self.abandoned(),
            Some(Err(err)) => return self.recover(err),
            Some(Ok(place)) => place,
        };
        tracing::info!(
            "destination {:?} at {:.5},{:.5}",
            place.label,
            place.coordinate.lon(),
            place.coordinate.lat()
        );

        self.request_route(start, place.coordinate).await
    }

    /// Map tap: route straight to the tapped point.
    pub async fn tap(&mut self, tap: MapTap) -> Outcome {
        let Some(start) = self.begin_selection() else {
            return Outcome::Ignored;
        };
        self.request_route(start, tap.coordinate).await
    }

    pub fn unmount(&mut self) {
        self.lifecycle.unmount();
    }

    /// `&mut self` rules out a concurrent request, so an in-flight state
    /// here means the previous request was dropped before it resolved.
    fn selection_allowed(&self) -> bool {
        if !self.lifecycle.is_mounted() {
            tracing::debug!("destination ignored, map screen is not mounted");
            return false;
        }
        let state = self.state();
        if !state.accepts_destination() && !state.is_in_flight() {
            tracing::debug!("destination ignored in state {state:?}");
            return false;
        }
        true
    }

    fn begin_selection(&mut self) -> Option<Coordinate> {
        if !self.selection_allowed() {
            return None;
        }
        let state = self.state();
        if state.is_in_flight() {
            tracing::warn!("previous destination request was dropped in {state:?}");
        }
        self.set_state(NavState::Ready);
        self.current_location()
    }

    async fn request_route(&mut self, start: Coordinate, destination: Coordinate) -> Outcome {
        self.set_state(NavState::RoutingInFlight);
        let routed =
            unless_unmounted(self.lifecycle.watch(), self.router.route(start, destination)).await;
        match routed {
            None => self.abandoned(),
            Some(Err(err)) => self.recover(err),
            Some(Ok(route)) => {
                tracing::info!(
                    "route ready: {} points, {:.2} km",
                    route.len(),
                    approximate_distance_km(route.coordinates())
                );
                self.route.send_replace(Some(route));
                self.set_state(NavState::RouteDisplayed);
                Outcome::Displayed
            }
        }
    }

    fn recover(&mut self, err: NavError) -> Outcome {
        let notice = self.notify(&err);
        self.set_state(NavState::Ready);
        Outcome::Failed(notice)
    }

    fn locating_failed(&mut self, err: NavError) -> Outcome {
        self.lifecycle.replace_subscription(None);
        let notice = self.notify(&err);
        self.set_state(NavState::Idle);
        Outcome::Failed(notice)
    }

    fn abandoned(&mut self) -> Outcome {
        tracing::debug!("request abandoned in state {:?}", self.state());
        self.set_state(NavState::Idle);
        Outcome::Abandoned
    }

    fn notify(&self, err: &NavError) -> Notice {
        tracing::warn!("{}: {err}", err.title());
        let notice = Notice::from(err);
        // Nobody listening is fine; the notice is also returned.
        let _ = self.notices.send(notice.clone());
        notice
    }

    fn set_state(&self, next: NavState) {
        publish_state(&self.state, next);
    }
}

impl Drop for NavigationWorkflow {
    fn drop(&mut self) {
        self.lifecycle.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use shared::PlaceMatch;

    use super::*;
    use crate::error::Result;
    use crate::location::{SimulatedSensor, WatchOptions};
    use crate::routing::route_from_polyline;

    const FIXTURE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    #[derive(Default)]
    struct CountingGeocoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn geocode(&self, query: &str) -> Result<PlaceMatch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NavError::NotFound(query.to_string()))
        }
    }

    /// Hangs on the first call, answers every later one.
    #[derive(Default)]
    struct StallOnceRouter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RouteProvider for StallOnceRouter {
        async fn route(&self, _: Coordinate, _: Coordinate) -> Result<Route> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            route_from_polyline(FIXTURE)
        }
    }

    fn workflow(
        sensor: SimulatedSensor,
    ) -> (NavigationWorkflow, Arc<CountingGeocoder>, Arc<StallOnceRouter>) {
        let geocoder = Arc::new(CountingGeocoder::default());
        let router = Arc::new(StallOnceRouter::default());
        let location = LocationProvider::new(Arc::new(sensor), WatchOptions::default());
        let workflow = NavigationWorkflow::new(geocoder.clone(), router.clone(), location);
        (workflow, geocoder, router)
    }

    fn berlin() -> Coordinate {
        Coordinate::new(13.405, 52.52).unwrap()
    }

    #[test]
    fn only_settled_states_accept_destinations() {
        assert!(NavState::Ready.accepts_destination());
        assert!(NavState::RouteDisplayed.accepts_destination());
        assert!(!NavState::Idle.accepts_destination());
        assert!(!NavState::LocatingUser.accepts_destination());
        assert!(!NavState::RoutingInFlight.accepts_destination());
    }

    #[tokio::test]
    async fn tap_before_mount_is_ignored() {
        let (mut workflow, _, router) = workflow(SimulatedSensor::fixed(berlin()));
        assert_eq!(workflow.tap(MapTap::new(berlin())).await, Outcome::Ignored);
        assert_eq!(router.calls.load(Ordering::SeqCst), 0);
        assert_eq!(workflow.state(), NavState::Idle);
    }

    #[tokio::test]
    async fn mount_twice_is_ignored() {
        let (mut workflow, _, _) = workflow(SimulatedSensor::fixed(berlin()));
        assert_eq!(workflow.mount().await, Outcome::Located(berlin()));
        assert_eq!(workflow.mount().await, Outcome::Ignored);
        assert!(workflow.can_select_destination());
    }

    #[tokio::test]
    async fn blank_search_never_reaches_geocoder() {
        let (mut workflow, geocoder, _) = workflow(SimulatedSensor::fixed(berlin()));
        workflow.mount().await;

        let outcome = workflow.search("   ").await;
        assert!(matches!(outcome, Outcome::Failed(ref n) if n.title == "Search"));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(workflow.state(), NavState::Ready);
    }

    #[tokio::test]
    async fn dropped_request_does_not_wedge_the_workflow() {
        let (mut workflow, _, router) = workflow(SimulatedSensor::fixed(berlin()));
        workflow.mount().await;
        let tap = MapTap::new(Coordinate::new(13.41, 52.5).unwrap());

        let timed_out = tokio::time::timeout(Duration::from_millis(20), workflow.tap(tap)).await;
        assert!(timed_out.is_err());
        assert_eq!(workflow.state(), NavState::RoutingInFlight);

        assert_eq!(workflow.tap(tap).await, Outcome::Displayed);
        assert_eq!(router.calls.load(Ordering::SeqCst), 2);
        assert_eq!(workflow.state(), NavState::RouteDisplayed);
    }

    #[tokio::test]
    async fn failed_fix_returns_to_idle_and_can_retry() {
        let (mut workflow, _, _) = workflow(SimulatedSensor::new(true, None, Vec::new()));
        let outcome = workflow.mount().await;
        assert!(matches!(outcome, Outcome::Failed(ref n) if n.title == "Location unavailable"));
        assert_eq!(workflow.state(), NavState::Idle);

        // Still idle, so a second mount attempt runs again.
        assert!(matches!(workflow.mount().await, Outcome::Failed(_)));
    }
}

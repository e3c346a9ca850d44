//! Device location: permission, one-shot fixes and a throttled stream of
//! position/speed samples.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Coordinate, CoordinateError, LocationSample};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::{NavError, Result};
use crate::routing::haversine_km;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Low,
    Balanced,
    #[default]
    High,
}

/// Options handed to the sensor when watching position. The provider
/// applies the same thresholds again, so a sensor that ignores them still
/// cannot flood subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    pub time_interval_ms: u64,
    pub min_distance_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::High,
            time_interval_ms: 1000,
            min_distance_m: 5.0,
        }
    }
}

/// A reading as the platform reports it: degrees, m/s, possibly nonsense.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPosition {
    pub longitude: f64,
    pub latitude: f64,
    pub speed_mps: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl RawPosition {
    pub fn coordinate(&self) -> std::result::Result<Coordinate, CoordinateError> {
        Coordinate::new(self.longitude, self.latitude)
    }

    pub fn to_sample(&self) -> std::result::Result<LocationSample, CoordinateError> {
        Ok(LocationSample::new(
            self.coordinate()?,
            self.speed_mps,
            self.timestamp,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("location permission not granted")]
    PermissionDenied,
    #[error("{0}")]
    Unavailable(String),
}

/// The platform positioning service.
#[async_trait]
pub trait LocationSensor: Send + Sync {
    async fn request_permission(&self) -> bool;
    async fn current_fix(&self) -> std::result::Result<RawPosition, SensorError>;
    /// Starts continuous updates. Dropping or closing the receiver stops them.
    fn watch_position(&self, options: WatchOptions) -> mpsc::Receiver<RawPosition>;
}

pub struct LocationProvider {
    sensor: Arc<dyn LocationSensor>,
    options: WatchOptions,
    granted: AtomicBool,
}

impl LocationProvider {
    pub fn new(sensor: Arc<dyn LocationSensor>, options: WatchOptions) -> Self {
        Self {
            sensor,
            options,
            granted: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> WatchOptions {
        self.options
    }

    pub async fn request_permission(&self) -> bool {
        let granted = self.sensor.request_permission().await;
        self.granted.store(granted, Ordering::Release);
        tracing::info!("location permission granted={granted}");
        granted
    }

    pub fn has_permission(&self) -> bool {
        self.granted.load(Ordering::Acquire)
    }

    pub async fn current_fix(&self) -> Result<Coordinate> {
        self.ensure_permission()?;
        let raw = self.sensor.current_fix().await.map_err(|err| match err {
            SensorError::PermissionDenied => NavError::PermissionDenied,
            SensorError::Unavailable(reason) => NavError::PositionUnavailable(reason),
        })?;
        raw.coordinate()
            .map_err(|err| NavError::PositionUnavailable(err.to_string()))
    }

    /// Continuous samples, throttled by the configured interval and distance.
    pub fn watch(&self) -> Result<LocationUpdates> {
        self.ensure_permission()?;
        Ok(LocationUpdates {
            receiver: self.sensor.watch_position(self.options),
            throttle: Throttle::new(self.options),
            cancelled: false,
        })
    }

    /// Runs `on_update` for every sample on a background task until the
    /// returned handle is cancelled or dropped. Must be called from within
    /// a Tokio runtime.
    pub fn subscribe<F>(&self, on_update: F) -> Result<Subscription>
    where
        F: FnMut(LocationSample) + Send + 'static,
    {
        let mut updates = self.watch()?;
        let mut on_update = on_update;
        let active = Arc::new(AtomicBool::new(true));
        let still_active = Arc::clone(&active);

        let task = tokio::spawn(async move {
            while let Some(sample) = updates.next().await {
                if !still_active.load(Ordering::Acquire) {
                    break;
                }
                on_update(sample);
            }
            tracing::debug!("location subscription finished");
        });

        Ok(Subscription {
            active,
            task: Some(task),
        })
    }

    fn ensure_permission(&self) -> Result<()> {
        if self.has_permission() {
            Ok(())
        } else {
            Err(NavError::PermissionDenied)
        }
    }
}

/// Cancellable stream of samples produced by [`LocationProvider::watch`].
pub struct LocationUpdates {
    receiver: mpsc::Receiver<RawPosition>,
    throttle: Throttle,
    cancelled: bool,
}

impl LocationUpdates {
    /// Next admitted sample, or `None` once the sensor stops or the stream
    /// is cancelled.
    pub async fn next(&mut self) -> Option<LocationSample> {
        if self.cancelled {
            return None;
        }
        while let Some(raw) = self.receiver.recv().await {
            let sample = match raw.to_sample() {
                Ok(sample) => sample,
                Err(err) => {
                    tracing::warn!("dropping location reading: {err}");
                    continue;
                }
            };
            if self.throttle.admit(&sample) {
                return Some(sample);
            }
        }
        None
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.receiver.close();
    }
}

/// Handle for a callback subscription; cancelling (or dropping) it stops
/// delivery.
#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn cancel(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("location subscription cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Admits the first sample, then only samples that are both at least
/// `time_interval_ms` later and `min_distance_m` away from the last
/// admitted one.
#[derive(Debug, Clone)]
struct Throttle {
    min_interval: chrono::Duration,
    min_distance_m: f64,
    last: Option<LocationSample>,
}

impl Throttle {
    fn new(options: WatchOptions) -> Self {
        let millis = i64::try_from(options.time_interval_ms).unwrap_or(i64::MAX);
        Self {
            min_interval: chrono::Duration::milliseconds(millis),
            min_distance_m: options.min_distance_m.max(0.0),
            last: None,
        }
    }

    fn admit(&mut self, sample: &LocationSample) -> bool {
        if let Some(last) = &self.last {
            let elapsed = sample.recorded_at - last.recorded_at;
            let moved_m = haversine_km(last.coordinate, sample.coordinate) * 1000.0;
            if elapsed < self.min_interval || moved_m < self.min_distance_m {
                return false;
            }
        }
        self.last = Some(*sample);
        true
    }
}

/// Scripted sensor for the demo binary and tests.
///
/// Every `watch_position` call gets its own channel, pre-filled with the
/// scripted readings; `push` feeds further readings to all open watches.
pub struct SimulatedSensor {
    grant: bool,
    fix: Option<RawPosition>,
    script: Vec<RawPosition>,
    feeds: Mutex<Vec<mpsc::Sender<RawPosition>>>,
}

const FEED_CAPACITY: usize = 64;

impl SimulatedSensor {
    pub fn new(grant: bool, fix: Option<RawPosition>, script: Vec<RawPosition>) -> Self {
        Self {
            grant,
            fix,
            script,
            feeds: Mutex::new(Vec::new()),
        }
    }

    /// A device parked at `coordinate` that grants permission.
    pub fn fixed(coordinate: Coordinate) -> Self {
        Self::new(
            true,
            Some(RawPosition {
                longitude: coordinate.lon(),
                latitude: coordinate.lat(),
                speed_mps: Some(0.0),
                timestamp: Utc::now(),
            }),
            Vec::new(),
        )
    }

    pub fn denied() -> Self {
        Self::new(false, None, Vec::new())
    }

    /// Sends `reading` to every open watch and returns how many received it.
    pub fn push(&self, reading: RawPosition) -> usize {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        feeds.retain(|feed| !feed.is_closed());
        feeds
            .iter()
            .filter(|feed| feed.try_send(reading).is_ok())
            .count()
    }

    /// Watches whose receiving side is still alive.
    pub fn active_watches(&self) -> usize {
        let feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        feeds.iter().filter(|feed| !feed.is_closed()).count()
    }
}

#[async_trait]
impl LocationSensor for SimulatedSensor {
    async fn request_permission(&self) -> bool {
        self.grant
    }

    async fn current_fix(&self) -> std::result::Result<RawPosition, SensorError> {
        if !self.grant {
            return Err(SensorError::PermissionDenied);
        }
        self.fix
            .ok_or_else(|| SensorError::Unavailable("no satellite fix".into()))
    }

    fn watch_position(&self, options: WatchOptions) -> mpsc::Receiver<RawPosition> {
        tracing::debug!(
            "simulated watch started (accuracy={:?}, interval={}ms, distance={}m)",
            options.accuracy,
            options.time_interval_ms,
            options.min_distance_m
        );
        let (tx, rx) = mpsc::channel(FEED_CAPACITY.max(self.script.len()));
        for reading in &self.script {
            let _ = tx.try_send(*reading);
        }
        self.feeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

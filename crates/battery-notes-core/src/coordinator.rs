//! Per-device aggregation and fan-out.
//!
//! A [`Coordinator`] owns one device's view of the metadata store, derives
//! the low/increased flags from the latest telemetry reading, fires crossing
//! events and notifies registered listeners.
//!
//! Two inputs drive it:
//!
//! - [`Coordinator::refresh`] (and the write paths that end in a refresh)
//!   re-reads metadata and notifies every listener.
//! - [`Coordinator::observe_reading`] feeds a new telemetry reading. Increase
//!   detection only runs here, so a metadata refresh never re-fires it.
//!
//! Listeners run after all internal locks are released. A failing or
//! panicking listener is logged and skipped; the others still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use time::Date;
use tracing::{debug, error, info, warn};

use battery_notes_store::Store;
use battery_notes_types::{DeviceMetadata, MetadataUpdate};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::events::{DomainEvent, EventDispatcher};

/// Metadata store shared by every coordinator.
pub type SharedStore = Arc<Mutex<Store>>;

/// Why listeners are being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// Metadata was re-read.
    Refresh,
    /// A battery replacement was recorded.
    Replacement,
    /// A telemetry reading changed the low flag.
    Telemetry,
}

/// The latest telemetry observed for a device.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryReading {
    /// Numeric battery level in percent.
    pub level: Option<f64>,
    /// Boolean low flag from binary-only telemetry.
    pub low: Option<bool>,
}

impl TelemetryReading {
    /// No usable telemetry.
    pub const UNAVAILABLE: Self = Self {
        level: None,
        low: None,
    };

    /// A numeric level.
    pub fn level(level: f64) -> Self {
        Self {
            level: Some(level),
            low: None,
        }
    }

    /// A binary low flag.
    pub fn binary(low: bool) -> Self {
        Self {
            level: None,
            low: Some(low),
        }
    }
}

/// Derived per-device state, recomputed on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorSnapshot {
    pub device_id: String,
    pub battery_type: String,
    pub battery_quantity: u32,
    pub battery_type_and_quantity: String,
    /// Effective threshold after falling back to the global default.
    pub battery_low_threshold: u8,
    pub battery_low: bool,
    pub battery_increased: bool,
    pub battery_level: Option<f64>,
    #[serde(with = "battery_notes_types::date::serde_opt")]
    pub last_replaced: Option<Date>,
}

/// Callback notified after each refresh.
pub type Listener =
    Arc<dyn Fn(&CoordinatorSnapshot, RefreshReason) -> Result<()> + Send + Sync>;

/// Identifier of a listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    listener: Listener,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct CoordinatorState {
    metadata: Option<DeviceMetadata>,
    reading: TelemetryReading,
    previous_level: Option<f64>,
    increased: bool,
    last_low: Option<bool>,
    snapshot: Option<CoordinatorSnapshot>,
}

/// Per-device aggregation point.
pub struct Coordinator {
    device_id: String,
    store: SharedStore,
    options: Options,
    events: EventDispatcher,
    state: Mutex<CoordinatorState>,
    listeners: Mutex<Vec<Registration>>,
    next_listener_id: AtomicU64,
}

impl Coordinator {
    /// Create a coordinator. Nothing is read until the first refresh.
    pub fn new(
        device_id: impl Into<String>,
        store: SharedStore,
        options: Options,
        events: EventDispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            device_id: device_id.into(),
            store,
            options,
            events,
            state: Mutex::new(CoordinatorState::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        })
    }

    /// Device this coordinator aggregates.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Options snapshot the coordinator was built with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Latest snapshot, or `None` before the first refresh.
    pub fn snapshot(&self) -> Option<CoordinatorSnapshot> {
        self.state.lock().snapshot.clone()
    }

    /// Read the device's stored metadata without refreshing.
    pub fn stored_metadata(&self) -> Result<DeviceMetadata> {
        Ok(self.store.lock().get_device_or_default(&self.device_id)?)
    }

    /// Re-read metadata, recompute and notify every listener.
    pub fn refresh(&self) -> Result<CoordinatorSnapshot> {
        self.refresh_with(RefreshReason::Refresh)
    }

    /// Persist a replacement day and refresh immediately.
    pub fn record_replacement(&self, date: Date) -> Result<CoordinatorSnapshot> {
        self.store.lock().set_last_replaced(&self.device_id, date)?;
        info!("Recorded battery replacement for {} on {}", self.device_id, date);
        self.refresh_with(RefreshReason::Replacement)
    }

    /// Persist a metadata change and refresh.
    pub fn update_metadata(&self, update: &MetadataUpdate) -> Result<CoordinatorSnapshot> {
        self.store.lock().update_device(&self.device_id, update)?;
        self.refresh_with(RefreshReason::Refresh)
    }

    /// Feed a telemetry reading.
    ///
    /// Runs increase and low-threshold crossing detection. Listeners are only
    /// notified when the derived flags changed. Returns `None` before the
    /// first refresh, in which case the reading is kept for it.
    pub fn observe_reading(&self, reading: TelemetryReading) -> Option<CoordinatorSnapshot> {
        let mut events = Vec::new();

        let (snapshot, changed) = {
            let mut state = self.state.lock();
            state.reading = reading;

            if let Some(event) = self.detect_increase(&mut state) {
                events.push(event);
            }

            if state.metadata.is_none() {
                (None, false)
            } else {
                if let Some(event) = self.detect_low_crossing(&mut state) {
                    events.push(event);
                }
                let previous = state.snapshot.clone();
                let snapshot = self.rebuild(&mut state);
                let changed = previous.is_none_or(|previous| {
                    previous.battery_low != snapshot.battery_low
                        || previous.battery_increased != snapshot.battery_increased
                });
                (Some(snapshot), changed)
            }
        };

        self.emit(events);

        if let Some(snapshot) = &snapshot
            && changed
        {
            self.notify(snapshot, RefreshReason::Telemetry);
        }
        snapshot
    }

    /// Register a listener.
    ///
    /// A listener (by `Arc` identity) may only be registered once. The
    /// registration lasts as long as the returned handle.
    pub fn add_listener(self: &Arc<Self>, listener: Listener) -> Result<ListenerHandle> {
        let mut listeners = self.listeners.lock();
        if listeners
            .iter()
            .any(|registration| Arc::ptr_eq(&registration.listener, &listener))
        {
            return Err(Error::ListenerAlreadyRegistered {
                device_id: self.device_id.clone(),
            });
        }

        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let active = Arc::new(AtomicBool::new(true));
        listeners.push(Registration {
            id,
            listener,
            active: active.clone(),
        });
        debug!("Listener {:?} added to coordinator for {}", id, self.device_id);

        Ok(ListenerHandle {
            coordinator: Arc::downgrade(self),
            id,
            active,
        })
    }

    /// Remove a listener. Returns false if it was not registered.
    ///
    /// Once this returns the listener is never invoked again, including by a
    /// fan-out already in progress.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(index) = listeners
            .iter()
            .position(|registration| registration.id == id)
        else {
            return false;
        };

        let registration = listeners.remove(index);
        registration.active.store(false, Ordering::Release);
        debug!("Listener {:?} removed from coordinator for {}", id, self.device_id);
        true
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn refresh_with(&self, reason: RefreshReason) -> Result<CoordinatorSnapshot> {
        let metadata = self.stored_metadata()?;

        let (snapshot, event) = {
            let mut state = self.state.lock();
            state.metadata = Some(metadata);
            let event = self.detect_low_crossing(&mut state);
            (self.rebuild(&mut state), event)
        };

        debug!(
            "Coordinator for {} refreshed ({:?}): {:?}",
            self.device_id, reason, snapshot
        );
        self.emit(event);
        self.notify(&snapshot, reason);
        Ok(snapshot)
    }

    fn effective_threshold(&self, state: &CoordinatorState) -> u8 {
        state
            .metadata
            .as_ref()
            .map(|metadata| metadata.effective_low_threshold(self.options.default_battery_low_threshold))
            .unwrap_or(self.options.default_battery_low_threshold)
    }

    /// Low flag for the current reading, or `None` if indeterminate.
    fn current_low(&self, state: &CoordinatorState) -> Option<bool> {
        match state.reading.level {
            Some(level) => Some(level < f64::from(self.effective_threshold(state))),
            None => state.reading.low,
        }
    }

    fn detect_low_crossing(&self, state: &mut CoordinatorState) -> Option<DomainEvent> {
        let low = self.current_low(state)?;
        let previous = state.last_low.replace(low);

        match previous {
            Some(previous) if previous != low => Some(DomainEvent::BatteryThreshold {
                device_id: self.device_id.clone(),
                battery_low: low,
                battery_type_and_quantity: self.type_and_quantity(state),
            }),
            _ => None,
        }
    }

    fn detect_increase(&self, state: &mut CoordinatorState) -> Option<DomainEvent> {
        let Some(level) = state.reading.level else {
            // Indeterminate; the previous level is kept for the next reading.
            state.increased = false;
            return None;
        };

        let threshold = f64::from(self.options.battery_increase_threshold);
        let previous_level = state.previous_level.replace(level);
        let increased = previous_level.is_some_and(|previous| level > previous + threshold);
        let was_increased = std::mem::replace(&mut state.increased, increased);

        match previous_level {
            Some(previous_level) if increased && !was_increased => {
                Some(DomainEvent::BatteryIncreased {
                    device_id: self.device_id.clone(),
                    previous_level,
                    current_level: level,
                    battery_type_and_quantity: self.type_and_quantity(state),
                })
            }
            _ => None,
        }
    }

    fn type_and_quantity(&self, state: &CoordinatorState) -> String {
        state
            .metadata
            .as_ref()
            .map(DeviceMetadata::battery_type_and_quantity)
            .unwrap_or_default()
    }

    fn rebuild(&self, state: &mut CoordinatorState) -> CoordinatorSnapshot {
        let metadata = state.metadata.clone().unwrap_or_default();
        let snapshot = CoordinatorSnapshot {
            device_id: self.device_id.clone(),
            battery_type_and_quantity: metadata.battery_type_and_quantity(),
            battery_low_threshold: self.effective_threshold(state),
            battery_low: self.current_low(state).unwrap_or(false),
            battery_increased: state.increased,
            battery_level: state.reading.level,
            last_replaced: metadata.last_replaced,
            battery_type: metadata.battery_type,
            battery_quantity: metadata.battery_quantity,
        };
        state.snapshot = Some(snapshot.clone());
        snapshot
    }

    fn emit(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            info!("{} for {}: {:?}", event.event_type(), self.device_id, event);
            self.events.send(event);
        }
    }

    fn notify(&self, snapshot: &CoordinatorSnapshot, reason: RefreshReason) {
        let registrations: Vec<(ListenerId, Listener, Arc<AtomicBool>)> = self
            .listeners
            .lock()
            .iter()
            .map(|registration| {
                (
                    registration.id,
                    registration.listener.clone(),
                    registration.active.clone(),
                )
            })
            .collect();

        for (id, listener, active) in registrations {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener(snapshot, reason))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    "Listener {:?} for {} failed: {}",
                    id, self.device_id, e
                ),
                Err(_) => error!("Listener {:?} for {} panicked", id, self.device_id),
            }
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("device_id", &self.device_id)
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

/// Registration handle returned by [`Coordinator::add_listener`].
///
/// Dropping the handle removes the listener.
pub struct ListenerHandle {
    coordinator: Weak<Coordinator>,
    id: ListenerId,
    active: Arc<AtomicBool>,
}

impl ListenerHandle {
    /// Registration id.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns true while the listener is registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove the listener now.
    pub fn remove(self) {}
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.remove_listener(self.id);
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::events::EVENT_BATTERY_INCREASED;
    use time::macros::date;

    fn store() -> SharedStore {
        Arc::new(Mutex::new(Store::open_in_memory().unwrap()))
    }

    fn coordinator_with(store: SharedStore, events: EventDispatcher) -> Arc<Coordinator> {
        Coordinator::new("remote", store, Options::default(), events)
    }

    fn counting_listener(counter: Arc<AtomicUsize>) -> Listener {
        Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn drain(rx: &mut crate::events::EventReceiver) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_refresh_with_missing_metadata_uses_defaults() {
        let coordinator = coordinator_with(store(), EventDispatcher::default());
        assert!(coordinator.snapshot().is_none());

        let snapshot = coordinator.refresh().unwrap();
        assert_eq!(snapshot.battery_type, "");
        assert_eq!(snapshot.battery_quantity, 0);
        assert_eq!(snapshot.battery_low_threshold, 10);
        assert!(!snapshot.battery_low);
        assert_eq!(snapshot.last_replaced, None);
        assert_eq!(coordinator.snapshot(), Some(snapshot));
    }

    #[test]
    fn test_snapshot_reflects_metadata() {
        let store = store();
        store
            .lock()
            .update_device(
                "remote",
                &MetadataUpdate::new()
                    .battery_type("AAA")
                    .battery_quantity(3)
                    .battery_low_threshold(Some(30)),
            )
            .unwrap();
        let coordinator = coordinator_with(store, EventDispatcher::default());

        let snapshot = coordinator.refresh().unwrap();
        assert_eq!(snapshot.battery_type_and_quantity, "3× AAA");
        assert_eq!(snapshot.battery_low_threshold, 30);
    }

    #[test]
    fn test_increase_fires_once_per_run() {
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let coordinator = coordinator_with(store(), events);
        coordinator.refresh().unwrap();

        for level in [20.0, 20.0, 60.0, 60.0, 60.0, 30.0, 70.0] {
            coordinator.observe_reading(TelemetryReading::level(level));
        }

        let increases: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|event| event.event_type() == EVENT_BATTERY_INCREASED)
            .collect();
        assert_eq!(increases.len(), 2);
        assert!(matches!(
            increases[0],
            DomainEvent::BatteryIncreased { previous_level, current_level, .. }
                if previous_level == 20.0 && current_level == 60.0
        ));
        assert!(matches!(
            increases[1],
            DomainEvent::BatteryIncreased { previous_level, current_level, .. }
                if previous_level == 30.0 && current_level == 70.0
        ));
    }

    #[test]
    fn test_increase_not_refired_by_refresh() {
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let coordinator = coordinator_with(store(), events);
        coordinator.refresh().unwrap();

        coordinator.observe_reading(TelemetryReading::level(5.0));
        coordinator.observe_reading(TelemetryReading::level(95.0));
        assert!(coordinator.refresh().unwrap().battery_increased);
        coordinator.refresh().unwrap();

        let increases = drain(&mut rx)
            .into_iter()
            .filter(|event| event.event_type() == EVENT_BATTERY_INCREASED)
            .count();
        assert_eq!(increases, 1);
    }

    #[test]
    fn test_unavailable_keeps_previous_level() {
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let coordinator = coordinator_with(store(), events);
        coordinator.refresh().unwrap();

        coordinator.observe_reading(TelemetryReading::level(10.0));
        let snapshot = coordinator
            .observe_reading(TelemetryReading::UNAVAILABLE)
            .unwrap();
        assert!(!snapshot.battery_low);
        assert!(!snapshot.battery_increased);
        assert_eq!(snapshot.battery_level, None);

        coordinator.observe_reading(TelemetryReading::level(90.0));
        let increases = drain(&mut rx)
            .into_iter()
            .filter(|event| event.event_type() == EVENT_BATTERY_INCREASED)
            .count();
        assert_eq!(increases, 1);
    }

    #[test]
    fn test_low_crossing_fires_on_change_only() {
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let coordinator = coordinator_with(store(), events);
        coordinator.refresh().unwrap();

        coordinator.observe_reading(TelemetryReading::level(50.0));
        coordinator.observe_reading(TelemetryReading::level(9.0));
        coordinator.observe_reading(TelemetryReading::level(8.0));
        coordinator.observe_reading(TelemetryReading::UNAVAILABLE);
        coordinator.observe_reading(TelemetryReading::level(7.0));

        let crossings: Vec<bool> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                DomainEvent::BatteryThreshold { battery_low, .. } => Some(battery_low),
                _ => None,
            })
            .collect();
        assert_eq!(crossings, vec![true]);
    }

    #[test]
    fn test_binary_telemetry_uses_flag() {
        let coordinator = coordinator_with(store(), EventDispatcher::default());
        coordinator.refresh().unwrap();

        let snapshot = coordinator
            .observe_reading(TelemetryReading::binary(true))
            .unwrap();
        assert!(snapshot.battery_low);
        assert_eq!(snapshot.battery_level, None);

        let snapshot = coordinator
            .observe_reading(TelemetryReading::binary(false))
            .unwrap();
        assert!(!snapshot.battery_low);
    }

    #[test]
    fn test_threshold_edit_can_cross() {
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let coordinator = coordinator_with(store(), events);
        coordinator.refresh().unwrap();
        coordinator.observe_reading(TelemetryReading::level(25.0));

        let snapshot = coordinator
            .update_metadata(&MetadataUpdate::new().battery_low_threshold(Some(40)))
            .unwrap();
        assert!(snapshot.battery_low);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [DomainEvent::BatteryThreshold { battery_low: true, .. }]
        ));
    }

    #[test]
    fn test_reading_before_first_refresh_is_kept() {
        let coordinator = coordinator_with(store(), EventDispatcher::default());
        assert!(coordinator.observe_reading(TelemetryReading::level(5.0)).is_none());
        assert!(coordinator.snapshot().is_none());

        let snapshot = coordinator.refresh().unwrap();
        assert_eq!(snapshot.battery_level, Some(5.0));
        assert!(snapshot.battery_low);
    }

    #[test]
    fn test_record_replacement_persists_and_notifies() {
        let store = store();
        let coordinator = coordinator_with(store.clone(), EventDispatcher::default());
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let seen = reasons.clone();
        let _handle = coordinator
            .add_listener(Arc::new(move |snapshot, reason| {
                seen.lock().push((reason, snapshot.last_replaced));
                Ok(())
            }))
            .unwrap();

        coordinator.record_replacement(date!(2024 - 06 - 01)).unwrap();

        assert_eq!(
            store.lock().get_device("remote").unwrap().unwrap().last_replaced,
            Some(date!(2024 - 06 - 01))
        );
        assert_eq!(
            *reasons.lock(),
            vec![(RefreshReason::Replacement, Some(date!(2024 - 06 - 01)))]
        );
    }

    #[test]
    fn test_duplicate_listener_rejected() {
        let coordinator = coordinator_with(store(), EventDispatcher::default());
        let listener = counting_listener(Arc::new(AtomicUsize::new(0)));

        let _handle = coordinator.add_listener(listener.clone()).unwrap();
        let err = coordinator.add_listener(listener).unwrap_err();
        assert!(matches!(err, Error::ListenerAlreadyRegistered { .. }));
        assert_eq!(coordinator.listener_count(), 1);
    }

    #[test]
    fn test_dropped_handle_stops_notifications() {
        let coordinator = coordinator_with(store(), EventDispatcher::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = coordinator
            .add_listener(counting_listener(counter.clone()))
            .unwrap();

        coordinator.refresh().unwrap();
        handle.remove();
        coordinator.refresh().unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.listener_count(), 0);
    }

    #[test]
    fn test_listener_removed_mid_fanout_is_skipped() {
        let coordinator = coordinator_with(store(), EventDispatcher::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let victim = Arc::new(Mutex::new(None::<ListenerHandle>));

        let remover = victim.clone();
        let _first = coordinator
            .add_listener(Arc::new(move |_, _| {
                remover.lock().take();
                Ok(())
            }))
            .unwrap();
        *victim.lock() = Some(
            coordinator
                .add_listener(counting_listener(counter.clone()))
                .unwrap(),
        );

        coordinator.refresh().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_listeners_are_isolated() {
        let coordinator = coordinator_with(store(), EventDispatcher::default());
        let counter = Arc::new(AtomicUsize::new(0));

        let _erroring = coordinator
            .add_listener(Arc::new(|_, _| Err(Error::listener("boom"))))
            .unwrap();
        let _panicking = coordinator
            .add_listener(Arc::new(|_, _| panic!("listener panic")))
            .unwrap();
        let _counting = coordinator
            .add_listener(counting_listener(counter.clone()))
            .unwrap();

        let first = coordinator.refresh().unwrap();
        let second = coordinator.refresh().unwrap();
        assert_eq!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_telemetry_fanout_only_on_flag_change() {
        let coordinator = coordinator_with(store(), EventDispatcher::default());
        coordinator.refresh().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let _handle = coordinator
            .add_listener(counting_listener(counter.clone()))
            .unwrap();

        coordinator.observe_reading(TelemetryReading::level(80.0));
        coordinator.observe_reading(TelemetryReading::level(79.0));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        coordinator.observe_reading(TelemetryReading::level(5.0));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{DOMAIN, MANUFACTURER, NumberDefaults, RefreshFailurePolicy};
use crate::coordinator::{Coordinator, DeviceData};
use crate::core::range::Range;
use crate::entity::{DeviceInfo, EntityHost, EntityState, NumberEntity, NumberMode, UnitOfMeasurement};

const BOOST_SECTION: &str = "setup";
const BOOST_KEY: &str = "ww1boost";
//tenths of a degree
const DEFAULT_BOOST_RAW: f64 = 500.0;
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
#[display("Value {value} is out of range {bounds}")]
pub struct OutOfRange {
    pub value: f64,
    pub bounds: Range<f64>,
}

/// Hot water assurance: the boost setpoint of a my-PV heating device as a host number entity.
///
/// The cached value is written by the poll task and by host-triggered sets without coordination
/// between the two, the last write wins. Only the set path checks the bounds.
pub struct HotWaterBoost<C> {
    coordinator: Arc<C>,
    device_title: String,
    serial_number: String,
    model: String,
    unique_id: String,
    name: String,
    bounds: Range<f64>,
    step: f64,
    mode: NumberMode,
    refresh_failure: RefreshFailurePolicy,
    value: AtomicU64,
    entity_host: OnceLock<Arc<dyn EntityHost>>,
}

impl<C: Coordinator> HotWaterBoost<C> {
    pub fn new(coordinator: Arc<C>, host: &str, title: &str, defaults: &NumberDefaults) -> Self {
        let snapshot = coordinator.data();
        let data = snapshot.data();

        let serial_number = data.get_string("info", "sn").unwrap_or_else(|| UNKNOWN.to_owned());
        let model = data.get_string("info", "device").unwrap_or_else(|| UNKNOWN.to_owned());
        let value = boost_setpoint(data);

        Self {
            unique_id: format!("{} {}_{}", serial_number, BOOST_KEY, host),
            name: format!("Hot Water Assurance {}", host),
            device_title: title.to_owned(),
            serial_number,
            model,
            bounds: defaults.bounds(),
            step: defaults.step,
            mode: defaults.mode,
            refresh_failure: defaults.refresh_failure,
            value: AtomicU64::new(value.to_bits()),
            entity_host: OnceLock::new(),
            coordinator,
        }
    }

    pub fn validate(&self, value: f64) -> Result<f64, OutOfRange> {
        if self.bounds.contains(&value) {
            Ok(value)
        } else {
            Err(OutOfRange {
                value,
                bounds: self.bounds,
            })
        }
    }

    /// Registers the host that renders this entity and starts polling the coordinator every
    /// `interval`, first tick one interval from now.
    pub fn attach(self: &Arc<Self>, host: Arc<dyn EntityHost>, interval: Duration) -> PollTask
    where
        C: 'static,
    {
        if self.entity_host.set(host).is_err() {
            tracing::warn!("{} is already attached, keeping the first host", self.unique_id);
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let entity = self.clone();
        let first_tick = Instant::now() + interval;

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(first_tick, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = timer.tick() => entity.poll().await,
                }
            }

            tracing::debug!("Stopped polling for {}", entity.unique_id);
        });

        PollTask { token, handle }
    }

    pub async fn poll(&self) {
        self.coordinator.request_refresh().await;

        if !self.coordinator.last_update_success() {
            tracing::debug!("Refresh failed, {} keeps {}", self.unique_id, self.current());
            return;
        }

        let snapshot = self.coordinator.data();
        let value = boost_setpoint(snapshot.data());
        self.value.store(value.to_bits(), Ordering::SeqCst);

        tracing::debug!(
            unique_id = %self.unique_id,
            version = snapshot.version(),
            value,
            "Hot water boost setpoint polled"
        );
        self.write_state();
    }

    fn current(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::SeqCst))
    }

    fn write_state(&self) {
        match self.entity_host.get() {
            Some(host) => host.write_state(EntityState::of(self)),
            None => tracing::debug!("{} is not attached, skipping state write", self.unique_id),
        }
    }

    fn handle_failed_refresh(&self, requested: f64, previous: f64) {
        match self.refresh_failure {
            RefreshFailurePolicy::Keep => {
                tracing::warn!("Refresh after setting {} to {} failed", self.unique_id, requested);
            }
            RefreshFailurePolicy::Rollback => {
                //a poll may have written in the meantime, that value stays
                let restored = self
                    .value
                    .compare_exchange(requested.to_bits(), previous.to_bits(), Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();

                tracing::warn!(
                    restored,
                    "Refresh after setting {} to {} failed, rolling back to {}",
                    self.unique_id,
                    requested,
                    previous
                );
            }
        }
    }
}

impl<C: Coordinator> NumberEntity for HotWaterBoost<C> {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: BTreeSet::from([(DOMAIN.to_owned(), self.serial_number.clone())]),
            name: self.device_title.clone(),
            manufacturer: MANUFACTURER.to_owned(),
            model: self.model.clone(),
        }
    }

    fn unique_id(&self) -> String {
        self.unique_id.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn native_min_value(&self) -> f64 {
        *self.bounds.min()
    }

    fn native_max_value(&self) -> f64 {
        *self.bounds.max()
    }

    fn native_step(&self) -> f64 {
        self.step
    }

    fn native_value(&self) -> f64 {
        self.current()
    }

    fn native_unit_of_measurement(&self) -> UnitOfMeasurement {
        UnitOfMeasurement::Celsius
    }

    fn mode(&self) -> NumberMode {
        self.mode
    }

    async fn set_native_value(&self, value: f64) {
        let value = match self.validate(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("{}", e);
                return;
            }
        };

        let previous = f64::from_bits(self.value.swap(value.to_bits(), Ordering::SeqCst));

        self.coordinator.refresh().await;
        if !self.coordinator.last_update_success() {
            self.handle_failed_refresh(value, previous);
        }

        self.write_state();
    }
}

/// Handle of a running poll loop, owned by whoever attached the entity.
pub struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTask {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("Poll task ended abnormally: {:?}", e);
        }
    }
}

fn boost_setpoint(data: &DeviceData) -> f64 {
    data.get_f64(BOOST_SECTION, BOOST_KEY).unwrap_or(DEFAULT_BOOST_RAW) / 10.0
}

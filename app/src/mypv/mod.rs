mod number;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::coordinator::Coordinator;
use crate::core::range::Range;
use crate::entity::NumberMode;

pub use number::{HotWaterBoost, OutOfRange, PollTask};

pub const DOMAIN: &str = "mypv";
pub const MANUFACTURER: &str = "my-PV";
/// Meters are handled by their own integration and carry no boost setpoint.
pub const WIFI_METER_NAME: &str = "WiFi Meter";

pub const DEFAULT_MIN_VALUE: f64 = 0.0;
pub const DEFAULT_MAX_VALUE: f64 = 100.0;
pub const DEFAULT_STEP: f64 = 1.0;
pub const MIN_TIME_BETWEEN_UPDATES: Duration = Duration::from_secs(10);
const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigEntry {
    pub title: String,
    pub host: String,
    pub device: String,
}

/// What the set path does when the refresh following an accepted value fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshFailurePolicy {
    #[default]
    Keep,
    Rollback,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NumberDefaults {
    pub min_value: f64,
    pub max_value: f64,
    pub step: f64,
    pub mode: NumberMode,
    pub poll_interval_secs: u64,
    pub refresh_failure: RefreshFailurePolicy,
}

impl Default for NumberDefaults {
    fn default() -> Self {
        Self {
            min_value: DEFAULT_MIN_VALUE,
            max_value: DEFAULT_MAX_VALUE,
            step: DEFAULT_STEP,
            mode: NumberMode::default(),
            poll_interval_secs: MIN_TIME_BETWEEN_UPDATES.as_secs(),
            refresh_failure: RefreshFailurePolicy::default(),
        }
    }
}

impl NumberDefaults {
    pub fn bounds(&self) -> Range<f64> {
        Range::new(self.min_value, self.max_value)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.clamp(1, MAX_POLL_INTERVAL_SECS))
    }
}

pub fn setup_entry<C: Coordinator>(
    entry: &ConfigEntry,
    coordinator: Arc<C>,
    defaults: &NumberDefaults,
) -> Vec<Arc<HotWaterBoost<C>>> {
    if entry.device == WIFI_METER_NAME {
        tracing::debug!("Skipping hot water assurance for {} ({})", entry.title, entry.device);
        return vec![];
    }

    vec![Arc::new(HotWaterBoost::new(coordinator, &entry.host, &entry.title, defaults))]
}

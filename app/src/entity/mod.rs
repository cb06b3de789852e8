use std::collections::BTreeSet;
use std::future::Future;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: BTreeSet<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum NumberMode {
    #[display("auto")]
    Auto,
    #[default]
    #[display("box")]
    Box,
    #[display("slider")]
    Slider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum UnitOfMeasurement {
    #[serde(rename = "°C")]
    #[display("°C")]
    Celsius,
}

/// Capability of a host-visible numeric control.
pub trait NumberEntity: Send + Sync {
    fn device_info(&self) -> DeviceInfo;
    fn unique_id(&self) -> String;
    fn name(&self) -> &str;
    fn native_min_value(&self) -> f64;
    fn native_max_value(&self) -> f64;
    fn native_step(&self) -> f64;
    fn native_value(&self) -> f64;
    fn native_unit_of_measurement(&self) -> UnitOfMeasurement;
    fn mode(&self) -> NumberMode;

    fn set_native_value(&self, value: f64) -> impl Future<Output = ()> + Send;
}

/// Receives the rendered state whenever an entity asks to be re-rendered.
pub trait EntityHost: Send + Sync {
    fn write_state(&self, state: EntityState);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub unique_id: String,
    pub name: String,
    pub state: f64,
    pub attributes: NumberAttributes,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberAttributes {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub mode: NumberMode,
    pub unit_of_measurement: UnitOfMeasurement,
}

impl EntityState {
    pub fn of(entity: &impl NumberEntity) -> Self {
        Self {
            unique_id: entity.unique_id(),
            name: entity.name().to_owned(),
            state: entity.native_value(),
            attributes: NumberAttributes {
                min: entity.native_min_value(),
                max: entity.native_max_value(),
                step: entity.native_step(),
                mode: entity.mode(),
                unit_of_measurement: entity.native_unit_of_measurement(),
            },
            device: entity.device_info(),
        }
    }
}

/// Host that publishes every state write as a log record.
#[derive(Debug, Clone, Default)]
pub struct TracingHost;

impl EntityHost for TracingHost {
    fn write_state(&self, state: EntityState) {
        match serde_json::to_string(&state) {
            Ok(json) => tracing::info!(unique_id = %state.unique_id, state = %json, "Entity state written"),
            Err(e) => tracing::error!("Error serializing state of {}: {:?}", state.unique_id, e),
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingHost {
        writes: Mutex<Vec<EntityState>>,
    }

    impl RecordingHost {
        pub fn writes(&self) -> Vec<EntityState> {
            self.writes.lock().unwrap().clone()
        }

        pub fn last_state(&self) -> Option<f64> {
            self.writes.lock().unwrap().last().map(|s| s.state)
        }
    }

    impl EntityHost for RecordingHost {
        fn write_state(&self, state: EntityState) {
            self.writes.lock().unwrap().push(state);
        }
    }
}

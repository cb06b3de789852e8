use serde_json::{Map, Value};

/// Device data as last fetched, keyed by section (`setup`, `info`, ...) and then by field.
#[derive(Debug, Clone, Default, PartialEq, derive_more::From)]
pub struct DeviceData(Map<String, Value>);

impl DeviceData {
    pub fn with_section(mut self, section: impl Into<String>, value: Value) -> Self {
        self.insert_section(section, value);
        self
    }

    pub fn insert_section(&mut self, section: impl Into<String>, value: Value) {
        self.0.insert(section.into(), value);
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.0.get(section)?.get(key)
    }

    /// Numbers and numeric strings are accepted. Anything else, including NaN and infinities spelled
    /// out as text, reads as absent.
    pub fn get_f64(&self, section: &str, key: &str) -> Option<f64> {
        let value = match self.get(section, key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };

        value.filter(|v: &f64| v.is_finite())
    }

    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match self.get(section, key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One published fetch result. Never mutated once handed out; a refresh publishes a new one.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    version: u64,
    data: DeviceData,
}

impl Snapshot {
    pub fn new(version: u64, data: DeviceData) -> Self {
        Self { version, data }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn data(&self) -> &DeviceData {
        &self.data
    }

    pub fn next(&self, data: DeviceData) -> Self {
        Self {
            version: self.version + 1,
            data,
        }
    }
}

use config::{Config, ConfigError, Environment, File, Source};
use infrastructure::MonitoringConfig;
use serde::Deserialize;

use crate::coordinator::DeviceSettings;
use crate::mypv::{ConfigEntry, NumberDefaults};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub number: NumberDefaults,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub entries: Vec<ConfigEntry>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file(File::with_name("config.toml"))
    }

    fn from_file<S>(file: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix("MYPV")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("monitoring.logs.filters"),
        );

        let s = builder.build()?;
        s.try_deserialize()
    }
}

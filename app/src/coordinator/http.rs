use std::collections::BTreeMap;

use anyhow::Context as _;
use infrastructure::HttpClientConfig;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::Value;

use super::{DataSource, DeviceData};

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_sections")]
    pub sections: BTreeMap<String, String>,
    #[serde(default)]
    pub http: HttpClientConfig,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            sections: default_sections(),
            http: HttpClientConfig::default(),
        }
    }
}

fn default_sections() -> BTreeMap<String, String> {
    [("setup", "/setup.jsn"), ("info", "/mypv_dev.jsn"), ("data", "/data.jsn")]
        .into_iter()
        .map(|(section, path)| (section.to_owned(), path.to_owned()))
        .collect()
}

/// Fetches one JSON document per configured section from the device's web interface.
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: ClientWithMiddleware,
    base_url: String,
    sections: BTreeMap<String, String>,
}

impl HttpDataSource {
    pub fn new(host: &str, settings: &DeviceSettings) -> anyhow::Result<Self> {
        let client = settings.http.new_tracing_client()?;

        Ok(Self {
            client,
            base_url: base_url(host),
            sections: settings.sections.clone(),
        })
    }

    fn section_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_section(&self, section: &str, path: &str) -> anyhow::Result<Value> {
        let url = self.section_url(path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Error requesting section {} from {}", section, url))?
            .error_for_status()
            .with_context(|| format!("Error status for section {} from {}", section, url))?;

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Error parsing section {} from {}", section, url))
    }
}

impl DataSource for HttpDataSource {
    async fn fetch(&self) -> anyhow::Result<DeviceData> {
        let mut data = DeviceData::default();

        for (section, path) in &self.sections {
            let value = self.fetch_section(section, path).await?;
            data.insert_section(section.clone(), value);
        }

        Ok(data)
    }
}

fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("http://{}", host)
    }
}

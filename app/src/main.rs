use std::sync::Arc;

use mypv_bridge::coordinator::{Coordinator, DataUpdateCoordinator, HttpDataSource};
use mypv_bridge::entity::{EntityHost, EntityState, NumberEntity, TracingHost};
use mypv_bridge::mypv;
use mypv_bridge::settings::Settings;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");
    settings.monitoring.init().expect("Error initializing monitoring");

    let host: Arc<dyn EntityHost> = Arc::new(TracingHost);
    let mut poll_tasks = vec![];

    for entry in &settings.entries {
        let source = HttpDataSource::new(&entry.host, &settings.device).expect("Error initializing device HTTP client");
        let coordinator = Arc::new(DataUpdateCoordinator::new(entry.title.clone(), source));

        coordinator.refresh().await;
        if !coordinator.last_update_success() {
            tracing::error!("Initial refresh of {} at {} failed, skipping entry", coordinator.name(), entry.host);
            continue;
        }

        for entity in mypv::setup_entry(entry, coordinator.clone(), &settings.number) {
            tracing::info!("Registered {} for {}", entity.unique_id(), entry.title);
            host.write_state(EntityState::of(&*entity));
            poll_tasks.push(entity.attach(host.clone(), settings.number.poll_interval()));
        }
    }

    if poll_tasks.is_empty() {
        tracing::warn!("No entities registered");
    }

    tracing::info!("Starting main loop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Error waiting for shutdown signal: {:?}", e);
    }

    tracing::info!("Shutting down");
    for task in poll_tasks {
        task.stop().await;
    }
}

mod config;
mod guardsaas_api;
mod home_assistant;
mod pipeline;
mod publisher;
mod registry;

use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt};

use crate::config::{Config, GuardSaasConfig, SensorConfig};
use crate::guardsaas_api::portal_client::{PortalApi, PortalClient};
use crate::pipeline::{STATE_DISABLED, STATE_ERROR, SensorSnapshot};
use crate::publisher::EventSensorPublisher;
use crate::registry::{RefreshCommand, RefreshTarget, SensorRegistry, refresh_topic_parser};
use dashmap::DashSet;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_file("config.toml").or_else(|e| {
        println!("Config file not found. Creating example config.toml...");
        Config::save_example("config.toml")?;
        println!("Please edit config.toml with your settings and restart the application.");
        Err(e)
    })?;

    // Directory for logs
    let log_dir = &config.logging.directory;

    // One file per level
    let debug_file = rolling::daily(log_dir, &config.logging.debug_file);
    let info_file = rolling::daily(log_dir, &config.logging.info_file);
    let warn_file = rolling::daily(log_dir, &config.logging.warn_file);
    let error_file = rolling::daily(log_dir, &config.logging.error_file);

    // Build layers, filtering each level
    let debug_layer = fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug"));

    let info_layer = fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);

    let warn_layer = fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let error_layer = fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

    // Console pretty logger
    let console_layer = fmt::layer()
        .pretty()
        .with_filter(EnvFilter::new(&config.logging.console_level));

    // Compose subscriber
    tracing_subscriber::registry()
        .with(console_layer)
        .with(debug_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .init();

    // Verify credentials and the configured objects before wiring anything up
    verify_portal_access(&config.guardsaas, &config.sensors).await?;

    let mut ha_options = MqttOptions::new(
        &config.home_assistant.client_id,
        &config.home_assistant.mqtt_host,
        config.home_assistant.mqtt_port,
    );
    ha_options.set_credentials(
        &config.home_assistant.mqtt_username,
        &config.home_assistant.mqtt_password,
    );
    ha_options.set_keep_alive(Duration::from_secs(
        config.intervals.mqtt_keep_alive_seconds,
    ));
    let (ha_client, mut ha_eventloop) = AsyncClient::new(ha_options, config.limits.mqtt_queue_size);

    let published_discovery = Arc::new(DashSet::new());
    let registry = SensorRegistry::new();

    // Run HA event loop in background, routing refresh commands to sensors
    let router_registry = registry.clone();
    let ha_published_discovery = published_discovery.clone();
    let reconnect_delay = Duration::from_secs(config.intervals.reconnect_delay_seconds);
    tokio::spawn(async move {
        loop {
            match ha_eventloop.poll().await {
                Ok(event) => {
                    if let Event::Incoming(Packet::Publish(p)) = event {
                        match refresh_topic_parser(&p.topic) {
                            Some(RefreshTarget::Sensor(unique_id)) => {
                                if !router_registry.refresh(&unique_id).await {
                                    warn!("No sensor registered for refresh of {}", unique_id);
                                }
                            }
                            Some(RefreshTarget::All) => {
                                let reached = router_registry.refresh_all().await;
                                info!("Bridge-wide refresh reached {} sensors", reached);
                            }
                            None => {
                                warn!("Failed to parse topic: {:?}", p.topic);
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(
                        "HA event loop failed: {:?}. Forcing rediscovery and resubscriptions",
                        e
                    );
                    ha_published_discovery.clear();
                    tokio::time::sleep(reconnect_delay).await;
                }
            }
        }
    });

    for sensor in config.sensors.clone() {
        let (tx, rx) = mpsc::channel::<RefreshCommand>(config.limits.command_channel_size);
        registry.register(&sensor.unique_id(), tx).await;

        let publisher = EventSensorPublisher {
            ha_client: ha_client.clone(),
            published_discovery: published_discovery.clone(),
        };
        let portal = config.guardsaas.clone();

        tokio::spawn(async move {
            run_sensor_loop(portal, sensor, publisher, rx).await;
        });
    }

    // Prevent main from exiting
    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

/// Startup check: log in once, pull the object list and make sure every
/// configured target object exists on the account.
async fn verify_portal_access(
    portal: &GuardSaasConfig,
    sensors: &[SensorConfig],
) -> anyhow::Result<()> {
    let client = PortalClient::new(&portal.base_url)?;
    client.login(&portal.username, &portal.password).await?;

    let objects = client.get_objects().await?;
    client.logout().await;

    for sensor in sensors {
        if !objects.iter().any(|o| o.name == sensor.target_object) {
            let available: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
            anyhow::bail!(
                "object \"{}\" not found on the account; available objects: {:?}",
                sensor.target_object,
                available
            );
        }
    }
    info!(
        "Portal access verified, {} object(s) configured",
        sensors.len()
    );
    Ok(())
}

/// One polled sensor: ticks at the configured interval, also wakes up on
/// manual refresh commands, and publishes whatever snapshot the round trip
/// produced. Never exits while its refresh channel is open.
async fn run_sensor_loop(
    portal: GuardSaasConfig,
    sensor: SensorConfig,
    publisher: EventSensorPublisher,
    mut rx: mpsc::Receiver<RefreshCommand>,
) {
    let mut tick =
        tokio::time::interval(Duration::from_secs(sensor.scan_interval_minutes * 60));

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            cmd = rx.recv() => {
                if cmd.is_none() {
                    return;
                }
                info!("Manual refresh requested for {}", sensor.unique_id());
            }
        }

        let snapshot = fetch_snapshot(&portal, &sensor).await;
        if let Err(e) = publisher.publish(&sensor, &snapshot).await {
            error!(
                "Failed to publish snapshot for {}: {:?}",
                sensor.unique_id(),
                e
            );
        }
    }
}

async fn fetch_snapshot(portal: &GuardSaasConfig, sensor: &SensorConfig) -> SensorSnapshot {
    if !sensor.enabled {
        return SensorSnapshot::with_state(STATE_DISABLED);
    }

    // Fresh client per poll: the session lives for exactly one round trip
    match PortalClient::new(&portal.base_url) {
        Ok(client) => {
            pipeline::poll_once(
                &client,
                &portal.username,
                &portal.password,
                &sensor.target_object,
                sensor.limit,
            )
            .await
        }
        Err(e) => SensorSnapshot::failure(STATE_ERROR, &e),
    }
}

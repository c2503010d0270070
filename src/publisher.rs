use crate::config::SensorConfig;
use crate::home_assistant::availability::{Availability, AvailabilityState};
use crate::home_assistant::device::Device;
use crate::home_assistant::sensor::SensorDiscoveryPayload;
use crate::pipeline::SensorSnapshot;
use dashmap::DashSet;
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use tokio::join;
use tracing::{error, trace};

pub const BRIDGE_REFRESH_TOPIC: &str = "guardsaas/bridge/refresh/set";

/// Pushes snapshots at Home Assistant: publishes the retained MQTT discovery
/// config once per unique id, then state, attributes and availability on
/// every poll. The discovery set is shared so a broker reconnect can force
/// re-publication for every sensor at once.
#[derive(Clone)]
pub struct EventSensorPublisher {
    pub ha_client: AsyncClient,
    pub published_discovery: Arc<DashSet<String>>,
}

impl EventSensorPublisher {
    pub fn state_topic(unique_id: &str) -> String {
        format!("guardsaas/sensor/{}/state", unique_id)
    }

    pub fn attributes_topic(unique_id: &str) -> String {
        format!("guardsaas/sensor/{}/attributes", unique_id)
    }

    pub fn availability_topic(unique_id: &str) -> String {
        format!("guardsaas/sensor/{}/availability", unique_id)
    }

    pub fn refresh_topic(unique_id: &str) -> String {
        format!("guardsaas/sensor/{}/refresh/set", unique_id)
    }

    pub async fn publish(
        &self,
        sensor: &SensorConfig,
        snapshot: &SensorSnapshot,
    ) -> anyhow::Result<()> {
        let unique_id = sensor.unique_id();
        let state_topic = Self::state_topic(&unique_id);
        let attributes_topic = Self::attributes_topic(&unique_id);
        let availability_topic = Self::availability_topic(&unique_id);

        let should_publish = self.published_discovery.insert(unique_id.clone());
        if should_publish {
            // Un-mark on failure so the next cycle retries the discovery
            // config and the command subscriptions.
            if let Err(e) = self.publish_discovery(sensor, &unique_id).await {
                self.published_discovery.remove(&unique_id);
                return Err(e);
            }
        }

        match join!(
            self.ha_client.publish(
                &state_topic,
                QoS::AtLeastOnce,
                true,
                snapshot.state.clone()
            ),
            self.ha_client.publish(
                &attributes_topic,
                QoS::AtLeastOnce,
                true,
                serde_json::to_string(&snapshot.attributes)?,
            ),
            self.ha_client.publish(
                &availability_topic,
                QoS::AtLeastOnce,
                true,
                AvailabilityState::Online.as_serde_value(),
            )
        ) {
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                error!("Error publishing to {}: {:?}", state_topic, e);
                Err(anyhow::Error::from(e))
            }
            _ => Ok(()),
        }
    }

    async fn publish_discovery(
        &self,
        sensor: &SensorConfig,
        unique_id: &str,
    ) -> anyhow::Result<()> {
        let discovery_topic = format!("homeassistant/sensor/{}/config", unique_id);

        let discovery_object = SensorDiscoveryPayload {
            device: Device {
                identifiers: vec![unique_id.to_string()],
                manufacturer: "GuardSaaS".to_string(),
                model: "Event Sensor".to_string(),
                name: sensor.display_name(),
            },
            name: sensor.display_name(),
            icon: "mdi:account-key".to_string(),
            state_topic: Self::state_topic(unique_id),
            unique_id: unique_id.to_string(),
            json_attributes_topic: Some(Self::attributes_topic(unique_id)),
            availability: Some(vec![Availability {
                payload_available: Some(AvailabilityState::Online.as_serde_value()),
                payload_not_available: Some(AvailabilityState::Offline.as_serde_value()),
                topic: Self::availability_topic(unique_id),
                value_template: None,
            }]),
            availability_mode: None,
        };
        let discovery_payload = serde_json::to_string(&discovery_object)?;
        trace!("{}", discovery_payload);

        self.ha_client
            .publish(&discovery_topic, QoS::AtLeastOnce, true, discovery_payload)
            .await?;

        // Command subscriptions ride along with discovery so a forced
        // rediscovery after an event-loop error also restores them.
        self.ha_client
            .subscribe(Self::refresh_topic(unique_id), QoS::AtLeastOnce)
            .await?;
        self.ha_client
            .subscribe(BRIDGE_REFRESH_TOPIC, QoS::AtLeastOnce)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SensorSnapshot;
    use rumqttc::MqttOptions;

    #[tokio::test]
    async fn failed_discovery_publish_is_retried_next_cycle() {
        // Dropping the event loop closes the request channel, so every
        // publish fails.
        let (ha_client, eventloop) =
            AsyncClient::new(MqttOptions::new("test", "localhost", 1883), 10);
        drop(eventloop);

        let publisher = EventSensorPublisher {
            ha_client,
            published_discovery: Arc::new(DashSet::new()),
        };
        let sensor = SensorConfig {
            target_object: "Door A".to_string(),
            limit: 25,
            scan_interval_minutes: 1,
            enabled: true,
        };
        let snapshot = SensorSnapshot::with_state("Ivan Petrov");

        assert!(publisher.publish(&sensor, &snapshot).await.is_err());
        assert!(
            !publisher.published_discovery.contains(&sensor.unique_id()),
            "failed discovery must stay unmarked so the next cycle retries it"
        );
    }

    #[test]
    fn topics_are_scoped_by_unique_id() {
        assert_eq!(
            EventSensorPublisher::state_topic("guardsaas_door_a"),
            "guardsaas/sensor/guardsaas_door_a/state"
        );
        assert_eq!(
            EventSensorPublisher::refresh_topic("guardsaas_door_a"),
            "guardsaas/sensor/guardsaas_door_a/refresh/set"
        );
    }
}

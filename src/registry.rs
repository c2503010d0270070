use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::warn;

/// Request for an out-of-schedule poll, delivered over each sensor's
/// command channel.
#[derive(Debug, Clone, Copy)]
pub struct RefreshCommand;

/// Registry of live sensors, keyed by unique id. Owned by main and handed
/// to the MQTT command router; this is the only shared mutable state in the
/// process.
#[derive(Clone, Default)]
pub struct SensorRegistry {
    senders: Arc<RwLock<HashMap<String, mpsc::Sender<RefreshCommand>>>>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, unique_id: &str, sender: mpsc::Sender<RefreshCommand>) {
        self.senders
            .write()
            .await
            .insert(unique_id.to_string(), sender);
    }

    /// Refresh one sensor. Returns false when no sensor carries that id.
    pub async fn refresh(&self, unique_id: &str) -> bool {
        match self.senders.read().await.get(unique_id) {
            Some(sender) => {
                if let Err(e) = sender.send(RefreshCommand).await {
                    warn!("refresh channel for {} is gone: {:?}", unique_id, e);
                    return false;
                }
                true
            }
            None => false,
        }
    }

    /// Refresh every registered sensor; returns how many were reached.
    pub async fn refresh_all(&self) -> usize {
        let mut reached = 0;
        for (unique_id, sender) in self.senders.read().await.iter() {
            if let Err(e) = sender.send(RefreshCommand).await {
                warn!("refresh channel for {} is gone: {:?}", unique_id, e);
            } else {
                reached += 1;
            }
        }
        reached
    }
}

#[derive(Debug, PartialEq)]
pub enum RefreshTarget {
    All,
    Sensor(String),
}

/// Maps incoming MQTT command topics onto refresh targets. The per-sensor
/// topic mirrors the optional entity filter of the original manual-refresh
/// service; the bridge-wide topic is the no-filter case.
pub fn refresh_topic_parser(topic: &str) -> Option<RefreshTarget> {
    let parts: Vec<&str> = topic.split('/').collect();
    match parts.as_slice() {
        ["guardsaas", "bridge", "refresh", "set"] => Some(RefreshTarget::All),
        ["guardsaas", "sensor", unique_id, "refresh", "set"] if !unique_id.is_empty() => {
            Some(RefreshTarget::Sensor(unique_id.to_string()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_sensor_topic_routes_to_that_sensor() {
        assert_eq!(
            refresh_topic_parser("guardsaas/sensor/guardsaas_door_a/refresh/set"),
            Some(RefreshTarget::Sensor("guardsaas_door_a".to_string()))
        );
    }

    #[test]
    fn bridge_topic_routes_to_all() {
        assert_eq!(
            refresh_topic_parser("guardsaas/bridge/refresh/set"),
            Some(RefreshTarget::All)
        );
    }

    #[test]
    fn unrelated_topics_are_rejected() {
        assert_eq!(refresh_topic_parser("homeassistant/sensor/foo/config"), None);
        assert_eq!(refresh_topic_parser("guardsaas/sensor//refresh/set"), None);
        assert_eq!(refresh_topic_parser("guardsaas/sensor/foo/refresh"), None);
    }

    #[tokio::test]
    async fn registry_routes_by_id_and_broadcasts() {
        let registry = SensorRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        registry.register("a", tx_a).await;
        registry.register("b", tx_b).await;

        assert!(registry.refresh("a").await);
        assert!(!registry.refresh("missing").await);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());

        assert_eq!(registry.refresh_all().await, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }
}

use serde::{Deserialize, Serialize};

/// Availability block of an MQTT discovery payload: Home Assistant marks the
/// entity available while `topic` last carried `payload_available`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Availability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_available: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_not_available: Option<String>,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum AvailabilityMode {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "latest")]
    Latest,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub enum AvailabilityState {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "offline")]
    Offline,
}

impl AvailabilityState {
    pub fn as_serde_value(&self) -> String {
        match self {
            AvailabilityState::Online => "online".to_string(),
            AvailabilityState::Offline => "offline".to_string(),
        }
    }
}

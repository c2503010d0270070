use crate::guardsaas_api::portal_client::DEFAULT_BASE_URL;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub guardsaas: GuardSaasConfig,
    pub home_assistant: HomeAssistantConfig,
    pub intervals: IntervalConfig,
    pub limits: LimitsConfig,
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub directory: String,
    pub debug_file: String,
    pub info_file: String,
    pub warn_file: String,
    pub error_file: String,
    pub console_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GuardSaasConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HomeAssistantConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: String,
    pub mqtt_password: String,
    pub client_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IntervalConfig {
    pub reconnect_delay_seconds: u64,
    pub mqtt_keep_alive_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitsConfig {
    pub mqtt_queue_size: usize,
    pub command_channel_size: usize,
}

/// One polled sensor, bound to one portal object.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SensorConfig {
    pub target_object: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_minutes: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_limit() -> u32 {
    25
}

fn default_scan_interval() -> u64 {
    1
}

fn default_enabled() -> bool {
    true
}

impl SensorConfig {
    pub fn unique_id(&self) -> String {
        format!(
            "guardsaas_{}",
            self.target_object.to_lowercase().replace(' ', "_")
        )
    }

    pub fn display_name(&self) -> String {
        format!("GuardSaaS - {}", self.target_object)
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sensors.is_empty() {
            bail!("config declares no [[sensors]]");
        }
        for sensor in &self.sensors {
            if sensor.limit < 1 || sensor.limit > 1000 {
                bail!(
                    "sensor \"{}\": limit must be within 1..=1000, got {}",
                    sensor.target_object,
                    sensor.limit
                );
            }
            if sensor.scan_interval_minutes < 1 || sensor.scan_interval_minutes > 1440 {
                bail!(
                    "sensor \"{}\": scan_interval_minutes must be within 1..=1440, got {}",
                    sensor.target_object,
                    sensor.scan_interval_minutes
                );
            }
        }
        let mut seen = std::collections::HashSet::new();
        for sensor in &self.sensors {
            if !seen.insert(sensor.unique_id()) {
                bail!("duplicate sensor for object \"{}\"", sensor.target_object);
            }
        }
        Ok(())
    }

    pub fn save_example(path: &str) -> Result<()> {
        let example_config = Config {
            logging: LoggingConfig {
                directory: "./logs".to_string(),
                debug_file: "log_debug.log".to_string(),
                info_file: "log_info.log".to_string(),
                warn_file: "log_warn.log".to_string(),
                error_file: "log_error.log".to_string(),
                console_level: "info".to_string(),
            },
            guardsaas: GuardSaasConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                username: "REPLACE_WITH_YOUR_GUARDSAAS_USERNAME".to_string(),
                password: "REPLACE_WITH_YOUR_GUARDSAAS_PASSWORD".to_string(),
            },
            home_assistant: HomeAssistantConfig {
                mqtt_host: "192.168.1.40".to_string(),
                mqtt_port: 1883,
                mqtt_username: "homeassistant".to_string(),
                mqtt_password: "REPLACE_WITH_YOUR_HOMEASSISTANT_MQTT_PASSWORD".to_string(),
                client_id: "guardsaas-forwarder".to_string(),
            },
            intervals: IntervalConfig {
                reconnect_delay_seconds: 5,
                mqtt_keep_alive_seconds: 30,
            },
            limits: LimitsConfig {
                mqtt_queue_size: 100,
                command_channel_size: 10,
            },
            sensors: vec![SensorConfig {
                target_object: "Main Entrance".to_string(),
                limit: 25,
                scan_interval_minutes: 1,
                enabled: true,
            }],
        };

        let toml_content = toml::to_string_pretty(&example_config)?;
        fs::write(path, toml_content)?;
        Ok(())
    }
}

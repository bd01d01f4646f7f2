use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("thermostatName must not be empty")]
    MissingThermostatName,
    #[error("plugName must not be empty")]
    MissingPlugName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchdogConfig {
    pub check_interval_ms: u64,
    pub cycle_wait_ms: u64,
    pub power_off_duration_ms: u64,
    /// Degrees below setpoint before a decline is worth acting on.
    pub temp_threshold: f32,
    pub max_cycles: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 60_000,
            cycle_wait_ms: 600_000,
            power_off_duration_ms: 10_000,
            temp_threshold: 2.0,
            max_cycles: 3,
        }
    }
}

/// Which devices to manage, by gateway nickname. No defaults: a watchdog
/// pointed at the wrong plug is worse than one that refuses to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicesConfig {
    pub thermostat_name: String,
    pub plug_name: String,
}

impl DevicesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thermostat_name.trim().is_empty() {
            return Err(ConfigError::MissingThermostatName);
        }
        if self.plug_name.trim().is_empty() {
            return Err(ConfigError::MissingPlugName);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub http_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    pub devices: DevicesConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let config = WatchdogConfig::default();
        assert_eq!(config.check_interval_ms, 60_000);
        assert_eq!(config.cycle_wait_ms, 600_000);
        assert_eq!(config.power_off_duration_ms, 10_000);
        assert_eq!(config.max_cycles, 3);
        assert!((config.temp_threshold - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_minimal_config() {
        let raw = r#"{"devices":{"thermostatName":"Hallway","plugName":"Stove Plug"}}"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.devices.thermostat_name, "Hallway");
        assert_eq!(config.devices.plug_name, "Stove Plug");
        assert_eq!(config.watchdog.check_interval_ms, 60_000);
        assert_eq!(config.network.mqtt_port, 1883);
        assert!(config.devices.validate().is_ok());
    }

    #[test]
    fn missing_devices_section_is_a_parse_error() {
        let raw = r#"{"watchdog":{"checkIntervalMs":30000}}"#;
        assert!(serde_json::from_str::<RuntimeConfig>(raw).is_err());
    }

    #[test]
    fn empty_device_names_fail_validation() {
        let devices = DevicesConfig {
            thermostat_name: "  ".to_string(),
            plug_name: "Stove Plug".to_string(),
        };
        assert_eq!(devices.validate(), Err(ConfigError::MissingThermostatName));

        let devices = DevicesConfig {
            thermostat_name: "Hallway".to_string(),
            plug_name: String::new(),
        };
        assert_eq!(devices.validate(), Err(ConfigError::MissingPlugName));
    }

    #[test]
    fn overrides_take_effect() {
        let raw = r#"{
            "watchdog": {"checkIntervalMs": 30000, "tempThreshold": 1.5, "maxCycles": 5},
            "devices": {"thermostatName": "Hallway", "plugName": "Stove Plug"},
            "network": {"mqttHost": "broker.local", "httpPort": 9090}
        }"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.watchdog.check_interval_ms, 30_000);
        assert_eq!(config.watchdog.max_cycles, 5);
        assert_eq!(config.network.mqtt_host, "broker.local");
        assert_eq!(config.network.http_port, 9090);
    }
}

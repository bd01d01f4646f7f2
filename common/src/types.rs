use serde::{Deserialize, Serialize};

/// The only thermostat mode the watchdog acts on. Anything else reported by
/// the gateway counts as "not heating".
pub const WORKING_STATE_HEATING: &str = "heating";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchdogState {
    Monitoring,
    WaitingForIgnition,
    WaitingAfterCycle,
    Failed,
}

impl WatchdogState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monitoring => "MONITORING",
            Self::WaitingForIgnition => "WAITING_FOR_IGNITION",
            Self::WaitingAfterCycle => "WAITING_AFTER_CYCLE",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    Plug,
    Thermostat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub nickname: String,
    pub product_type: ProductType,
    pub mac: String,
    pub product_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatStatus {
    pub working_state: String,
    pub temperature: f32,
    pub heat_setpoint: f32,
}

impl ThermostatStatus {
    pub fn is_heating(&self) -> bool {
        self.working_state == WORKING_STATE_HEATING
    }
}

/// Point-in-time view of the engine, published retained over MQTT and served
/// from the HTTP status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogSnapshot {
    pub state: &'static str,
    pub cycle_count: u32,
    pub max_cycles: u32,
    pub samples: usize,
    pub current_temp: Option<f32>,
    pub current_setpoint: Option<f32>,
    pub wait_remaining_ms: u64,
    pub thermostat: String,
    pub plug: String,
}

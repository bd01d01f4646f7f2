pub mod config;
pub mod gateway;
pub mod history;
pub mod topics;
pub mod trend;
pub mod types;
pub mod watchdog;

pub use config::{ConfigError, DevicesConfig, NetworkConfig, RuntimeConfig, WatchdogConfig};
pub use gateway::{DeviceGateway, GatewayError};
pub use history::{TempHistory, TempSample, HISTORY_CAPACITY};
pub use topics::*;
pub use types::{
    Device, ProductType, ThermostatStatus, WatchdogSnapshot, WatchdogState, WORKING_STATE_HEATING,
};
pub use watchdog::WatchdogEngine;

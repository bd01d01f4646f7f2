use thiserror::Error;

use crate::types::{Device, ThermostatStatus};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("device gateway transport error: {0}")]
    Transport(String),
    #[error("no status report available for {0}")]
    NoStatus(String),
    #[error("device {0:?} not found")]
    DeviceNotFound(String),
}

/// The four capabilities the watchdog needs from whatever controls the
/// devices. Plug commands return `Ok(false)` when the device did not confirm
/// the requested state; `Err` means the gateway itself failed.
#[allow(async_fn_in_trait)]
pub trait DeviceGateway {
    async fn list_devices(&self) -> Result<Vec<Device>, GatewayError>;
    async fn thermostat_status(&self, device: &Device) -> Result<ThermostatStatus, GatewayError>;
    async fn plug_off(&self, device: &Device) -> Result<bool, GatewayError>;
    async fn plug_on(&self, device: &Device) -> Result<bool, GatewayError>;
    async fn is_plug_on(&self, device: &Device) -> Result<bool, GatewayError>;
}

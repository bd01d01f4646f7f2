use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use stovewatch_common::{
    topics, Device, DeviceGateway, GatewayError, NetworkConfig, ThermostatStatus,
    WatchdogSnapshot, TOPIC_DISCOVERY_WILDCARD, TOPIC_PLUG_STATE_WILDCARD,
    TOPIC_THERMOSTAT_STATUS_WILDCARD, TOPIC_WATCHDOG_STATE,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCOVERY_SETTLE: Duration = Duration::from_secs(2);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const COMMAND_POLL: Duration = Duration::from_millis(200);

#[derive(Default)]
struct GatewayCache {
    devices: HashMap<String, Device>,
    thermostats: HashMap<String, ThermostatStatus>,
    plug_states: HashMap<String, bool>,
}

/// Device gateway over MQTT. Devices (or a bridge in front of them) publish
/// retained discovery, thermostat status, and plug state messages; commands
/// go out on the plug command topic and are considered confirmed once the
/// device's retained state echoes the requested value.
#[derive(Clone)]
pub struct MqttGateway {
    client: AsyncClient,
    cache: Arc<Mutex<GatewayCache>>,
}

impl MqttGateway {
    /// Connect and authenticate against the broker. Failure here is fatal to
    /// startup; nothing else may be called first. Retained messages are
    /// drained for a short settle window so the first `list_devices` call
    /// sees the world as the broker knows it.
    pub async fn login(network: &NetworkConfig) -> anyhow::Result<Self> {
        let mut options =
            MqttOptions::new("stovewatch-daemon", &network.mqtt_host, network.mqtt_port);
        if !network.mqtt_user.is_empty() {
            options.set_credentials(&network.mqtt_user, &network.mqtt_pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);

        tokio::time::timeout(CONNECT_TIMEOUT, async {
            loop {
                if let Event::Incoming(Incoming::ConnAck(_)) = eventloop.poll().await? {
                    return Ok::<(), anyhow::Error>(());
                }
            }
        })
        .await
        .context("timed out waiting for the mqtt broker")?
        .context("mqtt connection rejected")?;
        info!(
            "logged in to mqtt broker at {}:{}",
            network.mqtt_host, network.mqtt_port
        );

        for topic in [
            TOPIC_DISCOVERY_WILDCARD,
            TOPIC_THERMOSTAT_STATUS_WILDCARD,
            TOPIC_PLUG_STATE_WILDCARD,
        ] {
            client.subscribe(topic, QoS::AtLeastOnce).await?;
        }

        let cache: Arc<Mutex<GatewayCache>> = Arc::default();

        let settle = tokio::time::sleep(DISCOVERY_SETTLE);
        tokio::pin!(settle);
        loop {
            tokio::select! {
                () = &mut settle => break,
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::Publish(message))) => {
                        absorb(&cache, &message.topic, &message.payload).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("mqtt poll error during discovery: {err}");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        }

        let loop_cache = cache.clone();
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(message))) => {
                        absorb(&loop_cache, &message.topic, &message.payload).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("mqtt poll error: {err}");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        Ok(Self { client, cache })
    }

    pub async fn publish_snapshot(&self, snapshot: &WatchdogSnapshot) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(snapshot)?;
        self.client
            .publish(TOPIC_WATCHDOG_STATE, QoS::AtLeastOnce, true, payload)
            .await
            .context("watchdog state publish failed")?;
        Ok(())
    }

    async fn command_plug(&self, device: &Device, on: bool) -> Result<bool, GatewayError> {
        let payload = if on { "on" } else { "off" };
        self.client
            .publish(
                topics::plug_cmd_topic(&device.mac),
                QoS::AtLeastOnce,
                false,
                payload,
            )
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        // Wait for the device to echo the new state on its retained topic.
        let deadline = Instant::now() + COMMAND_TIMEOUT;
        while Instant::now() < deadline {
            if self.cache.lock().await.plug_states.get(&device.mac) == Some(&on) {
                return Ok(true);
            }
            tokio::time::sleep(COMMAND_POLL).await;
        }
        Ok(false)
    }
}

impl DeviceGateway for MqttGateway {
    async fn list_devices(&self) -> Result<Vec<Device>, GatewayError> {
        Ok(self.cache.lock().await.devices.values().cloned().collect())
    }

    async fn thermostat_status(&self, device: &Device) -> Result<ThermostatStatus, GatewayError> {
        self.cache
            .lock()
            .await
            .thermostats
            .get(&device.mac)
            .cloned()
            .ok_or_else(|| GatewayError::NoStatus(device.nickname.clone()))
    }

    async fn plug_off(&self, device: &Device) -> Result<bool, GatewayError> {
        self.command_plug(device, false).await
    }

    async fn plug_on(&self, device: &Device) -> Result<bool, GatewayError> {
        self.command_plug(device, true).await
    }

    async fn is_plug_on(&self, device: &Device) -> Result<bool, GatewayError> {
        self.cache
            .lock()
            .await
            .plug_states
            .get(&device.mac)
            .copied()
            .ok_or_else(|| GatewayError::NoStatus(device.nickname.clone()))
    }
}

async fn absorb(cache: &Mutex<GatewayCache>, topic: &str, payload: &[u8]) {
    if let Some(mac) = topics::parse_discovery(topic) {
        match serde_json::from_slice::<Device>(payload) {
            Ok(device) => {
                cache.lock().await.devices.insert(mac.to_string(), device);
            }
            Err(err) => warn!("invalid discovery payload on {topic}: {err}"),
        }
    } else if let Some(mac) = topics::parse_thermostat_status(topic) {
        match serde_json::from_slice::<ThermostatStatus>(payload) {
            Ok(status) => {
                cache
                    .lock()
                    .await
                    .thermostats
                    .insert(mac.to_string(), status);
            }
            Err(err) => warn!("invalid thermostat status on {topic}: {err}"),
        }
    } else if let Some(mac) = topics::parse_plug_state(topic) {
        match payload {
            b"on" => {
                cache.lock().await.plug_states.insert(mac.to_string(), true);
            }
            b"off" => {
                cache
                    .lock()
                    .await
                    .plug_states
                    .insert(mac.to_string(), false);
            }
            _ => warn!("unrecognized plug state payload on {topic}"),
        }
    }
}

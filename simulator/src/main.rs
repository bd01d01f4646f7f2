//! Fake thermostat/plug pair on MQTT for exercising the daemon end to end
//! without hardware. Publishes retained discovery and status, answers plug
//! commands, and can fake a failed ignition (`SIM_FAIL_IGNITION=1`) that a
//! power cycle repairs.

use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tracing::{info, warn};

use stovewatch_common::{
    topics, Device, ProductType, ThermostatStatus, WORKING_STATE_HEATING,
    TOPIC_PLUG_CMD_WILDCARD,
};

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

struct Simulation {
    thermostat: Device,
    plug: Device,
    plug_on: bool,
    temperature: f32,
    setpoint: f32,
    fail_ignition: bool,
}

impl Simulation {
    fn new() -> Self {
        Self {
            thermostat: Device {
                nickname: env_or("SIM_THERMOSTAT_NAME", "Hallway"),
                product_type: ProductType::Thermostat,
                mac: "SIM-TH-01".to_string(),
                product_model: "CloudTherm-2".to_string(),
            },
            plug: Device {
                nickname: env_or("SIM_PLUG_NAME", "Stove Plug"),
                product_type: ProductType::Plug,
                mac: "SIM-PL-01".to_string(),
                product_model: "SmartPlug-Mini".to_string(),
            },
            plug_on: true,
            temperature: 66.0,
            setpoint: 72.0,
            fail_ignition: std::env::var("SIM_FAIL_IGNITION").is_ok(),
        }
    }

    fn step(&mut self) -> ThermostatStatus {
        let wants_heat = self.temperature < self.setpoint - 0.5;
        let heating = self.plug_on && wants_heat;

        if heating {
            // A broken ignition reports heating while the room cools.
            self.temperature += if self.fail_ignition { -0.3 } else { 0.4 };
        } else {
            self.temperature -= 0.1;
        }

        ThermostatStatus {
            working_state: if heating {
                WORKING_STATE_HEATING.to_string()
            } else {
                "idle".to_string()
            },
            temperature: self.temperature,
            heat_setpoint: self.setpoint,
        }
    }

    fn set_plug(&mut self, on: bool) {
        // Going off and back on resets the stove controller, so a power
        // cycle clears the simulated ignition fault.
        if on && !self.plug_on {
            self.fail_ignition = false;
        }
        self.plug_on = on;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mqtt_host = env_or("MQTT_HOST", "127.0.0.1");
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mqtt_options = MqttOptions::new("stovewatch-simulator", mqtt_host, mqtt_port);
    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.subscribe(TOPIC_PLUG_CMD_WILDCARD, QoS::AtLeastOnce)
        .await
        .context("failed to subscribe to plug commands")?;

    let mut sim = Simulation::new();
    announce(&mqtt, &sim).await?;
    info!(
        "simulating thermostat {:?} and plug {:?} (fail_ignition={})",
        sim.thermostat.nickname, sim.plug.nickname, sim.fail_ignition
    );

    let mut interval = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let status = sim.step();
                let payload = serde_json::to_vec(&status)?;
                mqtt.publish(
                    topics::thermostat_status_topic(&sim.thermostat.mac),
                    QoS::AtLeastOnce,
                    true,
                    payload,
                )
                .await
                .context("failed to publish thermostat status")?;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    let Some(mac) = topics::parse_plug_cmd(&message.topic) else {
                        continue;
                    };
                    if mac != sim.plug.mac {
                        continue;
                    }
                    match message.payload.as_ref() {
                        b"on" => sim.set_plug(true),
                        b"off" => sim.set_plug(false),
                        other => {
                            warn!("ignoring plug command payload {:?}", other);
                            continue;
                        }
                    }
                    info!("plug switched {}", if sim.plug_on { "on" } else { "off" });
                    publish_plug_state(&mqtt, &sim).await?;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("simulator mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
}

async fn announce(mqtt: &AsyncClient, sim: &Simulation) -> anyhow::Result<()> {
    for device in [&sim.thermostat, &sim.plug] {
        let payload = serde_json::to_vec(device)?;
        mqtt.publish(
            topics::discovery_topic(&device.mac),
            QoS::AtLeastOnce,
            true,
            payload,
        )
        .await
        .context("failed to publish device discovery")?;
    }
    publish_plug_state(mqtt, sim).await
}

async fn publish_plug_state(mqtt: &AsyncClient, sim: &Simulation) -> anyhow::Result<()> {
    mqtt.publish(
        topics::plug_state_topic(&sim.plug.mac),
        QoS::AtLeastOnce,
        true,
        if sim.plug_on { "on" } else { "off" },
    )
    .await
    .context("failed to publish plug state")?;
    Ok(())
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

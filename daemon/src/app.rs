use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use stovewatch_common::{
    Device, DeviceGateway, DevicesConfig, ProductType, RuntimeConfig, WatchdogEngine,
    WatchdogSnapshot,
};

use crate::gateway::MqttGateway;
use crate::http;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_runtime_config()?;
    config
        .devices
        .validate()
        .context("invalid device configuration")?;

    let gateway = MqttGateway::login(&config.network)
        .await
        .context("device gateway login failed")?;

    let Some((thermostat, plug)) = startup_check(&gateway, &config.devices).await? else {
        return Ok(());
    };

    info!(
        "watching thermostat {:?} via plug {:?}, checking every {}s",
        thermostat.nickname,
        plug.nickname,
        config.watchdog.check_interval_ms / 1000
    );

    let engine = WatchdogEngine::new(
        gateway.clone(),
        config.watchdog.clone(),
        thermostat,
        config.devices.plug_name.clone(),
    );

    let snapshot = Arc::new(Mutex::new(engine.snapshot()));
    http::spawn(config.network.http_port, snapshot.clone());

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    watch_loop(engine, snapshot, Some(gateway), shutdown).await;

    Ok(())
}

/// Post-login startup checks. Resolves the configured devices (missing ones
/// are fatal) and honors a deliberately switched-off plug: that stove was
/// turned off on purpose (vacation, maintenance), and powering it up is not
/// our call, so `None` means exit cleanly without touching anything.
async fn startup_check<G: DeviceGateway>(
    gateway: &G,
    devices: &DevicesConfig,
) -> anyhow::Result<Option<(Device, Device)>> {
    let all = gateway
        .list_devices()
        .await
        .context("device discovery failed")?;
    let thermostat = find_device(&all, ProductType::Thermostat, &devices.thermostat_name)
        .with_context(|| format!("thermostat {:?} not found", devices.thermostat_name))?;
    let plug = find_device(&all, ProductType::Plug, &devices.plug_name)
        .with_context(|| format!("plug {:?} not found", devices.plug_name))?;

    let plug_on = gateway
        .is_plug_on(&plug)
        .await
        .context("could not read initial plug state")?;
    if !plug_on {
        info!(
            "plug {:?} is off, assuming vacation or maintenance mode, exiting",
            plug.nickname
        );
        return Ok(None);
    }

    Ok(Some((thermostat, plug)))
}

/// Drives the engine at the configured interval until `shutdown` resolves.
/// The tick body runs to completion inside its select arm, so a shutdown
/// arriving mid-tick (power-cycle sleep included) takes effect between
/// ticks, never in the middle of one.
async fn watch_loop<G: DeviceGateway>(
    mut engine: WatchdogEngine<G>,
    snapshot: Arc<Mutex<WatchdogSnapshot>>,
    publisher: Option<MqttGateway>,
    shutdown: impl Future<Output = ()>,
) {
    let mut ticker =
        tokio::time::interval(Duration::from_millis(engine.config.check_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("shutdown requested, stopping after current tick");
                break;
            }
            _ = ticker.tick() => {
                engine.tick().await;

                let current = engine.snapshot();
                *snapshot.lock().await = current.clone();
                if let Some(publisher) = &publisher {
                    if let Err(err) = publisher.publish_snapshot(&current).await {
                        warn!("could not publish watchdog state: {err:#}");
                    }
                }
            }
        }
    }
}

fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let path = std::env::var("STOVEWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./stovewatch.json"));

    let raw = std::fs::read(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn find_device(devices: &[Device], product_type: ProductType, nickname: &str) -> Option<Device> {
    devices
        .iter()
        .find(|device| device.product_type == product_type && device.nickname == nickname)
        .cloned()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    use stovewatch_common::{GatewayError, ThermostatStatus, WatchdogConfig};

    use super::*;

    struct MockInner {
        devices: Vec<Device>,
        plug_on: AtomicBool,
        statuses: StdMutex<VecDeque<ThermostatStatus>>,
        calls: StdMutex<Vec<&'static str>>,
    }

    #[derive(Clone)]
    struct MockGateway(Arc<MockInner>);

    impl MockGateway {
        fn new(devices: Vec<Device>) -> Self {
            Self(Arc::new(MockInner {
                devices,
                plug_on: AtomicBool::new(true),
                statuses: StdMutex::new(VecDeque::new()),
                calls: StdMutex::new(Vec::new()),
            }))
        }

        fn calls(&self) -> Vec<&'static str> {
            self.0.calls.lock().unwrap().clone()
        }
    }

    impl DeviceGateway for MockGateway {
        async fn list_devices(&self) -> Result<Vec<Device>, GatewayError> {
            self.0.calls.lock().unwrap().push("list");
            Ok(self.0.devices.clone())
        }

        async fn thermostat_status(
            &self,
            device: &Device,
        ) -> Result<ThermostatStatus, GatewayError> {
            self.0.calls.lock().unwrap().push("status");
            self.0
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| GatewayError::NoStatus(device.nickname.clone()))
        }

        async fn plug_off(&self, _device: &Device) -> Result<bool, GatewayError> {
            self.0.calls.lock().unwrap().push("off");
            Ok(true)
        }

        async fn plug_on(&self, _device: &Device) -> Result<bool, GatewayError> {
            self.0.calls.lock().unwrap().push("on");
            Ok(true)
        }

        async fn is_plug_on(&self, _device: &Device) -> Result<bool, GatewayError> {
            self.0.calls.lock().unwrap().push("is_plug_on");
            Ok(self.0.plug_on.load(Ordering::SeqCst))
        }
    }

    fn thermostat_device() -> Device {
        Device {
            nickname: "Hallway".to_string(),
            product_type: ProductType::Thermostat,
            mac: "TH01".to_string(),
            product_model: "CloudTherm".to_string(),
        }
    }

    fn plug_device() -> Device {
        Device {
            nickname: "Stove Plug".to_string(),
            product_type: ProductType::Plug,
            mac: "PL01".to_string(),
            product_model: "SmartPlug".to_string(),
        }
    }

    fn devices_config() -> DevicesConfig {
        DevicesConfig {
            thermostat_name: "Hallway".to_string(),
            plug_name: "Stove Plug".to_string(),
        }
    }

    #[tokio::test]
    async fn switched_off_plug_means_vacation_mode_and_no_commands() {
        let gateway = MockGateway::new(vec![thermostat_device(), plug_device()]);
        gateway.0.plug_on.store(false, Ordering::SeqCst);

        let resolved = startup_check(&gateway, &devices_config()).await.unwrap();

        assert!(resolved.is_none());
        // Only reads: no plug command, no status fetch, nothing.
        assert_eq!(gateway.calls(), vec!["list", "is_plug_on"]);
    }

    #[tokio::test]
    async fn startup_proceeds_with_resolved_devices_when_plug_is_on() {
        let gateway = MockGateway::new(vec![thermostat_device(), plug_device()]);

        let (thermostat, plug) = startup_check(&gateway, &devices_config())
            .await
            .unwrap()
            .expect("startup should proceed");

        assert_eq!(thermostat.nickname, "Hallway");
        assert_eq!(plug.nickname, "Stove Plug");
    }

    #[tokio::test]
    async fn missing_thermostat_is_fatal_before_any_plug_read() {
        let gateway = MockGateway::new(vec![plug_device()]);

        let result = startup_check(&gateway, &devices_config()).await;

        assert!(result.is_err());
        assert_eq!(gateway.calls(), vec!["list"]);
    }

    #[tokio::test]
    async fn missing_plug_is_fatal() {
        let gateway = MockGateway::new(vec![thermostat_device()]);

        assert!(startup_check(&gateway, &devices_config()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_loop_exits_promptly_when_shutdown_is_already_requested() {
        let gateway = MockGateway::new(vec![thermostat_device(), plug_device()]);
        let engine = WatchdogEngine::new(
            gateway.clone(),
            WatchdogConfig::default(),
            thermostat_device(),
            "Stove Plug".to_string(),
        );
        let snapshot = Arc::new(Mutex::new(engine.snapshot()));

        watch_loop(engine, snapshot, None, std::future::ready(())).await;

        assert!(gateway.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_a_run_stops_after_the_current_tick() {
        let gateway = MockGateway::new(vec![thermostat_device(), plug_device()]);
        gateway.0.statuses.lock().unwrap().push_back(ThermostatStatus {
            working_state: "idle".to_string(),
            temperature: 70.0,
            heat_setpoint: 72.0,
        });
        let engine = WatchdogEngine::new(
            gateway.clone(),
            WatchdogConfig::default(),
            thermostat_device(),
            "Stove Plug".to_string(),
        );
        let snapshot = Arc::new(Mutex::new(engine.snapshot()));

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(watch_loop(engine, snapshot.clone(), None, async {
            let _ = rx.await;
        }));

        // Let the first tick complete before requesting shutdown.
        for _ in 0..50 {
            if snapshot.lock().await.samples == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(snapshot.lock().await.samples, 1);

        tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(snapshot.lock().await.state, "MONITORING");
    }
}

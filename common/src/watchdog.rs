use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::config::WatchdogConfig;
use crate::gateway::{DeviceGateway, GatewayError};
use crate::history::TempHistory;
use crate::trend;
use crate::types::{Device, ProductType, WatchdogSnapshot, WatchdogState, WORKING_STATE_HEATING};

/// Supervises one thermostat/plug pair: watches the reported working state
/// and temperature trend, and power-cycles the plug when the stove claims to
/// be heating while the room keeps cooling.
///
/// The engine is the single writer of all of its state; the daemon owns it
/// inside one task and drives `tick` at a fixed interval. Observers only ever
/// see cloned [`WatchdogSnapshot`]s.
pub struct WatchdogEngine<G> {
    gateway: G,
    pub config: WatchdogConfig,
    thermostat: Device,
    plug_name: String,

    state: WatchdogState,
    cycle_count: u32,
    history: TempHistory,
    ignition_started_at: Option<Instant>,
    last_cycle_at: Option<Instant>,
    last_working_state: Option<String>,
}

impl<G: DeviceGateway> WatchdogEngine<G> {
    pub fn new(gateway: G, config: WatchdogConfig, thermostat: Device, plug_name: String) -> Self {
        Self {
            gateway,
            config,
            thermostat,
            plug_name,
            state: WatchdogState::Monitoring,
            cycle_count: 0,
            history: TempHistory::new(),
            ignition_started_at: None,
            last_cycle_at: None,
            last_working_state: None,
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// One pass through the handler for the current state. A gateway failure
    /// aborts the pass with state and counters untouched; the next scheduled
    /// tick retries from scratch.
    pub async fn tick(&mut self) {
        let result = match self.state {
            WatchdogState::Monitoring => self.tick_monitoring().await,
            WatchdogState::WaitingForIgnition => {
                self.tick_waiting_for_ignition();
                Ok(())
            }
            WatchdogState::WaitingAfterCycle => {
                self.tick_waiting_after_cycle();
                Ok(())
            }
            WatchdogState::Failed => self.tick_failed().await,
        };

        if let Err(err) = result {
            warn!("tick aborted, retrying next interval: {err}");
        }
    }

    async fn tick_monitoring(&mut self) -> Result<(), GatewayError> {
        let status = self.gateway.thermostat_status(&self.thermostat).await?;
        let is_heating = status.is_heating();
        let was_heating = self
            .last_working_state
            .as_deref()
            .is_some_and(|state| state == WORKING_STATE_HEATING);
        self.last_working_state = Some(status.working_state.clone());

        if is_heating && !was_heating {
            info!(
                "ignition started, holding off trend checks for {}s",
                self.config.cycle_wait_ms / 1000
            );
            self.ignition_started_at = Some(Instant::now());
            self.history.clear();
            self.state = WatchdogState::WaitingForIgnition;
            return Ok(());
        }

        self.history
            .record(status.temperature, status.heat_setpoint, Instant::now());

        let temp_diff = status.heat_setpoint - status.temperature;
        let below_threshold = temp_diff >= self.config.temp_threshold;
        let declining = trend::ignition_decline(&self.history);

        if self.cycle_count > 0 && (!is_heating || !below_threshold) {
            info!(
                "heating recovered, resetting cycle counter (was {})",
                self.cycle_count
            );
            self.cycle_count = 0;
        }

        if is_heating && below_threshold && declining {
            if self.cycle_count >= self.config.max_cycles {
                error!(
                    "temperature still declining after {} power cycles, \
                     giving up until the stove recovers or gets attention",
                    self.cycle_count
                );
                self.state = WatchdogState::Failed;
                return Ok(());
            }

            warn!(
                "stove reports heating but temperature dropped to {:.1} \
                 ({:.1} below setpoint), power-cycling",
                status.temperature, temp_diff
            );
            if self.power_cycle().await {
                self.cycle_count += 1;
                self.last_cycle_at = Some(Instant::now());
                self.state = WatchdogState::WaitingAfterCycle;
            }
        }

        Ok(())
    }

    fn tick_waiting_for_ignition(&mut self) {
        if !timer_expired(self.ignition_started_at, self.config.cycle_wait_ms) {
            return;
        }
        info!("ignition grace period over, monitoring resumed");
        self.history.clear();
        self.state = WatchdogState::Monitoring;
    }

    fn tick_waiting_after_cycle(&mut self) {
        if !timer_expired(self.last_cycle_at, self.config.cycle_wait_ms) {
            return;
        }
        info!("post-cycle grace period over, monitoring resumed");
        self.history.clear();
        self.state = WatchdogState::Monitoring;
    }

    /// Terminal until the underlying condition clears: keep reading the
    /// thermostat so a refilled or serviced stove brings us back without a
    /// restart, but never cycle the plug again from here.
    async fn tick_failed(&mut self) -> Result<(), GatewayError> {
        let status = self.gateway.thermostat_status(&self.thermostat).await?;
        self.last_working_state = Some(status.working_state.clone());

        let temp_diff = status.heat_setpoint - status.temperature;
        let below_threshold = temp_diff >= self.config.temp_threshold;
        if !status.is_heating() || !below_threshold {
            info!(
                "stove recovered (workingState={:?}, temperature={:.1}), monitoring resumed",
                status.working_state, status.temperature
            );
            self.cycle_count = 0;
            self.history.clear();
            self.state = WatchdogState::Monitoring;
        }

        Ok(())
    }

    /// Off, wait, on, verify. Success means the plug was confirmed back ON,
    /// not merely that the commands were accepted. An ON failure after OFF
    /// succeeded leaves the stove unpowered, hence the error-level logging.
    async fn power_cycle(&mut self) -> bool {
        let plug = match self.resolve_plug().await {
            Ok(plug) => plug,
            Err(err) => {
                warn!("power cycle aborted, could not resolve plug: {err}");
                return false;
            }
        };

        match self.gateway.plug_off(&plug).await {
            Ok(true) => info!("plug {:?} switched off", plug.nickname),
            Ok(false) => {
                warn!(
                    "plug {:?} did not confirm OFF, power cycle aborted",
                    plug.nickname
                );
                return false;
            }
            Err(err) => {
                warn!("plug OFF command failed: {err}");
                return false;
            }
        }

        // The stove's controller needs a few seconds without power to reset.
        sleep(Duration::from_millis(self.config.power_off_duration_ms)).await;

        match self.gateway.plug_on(&plug).await {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    "plug {:?} did not confirm ON after OFF succeeded, \
                     the stove may be left without power",
                    plug.nickname
                );
                return false;
            }
            Err(err) => {
                error!(
                    "plug ON command failed after OFF succeeded, \
                     the stove may be left without power: {err}"
                );
                return false;
            }
        }

        match self.gateway.is_plug_on(&plug).await {
            Ok(true) => {
                info!("power cycle complete, plug {:?} confirmed on", plug.nickname);
                true
            }
            Ok(false) => {
                error!(
                    "plug {:?} reports OFF after power cycle, \
                     the stove may be left without power",
                    plug.nickname
                );
                false
            }
            Err(err) => {
                error!("could not verify plug state after power cycle: {err}");
                false
            }
        }
    }

    async fn resolve_plug(&self) -> Result<Device, GatewayError> {
        let devices = self.gateway.list_devices().await?;
        devices
            .into_iter()
            .find(|device| {
                device.product_type == ProductType::Plug && device.nickname == self.plug_name
            })
            .ok_or_else(|| GatewayError::DeviceNotFound(self.plug_name.clone()))
    }

    pub fn snapshot(&self) -> WatchdogSnapshot {
        WatchdogSnapshot {
            state: self.state.as_str(),
            cycle_count: self.cycle_count,
            max_cycles: self.config.max_cycles,
            samples: self.history.len(),
            current_temp: self.history.latest().map(|sample| sample.temperature),
            current_setpoint: self.history.latest().map(|sample| sample.setpoint),
            wait_remaining_ms: self.wait_remaining_ms(),
            thermostat: self.thermostat.nickname.clone(),
            plug: self.plug_name.clone(),
        }
    }

    fn wait_remaining_ms(&self) -> u64 {
        let armed_at = match self.state {
            WatchdogState::WaitingForIgnition => self.ignition_started_at,
            WatchdogState::WaitingAfterCycle => self.last_cycle_at,
            _ => None,
        };
        match armed_at {
            Some(at) => Duration::from_millis(self.config.cycle_wait_ms)
                .saturating_sub(at.elapsed())
                .as_millis() as u64,
            None => 0,
        }
    }
}

fn timer_expired(armed_at: Option<Instant>, wait_ms: u64) -> bool {
    match armed_at {
        Some(at) => at.elapsed() >= Duration::from_millis(wait_ms),
        // An unarmed timer in a waiting state should not wedge the engine.
        None => true,
    }
}

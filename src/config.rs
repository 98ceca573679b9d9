//! Bridge configuration
//!
//! Everything the Follower needs at start-up: the DHW toggle announced on
//! Data-ID 3, the reply delay, the CH report interval, the initial status
//! flags and the fallback value of every override.

use std::time::Duration;

use crate::encoding::{status_bits, StatusVector};
use crate::error::{BridgeError, Result};
use crate::protocol::{FollowerState, OverrideCache, OverrideKey};
use crate::timing::TimingGate;

/// Status flags the Follower starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InitialStatus {
    /// Fault indication
    pub fault: bool,
    /// CH mode
    pub ch_mode: bool,
    /// Flame on
    pub flame: bool,
}

impl InitialStatus {
    /// Follower status vector with these flags
    pub fn to_status(&self) -> StatusVector {
        use status_bits::follower::{CH_MODE, FAULT, FLAME};

        let mut status = StatusVector::new();
        status.set(FAULT, self.fault);
        status.set(CH_MODE, self.ch_mode);
        status.set(FLAME, self.flame);
        status
    }
}

/// Fallback value of each override until a command replaces it
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OverrideDefaults {
    /// Control setpoint (°C)
    pub control_ch_setpoint: f64,
    /// Maximum relative modulation (%)
    pub max_rel_modulation: f64,
    /// Maximum CH water setpoint (°C)
    pub max_ch_water_setpoint: f64,
    /// DHW setpoint (°C)
    pub dhw_setpoint: f64,
    /// CH water pressure (bar)
    pub water_pressure_ch: f64,
    /// Outside temperature (°C)
    pub outside_temperature: f64,
    /// Boiler flow temperature (°C)
    pub heater_flow_temperature: f64,
    /// Return water temperature (°C)
    pub return_water_temperature: f64,
    /// DHW flow rate (l/min)
    pub water_flow_dhw: f64,
    /// DHW temperature (°C)
    pub dhw_temperature: f64,
}

impl Default for OverrideDefaults {
    fn default() -> Self {
        OverrideDefaults {
            control_ch_setpoint: 75.0,
            max_rel_modulation: 100.0,
            max_ch_water_setpoint: 85.0,
            dhw_setpoint: 0.0,
            water_pressure_ch: 0.0,
            outside_temperature: 0.0,
            heater_flow_temperature: 0.0,
            return_water_temperature: 0.0,
            water_flow_dhw: 0.0,
            dhw_temperature: 0.0,
        }
    }
}

impl OverrideDefaults {
    /// Default for a single key
    pub fn get(&self, key: OverrideKey) -> f64 {
        match key {
            OverrideKey::ControlChSetpoint => self.control_ch_setpoint,
            OverrideKey::MaxRelModulation => self.max_rel_modulation,
            OverrideKey::MaxChWaterSetpoint => self.max_ch_water_setpoint,
            OverrideKey::DhwSetpoint => self.dhw_setpoint,
            OverrideKey::WaterPressureCh => self.water_pressure_ch,
            OverrideKey::OutsideTemperature => self.outside_temperature,
            OverrideKey::HeaterFlowTemperature => self.heater_flow_temperature,
            OverrideKey::ReturnWaterTemperature => self.return_water_temperature,
            OverrideKey::WaterFlowDhw => self.water_flow_dhw,
            OverrideKey::DhwTemperature => self.dhw_temperature,
        }
    }

    /// Seed an override cache with these values
    pub fn to_cache(&self) -> OverrideCache {
        OverrideKey::ALL
            .into_iter()
            .fold(OverrideCache::new(), |cache, key| cache.with(key, self.get(key)))
    }
}

/// Configuration of the Follower bridge
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BridgeConfig {
    /// Announce a DHW circuit on Data-ID 3
    pub dhw_present: bool,
    /// Minimum delay before a reply is transmitted (milliseconds, 20-800)
    pub reply_delay_ms: u64,
    /// Republish the CH-requested flag at least this often (seconds)
    pub ch_report_interval_secs: u64,
    /// Follower status flags at start-up
    pub initial_status: InitialStatus,
    /// Fallback override values
    pub defaults: OverrideDefaults,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            dhw_present: false,
            reply_delay_ms: TimingGate::DEFAULT_DELAY.as_millis() as u64,
            ch_report_interval_secs: 60,
            initial_status: InitialStatus::default(),
            defaults: OverrideDefaults::default(),
        }
    }
}

impl BridgeConfig {
    /// Set the DHW-present toggle
    pub fn with_dhw_present(mut self, dhw_present: bool) -> Self {
        self.dhw_present = dhw_present;
        self
    }

    /// Set the reply delay
    pub fn with_reply_delay_ms(mut self, reply_delay_ms: u64) -> Self {
        self.reply_delay_ms = reply_delay_ms;
        self
    }

    /// Set the CH report interval
    pub fn with_ch_report_interval_secs(mut self, secs: u64) -> Self {
        self.ch_report_interval_secs = secs;
        self
    }

    /// Set the initial status flags
    pub fn with_initial_status(mut self, initial_status: InitialStatus) -> Self {
        self.initial_status = initial_status;
        self
    }

    /// Set the override fallbacks
    pub fn with_defaults(mut self, defaults: OverrideDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Reply delay as a duration
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    /// CH report interval as a duration
    pub fn ch_report_interval(&self) -> Duration {
        Duration::from_secs(self.ch_report_interval_secs)
    }

    /// Follower state seeded from this configuration
    pub fn initial_state(&self) -> FollowerState {
        FollowerState::new(self.initial_status.to_status(), self.defaults.to_cache())
    }

    /// Check the configuration against protocol limits
    pub fn validate(&self) -> Result<()> {
        let delay = self.reply_delay();
        if delay < TimingGate::MIN_DELAY || delay > TimingGate::MAX_DELAY {
            return Err(BridgeError::invalid_config(format!(
                "reply delay {}ms outside [{}, {}]ms",
                self.reply_delay_ms,
                TimingGate::MIN_DELAY.as_millis(),
                TimingGate::MAX_DELAY.as_millis()
            )));
        }

        if let Some(key) = OverrideKey::ALL
            .into_iter()
            .find(|&key| !self.defaults.get(key).is_finite())
        {
            return Err(BridgeError::invalid_config(format!(
                "default for {} is not a finite number",
                key
            )));
        }

        Ok(())
    }

    /// Load and validate a JSON configuration; missing fields take defaults
    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

//! Follower-side state shared across requests
//!
//! The Dispatcher owns one [`FollowerState`]. Command ingestion mutates it
//! between requests; every write replaces a whole value, so a reader never
//! observes a partial update.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::encoding::{status_bits, StatusVector};

/// Operator or sensor value that can override a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverrideKey {
    /// Control setpoint for the CH water
    ControlChSetpoint,
    /// Maximum relative modulation level
    MaxRelModulation,
    /// Maximum CH water setpoint
    MaxChWaterSetpoint,
    /// DHW setpoint
    DhwSetpoint,
    /// CH water pressure
    WaterPressureCh,
    /// Outside temperature
    OutsideTemperature,
    /// Boiler flow temperature
    HeaterFlowTemperature,
    /// Return water temperature
    ReturnWaterTemperature,
    /// DHW flow rate
    WaterFlowDhw,
    /// DHW temperature
    DhwTemperature,
}

impl OverrideKey {
    /// Every key, in storage order
    pub const ALL: [OverrideKey; 10] = [
        OverrideKey::ControlChSetpoint,
        OverrideKey::MaxRelModulation,
        OverrideKey::MaxChWaterSetpoint,
        OverrideKey::DhwSetpoint,
        OverrideKey::WaterPressureCh,
        OverrideKey::OutsideTemperature,
        OverrideKey::HeaterFlowTemperature,
        OverrideKey::ReturnWaterTemperature,
        OverrideKey::WaterFlowDhw,
        OverrideKey::DhwTemperature,
    ];

    fn index(&self) -> usize {
        *self as usize
    }

    /// Name used on the command channel
    pub fn name(&self) -> &'static str {
        match self {
            OverrideKey::ControlChSetpoint => "control_ch_setpoint",
            OverrideKey::MaxRelModulation => "max_rel_modulation",
            OverrideKey::MaxChWaterSetpoint => "max_ch_water_setpoint",
            OverrideKey::DhwSetpoint => "dhw_setpoint",
            OverrideKey::WaterPressureCh => "water_pressure_ch",
            OverrideKey::OutsideTemperature => "outside_temperature",
            OverrideKey::HeaterFlowTemperature => "heater_flow_temperature",
            OverrideKey::ReturnWaterTemperature => "return_water_temperature",
            OverrideKey::WaterFlowDhw => "water_flow_dhw",
            OverrideKey::DhwTemperature => "dhw_temperature",
        }
    }

    /// Look a key up by its command-channel name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

impl std::fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Last-write-wins store of override values
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverrideCache {
    values: [f64; 10],
}

impl OverrideCache {
    /// Cache with every value at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `key`
    pub fn get(&self, key: OverrideKey) -> f64 {
        self.values[key.index()]
    }

    /// Replace the value for `key`
    pub fn set(&mut self, key: OverrideKey, value: f64) {
        let slot = &mut self.values[key.index()];
        if *slot != value {
            debug!(key = key.name(), from = *slot, to = value, "override updated");
        }
        *slot = value;
    }

    /// Builder-style `set`
    pub fn with(mut self, key: OverrideKey, value: f64) -> Self {
        self.set(key, value);
        self
    }
}

/// Process-wide Follower state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FollowerState {
    /// Follower status flags reported on Data-ID 0
    pub follower_status: StatusVector,
    /// Operator and sensor overrides
    pub overrides: OverrideCache,
}

impl FollowerState {
    /// Create a new state
    pub fn new(follower_status: StatusVector, overrides: OverrideCache) -> Self {
        FollowerState {
            follower_status,
            overrides,
        }
    }

    /// Set the fault indication
    pub fn set_fault(&mut self, fault: bool) {
        self.follower_status.set(status_bits::follower::FAULT, fault);
    }

    /// Set the CH mode flag
    pub fn set_ch_mode(&mut self, active: bool) {
        self.follower_status.set(status_bits::follower::CH_MODE, active);
    }

    /// Set the flame status
    pub fn set_flame(&mut self, on: bool) {
        self.follower_status.set(status_bits::follower::FLAME, on);
    }

    /// Read an override value
    pub fn override_value(&self, key: OverrideKey) -> f64 {
        self.overrides.get(key)
    }

    /// Replace an override value
    pub fn set_override(&mut self, key: OverrideKey, value: f64) {
        self.overrides.set(key, value);
    }
}

/// Decides when the Leader's CH-enable flag is republished
///
/// A report goes out whenever the flag changes, and otherwise once per
/// interval.
#[derive(Debug)]
pub struct ChRequestReporter {
    interval: Duration,
    last_reported: bool,
    last_report_at: Option<Instant>,
}

impl ChRequestReporter {
    /// Create a reporter; the flag starts as "not requested"
    pub fn new(interval: Duration) -> Self {
        ChRequestReporter {
            interval,
            last_reported: false,
            last_report_at: None,
        }
    }

    /// Returns the value to publish, if a report is due at `now`
    pub fn poll(&mut self, ch_enabled: bool, now: Instant) -> Option<bool> {
        let changed = ch_enabled != self.last_reported;
        let stale = match self.last_report_at {
            Some(at) => now.saturating_duration_since(at) > self.interval,
            None => false,
        };

        if changed || stale {
            self.last_reported = ch_enabled;
            self.last_report_at = Some(now);
            Some(ch_enabled)
        } else {
            if self.last_report_at.is_none() {
                self.last_report_at = Some(now);
            }
            None
        }
    }

    /// Last published value
    pub fn last_reported(&self) -> bool {
        self.last_reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_cache_last_write_wins() {
        let mut cache = OverrideCache::new();
        assert_eq!(cache.get(OverrideKey::DhwSetpoint), 0.0);

        cache.set(OverrideKey::DhwSetpoint, 55.0);
        cache.set(OverrideKey::DhwSetpoint, 60.0);
        assert_eq!(cache.get(OverrideKey::DhwSetpoint), 60.0);
        assert_eq!(cache.get(OverrideKey::ControlChSetpoint), 0.0);
    }

    #[test]
    fn test_override_key_names() {
        for key in OverrideKey::ALL {
            assert_eq!(OverrideKey::from_name(key.name()), Some(key));
        }
        assert_eq!(OverrideKey::from_name("pump_speed"), None);
    }

    #[test]
    fn test_follower_state_flags() {
        let mut state = FollowerState::default();
        state.set_fault(true);
        state.set_ch_mode(true);
        state.set_flame(true);
        assert_eq!(state.follower_status.as_bits(), [0, 0, 0, 1, 0, 0, 1, 1]);

        state.set_fault(false);
        assert!(!state.follower_status.get(status_bits::follower::FAULT));
    }

    #[test]
    fn test_ch_reporter_change_driven() {
        let start = Instant::now();
        let mut reporter = ChRequestReporter::new(Duration::from_secs(60));

        assert_eq!(reporter.poll(false, start), None);
        assert_eq!(reporter.poll(true, start), Some(true));
        assert_eq!(reporter.poll(true, start + Duration::from_secs(1)), None);
        assert_eq!(reporter.poll(false, start + Duration::from_secs(2)), Some(false));
        assert!(!reporter.last_reported());
    }

    #[test]
    fn test_ch_reporter_periodic() {
        let start = Instant::now();
        let mut reporter = ChRequestReporter::new(Duration::from_secs(60));

        assert_eq!(reporter.poll(false, start), None);
        assert_eq!(reporter.poll(false, start + Duration::from_secs(30)), None);
        assert_eq!(reporter.poll(false, start + Duration::from_secs(61)), Some(false));
        assert_eq!(reporter.poll(false, start + Duration::from_secs(62)), None);
    }
}

//! Operator command ingestion
//!
//! Commands arrive from the telemetry broker as a topic plus a text payload:
//!
//! - `status/fault`, `status/ch_mode`, `status/flame`: `"0"` or `"1"`
//! - `command/<setpoint>`: decimal value for one of the operator setpoints
//! - `sensors/<reading>`: decimal value for one of the externally measured readings
//!
//! Parsing is separate from applying so the transport glue can log and drop
//! bad messages without touching the Follower state.

use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::protocol::{FollowerState, OverrideKey};

/// Topics the Follower listens on
pub const TOPICS: [&str; 13] = [
    "status/fault",
    "status/ch_mode",
    "status/flame",
    "command/max_rel_modulation",
    "command/control_ch_setpoint",
    "command/max_ch_water_setpoint",
    "command/dhw_setpoint",
    "sensors/water_pressure_ch",
    "sensors/outside_temperature",
    "sensors/heater_flow_temperature",
    "sensors/return_water_temperature",
    "sensors/water_flow_dhw",
    "sensors/dhw_temperature",
];

/// A parsed operator command
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Set or clear the fault indication
    SetFault(bool),
    /// Set or clear CH mode
    SetChMode(bool),
    /// Set or clear the flame status
    SetFlame(bool),
    /// Replace an override value
    SetOverride {
        /// Which override
        key: OverrideKey,
        /// New value
        value: f64,
    },
}

impl Command {
    /// Parse a command from its topic and payload
    pub fn parse(topic: &str, payload: &str) -> Result<Self> {
        let (group, name) = topic
            .split_once('/')
            .ok_or_else(|| BridgeError::unknown_topic(topic))?;

        match (group, name) {
            ("status", "fault") => Ok(Command::SetFault(parse_flag(topic, payload)?)),
            ("status", "ch_mode") => Ok(Command::SetChMode(parse_flag(topic, payload)?)),
            ("status", "flame") => Ok(Command::SetFlame(parse_flag(topic, payload)?)),
            ("command", _) | ("sensors", _) => {
                let key = OverrideKey::from_name(name)
                    .filter(|key| is_command_key(*key) == (group == "command"))
                    .ok_or_else(|| BridgeError::unknown_topic(topic))?;
                let mut value = parse_number(topic, payload)?;
                // Whole degrees only
                if key == OverrideKey::DhwSetpoint {
                    value = value.trunc();
                }
                Ok(Command::SetOverride { key, value })
            }
            _ => Err(BridgeError::unknown_topic(topic)),
        }
    }

    /// Apply the command to the Follower state
    pub fn apply(&self, state: &mut FollowerState) {
        debug!(command = ?self, "applying command");
        match *self {
            Command::SetFault(fault) => state.set_fault(fault),
            Command::SetChMode(active) => state.set_ch_mode(active),
            Command::SetFlame(on) => state.set_flame(on),
            Command::SetOverride { key, value } => state.set_override(key, value),
        }
    }

    /// Topic this command is carried on
    pub fn topic(&self) -> String {
        match self {
            Command::SetFault(_) => "status/fault".to_string(),
            Command::SetChMode(_) => "status/ch_mode".to_string(),
            Command::SetFlame(_) => "status/flame".to_string(),
            Command::SetOverride { key, .. } if is_command_key(*key) => {
                format!("command/{}", key.name())
            }
            Command::SetOverride { key, .. } => format!("sensors/{}", key.name()),
        }
    }
}

/// Operator setpoints travel on `command/`, readings on `sensors/`
fn is_command_key(key: OverrideKey) -> bool {
    matches!(
        key,
        OverrideKey::ControlChSetpoint
            | OverrideKey::MaxRelModulation
            | OverrideKey::MaxChWaterSetpoint
            | OverrideKey::DhwSetpoint
    )
}

/// Only the first character counts, as on the wire
fn parse_flag(topic: &str, payload: &str) -> Result<bool> {
    match payload.chars().next() {
        Some('0') => Ok(false),
        Some('1') => Ok(true),
        _ => Err(BridgeError::invalid_payload(format!(
            "{}: expected 0 or 1, got {:?}",
            topic, payload
        ))),
    }
}

fn parse_number(topic: &str, payload: &str) -> Result<f64> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            BridgeError::invalid_payload(format!("{}: not a number: {:?}", topic, payload))
        })
}

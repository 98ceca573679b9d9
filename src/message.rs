//! Data-ID registry for the OpenTherm messages this Follower understands

use crate::core::AckKind;

/// How the 16-bit data value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    /// Two independent 8-bit flag vectors
    Flag8Pair,
    /// f8.8 fixed point
    F88,
    /// Unsigned byte (not supported by this Follower)
    U8,
    /// Unknown Data-ID, payload echoed untouched
    Unspecified,
}

/// Data direction from the Leader's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Leader reads the value from the Follower
    ReadOnly,
    /// Leader writes the value to the Follower
    WriteOnly,
}

/// Inclusive range of valid values
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueRange {
    /// Lowest valid value
    pub low: f64,
    /// Highest valid value
    pub high: f64,
}

impl ValueRange {
    /// Create a new range
    pub const fn new(low: f64, high: f64) -> Self {
        ValueRange { low, high }
    }

    /// Check whether `value` lies inside the range (bounds included)
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Whether negative values are valid
    pub fn is_signed(&self) -> bool {
        self.low < 0.0
    }
}

/// Static description of a Data-ID
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DataIdSpec {
    /// The Data-ID
    pub id: u8,
    /// Human readable description
    pub description: &'static str,
    /// Payload interpretation
    pub value_kind: ValueKind,
    /// Read or write
    pub direction: Direction,
    /// Valid range, if the value is checked
    pub range: Option<ValueRange>,
}

impl DataIdSpec {
    const fn new(
        id: u8,
        description: &'static str,
        value_kind: ValueKind,
        direction: Direction,
        range: Option<ValueRange>,
    ) -> Self {
        DataIdSpec {
            id,
            description,
            value_kind,
            direction,
            range,
        }
    }

    /// Whether this spec came from the registry rather than the fallback
    pub fn is_known(&self) -> bool {
        self.value_kind != ValueKind::Unspecified
    }

    /// Whether f8.8 values use two's complement
    pub fn is_signed(&self) -> bool {
        self.range.map_or(false, |range| range.is_signed())
    }

    /// Ack kind for a successful reply
    ///
    /// Read-only ids are acknowledged as reads; everything else, unknown ids
    /// included, is acknowledged as a write.
    pub fn ack_kind(&self) -> AckKind {
        match self.direction {
            Direction::ReadOnly => AckKind::ReadAck,
            Direction::WriteOnly => AckKind::WriteAck,
        }
    }

    /// Range check; a spec without a range accepts everything
    pub fn accepts(&self, value: f64) -> bool {
        self.range.map_or(true, |range| range.contains(value))
    }
}

/// Description used for ids missing from the registry
pub const NO_VALID_DESCRIPTION: &str = "No valid description";

use Direction::{ReadOnly as R, WriteOnly as W};
use ValueKind::{Flag8Pair, F88, U8};

const PERCENT: Option<ValueRange> = Some(ValueRange::new(0.0, 100.0));
const CONTROL_SETPOINT_RANGE: Option<ValueRange> = Some(ValueRange::new(0.0, 100.0));
const CH_PRESSURE_RANGE: Option<ValueRange> = Some(ValueRange::new(0.0, 5.0));
const DHW_FLOW_RATE_RANGE: Option<ValueRange> = Some(ValueRange::new(0.0, 16.0));
const TEMPERATURE: Option<ValueRange> = Some(ValueRange::new(-40.0, 127.0));
const SETPOINT: Option<ValueRange> = Some(ValueRange::new(0.0, 127.0));

static REGISTRY: [DataIdSpec; 16] = [
    DataIdSpec::new(0x00, "Status flags", Flag8Pair, R, None),
    DataIdSpec::new(
        0x01,
        "Control setpoint CH water temperature (C)",
        F88,
        W,
        CONTROL_SETPOINT_RANGE,
    ),
    DataIdSpec::new(0x03, "Follower config flags and MemberID code", Flag8Pair, R, None),
    DataIdSpec::new(0x05, "Application-specific and OEM fault flags", U8, R, None),
    DataIdSpec::new(0x0E, "Maximum relative modulation level setting (%)", F88, W, PERCENT),
    DataIdSpec::new(0x10, "Room setpoint (C)", F88, W, TEMPERATURE),
    DataIdSpec::new(0x11, "Relative modulation level (%)", F88, R, PERCENT),
    DataIdSpec::new(0x12, "Water pressure in CH circuit (bar)", F88, R, CH_PRESSURE_RANGE),
    DataIdSpec::new(
        0x13,
        "Water flow rate in DHW circuit (litres/minute)",
        F88,
        R,
        DHW_FLOW_RATE_RANGE,
    ),
    DataIdSpec::new(0x18, "Room temperature (C)", F88, W, TEMPERATURE),
    DataIdSpec::new(0x19, "Boiler flow water temperature (C)", F88, R, TEMPERATURE),
    DataIdSpec::new(0x1A, "DHW temperature (C)", F88, R, TEMPERATURE),
    DataIdSpec::new(0x1B, "Outside temperature (C)", F88, R, TEMPERATURE),
    DataIdSpec::new(0x1C, "Return water temperature (C)", F88, R, TEMPERATURE),
    DataIdSpec::new(0x38, "DHW setpoint (C)", F88, R, SETPOINT),
    DataIdSpec::new(0x39, "Maximum CH water setpoint (C)", F88, R, SETPOINT),
];

/// Well-known Data-IDs
pub mod data_id {
    /// Leader and Follower status flags
    pub const STATUS: u8 = 0x00;
    /// Control setpoint
    pub const CONTROL_SETPOINT: u8 = 0x01;
    /// Follower configuration announcement
    pub const FOLLOWER_CONFIG: u8 = 0x03;
    /// Application-specific fault flags
    pub const FAULT_FLAGS: u8 = 0x05;
    /// Maximum relative modulation level
    pub const MAX_REL_MODULATION: u8 = 0x0E;
    /// Room setpoint
    pub const ROOM_SETPOINT: u8 = 0x10;
    /// Relative modulation level
    pub const REL_MODULATION: u8 = 0x11;
    /// CH water pressure
    pub const CH_PRESSURE: u8 = 0x12;
    /// DHW flow rate
    pub const DHW_FLOW_RATE: u8 = 0x13;
    /// Room temperature
    pub const ROOM_TEMPERATURE: u8 = 0x18;
    /// Boiler flow water temperature
    pub const BOILER_TEMPERATURE: u8 = 0x19;
    /// DHW temperature
    pub const DHW_TEMPERATURE: u8 = 0x1A;
    /// Outside temperature
    pub const OUTSIDE_TEMPERATURE: u8 = 0x1B;
    /// Return water temperature
    pub const RETURN_TEMPERATURE: u8 = 0x1C;
    /// DHW setpoint
    pub const DHW_SETPOINT: u8 = 0x38;
    /// Maximum CH water setpoint
    pub const MAX_CH_SETPOINT: u8 = 0x39;
}

/// Static lookup over the known Data-IDs
pub struct MessageRegistry;

impl MessageRegistry {
    /// Look up a Data-ID; unknown ids get the fallback spec
    pub fn lookup(id: u8) -> DataIdSpec {
        REGISTRY
            .iter()
            .find(|spec| spec.id == id)
            .copied()
            .unwrap_or_else(|| Self::fallback(id))
    }

    /// Spec used for ids missing from the registry
    pub fn fallback(id: u8) -> DataIdSpec {
        DataIdSpec::new(
            id,
            NO_VALID_DESCRIPTION,
            ValueKind::Unspecified,
            Direction::WriteOnly,
            None,
        )
    }

    /// All registered specs
    pub fn all() -> &'static [DataIdSpec] {
        &REGISTRY
    }
}

//! Reply value resolution
//!
//! For most readable Data-IDs the Leader's value is meaningless: the
//! Follower answers with what the operator or the sensors last reported. The
//! boiler flow and return water temperatures prefer a live sensor reading
//! and fall back to the cached value while the sensor reads zero.

use tracing::debug;

use crate::message::{data_id, DataIdSpec};
use crate::protocol::{FollowerState, OverrideKey};
use crate::telemetry::{Channel, SensorSource};

/// A directly attached temperature sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveSensor {
    /// Boiler flow temperature probe
    BoilerFlow,
    /// Return water temperature probe
    ReturnWater,
}

impl LiveSensor {
    /// Current reading; 0.0 means absent
    pub fn read<S: SensorSource>(&self, sensors: &S) -> f64 {
        match self {
            LiveSensor::BoilerFlow => sensors.current_boiler_temp(),
            LiveSensor::ReturnWater => sensors.current_return_temp(),
        }
    }

    /// Channel the readout is published on
    pub fn channel(&self) -> Channel {
        match self {
            LiveSensor::BoilerFlow => Channel::BoilerTemp,
            LiveSensor::ReturnWater => Channel::ReturnTemp,
        }
    }
}

/// Where a Data-ID's reply value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideSource {
    /// Always the cached value
    Cache(OverrideKey),
    /// The live sensor when it reads non-zero, else the cached value
    LiveOrCache(LiveSensor, OverrideKey),
}

/// Which source produced the resolved value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// The Leader's own value, echoed
    Inbound,
    /// An override from the cache
    Cache(OverrideKey),
    /// A live sensor reading
    Live(LiveSensor),
}

/// Outcome of value resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Value to send back
    pub value: f64,
    /// Where it came from
    pub source: ValueSource,
    /// Live readout to publish, for the sensor-backed ids
    pub readout: Option<(Channel, f64)>,
}

/// Merges cached and live values into replies and checks their range
pub struct ValueOverridePolicy;

impl ValueOverridePolicy {
    /// Override source registered for a Data-ID
    pub fn source_for(id: u8) -> Option<OverrideSource> {
        use OverrideSource::{Cache, LiveOrCache};

        match id {
            data_id::CONTROL_SETPOINT => Some(Cache(OverrideKey::ControlChSetpoint)),
            data_id::MAX_REL_MODULATION => Some(Cache(OverrideKey::MaxRelModulation)),
            data_id::CH_PRESSURE => Some(Cache(OverrideKey::WaterPressureCh)),
            data_id::DHW_FLOW_RATE => Some(Cache(OverrideKey::WaterFlowDhw)),
            data_id::BOILER_TEMPERATURE => Some(LiveOrCache(
                LiveSensor::BoilerFlow,
                OverrideKey::HeaterFlowTemperature,
            )),
            data_id::DHW_TEMPERATURE => Some(Cache(OverrideKey::DhwTemperature)),
            data_id::OUTSIDE_TEMPERATURE => Some(Cache(OverrideKey::OutsideTemperature)),
            data_id::RETURN_TEMPERATURE => Some(LiveOrCache(
                LiveSensor::ReturnWater,
                OverrideKey::ReturnWaterTemperature,
            )),
            data_id::DHW_SETPOINT => Some(Cache(OverrideKey::DhwSetpoint)),
            data_id::MAX_CH_SETPOINT => Some(Cache(OverrideKey::MaxChWaterSetpoint)),
            _ => None,
        }
    }

    /// Resolve the reply value for `spec` given the Leader's `inbound` value
    pub fn resolve<S: SensorSource>(
        spec: &DataIdSpec,
        inbound: f64,
        state: &FollowerState,
        sensors: &S,
    ) -> Resolution {
        let resolution = match Self::source_for(spec.id) {
            None => Resolution {
                value: inbound,
                source: ValueSource::Inbound,
                readout: None,
            },
            Some(OverrideSource::Cache(key)) => Resolution {
                value: state.override_value(key),
                source: ValueSource::Cache(key),
                readout: None,
            },
            Some(OverrideSource::LiveOrCache(sensor, key)) => {
                let reading = sensor.read(sensors);
                let readout = Some((sensor.channel(), reading));
                if reading != 0.0 {
                    Resolution {
                        value: reading,
                        source: ValueSource::Live(sensor),
                        readout,
                    }
                } else {
                    Resolution {
                        value: state.override_value(key),
                        source: ValueSource::Cache(key),
                        readout,
                    }
                }
            }
        };

        if resolution.value != inbound {
            debug!(
                data_id = spec.id,
                from = inbound,
                to = resolution.value,
                source = ?resolution.source,
                "reply value overridden"
            );
        }
        resolution
    }

    /// Check the resolved value against the registered range
    pub fn validate(spec: &DataIdSpec, value: f64) -> bool {
        let valid = spec.accepts(value);
        if !valid {
            debug!(data_id = spec.id, value, range = ?spec.range, "value out of range");
        }
        valid
    }
}

//! Interfaces to the collaborators around the reply pipeline
//!
//! The transport adapter, telemetry broker and temperature sensors live
//! outside this crate. The Dispatcher talks to them only through these
//! traits.

/// Named telemetry channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    /// Request and reply log lines
    Thermostat,
    /// Relative modulation level requested by the Leader
    Modulation,
    /// CH enable flag requested by the Leader
    ChRequested,
    /// Live boiler flow temperature readout
    BoilerTemp,
    /// Live return water temperature readout
    ReturnTemp,
}

impl Channel {
    /// Topic string of the channel
    pub fn topic(&self) -> &'static str {
        match self {
            Channel::Thermostat => "thermostat",
            Channel::Modulation => "thermostat/modulation",
            Channel::ChRequested => "thermostat/ch_requested",
            Channel::BoilerTemp => "thermostat/boilertemp",
            Channel::ReturnTemp => "thermostat/returntemp",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.topic())
    }
}

/// Fire-and-forget telemetry sink
pub trait Publisher {
    /// Publish `text` on `channel`; delivery failures are the sink's concern
    fn publish(&mut self, channel: Channel, text: &str);
}

/// Live temperature readings; 0.0 means the sensor is unavailable
pub trait SensorSource {
    /// Current boiler flow temperature in °C
    fn current_boiler_temp(&self) -> f64;

    /// Current return water temperature in °C
    fn current_return_temp(&self) -> f64;
}

/// Transmit primitive of the transport adapter
pub trait Transmitter {
    /// Send a finished reply frame
    fn send_response(&mut self, frame: u32);
}

/// Outcome of the adapter's bit-level capture of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestStatus {
    /// Frame captured cleanly
    Success,
    /// Frame captured with a protocol error
    Invalid,
    /// Capture timed out
    Timeout,
    /// No status reported
    None,
}

/// Sensor readings held in memory, refreshed by an external poller
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StaticSensors {
    /// Boiler flow temperature in °C
    pub boiler_temp: f64,
    /// Return water temperature in °C
    pub return_temp: f64,
}

impl StaticSensors {
    /// Create with the given readings
    pub fn new(boiler_temp: f64, return_temp: f64) -> Self {
        StaticSensors {
            boiler_temp,
            return_temp,
        }
    }
}

impl SensorSource for StaticSensors {
    fn current_boiler_temp(&self) -> f64 {
        self.boiler_temp
    }

    fn current_return_temp(&self) -> f64 {
        self.return_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_topics() {
        assert_eq!(Channel::Thermostat.topic(), "thermostat");
        assert_eq!(Channel::ChRequested.to_string(), "thermostat/ch_requested");
        assert_eq!(Channel::BoilerTemp.topic(), "thermostat/boilertemp");
    }

    #[test]
    fn test_static_sensors() {
        let sensors = StaticSensors::new(55.5, 0.0);
        assert_eq!(sensors.current_boiler_temp(), 55.5);
        assert_eq!(sensors.current_return_temp(), 0.0);
    }
}

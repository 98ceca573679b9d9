//! # OpenTherm Follower
//!
//! The boiler side of an OpenTherm link. A room thermostat (the Leader)
//! sends one 32-bit request at a time; this crate decodes it, decides what
//! the boiler (the Follower) answers, and builds a protocol-conformant
//! reply frame within the OpenTherm response window.
//!
//! Reply values do not come from a real boiler. They come from an
//! [`OverrideCache`] fed by operator commands, and for the boiler flow and
//! return water temperatures from live sensors when those read non-zero.
//!
//! This library provides:
//!
//! - Hex and bit-field views of OpenTherm frames
//! - Flag-byte and f8.8 fixed-point codecs
//! - A Data-ID registry with value kinds, directions and valid ranges
//! - Reply parity bookkeeping and frame assembly
//! - A reply pipeline with a minimum-latency gate and telemetry hooks
//! - Operator command ingestion and configuration
//!
//! The electrical capture and transmission of frames, the telemetry broker
//! and the temperature sensors stay outside the crate, behind the
//! [`Transmitter`], [`Publisher`] and [`SensorSource`] traits.
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support and JSON configuration
//!
//! ## Example
//!
//! ```
//! use opentherm_follower::{
//!     Channel, DispatcherBuilder, Publisher, RequestStatus, StaticSensors, Transmitter,
//! };
//!
//! struct Log;
//!
//! impl Publisher for Log {
//!     fn publish(&mut self, channel: Channel, text: &str) {
//!         println!("{}: {}", channel, text);
//!     }
//! }
//!
//! struct Wire(Vec<u32>);
//!
//! impl Transmitter for Wire {
//!     fn send_response(&mut self, frame: u32) {
//!         self.0.push(frame);
//!     }
//! }
//!
//! let mut dispatcher =
//!     DispatcherBuilder::new().build(Log, StaticSensors::default(), Wire(Vec::new()))?;
//!
//! // READ-DATA for the DHW setpoint
//! let reply = dispatcher.handle_request(0x8038_0000, RequestStatus::Success);
//! assert_eq!(reply.frame.raw(), 0x4038_0000);
//! assert!(reply.frame.has_even_parity());
//! # Ok::<(), opentherm_follower::BridgeError>(())
//! ```

pub mod commands;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod encoding;
pub mod error;
pub mod message;
pub mod parity;
pub mod policy;
pub mod protocol;
pub mod response;
pub mod telemetry;
pub mod timing;

pub use crate::core::{AckKind, Frame, FrameCodec, HexFrame, MessageType};
pub use commands::Command;
pub use config::{BridgeConfig, InitialStatus, OverrideDefaults};
pub use dispatcher::{Dispatcher, DispatcherBuilder, RequestContext};
pub use encoding::{FixedPointCodec, FlagCodec, StatusVector};
pub use error::{BridgeError, Result};
pub use message::{DataIdSpec, MessageRegistry};
pub use policy::ValueOverridePolicy;
pub use protocol::{FollowerState, OverrideCache, OverrideKey};
pub use response::{Reply, ResponseBuilder};
pub use telemetry::{Channel, Publisher, RequestStatus, SensorSource, StaticSensors, Transmitter};
pub use timing::{Clock, SystemClock, TimingGate};

/// OpenTherm link constants
pub mod wire {
    /// Frame length in bits
    pub const FRAME_BITS: usize = 32;

    /// Frame length in hex digits
    pub const FRAME_HEX_DIGITS: usize = FRAME_BITS / 4;
}

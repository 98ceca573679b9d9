//! Per-request reply pipeline
//!
//! The transport adapter hands over one captured request at a time. The
//! [`Dispatcher`] runs it to completion:
//!
//! ```text
//! Classify -> Lookup -> Decode -> Override -> ValidateRange -> Encode
//!     -> Parity -> Assemble -> TimingGate -> PublishTelemetry -> Transmit
//! ```
//!
//! Every request reaches Transmit. The worst outcome is a well-formed
//! DATA-INVALID reply.

use std::time::Instant;

use tracing::{debug, instrument, trace, warn};

use crate::commands::Command;
use crate::config::BridgeConfig;
use crate::core::{AckKind, Frame, HexFrame, MessageType};
use crate::encoding::{status_bits, EncodedValue, FixedPointCodec, FlagCodec, StatusVector};
use crate::error::Result;
use crate::message::{data_id, DataIdSpec, MessageRegistry, ValueKind};
use crate::parity::ParityEngine;
use crate::policy::ValueOverridePolicy;
use crate::protocol::{ChRequestReporter, FollowerState};
use crate::response::{Reply, ResponseBuilder};
use crate::telemetry::{Channel, Publisher, RequestStatus, SensorSource, Transmitter};
use crate::timing::{Clock, SystemClock, TimingGate};

/// Scratch state of one request, dropped once the reply is sent
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request as received
    pub request: Frame,
    /// Hex digits of the request
    pub hex: HexFrame,
    /// Request kind from the first nibble
    pub request_type: MessageType,
    /// Registry entry of the Data-ID
    pub spec: DataIdSpec,
    /// When the request was captured
    pub received_at: Instant,
    /// Set bits recorded so far
    pub parity: ParityEngine,
    /// Reply under construction
    pub response: ResponseBuilder,
    /// Decoded high-byte flags and their parity contribution
    pub flags: Option<(StatusVector, u32)>,
    /// Value sent by the Leader
    pub inbound_value: f64,
    /// Value after overrides
    pub value: f64,
    /// Whether the reply passed validation
    pub valid: bool,
    /// Reply value rendered for telemetry
    pub value_text: String,
}

impl RequestContext {
    /// Classify the request and look up its Data-ID
    ///
    /// The ack nibble and the echoed Data-ID are entered in the parity
    /// ledger right away.
    pub fn new(request: u32, received_at: Instant) -> Self {
        let frame = Frame::new(request);
        let hex = frame.to_hex();
        let request_type = MessageType::classify(hex.nibble(0));
        let spec = MessageRegistry::lookup(frame.data_id());
        let ack = spec.ack_kind();

        let mut parity = ParityEngine::new();
        parity.add(ack.nibble().count_ones());
        parity.add_nibbles(&[hex.nibble(2), hex.nibble(3)]);

        RequestContext {
            request: frame,
            hex,
            request_type,
            spec,
            received_at,
            parity,
            response: ResponseBuilder::new(ack, spec.id),
            flags: None,
            inbound_value: 0.0,
            value: 0.0,
            valid: true,
            value_text: String::new(),
        }
    }

    /// Decode the request value according to the Data-ID's kind
    pub fn decode(&mut self) {
        match self.spec.value_kind {
            ValueKind::Flag8Pair => {
                let (flags, contribution) = FlagCodec::decode_flag_pair(&self.hex.slice(4, 6));
                self.parity.add(contribution);
                self.flags = Some((flags, contribution));
            }
            ValueKind::F88 => {
                let digits = self.hex.slice(4, 8);
                self.inbound_value = if self.spec.is_signed() {
                    FixedPointCodec::decode_signed(&digits)
                } else {
                    FixedPointCodec::decode(&digits)
                };
            }
            ValueKind::U8 | ValueKind::Unspecified => {
                self.inbound_value = f64::from(self.request.data_value());
            }
        }
        self.value = self.inbound_value;
        trace!(
            data_id = self.spec.id,
            kind = ?self.spec.value_kind,
            value = self.inbound_value,
            parity = self.parity.count(),
            "request decoded"
        );
    }

    /// Request value rendered for telemetry
    pub fn inbound_text(&self) -> String {
        match (self.spec.value_kind, self.flags) {
            (ValueKind::Flag8Pair, Some((flags, _))) => flags.to_string(),
            (ValueKind::F88, _) => format!("{:.2}", self.inbound_value),
            _ => self.hex.slice(4, 8),
        }
    }

    /// Request log line published on the main channel
    pub fn request_line(&self) -> String {
        format!(
            "T-{} {} {}: {}",
            self.hex,
            self.request_type,
            self.spec.description,
            self.inbound_text()
        )
    }

    /// Downgrade the reply to DATA-INVALID; the payload stays zero
    pub fn invalidate(&mut self) {
        let old = self.response.ack();
        self.parity.replace(
            old.nibble().count_ones(),
            AckKind::DataInvalid.nibble().count_ones(),
        );
        self.response = self.response.with_ack(AckKind::DataInvalid);
        self.valid = false;
    }

    /// Attach a payload and record all of its set bits
    fn set_payload(&mut self, payload: EncodedValue) {
        self.parity.add(payload.contribution);
        self.response = self.response.with_payload(payload);
    }
}

/// Runs the reply pipeline and owns the Follower state
pub struct Dispatcher<P, S, T, C = SystemClock> {
    config: BridgeConfig,
    state: FollowerState,
    leader_status: StatusVector,
    gate: TimingGate,
    ch_reporter: ChRequestReporter,
    publisher: P,
    sensors: S,
    transmitter: T,
    clock: C,
}

impl<P, S, T, C> Dispatcher<P, S, T, C>
where
    P: Publisher,
    S: SensorSource,
    T: Transmitter,
    C: Clock,
{
    /// Create a dispatcher; the configuration is taken as is, see
    /// [`DispatcherBuilder`] for a validating constructor
    pub fn new(config: BridgeConfig, publisher: P, sensors: S, transmitter: T, clock: C) -> Self {
        Dispatcher {
            state: config.initial_state(),
            leader_status: StatusVector::new(),
            gate: TimingGate::new(config.reply_delay()),
            ch_reporter: ChRequestReporter::new(config.ch_report_interval()),
            config,
            publisher,
            sensors,
            transmitter,
            clock,
        }
    }

    /// Handle a request captured just now
    pub fn handle_request(&mut self, request: u32, status: RequestStatus) -> Reply {
        let received_at = self.clock.now();
        self.handle_request_at(request, status, received_at)
    }

    /// Handle a request captured at `received_at`
    #[instrument(
        level = "debug",
        skip(self, request, received_at),
        fields(frame = %Frame::new(request))
    )]
    pub fn handle_request_at(
        &mut self,
        request: u32,
        status: RequestStatus,
        received_at: Instant,
    ) -> Reply {
        if status != RequestStatus::Success {
            warn!(?status, "adapter reported an unclean capture, replying anyway");
        }

        let mut ctx = RequestContext::new(request, received_at);
        if !ctx.request_type.is_request() {
            warn!(request_type = %ctx.request_type, "reply-type frame received as a request");
        }

        ctx.decode();
        if ctx.spec.id == data_id::STATUS {
            if let Some((flags, _)) = ctx.flags {
                self.leader_status = flags;
            }
        }
        self.publisher.publish(Channel::Thermostat, &ctx.request_line());

        self.resolve(&mut ctx);
        self.encode(&mut ctx);

        let frame = ctx.response.build(&ctx.parity);
        let latency = self.gate.wait(&self.clock, received_at);

        let reply = Reply {
            request: ctx.request,
            frame,
            ack: ctx.response.ack(),
            description: ctx.spec.description,
            value_text: ctx.value_text.clone(),
            latency,
        };
        self.publish_telemetry(&ctx, &reply);
        self.transmitter.send_response(frame.raw());

        debug!(
            reply = %reply.frame,
            ack = %reply.ack,
            latency_ms = latency.as_millis() as u64,
            "reply transmitted"
        );
        reply
    }

    /// Override and range check
    fn resolve(&mut self, ctx: &mut RequestContext) {
        match ctx.spec.value_kind {
            ValueKind::F88 => {
                let resolution = ValueOverridePolicy::resolve(
                    &ctx.spec,
                    ctx.inbound_value,
                    &self.state,
                    &self.sensors,
                );
                if let Some((channel, reading)) = resolution.readout {
                    self.publisher.publish(channel, &format!("{:.2}", reading));
                }
                ctx.value = resolution.value;

                if !ValueOverridePolicy::validate(&ctx.spec, ctx.value) {
                    ctx.invalidate();
                }
            }
            ValueKind::U8 => {
                debug!(data_id = ctx.spec.id, "u8 data-id not supported");
                ctx.invalidate();
            }
            ValueKind::Flag8Pair | ValueKind::Unspecified => {}
        }
    }

    fn encode(&self, ctx: &mut RequestContext) {
        match ctx.spec.value_kind {
            ValueKind::Flag8Pair => self.encode_flags(ctx),
            ValueKind::F88 if ctx.valid => {
                let payload = if ctx.spec.is_signed() {
                    FixedPointCodec::encode_signed(ctx.value)
                } else {
                    FixedPointCodec::encode(ctx.value)
                };
                ctx.set_payload(payload);
                ctx.value_text = format!("{:.2}", ctx.value);
            }
            // Zeroed payload
            ValueKind::F88 => ctx.value_text = format!("{:.2}", 0.0),
            ValueKind::U8 => ctx.value_text = "0000".to_string(),
            ValueKind::Unspecified => {
                ctx.set_payload(EncodedValue::from_raw(ctx.request.data_value()));
                ctx.value_text = ctx.hex.slice(4, 8);
            }
        }
    }

    fn encode_flags(&self, ctx: &mut RequestContext) {
        let (leader, decoded) = ctx.flags.unwrap_or_default();

        match ctx.spec.id {
            data_id::STATUS => {
                // Leader byte echoed (already counted), Follower code in the low byte
                let code = FlagCodec::follower_status_code(&self.state.follower_status);
                let follower = StatusVector::from_byte(code);
                let (_, follower_bits) = FlagCodec::encode_flag_pair(&follower);
                ctx.parity.add(follower_bits);
                ctx.response = ctx
                    .response
                    .with_payload(FlagCodec::encode_payload(&leader, &follower));
                ctx.value_text = format!("{} {}", leader, follower);
            }
            data_id::FOLLOWER_CONFIG => {
                ctx.parity.retract(decoded);
                let capabilities = FlagCodec::capability_flags(self.config.dhw_present);
                let member_id = StatusVector::new();
                ctx.set_payload(FlagCodec::encode_payload(&capabilities, &member_id));
                ctx.value_text = format!("{} {}", capabilities, member_id);
            }
            _ => {
                ctx.parity.retract(decoded);
                ctx.set_payload(EncodedValue::from_raw(ctx.request.data_value()));
                ctx.value_text = ctx.hex.slice(4, 8);
            }
        }
    }

    fn publish_telemetry(&mut self, ctx: &RequestContext, reply: &Reply) {
        self.publisher.publish(Channel::Thermostat, &reply.log_line());

        let ch_enabled = self.leader_status.get(status_bits::leader::CH_ENABLE);
        if let Some(requested) = self.ch_reporter.poll(ch_enabled, self.clock.now()) {
            self.publisher
                .publish(Channel::ChRequested, if requested { "1" } else { "0" });
        }

        if ctx.spec.id == data_id::REL_MODULATION {
            self.publisher.publish(Channel::Modulation, &ctx.value_text);
        }
    }

    /// Parse and apply an operator command
    pub fn apply_command(&mut self, topic: &str, payload: &str) -> Result<Command> {
        let command = Command::parse(topic, payload)?;
        command.apply(&mut self.state);
        Ok(command)
    }

    /// Current Follower state
    pub fn state(&self) -> &FollowerState {
        &self.state
    }

    /// Mutable access for writes arriving between requests
    pub fn state_mut(&mut self) -> &mut FollowerState {
        &mut self.state
    }

    /// Leader status flags from the most recent Data-ID 0 request
    pub fn leader_status(&self) -> StatusVector {
        self.leader_status
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The telemetry sink
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// The sensor source
    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    /// Mutable sensor source, for pollers that push readings in
    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    /// The transmitter
    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    /// The clock
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// Builder for a [`Dispatcher`]
pub struct DispatcherBuilder {
    config: BridgeConfig,
    state: Option<FollowerState>,
}

impl DispatcherBuilder {
    /// Create a new dispatcher builder with the default configuration
    pub fn new() -> Self {
        DispatcherBuilder {
            config: BridgeConfig::default(),
            state: None,
        }
    }

    /// Set the configuration
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from an existing state instead of the configured defaults
    pub fn with_state(mut self, state: FollowerState) -> Self {
        self.state = Some(state);
        self
    }

    /// Validate the configuration and build on the system clock
    pub fn build<P, S, T>(
        self,
        publisher: P,
        sensors: S,
        transmitter: T,
    ) -> Result<Dispatcher<P, S, T>>
    where
        P: Publisher,
        S: SensorSource,
        T: Transmitter,
    {
        self.build_with_clock(publisher, sensors, transmitter, SystemClock)
    }

    /// Validate the configuration and build on the given clock
    pub fn build_with_clock<P, S, T, C>(
        self,
        publisher: P,
        sensors: S,
        transmitter: T,
        clock: C,
    ) -> Result<Dispatcher<P, S, T, C>>
    where
        P: Publisher,
        S: SensorSource,
        T: Transmitter,
        C: Clock,
    {
        self.config.validate()?;
        let mut dispatcher = Dispatcher::new(self.config, publisher, sensors, transmitter, clock);
        if let Some(state) = self.state {
            dispatcher.state = state;
        }
        Ok(dispatcher)
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitialStatus;
    use crate::protocol::OverrideKey;
    use crate::telemetry::StaticSensors;
    use crate::timing::test_clock::ManualClock;
    use proptest::prelude::*;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingPublisher {
        messages: Vec<(Channel, String)>,
    }

    impl RecordingPublisher {
        fn on(&self, channel: Channel) -> Vec<&str> {
            self.messages
                .iter()
                .filter(|(c, _)| *c == channel)
                .map(|(_, text)| text.as_str())
                .collect()
        }
    }

    impl Publisher for RecordingPublisher {
        fn publish(&mut self, channel: Channel, text: &str) {
            self.messages.push((channel, text.to_string()));
        }
    }

    #[derive(Debug, Default)]
    struct RecordingTransmitter {
        frames: Vec<u32>,
    }

    impl Transmitter for RecordingTransmitter {
        fn send_response(&mut self, frame: u32) {
            self.frames.push(frame);
        }
    }

    type TestDispatcher =
        Dispatcher<RecordingPublisher, StaticSensors, RecordingTransmitter, ManualClock>;

    fn dispatcher(config: BridgeConfig) -> TestDispatcher {
        DispatcherBuilder::new()
            .with_config(config)
            .build_with_clock(
                RecordingPublisher::default(),
                StaticSensors::default(),
                RecordingTransmitter::default(),
                ManualClock::new(),
            )
            .unwrap()
    }

    /// A Leader request with correct parity
    fn request(kind: MessageType, id: u8, value: u16) -> u32 {
        let mut frame = Frame::new(0);
        frame.set_type_bits(kind.bits());
        frame.set_data_id(id);
        frame.set_data_value(value);
        let odd = frame.raw().count_ones() % 2 == 1;
        frame.set_parity(odd);
        frame.raw()
    }

    #[test]
    fn test_out_of_range_override_is_data_invalid() -> Result<()> {
        let mut d = dispatcher(BridgeConfig::default());
        d.apply_command("sensors/water_pressure_ch", "6.0")?;

        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::CH_PRESSURE, 0x0180),
            RequestStatus::Success,
        );

        assert_eq!(reply.ack, AckKind::DataInvalid);
        assert_eq!(reply.frame.to_hex().slice(4, 8), "0000");
        assert_eq!(reply.frame.data_id(), data_id::CH_PRESSURE);
        assert!(reply.frame.has_even_parity());
        Ok(())
    }

    #[test]
    fn test_in_range_override_replaces_value() -> Result<()> {
        let mut d = dispatcher(BridgeConfig::default());
        d.apply_command("sensors/water_pressure_ch", "1.5")?;

        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::CH_PRESSURE, 0),
            RequestStatus::Success,
        );
        assert_eq!(reply.ack, AckKind::ReadAck);
        assert_eq!(reply.frame.data_value(), 0x0180);
        assert_eq!(reply.value_text, "1.50");
        Ok(())
    }

    #[test]
    fn test_write_data_is_overridden_and_acked() {
        let mut d = dispatcher(BridgeConfig::default());

        // Leader asks for 40 °C; the configured 75 °C wins
        let reply = d.handle_request(
            request(MessageType::WriteData, data_id::CONTROL_SETPOINT, 0x2800),
            RequestStatus::Success,
        );
        assert_eq!(reply.frame.raw(), 0xD0014B00);
        assert_eq!(d.transmitter().frames, vec![0xD0014B00]);
    }

    #[test]
    fn test_boiler_temperature_precedence() {
        let mut d = dispatcher(BridgeConfig::default());
        d.state_mut()
            .set_override(OverrideKey::HeaterFlowTemperature, 40.0);

        d.sensors_mut().boiler_temp = 55.5;
        let live = d.handle_request(
            request(MessageType::ReadData, data_id::BOILER_TEMPERATURE, 0),
            RequestStatus::Success,
        );
        assert_eq!(live.frame.data_value(), 0x3780);

        d.sensors_mut().boiler_temp = 0.0;
        let cached = d.handle_request(
            request(MessageType::ReadData, data_id::BOILER_TEMPERATURE, 0),
            RequestStatus::Success,
        );
        assert_eq!(cached.frame.data_value(), 0x2800);

        assert_eq!(d.publisher().on(Channel::BoilerTemp), vec!["55.50", "0.00"]);
    }

    #[test]
    fn test_return_temperature_published() {
        let mut d = dispatcher(BridgeConfig::default());
        d.sensors_mut().return_temp = 30.25;

        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::RETURN_TEMPERATURE, 0),
            RequestStatus::Success,
        );
        assert_eq!(reply.frame.data_value(), 0x1E40);
        assert_eq!(d.publisher().on(Channel::ReturnTemp), vec!["30.25"]);
    }

    #[test]
    fn test_negative_outside_temperature() -> Result<()> {
        let mut d = dispatcher(BridgeConfig::default());
        d.apply_command("sensors/outside_temperature", "-5")?;

        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::OUTSIDE_TEMPERATURE, 0),
            RequestStatus::Success,
        );
        assert_eq!(reply.ack, AckKind::ReadAck);
        assert_eq!(reply.frame.data_value(), 0xFB00);
        assert!(reply.frame.has_even_parity());
        Ok(())
    }

    #[test]
    fn test_capability_announcement() {
        let mut with_dhw = dispatcher(BridgeConfig::default().with_dhw_present(true));
        let reply = with_dhw.handle_request(
            request(MessageType::ReadData, data_id::FOLLOWER_CONFIG, 0xFF00),
            RequestStatus::Success,
        );
        assert_eq!(reply.frame.raw(), 0xC0030300);

        let mut without_dhw = dispatcher(BridgeConfig::default());
        let reply = without_dhw.handle_request(
            request(MessageType::ReadData, data_id::FOLLOWER_CONFIG, 0xFF00),
            RequestStatus::Success,
        );
        assert_eq!(reply.frame.raw(), 0x40030200);
    }

    #[test]
    fn test_status_exchange() {
        let config = BridgeConfig::default().with_initial_status(InitialStatus {
            fault: false,
            ch_mode: true,
            flame: true,
        });
        let mut d = dispatcher(config);

        // CH and DHW enabled by the Leader
        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::STATUS, 0x0300),
            RequestStatus::Success,
        );
        assert_eq!(reply.frame.raw(), 0xC000030A);
        assert_eq!(reply.value_text, "00000011 00001010");
        assert!(d.leader_status().get(status_bits::leader::CH_ENABLE));

        d.state_mut().set_fault(true);
        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::STATUS, 0x0300),
            RequestStatus::Success,
        );
        assert_eq!(reply.frame.raw(), 0x40000301);
    }

    #[test]
    fn test_unknown_data_id_is_echoed() {
        let mut d = dispatcher(BridgeConfig::default());
        let reply = d.handle_request(
            request(MessageType::WriteData, 0x7F, 0x1234),
            RequestStatus::Success,
        );

        assert_eq!(reply.ack, AckKind::WriteAck);
        assert_eq!(reply.frame.data_id(), 0x7F);
        assert_eq!(reply.frame.data_value(), 0x1234);
        assert_eq!(reply.description, "No valid description");
        assert!(reply.frame.has_even_parity());
    }

    #[test]
    fn test_u8_data_id_is_data_invalid() {
        let mut d = dispatcher(BridgeConfig::default());
        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::FAULT_FLAGS, 0x0102),
            RequestStatus::Success,
        );
        assert_eq!(reply.ack, AckKind::DataInvalid);
        assert_eq!(reply.frame.data_value(), 0);
        assert!(reply.frame.has_even_parity());
    }

    #[test]
    fn test_modulation_published() {
        let mut d = dispatcher(BridgeConfig::default());
        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::REL_MODULATION, 0x3200),
            RequestStatus::Success,
        );
        assert_eq!(reply.frame.data_value(), 0x3200);
        assert_eq!(d.publisher().on(Channel::Modulation), vec!["50.00"]);
    }

    #[test]
    fn test_out_of_range_modulation_reports_zero() {
        let mut d = dispatcher(BridgeConfig::default());
        // 150 %
        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::REL_MODULATION, 0x9600),
            RequestStatus::Success,
        );

        assert_eq!(reply.ack, AckKind::DataInvalid);
        assert_eq!(reply.frame.data_value(), 0);
        assert_eq!(reply.value_text, "0.00");
        assert!(reply
            .log_line()
            .starts_with("B-60110000 DATA-INVALID Relative modulation level (%): 0.00 "));
        assert_eq!(d.publisher().on(Channel::Modulation), vec!["0.00"]);
    }

    #[test]
    fn test_log_lines() {
        let mut d = dispatcher(BridgeConfig::default());
        d.handle_request(
            request(MessageType::ReadData, data_id::REL_MODULATION, 0x3200),
            RequestStatus::Success,
        );

        let lines = d.publisher().on(Channel::Thermostat);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "T-80113200 READ-DATA Relative modulation level (%): 50.00");
        assert!(lines[1].starts_with("B-"));
        assert!(lines[1].ends_with("Replied after: 125ms."));
    }

    #[test]
    fn test_ch_requested_reporting() {
        let mut d = dispatcher(BridgeConfig::default());
        let status = |flags| request(MessageType::ReadData, data_id::STATUS, flags);

        d.handle_request(status(0x0100), RequestStatus::Success);
        d.handle_request(status(0x0100), RequestStatus::Success);
        d.handle_request(status(0x0000), RequestStatus::Success);
        assert_eq!(d.publisher().on(Channel::ChRequested), vec!["1", "0"]);

        // Unchanged flag is republished once the interval has passed
        d.clock().advance(Duration::from_secs(61));
        d.handle_request(status(0x0000), RequestStatus::Success);
        assert_eq!(d.publisher().on(Channel::ChRequested), vec!["1", "0", "0"]);
    }

    #[test]
    fn test_reply_waits_for_delay() {
        let mut d = dispatcher(BridgeConfig::default());
        let reply = d.handle_request(
            request(MessageType::ReadData, data_id::DHW_SETPOINT, 0),
            RequestStatus::Success,
        );
        assert_eq!(reply.latency, Duration::from_millis(125));
        assert_eq!(d.clock().sleeps(), vec![Duration::from_millis(125)]);
    }

    #[test]
    fn test_slow_request_sent_immediately() {
        let mut d = dispatcher(BridgeConfig::default());
        let received_at = d.clock().now();
        d.clock().advance(Duration::from_millis(200));

        let reply = d.handle_request_at(
            request(MessageType::ReadData, data_id::DHW_SETPOINT, 0),
            RequestStatus::Success,
            received_at,
        );
        assert_eq!(reply.latency, Duration::from_millis(200));
        assert!(d.clock().sleeps().is_empty());
    }

    #[test]
    fn test_unclean_capture_still_answered() {
        let mut d = dispatcher(BridgeConfig::default());
        for status in [RequestStatus::Invalid, RequestStatus::Timeout, RequestStatus::None] {
            d.handle_request(
                request(MessageType::ReadData, data_id::DHW_SETPOINT, 0),
                status,
            );
        }
        assert_eq!(d.transmitter().frames.len(), 3);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = DispatcherBuilder::new()
            .with_config(BridgeConfig::default().with_reply_delay_ms(5))
            .build_with_clock(
                RecordingPublisher::default(),
                StaticSensors::default(),
                RecordingTransmitter::default(),
                ManualClock::new(),
            );
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_with_state() {
        let mut state = FollowerState::default();
        state.set_override(OverrideKey::DhwSetpoint, 52.0);
        let d = DispatcherBuilder::new()
            .with_state(state.clone())
            .build(
                RecordingPublisher::default(),
                StaticSensors::default(),
                RecordingTransmitter::default(),
            )
            .unwrap();
        assert_eq!(d.state(), &state);
    }

    proptest! {
        #[test]
        fn prop_every_reply_has_even_parity(
            raw in any::<u32>(),
            boiler in -60.0f64..200.0,
            outside in -100.0f64..200.0,
            dhw_present in any::<bool>(),
            fault in any::<bool>(),
        ) {
            let mut d = dispatcher(BridgeConfig::default().with_dhw_present(dhw_present));
            d.sensors_mut().boiler_temp = boiler;
            d.state_mut().set_override(OverrideKey::OutsideTemperature, outside);
            d.state_mut().set_fault(fault);

            let reply = d.handle_request(raw, RequestStatus::Success);

            prop_assert!(reply.frame.has_even_parity());
            prop_assert_eq!(reply.frame.data_id(), Frame::new(raw).data_id());
            prop_assert_eq!(reply.frame.spare(), 0);
            prop_assert!(!reply.frame.message_type().is_request());
            prop_assert_eq!(&d.transmitter().frames, &vec![reply.frame.raw()]);
        }
    }
}

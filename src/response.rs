//! Reply frame assembly

use std::time::Duration;

use crate::core::{AckKind, Frame, HexFrame};
use crate::encoding::EncodedValue;
use crate::parity::ParityEngine;

/// Assembles the 8-nibble reply frame
///
/// Layout: `[ack + parity] [spare = 0] [Data-ID hi] [Data-ID lo] [value x4]`.
/// The Data-ID is echoed from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseBuilder {
    ack: AckKind,
    data_id: u8,
    payload: EncodedValue,
}

impl ResponseBuilder {
    /// Start a reply with an empty payload
    pub fn new(ack: AckKind, data_id: u8) -> Self {
        ResponseBuilder {
            ack,
            data_id,
            payload: EncodedValue::from_raw(0),
        }
    }

    /// Set the ack kind
    pub fn with_ack(mut self, ack: AckKind) -> Self {
        self.ack = ack;
        self
    }

    /// Set the 16-bit payload
    pub fn with_payload(mut self, payload: EncodedValue) -> Self {
        self.payload = payload;
        self
    }

    /// Ack kind of the reply
    pub fn ack(&self) -> AckKind {
        self.ack
    }

    /// Set bits of every field except the parity bit
    pub fn contribution(&self) -> u32 {
        self.ack.nibble().count_ones() + self.data_id.count_ones() + self.payload.contribution
    }

    /// Lay out the nibbles, taking the parity bit from `parity`
    pub fn assemble(&self, parity: &ParityEngine) -> HexFrame {
        debug_assert_eq!(
            parity.count(),
            self.contribution(),
            "parity ledger out of step with the reply fields"
        );

        let [v0, v1, v2, v3] = self.payload.nibbles();
        HexFrame::from_nibbles([
            parity.finalize(self.ack.nibble()),
            0x0,
            self.data_id >> 4,
            self.data_id & 0xF,
            v0,
            v1,
            v2,
            v3,
        ])
    }

    /// Assemble and convert to the frame handed to the transmitter
    pub fn build(&self, parity: &ParityEngine) -> Frame {
        Frame::new(self.assemble(parity).to_u32())
    }
}

/// Outcome of one pass through the reply pipeline
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Reply {
    /// Request as received
    pub request: Frame,
    /// Reply as transmitted
    pub frame: Frame,
    /// Ack kind of the reply
    pub ack: AckKind,
    /// Registry description of the Data-ID
    pub description: &'static str,
    /// Reply value rendered for telemetry
    pub value_text: String,
    /// Time between receipt and transmission
    pub latency: Duration,
}

impl Reply {
    /// Reply log line published on the main channel
    pub fn log_line(&self) -> String {
        format!(
            "B-{} {} {}: {} Replied after: {}ms.",
            self.frame.to_hex(),
            self.ack,
            self.description,
            self.value_text,
            self.latency.as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(builder: &ResponseBuilder) -> ParityEngine {
        let mut parity = ParityEngine::new();
        parity.add(builder.contribution());
        parity
    }

    #[test]
    fn test_assemble_layout() {
        let builder = ResponseBuilder::new(AckKind::ReadAck, 0x19)
            .with_payload(EncodedValue::from_raw(0x2800));
        let hex = builder.assemble(&ledger(&builder));

        // 4 + 0x19 + 0x2800: 1 + 3 + 2 set bits, even
        assert_eq!(hex.to_string(), "40192800");
        assert!(Frame::new(hex.to_u32()).has_even_parity());
    }

    #[test]
    fn test_odd_ledger_sets_parity() {
        let builder = ResponseBuilder::new(AckKind::WriteAck, 0x01)
            .with_payload(EncodedValue::from_raw(0x4B00));
        // 2 + 1 + 4 set bits
        let frame = builder.build(&ledger(&builder));
        assert_eq!(frame.raw(), 0xD0014B00);
        assert!(frame.has_even_parity());
    }

    #[test]
    fn test_ack_downgrade() {
        let builder = ResponseBuilder::new(AckKind::ReadAck, 0x12).with_ack(AckKind::DataInvalid);
        assert_eq!(builder.ack(), AckKind::DataInvalid);

        let hex = builder.assemble(&ledger(&builder));
        assert_eq!(hex.slice(4, 8), "0000");
        assert_eq!(hex.slice(0, 4), "6012");
    }

    #[test]
    fn test_reply_log_line() {
        let reply = Reply {
            request: Frame::new(0x00110000),
            frame: Frame::new(0xC0110000),
            ack: AckKind::ReadAck,
            description: "Relative modulation level (%)",
            value_text: "0.00".to_string(),
            latency: Duration::from_millis(125),
        };
        assert_eq!(
            reply.log_line(),
            "B-C0110000 READ-ACK Relative modulation level (%): 0.00 Replied after: 125ms."
        );
    }
}

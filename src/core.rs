//! Core frame types for the OpenTherm protocol

use bitfield::bitfield;

use crate::error::{BridgeError, Result};
use crate::wire::FRAME_HEX_DIGITS;

bitfield! {
    /// A single 32-bit OpenTherm frame
    ///
    /// Format:
    /// - Bit 31: parity bit (even parity over the whole frame)
    /// - Bits 30-28: message type
    /// - Bits 27-24: spare
    /// - Bits 23-16: Data-ID
    /// - Bits 15-0: data value
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Frame(u32);
    impl Debug;
    pub parity, set_parity: 31;
    pub u8, type_bits, set_type_bits: 30, 28;
    pub u8, spare, set_spare: 27, 24;
    pub u8, data_id, set_data_id: 23, 16;
    pub u16, data_value, set_data_value: 15, 0;
}

impl Frame {
    /// Wrap a raw frame value
    pub fn new(raw: u32) -> Self {
        Frame(raw)
    }

    /// Get the raw 32-bit value
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Message type carried in bits 30-28
    pub fn message_type(&self) -> MessageType {
        MessageType::from_bits(self.type_bits())
    }

    /// Check the protocol parity law: an even number of set bits
    pub fn has_even_parity(&self) -> bool {
        self.0.count_ones() % 2 == 0
    }

    /// Render as 8 upper-case hex digits
    pub fn to_hex(&self) -> HexFrame {
        FrameCodec::to_hex_nibbles(self.0)
    }
}

impl From<u32> for Frame {
    fn from(raw: u32) -> Self {
        Frame(raw)
    }
}

impl From<Frame> for u32 {
    fn from(frame: Frame) -> Self {
        frame.0
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Message type in an OpenTherm frame
///
/// Codes 0-3 are sent by the Leader, codes 4-7 by the Follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageType {
    /// Leader reads a value
    ReadData,
    /// Leader writes a value
    WriteData,
    /// Leader flags its own data as invalid
    InvalidData,
    /// Reserved request code
    Reserved,
    /// Follower acknowledges a read
    ReadAck,
    /// Follower acknowledges a write
    WriteAck,
    /// Follower rejects the data
    DataInvalid,
    /// Follower does not know the Data-ID
    UnknownDataId,
}

impl MessageType {
    /// Decode the 3 type bits (higher bits are ignored)
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            0 => MessageType::ReadData,
            1 => MessageType::WriteData,
            2 => MessageType::InvalidData,
            3 => MessageType::Reserved,
            4 => MessageType::ReadAck,
            5 => MessageType::WriteAck,
            6 => MessageType::DataInvalid,
            _ => MessageType::UnknownDataId,
        }
    }

    /// Classify the first nibble of a frame, ignoring the parity bit
    pub fn classify(nibble0: u8) -> Self {
        Self::from_bits(nibble0)
    }

    /// The 3-bit code of this message type
    pub fn bits(&self) -> u8 {
        match self {
            MessageType::ReadData => 0,
            MessageType::WriteData => 1,
            MessageType::InvalidData => 2,
            MessageType::Reserved => 3,
            MessageType::ReadAck => 4,
            MessageType::WriteAck => 5,
            MessageType::DataInvalid => 6,
            MessageType::UnknownDataId => 7,
        }
    }

    /// Whether a Leader would send this type
    pub fn is_request(&self) -> bool {
        self.bits() < 4
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::ReadData => write!(f, "READ-DATA"),
            MessageType::WriteData => write!(f, "WRITE-DATA"),
            MessageType::InvalidData => write!(f, "INVALID-DATA"),
            MessageType::Reserved => write!(f, "RESERVED"),
            MessageType::ReadAck => write!(f, "READ-ACK"),
            MessageType::WriteAck => write!(f, "WRITE-ACK"),
            MessageType::DataInvalid => write!(f, "DATA-INVALID"),
            MessageType::UnknownDataId => write!(f, "UNKNOWN-DATAID"),
        }
    }
}

/// Reply code chosen by the Follower
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AckKind {
    /// Read acknowledged
    ReadAck,
    /// Write acknowledged
    WriteAck,
    /// Data rejected
    DataInvalid,
    /// Data-ID not known
    UnknownDataId,
}

impl AckKind {
    /// Ack nibble before the parity bit is applied
    pub fn nibble(&self) -> u8 {
        self.message_type().bits()
    }

    /// The matching message type
    pub fn message_type(&self) -> MessageType {
        match self {
            AckKind::ReadAck => MessageType::ReadAck,
            AckKind::WriteAck => MessageType::WriteAck,
            AckKind::DataInvalid => MessageType::DataInvalid,
            AckKind::UnknownDataId => MessageType::UnknownDataId,
        }
    }
}

impl std::fmt::Display for AckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.message_type(), f)
    }
}

/// Render a nibble (0-15) as an upper-case hex digit
pub fn hex_digit(nibble: u8) -> char {
    match nibble & 0xF {
        n @ 0..=9 => (b'0' + n) as char,
        n => (b'A' + n - 10) as char,
    }
}

/// Value of a hex digit in either case
pub fn hex_value(c: char) -> Option<u8> {
    c.to_digit(16).map(|v| v as u8)
}

/// The 8-digit, zero-padded hex form of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexFrame([char; FRAME_HEX_DIGITS]);

impl HexFrame {
    /// Build from 8 nibble values (each masked to 4 bits)
    pub fn from_nibbles(nibbles: [u8; FRAME_HEX_DIGITS]) -> Self {
        HexFrame(nibbles.map(hex_digit))
    }

    /// Numeric value of the nibble at `index`
    pub fn nibble(&self, index: usize) -> u8 {
        hex_value(self.0[index]).unwrap_or(0)
    }

    /// Digits `start..end` as a string
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.0[start..end].iter().collect()
    }

    /// Parse the digits back into a 32-bit value
    pub fn to_u32(&self) -> u32 {
        FrameCodec::parse_lenient(&self.slice(0, FRAME_HEX_DIGITS))
    }
}

impl std::fmt::Display for HexFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in self.0 {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Hex decomposition of 32-bit frames
pub struct FrameCodec;

impl FrameCodec {
    /// Split a frame into 8 zero-padded hex digits
    pub fn to_hex_nibbles(value: u32) -> HexFrame {
        let mut nibbles = [0u8; FRAME_HEX_DIGITS];
        for (i, nibble) in nibbles.iter_mut().enumerate() {
            *nibble = ((value >> (28 - 4 * i)) & 0xF) as u8;
        }
        HexFrame::from_nibbles(nibbles)
    }

    /// Parse hex text, skipping characters that are not hex digits
    ///
    /// Only the last 8 recognized digits survive. A stray character shifts
    /// the remaining digits into different fields.
    pub fn parse_lenient(text: &str) -> u32 {
        text.chars()
            .filter_map(hex_value)
            .fold(0u32, |acc, v| (acc << 4) | v as u32)
    }

    /// Parse exactly 8 hex digits
    pub fn parse_strict(text: &str) -> Result<u32> {
        let text = text.trim();
        if text.len() != FRAME_HEX_DIGITS || !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BridgeError::invalid_frame(format!(
                "Expected 8 hex digits, got {:?}",
                text
            )));
        }
        u32::from_str_radix(text, 16)
            .map_err(|e| BridgeError::invalid_frame(format!("{}: {}", text, e)))
    }
}

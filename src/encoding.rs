//! Value encoding and decoding for OpenTherm data fields
//!
//! Two value kinds carry real content in this Follower:
//!
//! - `flag8/flag8`: the 16-bit payload is two independent 8-bit flag vectors
//! - `f8.8`: fixed point, payload integer = value × 256
//!
//! Both directions of the flag codec share [`nibble_to_bits`] and
//! [`bits_to_nibble`], and every encoder reports the number of set bits it
//! emitted so the caller can keep its parity bookkeeping.

use crate::core::{hex_digit, hex_value, FrameCodec};

/// Flag positions inside a [`StatusVector`]
///
/// Index 0 is the most significant bit of the flag byte, so index 7 is bit 0.
pub mod status_bits {
    /// Leader status byte (Data-ID 0, high byte)
    pub mod leader {
        /// Central heating enable
        pub const CH_ENABLE: usize = 7;
        /// Domestic hot water enable
        pub const DHW_ENABLE: usize = 6;
        /// Cooling enable
        pub const COOLING_ENABLE: usize = 5;
        /// Outside temperature compensation active
        pub const OTC_ACTIVE: usize = 4;
        /// Second CH circuit enable
        pub const CH2_ENABLE: usize = 3;
    }

    /// Follower status byte (Data-ID 0, low byte)
    pub mod follower {
        /// Fault indication
        pub const FAULT: usize = 7;
        /// Central heating mode
        pub const CH_MODE: usize = 6;
        /// Domestic hot water mode
        pub const DHW_MODE: usize = 5;
        /// Flame status
        pub const FLAME: usize = 4;
        /// Cooling status
        pub const COOLING: usize = 3;
        /// Second CH circuit mode
        pub const CH2_MODE: usize = 2;
        /// Diagnostic indication
        pub const DIAGNOSTIC: usize = 1;
    }

    /// Follower configuration flags (Data-ID 3, high byte)
    pub mod capability {
        /// Domestic hot water present
        pub const DHW_PRESENT: usize = 7;
        /// Control type
        pub const CONTROL_TYPE: usize = 6;
        /// Cooling configuration
        pub const COOLING_CONFIG: usize = 5;
        /// DHW storage configuration
        pub const DHW_CONFIG: usize = 4;
        /// Leader low-off and pump control
        pub const LOW_OFF_PUMP_CONTROL: usize = 3;
        /// Second CH circuit present
        pub const CH2_PRESENT: usize = 2;
    }
}

/// Expand a nibble into 4 bits, most significant first
pub fn nibble_to_bits(nibble: u8) -> [bool; 4] {
    [
        nibble & 0x8 != 0,
        nibble & 0x4 != 0,
        nibble & 0x2 != 0,
        nibble & 0x1 != 0,
    ]
}

/// Compact 4 bits (most significant first) into a nibble
pub fn bits_to_nibble(bits: [bool; 4]) -> u8 {
    bits.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8)
}

/// An ordered vector of 8 status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusVector([bool; 8]);

impl StatusVector {
    /// All flags cleared
    pub const fn new() -> Self {
        StatusVector([false; 8])
    }

    /// Build from a flag byte (bit 7 lands at index 0)
    pub fn from_byte(byte: u8) -> Self {
        let [a, b, c, d] = nibble_to_bits(byte >> 4);
        let [e, f, g, h] = nibble_to_bits(byte & 0xF);
        StatusVector([a, b, c, d, e, f, g, h])
    }

    /// Pack into a flag byte
    pub fn to_byte(&self) -> u8 {
        let [a, b, c, d, e, f, g, h] = self.0;
        (bits_to_nibble([a, b, c, d]) << 4) | bits_to_nibble([e, f, g, h])
    }

    /// Flag at `index`
    pub fn get(&self, index: usize) -> bool {
        self.0[index]
    }

    /// Set the flag at `index`
    pub fn set(&mut self, index: usize, value: bool) {
        self.0[index] = value;
    }

    /// Number of set flags
    pub fn count_ones(&self) -> u32 {
        self.0.iter().filter(|&&bit| bit).count() as u32
    }

    /// Flags as 0/1 integers, index 0 first
    pub fn as_bits(&self) -> [u8; 8] {
        self.0.map(u8::from)
    }
}

impl std::fmt::Display for StatusVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bit in self.as_bits() {
            write!(f, "{}", bit)?;
        }
        Ok(())
    }
}

/// Codec for `flag8` bytes
pub struct FlagCodec;

impl FlagCodec {
    /// Decode two hex digits into a flag vector and its parity contribution
    ///
    /// Digit 1 fills indices 0-3, digit 2 fills 4-7. Unrecognized characters
    /// are skipped; missing digits read as zero.
    pub fn decode_flag_pair(digits: &str) -> (StatusVector, u32) {
        let mut nibbles = digits.chars().filter_map(hex_value);
        let high = nibbles.next().unwrap_or(0);
        let low = nibbles.next().unwrap_or(0);

        let flags = StatusVector::from_byte((high << 4) | low);
        let contribution = flags.count_ones();
        (flags, contribution)
    }

    /// Encode a flag vector as two hex digits and its parity contribution
    pub fn encode_flag_pair(flags: &StatusVector) -> ([char; 2], u32) {
        let byte = flags.to_byte();
        ([hex_digit(byte >> 4), hex_digit(byte)], flags.count_ones())
    }

    /// Payload carrying `high` and `low` as its two bytes
    pub fn encode_payload(high: &StatusVector, low: &StatusVector) -> EncodedValue {
        let ([h1, h2], _) = Self::encode_flag_pair(high);
        let ([l1, l2], _) = Self::encode_flag_pair(low);
        let digits: String = [h1, h2, l1, l2].iter().collect();
        EncodedValue::from_raw(FrameCodec::parse_lenient(&digits) as u16)
    }

    /// Low nibble of the Follower status byte
    ///
    /// A fault forces code 1 and hides CH mode and flame. Otherwise the code
    /// combines CH mode (0x2) and flame (0x8).
    pub fn follower_status_code(status: &StatusVector) -> u8 {
        use status_bits::follower::{CH_MODE, FAULT, FLAME};

        if status.get(FAULT) {
            return 0x1;
        }
        match (status.get(CH_MODE), status.get(FLAME)) {
            (false, false) => 0x0,
            (true, false) => 0x2,
            (false, true) => 0x8,
            (true, true) => 0xA,
        }
    }

    /// Fixed configuration flags announced for Data-ID 3
    pub fn capability_flags(dhw_present: bool) -> StatusVector {
        use status_bits::capability::{CONTROL_TYPE, DHW_PRESENT};

        let mut flags = StatusVector::new();
        flags.set(CONTROL_TYPE, true);
        flags.set(DHW_PRESENT, dhw_present);
        flags
    }
}

/// An encoded f8.8 value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedValue {
    /// 16-bit payload
    pub raw: u16,
    /// Set bits in `raw`
    pub contribution: u32,
}

impl EncodedValue {
    /// Wrap a raw payload
    pub fn from_raw(raw: u16) -> Self {
        EncodedValue {
            raw,
            contribution: raw.count_ones(),
        }
    }

    /// The payload as 4 zero-padded hex digits
    pub fn digits(&self) -> [char; 4] {
        self.nibbles().map(hex_digit)
    }

    /// The payload as 4 nibble values
    pub fn nibbles(&self) -> [u8; 4] {
        [
            (self.raw >> 12) as u8 & 0xF,
            (self.raw >> 8) as u8 & 0xF,
            (self.raw >> 4) as u8 & 0xF,
            self.raw as u8 & 0xF,
        ]
    }
}

/// Codec for f8.8 fixed-point values
pub struct FixedPointCodec;

impl FixedPointCodec {
    /// Scale between the payload integer and the value
    pub const SCALE: f64 = 256.0;

    /// Decode 4 hex digits as an unsigned f8.8 value
    pub fn decode(digits: &str) -> f64 {
        Self::from_raw(FrameCodec::parse_lenient(digits) as u16)
    }

    /// Decode 4 hex digits as a two's-complement f8.8 value
    pub fn decode_signed(digits: &str) -> f64 {
        Self::from_raw_signed(FrameCodec::parse_lenient(digits) as u16)
    }

    /// Unsigned value of a payload
    pub fn from_raw(raw: u16) -> f64 {
        raw as f64 / Self::SCALE
    }

    /// Two's-complement value of a payload
    pub fn from_raw_signed(raw: u16) -> f64 {
        raw as i16 as f64 / Self::SCALE
    }

    /// Encode an unsigned value, truncating toward zero
    ///
    /// Values outside `0.0..256.0` saturate at the payload bounds.
    pub fn encode(value: f64) -> EncodedValue {
        EncodedValue::from_raw((value * Self::SCALE) as u16)
    }

    /// Encode a two's-complement value, truncating toward zero
    pub fn encode_signed(value: f64) -> EncodedValue {
        EncodedValue::from_raw((value * Self::SCALE) as i16 as u16)
    }
}

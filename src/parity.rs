//! Parity bookkeeping for reply frames
//!
//! OpenTherm uses even parity over all 32 bits: bit 31 is set exactly when
//! the other 31 bits hold an odd number of ones. The reply is built field by
//! field, so the engine keeps a running count of the set bits each field
//! contributes and picks the parity bit once the frame is complete.

use tracing::trace;

/// Running set-bit accumulator for one reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParityEngine {
    count: u32,
}

impl ParityEngine {
    /// The parity bit inside the first nibble
    pub const PARITY_NIBBLE_BIT: u8 = 0x8;

    /// Start a fresh accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the set bits of one field
    pub fn add(&mut self, contribution: u32) {
        self.count += contribution;
    }

    /// Add the set bits of a run of nibbles
    pub fn add_nibbles(&mut self, nibbles: &[u8]) {
        self.add(nibbles.iter().map(|n| (n & 0xF).count_ones()).sum());
    }

    /// Remove a contribution recorded earlier
    pub fn retract(&mut self, contribution: u32) {
        debug_assert!(contribution <= self.count, "retracting more than recorded");
        self.count = self.count.saturating_sub(contribution);
    }

    /// Swap one recorded contribution for another
    pub fn replace(&mut self, old: u32, new: u32) {
        self.retract(old);
        self.add(new);
    }

    /// Current count
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether the count is even
    pub fn is_even(&self) -> bool {
        self.count % 2 == 0
    }

    /// Apply the parity bit to the ack nibble
    ///
    /// Even count leaves the nibble alone; odd sets its top bit (4→C, 5→D,
    /// 6→E, 7→F).
    pub fn finalize(&self, ack_nibble: u8) -> u8 {
        let nibble = if self.is_even() {
            ack_nibble
        } else {
            ack_nibble | Self::PARITY_NIBBLE_BIT
        };
        trace!(count = self.count, ack_nibble, nibble, "parity finalized");
        nibble
    }
}

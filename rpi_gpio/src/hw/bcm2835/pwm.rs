//! PWM controller registers.

use super::PERIPHERAL_BASE;

pub const PWM_BASE: usize = PERIPHERAL_BASE + 0x20_C000;

/* Register offsets */
pub const CTL: usize = 0x00;
pub const RNG1: usize = 0x10;
pub const DAT1: usize = 0x14;
pub const RNG2: usize = 0x20;
pub const DAT2: usize = 0x24;

/// CTL field shift for the second channel.
pub const CHANNEL2_SHIFT: u32 = 8;

bitflags::bitflags! {
    /// Per-channel CTL bits, as laid out for channel 1.
    ///
    /// Shift left by [`CHANNEL2_SHIFT`] for channel 2.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Channel enable.
        const PWEN = 1 << 0;
        /// Serialiser mode when set, PWM mode when clear.
        const MODE = 1 << 1;
        /// Inverted polarity.
        const POLA = 1 << 4;
        /// Mark-space transmission instead of the PWM algorithm.
        const MSEN = 1 << 7;
    }
}

/// Mask covering one channel's CTL byte.
pub const CHANNEL_MASK: u32 = 0xFF;

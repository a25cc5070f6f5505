//! Broadcom Serial Controller (I2C master) registers.

use super::PERIPHERAL_BASE;

/// BSC0, muxed onto GPIO0/GPIO1 (ALT0).
pub const BSC0_BASE: usize = PERIPHERAL_BASE + 0x20_5000;
/// BSC1, muxed onto GPIO2/GPIO3 (ALT0).
pub const BSC1_BASE: usize = PERIPHERAL_BASE + 0x80_4000;

/* Register offsets */
pub const C: usize = 0x00;
pub const S: usize = 0x04;
pub const DLEN: usize = 0x08;
pub const A: usize = 0x0C;
pub const FIFO: usize = 0x10;
pub const DIV: usize = 0x14;

/// Depth of the transmit and receive FIFOs.
pub const FIFO_SIZE: usize = 16;

/// Largest value DLEN accepts.
pub const DLEN_MAX: usize = 0xFFFF;

/// Largest 7-bit slave address.
pub const ADDRESS_MAX: u8 = 0x7F;

bitflags::bitflags! {
    /// Control register.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Controller enable.
        const I2CEN = 1 << 15;
        /// Start transfer (self-clearing).
        const ST = 1 << 7;
        /// Clear FIFO (self-clearing).
        const CLEAR = 1 << 4;
        /// Read transfer.
        const READ = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Status register. `CLKT`, `ERR` and `DONE` are write-1-to-clear.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Clock stretch timeout.
        const CLKT = 1 << 9;
        /// Slave did not acknowledge.
        const ERR = 1 << 8;
        /// FIFO full.
        const RXF = 1 << 7;
        /// FIFO empty.
        const TXE = 1 << 6;
        /// FIFO contains data.
        const RXD = 1 << 5;
        /// FIFO can accept data.
        const TXD = 1 << 4;
        /// Transfer done.
        const DONE = 1 << 1;
        /// Transfer active.
        const TA = 1 << 0;

        /// Every write-1-to-clear flag.
        const CLEAR_ALL = Self::CLKT.bits() | Self::ERR.bits() | Self::DONE.bits();
    }
}

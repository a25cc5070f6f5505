//! BCM2835 peripheral register maps.
//!
//! The addresses are ARM physical addresses as seen through `/dev/mem`.
//! Peripherals documented at bus address `0x7Ennnnnn` appear at
//! `0x20nnnnnn`.

pub mod bsc;
pub mod clock;
pub mod gpio;
pub mod pwm;

/// Start of the peripheral window.
pub const PERIPHERAL_BASE: usize = 0x2000_0000;

/// Each register block is mapped as one page.
pub const BLOCK_SIZE: usize = 0x1000;

/// Core (VPU) clock feeding the BSC controllers.
pub const CORE_CLK_HZ: u32 = 250_000_000;

/// Crystal oscillator available as a clock-manager source.
pub const OSC_CLK_HZ: u32 = 19_200_000;

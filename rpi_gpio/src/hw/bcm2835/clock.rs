//! Clock manager registers for the PWM clock.

use super::PERIPHERAL_BASE;

pub const CLOCK_BASE: usize = PERIPHERAL_BASE + 0x10_1000;

/* Register offsets */
pub const CM_PWMCTL: usize = 0xA0;
pub const CM_PWMDIV: usize = 0xA4;

/// Every write to a clock-manager register must carry this password.
pub const PASSWD: u32 = 0x5A << 24;

/// Integer divisor field position in CM_PWMDIV.
pub const DIVI_SHIFT: u32 = 12;
/// Largest integer divisor.
pub const DIVI_MAX: u32 = 0xFFF;

bitflags::bitflags! {
    /// CM_PWMCTL bits below the password byte.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Clock generator running.
        const BUSY = 1 << 7;
        /// Enable the generator.
        const ENAB = 1 << 4;
        /// Source: 19.2 MHz oscillator.
        const SRC_OSC = 1;
    }
}

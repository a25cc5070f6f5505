//! BCM2835 GPIO Controller Driver
//!
//! This module provides both raw register sequences and the HAL
//! implementation for the BCM2835 GPIO controller.

use common::{Error, Result};
use log::{debug, trace};

use super::Bcm2835;
use crate::hal::gpio::{GpioController, PinState, Resistor};
use crate::hal::timer::CountingTimer;
use crate::hw::bcm2835::gpio::{
    self as regs, FSEL_MASK, Function, GPCLR0, GPLEV0, GPPUD, GPPUDCLK0, GPSET0, Pull,
};
use crate::mmio::{Block, Mmio};

/// Settle time between the steps of the pull latch sequence. The
/// controller needs 150 core cycles; a microsecond covers that at any
/// core clock the board runs.
pub const RESISTOR_SETTLE_US: u32 = 1;

impl From<Resistor> for Pull {
    fn from(resistor: Resistor) -> Self {
        match resistor {
            Resistor::Disabled => Pull::Off,
            Resistor::PullDown => Pull::Down,
            Resistor::PullUp => Pull::Up,
        }
    }
}

// ============================================================================
// Raw Hardware Functions
// ============================================================================

/// Write the function-select field of `pin`.
pub(super) fn write_function<M: Mmio>(mmio: &mut M, pin: u8, function: Function) {
    let (offset, shift) = regs::fsel_slot(pin);
    mmio.modify(Block::Gpio, offset, |value| {
        (value & !(FSEL_MASK << shift)) | (function.bits() << shift)
    });
}

/// Read the function-select field of `pin`.
pub(super) fn read_function<M: Mmio>(mmio: &M, pin: u8) -> Function {
    let (offset, shift) = regs::fsel_slot(pin);
    Function::from_field(mmio.read(Block::Gpio, offset) >> shift)
}

/// Drive `pin` through its GPSET or GPCLR bit.
pub(super) fn write_level<M: Mmio>(mmio: &mut M, pin: u8, state: PinState) {
    let (word, bit) = regs::bank_slot(pin);
    let base = match state {
        PinState::High => GPSET0,
        PinState::Low => GPCLR0,
    };
    mmio.write(Block::Gpio, base + word, bit);
}

pub(super) fn read_level<M: Mmio>(mmio: &M, pin: u8) -> PinState {
    let (word, bit) = regs::bank_slot(pin);
    PinState::from(mmio.read(Block::Gpio, GPLEV0 + word) & bit != 0)
}

/// Latch a pull resistor setting into `pin`.
///
/// The control value is only sampled by pins whose GPPUDCLK bit is pulsed
/// while it is held, so both registers are cleared again at the end.
pub(super) fn latch_pull<M: Mmio, T: CountingTimer>(mmio: &mut M, timer: &T, pin: u8, pull: Pull) {
    let (word, bit) = regs::bank_slot(pin);

    mmio.write(Block::Gpio, GPPUD, pull as u32);
    timer.delay_us(RESISTOR_SETTLE_US);

    mmio.write(Block::Gpio, GPPUDCLK0 + word, bit);
    timer.delay_us(RESISTOR_SETTLE_US);

    mmio.write(Block::Gpio, GPPUD, 0);
    mmio.write(Block::Gpio, GPPUDCLK0 + word, 0);
}

// ============================================================================
// Handle Operations
// ============================================================================

impl<M: Mmio> Bcm2835<M> {
    /// Multiplex `pin` to `function`.
    pub fn set_function(&mut self, pin: u8, function: Function) -> Result<()> {
        self.check_gpio(pin)?;
        trace!("gpio {pin} -> {function:?}");
        write_function(&mut self.regs, pin, function);
        Ok(())
    }

    /// Current function of `pin`.
    pub fn function(&self, pin: u8) -> Result<Function> {
        self.check_gpio(pin)?;
        Ok(read_function(&self.regs, pin))
    }

    /// Drive an output pin.
    ///
    /// Fails with [`Error::PinNotOutput`] unless `pin` is configured as an
    /// output.
    pub fn set_pin(&mut self, pin: u8, state: PinState) -> Result<()> {
        self.check_gpio(pin)?;

        if read_function(&self.regs, pin) != Function::Output {
            debug!("gpio {pin} is not an output");
            return Err(Error::PinNotOutput(pin));
        }

        write_level(&mut self.regs, pin, state);
        Ok(())
    }

    /// Sample the level of `pin`, whatever its function.
    pub fn read_pin(&self, pin: u8) -> Result<PinState> {
        self.check_gpio(pin)?;
        Ok(read_level(&self.regs, pin))
    }

    pub fn set_pull_resistor(&mut self, pin: u8, resistor: Resistor) -> Result<()> {
        self.check_gpio(pin)?;
        trace!("gpio {pin} pull {resistor:?}");
        latch_pull(&mut self.regs, &self.timer, pin, resistor.into());
        Ok(())
    }

    /// Default `(SDA, SCL)` pins of the board.
    pub fn i2c_pins(&self) -> Result<(u8, u8)> {
        self.ensure_open()?;
        Ok(self.rev.i2c_pins())
    }

    fn check_gpio(&self, pin: u8) -> Result<()> {
        self.ensure_open()?;
        self.rev.check_pin(pin)
    }
}

// ============================================================================
// HAL Implementation
// ============================================================================

impl<M: Mmio> GpioController for Bcm2835<M> {
    type Pin = u8;
    type Error = Error;

    fn set_pull(&mut self, pin: Self::Pin, resistor: Resistor) -> Result<()> {
        self.set_pull_resistor(pin, resistor)
    }

    fn set_high(&mut self, pin: Self::Pin) -> Result<()> {
        self.set_pin(pin, PinState::High)
    }

    fn set_low(&mut self, pin: Self::Pin) -> Result<()> {
        self.set_pin(pin, PinState::Low)
    }

    fn read(&self, pin: Self::Pin) -> Result<PinState> {
        self.read_pin(pin)
    }
}

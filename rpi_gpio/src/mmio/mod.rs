//! Register backends.
//!
//! Drivers never hold raw pointers. They go through [`Mmio`], which is
//! implemented by [`DevMem`] for real hardware and by [`MockMmio`] for
//! testing on any host.

pub mod devmem;
pub mod mock;

pub use devmem::DevMem;
pub use mock::MockMmio;

use crate::hw::bcm2835::{bsc, clock, gpio, pwm};

/// The peripheral register blocks used by the drivers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Block {
    Gpio,
    Bsc0,
    Bsc1,
    Pwm,
    Clock,
}

impl Block {
    pub const COUNT: usize = 5;

    pub const ALL: [Block; Block::COUNT] = [
        Block::Gpio,
        Block::Bsc0,
        Block::Bsc1,
        Block::Pwm,
        Block::Clock,
    ];

    /// Physical base address of the block.
    pub const fn base(self) -> usize {
        match self {
            Block::Gpio => gpio::GPIO_BASE,
            Block::Bsc0 => bsc::BSC0_BASE,
            Block::Bsc1 => bsc::BSC1_BASE,
            Block::Pwm => pwm::PWM_BASE,
            Block::Clock => clock::CLOCK_BASE,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// Volatile access to the peripheral register blocks.
///
/// Offsets are in bytes from the block base and must be word aligned.
pub trait Mmio {
    /// Read a 32-bit register.
    fn read(&self, block: Block, offset: usize) -> u32;

    /// Write a 32-bit register.
    fn write(&mut self, block: Block, offset: usize, value: u32);

    /// Read-modify-write a register.
    fn modify<F>(&mut self, block: Block, offset: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(block, offset);
        self.write(block, offset, f(value));
    }

    /// Set `bits` in a register, leaving the others untouched.
    fn set_bits(&mut self, block: Block, offset: usize, bits: u32) {
        self.modify(block, offset, |value| value | bits);
    }

    /// Clear `bits` in a register, leaving the others untouched.
    fn clear_bits(&mut self, block: Block, offset: usize, bits: u32) {
        self.modify(block, offset, |value| value & !bits);
    }

    /// Give the backing mapping back. Accesses afterwards are ignored.
    fn release(&mut self) -> common::Result<()> {
        Ok(())
    }
}

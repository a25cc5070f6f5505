//! Register-level GPIO, I2C and PWM control for BCM2835 Raspberry Pi boards.
//!
//! The crate maps the peripheral blocks through `/dev/mem` and drives them
//! directly, with no kernel driver in between.
//!
//! # Module Organization
//!
//! - [`hal`]: platform-independent traits and timing primitives
//! - [`hw`]: register offsets and bit definitions
//! - [`mmio`]: register backends (`/dev/mem` and an in-memory mock)
//! - [`board`]: board revision detection and header pin tables
//! - [`platform`]: the drivers, owned by one handle per process
//!
//! # Usage Example
//!
//! ```no_run
//! use rpi_gpio::hal::gpio::PinState;
//! use rpi_gpio::hw::bcm2835::gpio::Function;
//! use rpi_gpio::platform::bcm2835::i2c::I2cConfig;
//! use rpi_gpio::{Bcm2835, SetupConfig};
//!
//! fn main() -> rpi_gpio::Result<()> {
//!     let mut hw = Bcm2835::setup(SetupConfig::default())?;
//!
//!     hw.set_function(17, Function::Output)?;
//!     hw.set_pin(17, PinState::High)?;
//!
//!     let mut i2c = hw.i2c();
//!     i2c.setup(I2cConfig::default())?;
//!     i2c.set_7bit_slave(0x50)?;
//!     let id = i2c.write_read(&[0x00], 1)?;
//!     println!("eeprom byte 0: {:#04x}", id[0]);
//!     i2c.cleanup()?;
//!
//!     hw.cleanup()
//! }
//! ```

pub mod board;
pub mod hal;
pub mod hw;
pub mod mmio;
pub mod platform;

// Re-export commonly used types
pub use board::{
    PcbRev, REV1_PINCNT, REV1_PINS, REV1_SCL, REV1_SDA, REV2_PINCNT, REV2_PINS, REV2_SCL,
    REV2_SDA,
};
pub use common::{Error, Result, Status, err_to_string};
pub use hal::gpio::{GpioController, PinState, Resistor};
pub use hal::i2c::I2cMaster;
pub use hal::pwm::{PwmMode, PwmOutput, PwmSubMode};
pub use hw::bcm2835::CORE_CLK_HZ;
pub use hw::bcm2835::gpio::Function;

#[cfg(feature = "bcm2835")]
pub use platform::bcm2835::{
    Bcm2835, SessionState, SetupConfig,
    clock::PWM_CLOCK_FREQ_MIN,
    i2c::{I2C_CLOCK_FREQ_MAX, I2C_CLOCK_FREQ_MIN, I2cConfig},
    pwm::{Channel, PwmConfig, PwmState},
};

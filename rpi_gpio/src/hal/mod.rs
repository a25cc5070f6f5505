//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! This module defines generic traits for the peripherals the drivers
//! expose. The BCM2835 platform implements them, so code written against
//! the traits does not name the register backend.
//!
//! # Available Interfaces
//!
//! - [`gpio`]: pin levels and pull resistors
//! - [`i2c`]: blocking I2C master transfers
//! - [`pwm`]: PWM and serialiser output channels
//! - [`timer`]: microsecond clock, delays and bounded polling

pub mod gpio;
pub mod i2c;
pub mod pwm;
pub mod timer;

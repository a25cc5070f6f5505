//! Raw register maps.
//!
//! Offsets and bit definitions only; nothing here touches hardware.

pub mod bcm2835;

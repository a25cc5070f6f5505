use super::PERIPHERAL_BASE;

/// Base physical address of the GPIO controller.
pub const GPIO_BASE: usize = PERIPHERAL_BASE + 0x20_0000;

/* Register offsets */
pub const GPFSEL0: usize = 0x00;
pub const GPSET0: usize = 0x1C;
pub const GPCLR0: usize = 0x28;
pub const GPLEV0: usize = 0x34;
pub const GPPUD: usize = 0x94;
pub const GPPUDCLK0: usize = 0x98;

/// Pins sharing one GPFSEL word.
pub const PINS_PER_FSEL: u8 = 10;
/// Width mask of one function-select field.
pub const FSEL_MASK: u32 = 0b111;

/// GPIO pin function selection.
///
/// Each pin can be an input, an output, or one of six alternate functions
/// depending on the SoC peripheral muxing. The discriminants are the raw
/// three-bit GPFSEL encodings.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    /// Pin is configured as an input.
    Input = 0b000,
    /// Pin is configured as a push-pull output.
    Output = 0b001,
    /// Alternate function 0.
    Alt0 = 0b100,
    /// Alternate function 1.
    Alt1 = 0b101,
    /// Alternate function 2.
    Alt2 = 0b110,
    /// Alternate function 3.
    Alt3 = 0b111,
    /// Alternate function 4.
    Alt4 = 0b011,
    /// Alternate function 5.
    Alt5 = 0b010,
}

impl Function {
    /// Smallest raw encoding.
    pub const MIN: u32 = Function::Input as u32;
    /// Largest raw encoding.
    pub const MAX: u32 = Function::Alt3 as u32;

    /// Decode a GPFSEL field. Only the low three bits are considered.
    pub const fn from_field(field: u32) -> Self {
        match field & FSEL_MASK {
            0b000 => Function::Input,
            0b001 => Function::Output,
            0b010 => Function::Alt5,
            0b011 => Function::Alt4,
            0b100 => Function::Alt0,
            0b101 => Function::Alt1,
            0b110 => Function::Alt2,
            _ => Function::Alt3,
        }
    }

    /// Alternate function by index (0..=5).
    pub const fn alt(index: u8) -> Option<Self> {
        match index {
            0 => Some(Function::Alt0),
            1 => Some(Function::Alt1),
            2 => Some(Function::Alt2),
            3 => Some(Function::Alt3),
            4 => Some(Function::Alt4),
            5 => Some(Function::Alt5),
            _ => None,
        }
    }

    pub const fn bits(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Function {
    type Error = common::Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > Function::MAX {
            return Err(common::Error::range(
                "pin function",
                value,
                Function::MIN,
                Function::MAX,
            ));
        }
        Ok(Function::from_field(value))
    }
}

/// GPPUD control values.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pull {
    /// No pull-up or pull-down resistor.
    Off = 0b00,
    /// Enable pull-down resistor.
    Down = 0b01,
    /// Enable pull-up resistor.
    Up = 0b10,
}

/// Offset of the GPFSEL word and the field shift for `pin`.
pub const fn fsel_slot(pin: u8) -> (usize, u32) {
    let word = (pin / PINS_PER_FSEL) as usize;
    let shift = (pin % PINS_PER_FSEL) as u32 * 3;
    (GPFSEL0 + word * 4, shift)
}

/// Byte offset of the 32-pin bank word and the bit for `pin`, relative to
/// the bank's first register (GPSET0, GPCLR0, GPLEV0, GPPUDCLK0).
pub const fn bank_slot(pin: u8) -> (usize, u32) {
    let word = (pin / 32) as usize;
    (word * 4, 1u32 << (pin % 32))
}

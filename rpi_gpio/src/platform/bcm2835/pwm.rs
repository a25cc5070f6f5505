//! BCM2835 PWM Controller Driver
//!
//! The controller has two channels sharing one CTL register (one byte
//! each) and one clock generator. Only GPIO18 (channel 1, ALT5) reaches
//! the header of the boards this crate supports, but both channels are
//! driven the same way.

use common::{Error, Result};
use log::{debug, info, trace};

use super::clock;
use super::gpio::write_function;
use super::{Bcm2835, Session};
use crate::hal::pwm::{PwmMode, PwmOutput, PwmSubMode};
use crate::hw::bcm2835::gpio::Function;
use crate::hw::bcm2835::pwm::{
    CHANNEL_MASK, CHANNEL2_SHIFT, CTL, Control, DAT1, DAT2, RNG1, RNG2,
};
use crate::mmio::{Block, Mmio};

/// PWM output channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    One,
    Two,
}

impl Channel {
    pub const COUNT: usize = 2;
    pub const ALL: [Channel; Channel::COUNT] = [Channel::One, Channel::Two];

    pub(super) const fn index(self) -> usize {
        match self {
            Channel::One => 0,
            Channel::Two => 1,
        }
    }

    /// Pins this channel can be muxed onto, in order of preference.
    pub const fn pins(self) -> [(u8, Function); 2] {
        match self {
            Channel::One => [(12, Function::Alt0), (18, Function::Alt5)],
            Channel::Two => [(13, Function::Alt0), (19, Function::Alt5)],
        }
    }

    const fn shift(self) -> u32 {
        match self {
            Channel::One => 0,
            Channel::Two => CHANNEL2_SHIFT,
        }
    }

    const fn range_reg(self) -> usize {
        match self {
            Channel::One => RNG1,
            Channel::Two => RNG2,
        }
    }

    const fn data_reg(self) -> usize {
        match self {
            Channel::One => DAT1,
            Channel::Two => DAT2,
        }
    }

    /// `bits` moved into this channel's CTL byte.
    fn ctl(self, bits: Control) -> u32 {
        bits.bits() << self.shift()
    }
}

/// PWM channel session parameters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PwmConfig {
    /// Output pin; `None` picks the first of [`Channel::pins`] on the header.
    pub pin: Option<u8>,
}

/// Lifecycle of a PWM channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PwmState {
    Uninitialised,
    /// Set up; [`Pwm::enable`] not called yet.
    Configured,
    Enabled,
    Disabled,
    Closed,
}

#[derive(Debug, Copy, Clone)]
pub(super) struct PwmSession {
    pin: u8,
    modes: Option<(PwmMode, PwmSubMode)>,
    range: u32,
    data: u32,
    enabled: Option<bool>,
}

impl PwmSession {
    fn serialising(&self) -> bool {
        matches!(self.modes, Some((PwmMode::Serialiser, _)))
    }
}

// ============================================================================
// Session View
// ============================================================================

/// One PWM channel of a [`Bcm2835`] handle.
pub struct Pwm<'a, M: Mmio> {
    hw: &'a mut Bcm2835<M>,
    channel: Channel,
}

impl<M: Mmio> Bcm2835<M> {
    pub fn pwm(&mut self, channel: Channel) -> Pwm<'_, M> {
        Pwm { hw: self, channel }
    }
}

impl<M: Mmio> Pwm<'_, M> {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> PwmState {
        match &self.hw.pwm[self.channel.index()] {
            Session::Uninitialised => PwmState::Uninitialised,
            Session::Active(session) => match session.enabled {
                None => PwmState::Configured,
                Some(true) => PwmState::Enabled,
                Some(false) => PwmState::Disabled,
            },
            Session::Closed => PwmState::Closed,
        }
    }

    /// Claim the output pin and reset the channel.
    ///
    /// The shared clock generator is started at [`clock::PWM_CLOCK_FREQ_DEFAULT`]
    /// unless the other channel already runs it. The channel is left
    /// disabled with range and data zeroed.
    pub fn setup(&mut self, config: PwmConfig) -> Result<()> {
        self.hw.ensure_open()?;

        let channel = self.channel;
        if self.hw.pwm[channel.index()].is_active() {
            debug!("pwm {channel:?} setup called twice");
            return Err(Error::AlreadyInitialised("pwm"));
        }

        let (pin, function) = self.resolve_pin(config.pin)?;

        let hw = &mut *self.hw;
        if hw.pwm_clock.is_none() {
            let divisor = clock::divisor(clock::PWM_CLOCK_FREQ_DEFAULT)?;
            clock::start(&mut hw.regs, &hw.timer, divisor)?;
            hw.pwm_clock = Some(divisor);
        }

        write_function(&mut hw.regs, pin, function);
        hw.regs
            .clear_bits(Block::Pwm, CTL, CHANNEL_MASK << channel.shift());
        hw.regs.write(Block::Pwm, channel.data_reg(), 0);
        hw.regs.write(Block::Pwm, channel.range_reg(), 0);

        hw.pwm[channel.index()] = Session::Active(PwmSession {
            pin,
            modes: None,
            range: 0,
            data: 0,
            enabled: None,
        });

        info!("pwm {channel:?} up on gpio {pin}");
        Ok(())
    }

    /// Disable the channel and return its pin to input. The clock
    /// generator stops with the last active channel.
    pub fn cleanup(&mut self) -> Result<()> {
        let session = *self.session()?;
        let channel = self.channel;
        let hw = &mut *self.hw;

        write_function(&mut hw.regs, session.pin, Function::Input);
        hw.regs
            .clear_bits(Block::Pwm, CTL, CHANNEL_MASK << channel.shift());
        hw.pwm[channel.index()] = Session::Closed;

        let clock_result = if hw.pwm.iter().any(Session::is_active) {
            Ok(())
        } else {
            hw.pwm_clock = None;
            clock::stop(&mut hw.regs, &hw.timer)
        };

        info!("pwm {channel:?} closed");
        clock_result
    }

    /// Program MODE and MSEN. `sub_mode` only matters in PWM mode.
    ///
    /// Leaving serialiser mode fails with [`Error::Range`] while the data
    /// word is larger than the range.
    pub fn set_modes(&mut self, mode: PwmMode, sub_mode: PwmSubMode) -> Result<()> {
        let session = *self.session()?;

        if mode == PwmMode::Pwm && session.data > session.range {
            debug!("pwm data {} exceeds range {}", session.data, session.range);
            return Err(Error::range("pwm data", session.data, 0u32, session.range));
        }

        let (set, clear) = match (mode, sub_mode) {
            (PwmMode::Pwm, PwmSubMode::Algorithm) => {
                (Control::empty(), Control::MODE | Control::MSEN)
            }
            (PwmMode::Pwm, PwmSubMode::MarkSpace) => (Control::MSEN, Control::MODE),
            (PwmMode::Serialiser, _) => (Control::MODE, Control::MSEN),
        };

        let channel = self.channel;
        self.hw.regs.modify(Block::Pwm, CTL, |ctl| {
            (ctl & !channel.ctl(clear)) | channel.ctl(set)
        });
        self.update(|session| session.modes = Some((mode, sub_mode)));

        trace!("pwm {channel:?} {mode:?}/{sub_mode:?}");
        Ok(())
    }

    /// Set the shared clock generator. Affects both channels.
    pub fn set_clock_freq(&mut self, hz: u32) -> Result<()> {
        self.session()?;
        let divisor = clock::divisor(hz)?;

        // A failed restart leaves the generator stopped.
        let hw = &mut *self.hw;
        hw.pwm_clock = None;
        clock::start(&mut hw.regs, &hw.timer, divisor)?;
        hw.pwm_clock = Some(divisor);
        Ok(())
    }

    /// Program the range register.
    ///
    /// Outside serialiser mode the range may not drop below the current
    /// data value.
    pub fn set_range(&mut self, range: u32) -> Result<()> {
        let session = *self.session()?;

        if !session.serialising() && range < session.data {
            debug!("pwm range {range} is below data {}", session.data);
            return Err(Error::range("pwm range", range, session.data, u32::MAX));
        }

        self.hw
            .regs
            .write(Block::Pwm, self.channel.range_reg(), range);
        self.update(|session| session.range = range);
        Ok(())
    }

    /// Program the data register.
    ///
    /// Outside serialiser mode the value is a count of high ticks and must
    /// not exceed the range.
    pub fn set_data(&mut self, data: u32) -> Result<()> {
        let session = *self.session()?;

        if !session.serialising() && data > session.range {
            debug!("pwm data {data} exceeds range {}", session.range);
            return Err(Error::range("pwm data", data, 0u32, session.range));
        }

        self.hw
            .regs
            .write(Block::Pwm, self.channel.data_reg(), data);
        self.update(|session| session.data = data);
        Ok(())
    }

    /// Start or stop the output. Modes must be set before enabling.
    pub fn enable(&mut self, on: bool) -> Result<()> {
        let session = *self.session()?;

        if on && session.modes.is_none() {
            debug!("pwm {:?} enabled before its modes were set", self.channel);
            return Err(Error::NotInitialised("pwm mode"));
        }

        self.write_ctl_bit(Control::PWEN, on);
        self.update(|session| session.enabled = Some(on));
        Ok(())
    }

    /// Invert the output polarity.
    pub fn set_polarity(&mut self, inverted: bool) -> Result<()> {
        self.session()?;
        self.write_ctl_bit(Control::POLA, inverted);
        Ok(())
    }

    fn write_ctl_bit(&mut self, bit: Control, on: bool) {
        let bits = self.channel.ctl(bit);
        if on {
            self.hw.regs.set_bits(Block::Pwm, CTL, bits);
        } else {
            self.hw.regs.clear_bits(Block::Pwm, CTL, bits);
        }
    }

    fn resolve_pin(&self, requested: Option<u8>) -> Result<(u8, Function)> {
        let candidates = self.channel.pins();
        let rev = self.hw.rev;

        let found = match requested {
            Some(pin) => candidates.into_iter().find(|&(p, _)| p == pin),
            None => candidates.into_iter().find(|&(p, _)| rev.is_valid_pin(p)),
        };

        match found {
            Some((pin, function)) => {
                rev.check_pin(pin)?;
                Ok((pin, function))
            }
            None => {
                let pin = requested.unwrap_or(candidates[0].0);
                debug!("gpio {pin} can't carry pwm {:?}", self.channel);
                Err(Error::InvalidPin(pin))
            }
        }
    }

    fn session(&self) -> Result<&PwmSession> {
        self.hw.pwm[self.channel.index()].active().ok_or_else(|| {
            debug!("pwm {:?} used without setup", self.channel);
            Error::NotInitialised("pwm")
        })
    }

    fn update(&mut self, f: impl FnOnce(&mut PwmSession)) {
        if let Some(session) = self.hw.pwm[self.channel.index()].active_mut() {
            f(session);
        }
    }
}

// ============================================================================
// HAL Implementation
// ============================================================================

impl<M: Mmio> PwmOutput for Pwm<'_, M> {
    type Error = Error;

    fn set_modes(&mut self, mode: PwmMode, sub_mode: PwmSubMode) -> Result<()> {
        Pwm::set_modes(self, mode, sub_mode)
    }

    fn set_clock_freq(&mut self, hz: u32) -> Result<()> {
        Pwm::set_clock_freq(self, hz)
    }

    fn set_range(&mut self, range: u32) -> Result<()> {
        Pwm::set_range(self, range)
    }

    fn set_data(&mut self, data: u32) -> Result<()> {
        Pwm::set_data(self, data)
    }

    fn enable(&mut self, on: bool) -> Result<()> {
        Pwm::enable(self, on)
    }
}

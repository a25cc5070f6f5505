//! PWM Hardware Abstraction Layer.

/// How a channel interprets its range and data registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PwmMode {
    /// Duty cycle of `data / range`.
    Pwm,
    /// Shift `data` out MSB first, `range` bits per word.
    Serialiser,
}

/// Refinement of [`PwmMode::Pwm`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PwmSubMode {
    /// Spread the high time evenly across the period.
    Algorithm,
    /// One contiguous high pulse of `data` ticks per `range` ticks.
    MarkSpace,
}

/// A single PWM output channel.
pub trait PwmOutput {
    /// Error type for channel operations.
    type Error: core::fmt::Debug;

    /// Select the mode and sub-mode. The sub-mode is ignored by the
    /// serialiser.
    fn set_modes(&mut self, mode: PwmMode, sub_mode: PwmSubMode) -> Result<(), Self::Error>;

    /// Program the tick frequency feeding the channel.
    fn set_clock_freq(&mut self, hz: u32) -> Result<(), Self::Error>;

    /// Period in ticks (PWM) or word width in bits (serialiser).
    fn set_range(&mut self, range: u32) -> Result<(), Self::Error>;

    /// High ticks per period (PWM) or the word to shift out (serialiser).
    fn set_data(&mut self, data: u32) -> Result<(), Self::Error>;

    /// Start or stop the output.
    fn enable(&mut self, on: bool) -> Result<(), Self::Error>;
}

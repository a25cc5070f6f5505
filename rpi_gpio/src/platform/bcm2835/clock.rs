//! PWM clock generator.
//!
//! The generator runs from the 19.2 MHz oscillator through a 12-bit
//! integer divisor. It must be stopped, and BUSY seen clear, before the
//! divisor may change.

use core::ops::ControlFlow;
use core::time::Duration;

use common::{Error, Result};
use log::{debug, trace};

use crate::hal::timer::CountingTimer;
use crate::hw::bcm2835::OSC_CLK_HZ;
use crate::hw::bcm2835::clock::{CM_PWMCTL, CM_PWMDIV, Control, DIVI_MAX, DIVI_SHIFT, PASSWD};
use crate::mmio::{Block, Mmio};

/// Lowest PWM clock the divisor can reach.
pub const PWM_CLOCK_FREQ_MIN: u32 = OSC_CLK_HZ / (DIVI_MAX + 1) + 1;
pub const PWM_CLOCK_FREQ_MAX: u32 = OSC_CLK_HZ;

/// Clock the generator starts with when a channel is set up.
pub const PWM_CLOCK_FREQ_DEFAULT: u32 = 1_200_000;

/// Longest the generator may stay BUSY after being stopped.
pub const CLOCK_BUSY_TIMEOUT: Duration = Duration::from_millis(10);

const BUSY_POLL: Duration = Duration::from_micros(10);

/// Integer divisor for a PWM clock frequency.
pub fn divisor(hz: u32) -> Result<u32> {
    if !(PWM_CLOCK_FREQ_MIN..=PWM_CLOCK_FREQ_MAX).contains(&hz) {
        debug!("pwm clock frequency {hz} out of range");
        return Err(Error::range(
            "pwm clock frequency",
            hz,
            PWM_CLOCK_FREQ_MIN,
            PWM_CLOCK_FREQ_MAX,
        ));
    }

    Ok(OSC_CLK_HZ / hz)
}

fn busy<M: Mmio>(mmio: &M) -> bool {
    Control::from_bits_truncate(mmio.read(Block::Clock, CM_PWMCTL)).contains(Control::BUSY)
}

/// Stop the generator and wait for it to go idle.
pub(super) fn stop<M: Mmio, T: CountingTimer>(mmio: &mut M, timer: &T) -> Result<()> {
    mmio.write(Block::Clock, CM_PWMCTL, PASSWD | Control::SRC_OSC.bits());

    let idle = timer.poll_until(CLOCK_BUSY_TIMEOUT, || {
        if busy(mmio) {
            ControlFlow::Continue(BUSY_POLL)
        } else {
            ControlFlow::Break(())
        }
    });

    if idle {
        Ok(())
    } else {
        debug!("pwm clock still busy after {CLOCK_BUSY_TIMEOUT:?}");
        Err(Error::ClockBusy("pwm"))
    }
}

/// (Re)start the generator with `divisor`.
pub(super) fn start<M: Mmio, T: CountingTimer>(
    mmio: &mut M,
    timer: &T,
    divisor: u32,
) -> Result<()> {
    stop(mmio, timer)?;

    trace!("pwm clock divisor {divisor}");
    mmio.write(Block::Clock, CM_PWMDIV, PASSWD | (divisor << DIVI_SHIFT));
    mmio.write(
        Block::Clock,
        CM_PWMCTL,
        PASSWD | (Control::SRC_OSC | Control::ENAB).bits(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::timer::MonotonicTimer;
    use crate::mmio::MockMmio;

    #[test]
    fn divisor_bounds() {
        assert_eq!(PWM_CLOCK_FREQ_MIN, 4688);
        assert_eq!(divisor(PWM_CLOCK_FREQ_MIN).unwrap(), DIVI_MAX);
        assert_eq!(divisor(PWM_CLOCK_FREQ_MAX).unwrap(), 1);
        assert_eq!(divisor(PWM_CLOCK_FREQ_DEFAULT).unwrap(), 16);
        assert!(divisor(PWM_CLOCK_FREQ_MIN - 1).is_err());
        assert!(divisor(PWM_CLOCK_FREQ_MAX + 1).is_err());
    }

    #[test]
    fn start_stops_programs_then_enables() {
        let mut mock = MockMmio::new();
        let timer = MonotonicTimer::new();

        start(&mut mock, &timer, 16).unwrap();

        assert_eq!(
            mock.writes_to(Block::Clock),
            vec![
                (CM_PWMCTL, PASSWD | Control::SRC_OSC.bits()),
                (CM_PWMDIV, PASSWD | (16 << DIVI_SHIFT)),
                (CM_PWMCTL, PASSWD | (Control::SRC_OSC | Control::ENAB).bits()),
            ]
        );
        assert!(busy(&mock));
    }

    #[test]
    fn stuck_generator_is_reported() {
        /// Backend whose clock never leaves BUSY.
        struct Stuck;

        impl Mmio for Stuck {
            fn read(&self, _: Block, _: usize) -> u32 {
                Control::BUSY.bits()
            }

            fn write(&mut self, _: Block, _: usize, _: u32) {}
        }

        let err = stop(&mut Stuck, &MonotonicTimer::new()).unwrap_err();
        assert!(matches!(err, Error::ClockBusy("pwm")));
        assert_eq!(err.status(), common::Status::Default);
    }
}

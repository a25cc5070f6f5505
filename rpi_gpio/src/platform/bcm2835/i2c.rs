//! BCM2835 BSC (I2C master) Driver
//!
//! Transfers are blocking. The status register is polled at an interval
//! derived from the time one byte takes on the wire, and every wait is
//! bounded by the session timeout.
//!
//! Two controllers are used, selected by the pins the session claims:
//! BSC0 on GPIO0/GPIO1 (revision 1 header) and BSC1 on GPIO2/GPIO3
//! (revision 2 header).

use core::ops::ControlFlow;
use core::time::Duration;

use common::{Error, Result};
use log::{debug, info, trace};

use super::gpio::{latch_pull, write_function};
use super::{Bcm2835, Session, SessionState};
use crate::hal::i2c::I2cMaster;
use crate::hal::timer::CountingTimer;
use crate::hw::bcm2835::CORE_CLK_HZ;
use crate::hw::bcm2835::bsc::{self, Control, Status};
use crate::hw::bcm2835::gpio::{Function, Pull};
use crate::mmio::{Block, Mmio};

pub const I2C_CLOCK_FREQ_MIN: u32 = 10_000;
pub const I2C_CLOCK_FREQ_MAX: u32 = 400_000;
pub const I2C_CLOCK_FREQ_DEFAULT: u32 = 100_000;

/// Longest a single transfer may take before it is aborted.
pub const I2C_TIMEOUT: Duration = Duration::from_secs(1);

/// Eight data bits plus the acknowledge.
const CLOCKS_PER_BYTE: u64 = 9;

/// I2C session parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct I2cConfig {
    /// `(SDA, SCL)`; `None` selects the board default.
    pub pins: Option<(u8, u8)>,
    pub clock_hz: u32,
    /// Per-transfer timeout.
    pub timeout: Duration,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            pins: None,
            clock_hz: I2C_CLOCK_FREQ_DEFAULT,
            timeout: I2C_TIMEOUT,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub(super) struct I2cSession {
    block: Block,
    pins: (u8, u8),
    clock_hz: u32,
    address: Option<u8>,
    timeout: Duration,
}

/// CDIV value for an SCL frequency.
///
/// The controller ignores bit 0 of CDIV, so the divisor is rounded down
/// to an even value and the resulting frequency is at or just above `hz`.
pub fn clock_divisor(hz: u32) -> Result<u32> {
    if !(I2C_CLOCK_FREQ_MIN..=I2C_CLOCK_FREQ_MAX).contains(&hz) {
        debug!("i2c clock frequency {hz} out of range");
        return Err(Error::range(
            "i2c clock frequency",
            hz,
            I2C_CLOCK_FREQ_MIN,
            I2C_CLOCK_FREQ_MAX,
        ));
    }

    Ok((CORE_CLK_HZ / hz) & !1)
}

/// Controller muxed onto an `(SDA, SCL)` pair by ALT0.
pub fn bus_block(pins: (u8, u8)) -> Result<Block> {
    match pins {
        (0, 1) => Ok(Block::Bsc0),
        (2, 3) => Ok(Block::Bsc1),
        (sda, scl) => {
            debug!("gpio {sda}/{scl} are not an i2c pin pair");
            Err(Error::InvalidPin(sda))
        }
    }
}

fn byte_time_us(hz: u32) -> u64 {
    (CLOCKS_PER_BYTE * 1_000_000).div_ceil(u64::from(hz))
}

/// Time for up to half a FIFO of `pending` bytes to move.
fn poll_interval(byte_time_us: u64, pending: usize) -> Duration {
    let bytes = pending.clamp(1, bsc::FIFO_SIZE / 2) as u64;
    Duration::from_micros(byte_time_us * bytes)
}

// ============================================================================
// Raw Hardware Functions
// ============================================================================

fn status<M: Mmio>(mmio: &M, block: Block) -> Status {
    Status::from_bits_truncate(mmio.read(block, bsc::S))
}

/// Flush the FIFO, clear stale flags and start a transfer of `len` bytes.
fn begin_transfer<M: Mmio>(mmio: &mut M, block: Block, read: bool, len: usize) {
    mmio.set_bits(block, bsc::C, Control::CLEAR.bits());
    mmio.write(block, bsc::S, Status::CLEAR_ALL.bits());
    mmio.modify(block, bsc::C, |c| {
        if read {
            c | Control::READ.bits()
        } else {
            c & !Control::READ.bits()
        }
    });
    mmio.write(block, bsc::DLEN, len as u32);
    mmio.set_bits(block, bsc::C, Control::ST.bits());
}

/// Stop whatever the controller is doing and leave it disabled.
fn abort<M: Mmio>(mmio: &mut M, block: Block) {
    mmio.write(block, bsc::C, Control::CLEAR.bits());
    mmio.write(block, bsc::S, Status::CLEAR_ALL.bits());
}

/// Map the final status of a transfer to its outcome and clear the flags.
fn finish<M: Mmio>(mmio: &mut M, block: Block, finished: bool, remaining: usize) -> Result<()> {
    if !finished {
        debug!("{block:?} transfer timed out, {remaining} bytes outstanding");
        abort(mmio, block);
        mmio.write(block, bsc::C, Control::I2CEN.bits());
        return Err(Error::I2cTimeout);
    }

    let status = status(mmio, block);
    mmio.write(block, bsc::S, Status::CLEAR_ALL.bits());

    if status.contains(Status::ERR) {
        debug!("{block:?} slave did not acknowledge");
        Err(Error::I2cNack)
    } else if status.contains(Status::CLKT) {
        debug!("{block:?} clock stretch timeout");
        Err(Error::I2cClockStretch)
    } else if remaining > 0 {
        debug!("{block:?} transfer done with {remaining} bytes outstanding");
        Err(Error::I2cIncomplete { remaining })
    } else {
        Ok(())
    }
}

// ============================================================================
// Session View
// ============================================================================

/// The I2C master of a [`Bcm2835`] handle.
pub struct I2c<'a, M: Mmio> {
    hw: &'a mut Bcm2835<M>,
}

impl<M: Mmio> Bcm2835<M> {
    pub fn i2c(&mut self) -> I2c<'_, M> {
        I2c { hw: self }
    }
}

impl<M: Mmio> I2c<'_, M> {
    pub fn state(&self) -> SessionState {
        self.hw.i2c.state()
    }

    /// Claim the pins and enable the controller.
    ///
    /// Everything is validated before the first register write. Fails
    /// with [`Error::AlreadyInitialised`] while a session is active; a
    /// closed session may be set up again.
    pub fn setup(&mut self, config: I2cConfig) -> Result<()> {
        self.hw.ensure_open()?;

        if self.hw.i2c.is_active() {
            debug!("i2c setup called twice");
            return Err(Error::AlreadyInitialised("i2c"));
        }

        let pins = config.pins.unwrap_or(self.hw.rev.i2c_pins());
        self.hw.rev.check_pin(pins.0)?;
        self.hw.rev.check_pin(pins.1)?;
        let block = bus_block(pins)?;
        let divisor = clock_divisor(config.clock_hz)?;

        let hw = &mut *self.hw;
        // The board has external pull-ups on both lines.
        for pin in [pins.0, pins.1] {
            latch_pull(&mut hw.regs, &hw.timer, pin, Pull::Off);
            write_function(&mut hw.regs, pin, Function::Alt0);
        }

        hw.regs.write(block, bsc::DIV, divisor);
        hw.regs
            .write(block, bsc::C, (Control::I2CEN | Control::CLEAR).bits());
        hw.regs.write(block, bsc::S, Status::CLEAR_ALL.bits());

        hw.i2c = Session::Active(I2cSession {
            block,
            pins,
            clock_hz: config.clock_hz,
            address: None,
            timeout: config.timeout,
        });

        info!(
            "i2c up on {block:?}, sda {} scl {} at {} Hz",
            pins.0, pins.1, config.clock_hz
        );
        Ok(())
    }

    /// Abort any transfer, disable the controller and return the pins to
    /// inputs.
    pub fn cleanup(&mut self) -> Result<()> {
        let session = *self.session()?;
        let hw = &mut *self.hw;

        abort(&mut hw.regs, session.block);
        write_function(&mut hw.regs, session.pins.0, Function::Input);
        write_function(&mut hw.regs, session.pins.1, Function::Input);

        hw.i2c = Session::Closed;
        info!("i2c on {:?} closed", session.block);
        Ok(())
    }

    pub fn set_clock_freq(&mut self, hz: u32) -> Result<()> {
        let block = self.session()?.block;
        let divisor = clock_divisor(hz)?;

        trace!("{block:?} cdiv {divisor}");
        self.hw.regs.write(block, bsc::DIV, divisor);
        if let Some(session) = self.hw.i2c.active_mut() {
            session.clock_hz = hz;
        }
        Ok(())
    }

    pub fn set_7bit_slave(&mut self, address: u8) -> Result<()> {
        let block = self.session()?.block;

        if address > bsc::ADDRESS_MAX {
            debug!("slave address {address:#x} does not fit 7 bits");
            return Err(Error::range("i2c slave address", address, 0u8, bsc::ADDRESS_MAX));
        }

        self.hw.regs.write(block, bsc::A, u32::from(address));
        if let Some(session) = self.hw.i2c.active_mut() {
            session.address = Some(address);
        }
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let session = self.transfer_session(data.len())?;
        let block = session.block;
        let byte_time = byte_time_us(session.clock_hz);

        let hw = &mut *self.hw;
        let regs = &mut hw.regs;
        begin_transfer(regs, block, false, data.len());

        let mut sent = 0;
        let finished = hw.timer.poll_until(session.timeout, || {
            while sent < data.len() && status(regs, block).contains(Status::TXD) {
                regs.write(block, bsc::FIFO, u32::from(data[sent]));
                sent += 1;
            }

            if status(regs, block).contains(Status::DONE) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(poll_interval(byte_time, data.len() - sent))
            }
        });

        trace!("{block:?} wrote {sent}/{} bytes", data.len());
        finish(regs, block, finished, data.len() - sent)
    }

    pub fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let session = self.transfer_session(len)?;
        let block = session.block;
        let byte_time = byte_time_us(session.clock_hz);

        let hw = &mut *self.hw;
        let regs = &mut hw.regs;
        begin_transfer(regs, block, true, len);

        let mut received = Vec::with_capacity(len);
        let drain = |regs: &mut M, received: &mut Vec<u8>| {
            while received.len() < len && status(regs, block).contains(Status::RXD) {
                received.push(regs.read(block, bsc::FIFO) as u8);
            }
        };

        let finished = hw.timer.poll_until(session.timeout, || {
            drain(regs, &mut received);

            if status(regs, block).contains(Status::DONE) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(poll_interval(byte_time, len - received.len()))
            }
        });

        // Bytes can land in the FIFO between the last drain and DONE.
        drain(regs, &mut received);

        trace!("{block:?} read {}/{len} bytes", received.len());
        finish(regs, block, finished, len - received.len())?;
        Ok(received)
    }

    /// Write `data`, then read `len` bytes, as two transfers.
    pub fn write_read(&mut self, data: &[u8], len: usize) -> Result<Vec<u8>> {
        self.write(data)?;
        self.read(len)
    }

    fn session(&self) -> Result<&I2cSession> {
        self.hw.i2c.active().ok_or_else(|| {
            debug!("i2c used without setup");
            Error::NotInitialised("i2c")
        })
    }

    fn transfer_session(&self, len: usize) -> Result<I2cSession> {
        let session = *self.session()?;

        if len > bsc::DLEN_MAX {
            debug!("transfer of {len} bytes exceeds dlen");
            return Err(Error::range(
                "i2c transfer length",
                len as u64,
                0u64,
                bsc::DLEN_MAX as u64,
            ));
        }

        if session.address.is_none() {
            debug!("i2c transfer without a slave address");
            return Err(Error::Missing("i2c slave address"));
        }

        Ok(session)
    }
}

// ============================================================================
// HAL Implementation
// ============================================================================

impl<M: Mmio> I2cMaster for I2c<'_, M> {
    type Error = Error;

    fn set_clock_freq(&mut self, hz: u32) -> Result<()> {
        I2c::set_clock_freq(self, hz)
    }

    fn set_7bit_slave(&mut self, address: u8) -> Result<()> {
        I2c::set_7bit_slave(self, address)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        I2c::write(self, data)
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        I2c::read(self, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PcbRev;
    use crate::mmio::MockMmio;
    use crate::mmio::mock::{DeviceBehavior, MockI2cDevice};

    fn handle(rev: PcbRev) -> Bcm2835<MockMmio> {
        Bcm2835::with_registers(MockMmio::new(), rev)
    }

    fn ready(rev: PcbRev) -> Bcm2835<MockMmio> {
        let mut hw = handle(rev);
        hw.i2c().setup(I2cConfig::default()).unwrap();
        hw.i2c().set_7bit_slave(0x50).unwrap();
        hw
    }

    #[test]
    fn divisor_for_standard_rates() {
        assert_eq!(clock_divisor(100_000).unwrap(), 2500);
        assert_eq!(clock_divisor(10_000).unwrap(), 25_000);
        assert_eq!(clock_divisor(400_000).unwrap(), 624);
    }

    #[test]
    fn divisor_rejects_out_of_range_rates() {
        for hz in [0, 1, I2C_CLOCK_FREQ_MIN - 1, I2C_CLOCK_FREQ_MAX + 1, u32::MAX] {
            let err = clock_divisor(hz).unwrap_err();
            assert_eq!(err.status(), common::Status::Range);
        }
    }

    #[test]
    fn divisor_is_the_closest_even_value_not_below_the_rate() {
        for hz in (I2C_CLOCK_FREQ_MIN..=I2C_CLOCK_FREQ_MAX).step_by(997) {
            let divisor = clock_divisor(hz).unwrap();
            assert_eq!(divisor % 2, 0);
            assert!(CORE_CLK_HZ / divisor >= hz, "{hz} Hz -> {divisor}");
            assert!(CORE_CLK_HZ / (divisor + 2) < hz, "{hz} Hz -> {divisor}");
        }
    }

    #[test]
    fn setup_on_rev2_drives_bsc1() {
        let mut hw = handle(PcbRev::Rev2);

        hw.i2c().setup(I2cConfig::default()).unwrap();

        let regs = hw.registers();
        assert_eq!(regs.peek(Block::Bsc1, bsc::DIV), 2500);
        assert_eq!(regs.peek(Block::Bsc1, bsc::C), Control::I2CEN.bits());
        assert!(regs.writes_to(Block::Bsc0).is_empty());
        assert_eq!(hw.function(2).unwrap(), Function::Alt0);
        assert_eq!(hw.function(3).unwrap(), Function::Alt0);
        assert_eq!(hw.i2c().state(), SessionState::Active);
    }

    #[test]
    fn setup_on_rev1_drives_bsc0() {
        let mut hw = handle(PcbRev::Rev1);

        hw.i2c().setup(I2cConfig::default()).unwrap();

        assert_eq!(hw.registers().peek(Block::Bsc0, bsc::DIV), 2500);
        assert!(hw.registers().writes_to(Block::Bsc1).is_empty());
    }

    #[test]
    fn setup_validates_before_writing() {
        let mut hw = handle(PcbRev::Rev2);

        let rev1_pins = I2cConfig {
            pins: Some((0, 1)),
            ..I2cConfig::default()
        };
        assert!(matches!(hw.i2c().setup(rev1_pins), Err(Error::InvalidPin(0))));

        let not_a_pair = I2cConfig {
            pins: Some((4, 7)),
            ..I2cConfig::default()
        };
        assert!(matches!(hw.i2c().setup(not_a_pair), Err(Error::InvalidPin(4))));

        let too_fast = I2cConfig {
            clock_hz: 1_000_000,
            ..I2cConfig::default()
        };
        assert!(matches!(hw.i2c().setup(too_fast), Err(Error::Range { .. })));

        assert!(hw.registers().accesses().is_empty());
        assert_eq!(hw.i2c().state(), SessionState::Uninitialised);
    }

    #[test]
    fn setup_twice_fails_but_setup_after_cleanup_works() {
        let mut hw = handle(PcbRev::Rev2);
        let mut i2c = hw.i2c();

        i2c.setup(I2cConfig::default()).unwrap();
        assert!(matches!(
            i2c.setup(I2cConfig::default()),
            Err(Error::AlreadyInitialised("i2c"))
        ));

        i2c.cleanup().unwrap();
        assert_eq!(i2c.state(), SessionState::Closed);
        i2c.setup(I2cConfig::default()).unwrap();
    }

    #[test]
    fn cleanup_restores_inputs_and_disables_the_controller() {
        let mut hw = ready(PcbRev::Rev2);

        hw.i2c().cleanup().unwrap();

        assert_eq!(hw.function(2).unwrap(), Function::Input);
        assert_eq!(hw.function(3).unwrap(), Function::Input);
        assert_eq!(hw.registers().peek(Block::Bsc1, bsc::C), 0);
        assert!(matches!(hw.i2c().cleanup(), Err(Error::NotInitialised("i2c"))));
    }

    #[test]
    fn transfers_outside_a_session_touch_no_register() {
        let mut hw = handle(PcbRev::Rev2);

        assert!(matches!(hw.i2c().read(1), Err(Error::NotInitialised("i2c"))));
        assert!(matches!(hw.i2c().write(&[1]), Err(Error::NotInitialised("i2c"))));
        assert!(hw.i2c().set_clock_freq(100_000).is_err());
        assert!(hw.i2c().set_7bit_slave(0x20).is_err());
        assert!(hw.registers().accesses().is_empty());

        hw.i2c().setup(I2cConfig::default()).unwrap();
        hw.i2c().cleanup().unwrap();
        hw.registers_mut().clear_log();

        assert!(matches!(hw.i2c().read(1), Err(Error::NotInitialised("i2c"))));
        assert!(hw.registers().accesses().is_empty());
    }

    #[test]
    fn slave_address_must_fit_seven_bits() {
        let mut hw = ready(PcbRev::Rev2);

        let err = hw.i2c().set_7bit_slave(0x80).unwrap_err();
        assert_eq!(err.status(), common::Status::Range);
        assert_eq!(hw.registers().peek(Block::Bsc1, bsc::A), 0x50);
    }

    #[test]
    fn transfer_without_slave_address_is_missing() {
        let mut hw = handle(PcbRev::Rev2);
        hw.i2c().setup(I2cConfig::default()).unwrap();

        let err = hw.i2c().write(&[0]).unwrap_err();
        assert_eq!(err.status(), common::Status::Null);
    }

    #[test]
    fn oversized_transfer_is_a_range_error() {
        let mut hw = ready(PcbRev::Rev2);

        let err = hw.i2c().read(bsc::DLEN_MAX + 1).unwrap_err();
        assert_eq!(err.status(), common::Status::Range);
    }

    #[test]
    fn write_then_read_an_eeprom() {
        let mut hw = ready(PcbRev::Rev2);
        let eeprom = MockI2cDevice::new().with_response(&[0xDE, 0xAD, 0xBE, 0xEF]);
        hw.registers_mut().attach_i2c_device(Block::Bsc1, 0x50, eeprom);

        let data = hw.i2c().write_read(&[0x00, 0x10], 4).unwrap();

        assert_eq!(data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let eeprom = hw.registers().i2c_device(Block::Bsc1, 0x50).unwrap();
        assert_eq!(eeprom.received, vec![0x00, 0x10]);
        assert_eq!(hw.registers().peek(Block::Bsc1, bsc::DLEN), 4);
    }

    #[test]
    fn long_write_goes_through_the_fifo() {
        let mut hw = ready(PcbRev::Rev2);
        hw.registers_mut()
            .attach_i2c_device(Block::Bsc1, 0x50, MockI2cDevice::new());
        let payload: Vec<u8> = (0..40).collect();

        hw.i2c().write(&payload).unwrap();

        let device = hw.registers().i2c_device(Block::Bsc1, 0x50).unwrap();
        assert_eq!(device.received, payload);
    }

    #[test]
    fn absent_slave_nacks_and_flags_are_cleared() {
        let mut hw = ready(PcbRev::Rev2);

        assert!(matches!(hw.i2c().write(&[0x00]), Err(Error::I2cNack)));
        assert!(matches!(hw.i2c().read(1), Err(Error::I2cNack)));

        let status = status(hw.registers(), Block::Bsc1);
        assert!(!status.intersects(Status::CLEAR_ALL));
    }

    #[test]
    fn transfer_cut_short_reports_the_outstanding_bytes() {
        let mut hw = ready(PcbRev::Rev2);
        let device = MockI2cDevice::new()
            .with_response(&[0xA0, 0xA1])
            .with_behavior(DeviceBehavior::StopAfter(1));
        hw.registers_mut().attach_i2c_device(Block::Bsc1, 0x50, device);

        let err = hw.i2c().write(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::I2cIncomplete { remaining: 2 }));
        assert_eq!(err.status(), common::Status::I2c);
        let device = hw.registers().i2c_device(Block::Bsc1, 0x50).unwrap();
        assert_eq!(device.received, vec![1]);
        assert!(!status(hw.registers(), Block::Bsc1).intersects(Status::CLEAR_ALL));

        let err = hw.i2c().read(4).unwrap_err();
        assert!(matches!(err, Error::I2cIncomplete { remaining: 3 }));
        assert!(!status(hw.registers(), Block::Bsc1).intersects(Status::CLEAR_ALL));
    }

    #[test]
    fn clock_stretching_slave_is_reported() {
        let mut hw = ready(PcbRev::Rev2);
        let device = MockI2cDevice::new().with_behavior(DeviceBehavior::ClockStretch);
        hw.registers_mut().attach_i2c_device(Block::Bsc1, 0x50, device);

        let err = hw.i2c().read(2).unwrap_err();
        assert!(matches!(err, Error::I2cClockStretch));
        assert!(err.is_retryable());
    }

    #[test]
    fn hung_transfer_times_out_and_the_bus_recovers() {
        let mut hw = handle(PcbRev::Rev2);
        let config = I2cConfig {
            timeout: Duration::from_millis(5),
            ..I2cConfig::default()
        };
        hw.i2c().setup(config).unwrap();
        hw.i2c().set_7bit_slave(0x20).unwrap();
        let stuck = MockI2cDevice::new().with_behavior(DeviceBehavior::Hang);
        hw.registers_mut().attach_i2c_device(Block::Bsc1, 0x20, stuck);
        hw.registers_mut()
            .attach_i2c_device(Block::Bsc1, 0x21, MockI2cDevice::new().with_response(&[7]));

        assert!(matches!(hw.i2c().write(&[1, 2]), Err(Error::I2cTimeout)));
        assert_eq!(hw.registers().peek(Block::Bsc1, bsc::C), Control::I2CEN.bits());

        hw.i2c().set_7bit_slave(0x21).unwrap();
        assert_eq!(hw.i2c().read(1).unwrap(), vec![7]);
    }

    #[test]
    fn clock_can_be_changed_mid_session() {
        let mut hw = ready(PcbRev::Rev2);

        hw.i2c().set_clock_freq(400_000).unwrap();
        assert_eq!(hw.registers().peek(Block::Bsc1, bsc::DIV), 624);

        assert!(hw.i2c().set_clock_freq(5_000).is_err());
        assert_eq!(hw.registers().peek(Block::Bsc1, bsc::DIV), 624);
    }
}

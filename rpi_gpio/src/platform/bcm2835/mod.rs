//! BCM2835 peripheral drivers.
//!
//! [`Bcm2835`] owns the register mapping for the lifetime of a setup /
//! cleanup pair. GPIO operations are methods on the handle itself; the I2C
//! master and the two PWM channels are reached through short-lived views
//! ([`Bcm2835::i2c`], [`Bcm2835::pwm`]) that borrow it mutably, so only one
//! peripheral can be driven at a time.

pub mod clock;
pub mod gpio;
pub mod i2c;
pub mod pwm;

use std::path::PathBuf;

use common::{Error, Result};
use log::{debug, info, warn};

use crate::board::{self, PcbRev};
use crate::hal::timer::MonotonicTimer;
use crate::mmio::{DevMem, Mmio, MockMmio};

use self::i2c::I2cSession;
use self::pwm::{Channel, PwmSession};

/// Where [`Bcm2835::setup`] looks for the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConfig {
    /// Physical memory device.
    pub dev_mem: PathBuf,
    /// Primary source of the board revision code.
    pub cpuinfo: PathBuf,
    /// Fallback source of the board revision code.
    pub device_tree_revision: PathBuf,
    /// Skip detection and assume this layout.
    pub revision: Option<PcbRev>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            dev_mem: PathBuf::from("/dev/mem"),
            cpuinfo: PathBuf::from("/proc/cpuinfo"),
            device_tree_revision: PathBuf::from("/proc/device-tree/system/linux,revision"),
            revision: None,
        }
    }
}

/// Lifecycle of a peripheral session as seen by callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Setup has not been called.
    Uninitialised,
    /// Setup succeeded and cleanup has not been called.
    Active,
    /// Cleanup has been called. Setup may be called again.
    Closed,
}

/// Per-peripheral session slot.
#[derive(Debug)]
enum Session<S> {
    Uninitialised,
    Active(S),
    Closed,
}

impl<S> Session<S> {
    fn state(&self) -> SessionState {
        match self {
            Session::Uninitialised => SessionState::Uninitialised,
            Session::Active(_) => SessionState::Active,
            Session::Closed => SessionState::Closed,
        }
    }

    fn active(&self) -> Option<&S> {
        match self {
            Session::Active(session) => Some(session),
            _ => None,
        }
    }

    fn active_mut(&mut self) -> Option<&mut S> {
        match self {
            Session::Active(session) => Some(session),
            _ => None,
        }
    }

    fn is_active(&self) -> bool {
        matches!(self, Session::Active(_))
    }
}

/// Handle to the BCM2835 GPIO, BSC and PWM peripherals.
///
/// Generic over the register backend so the drivers can run against
/// [`crate::mmio::MockMmio`]. Dropping the handle runs [`Bcm2835::cleanup`].
#[derive(Debug)]
pub struct Bcm2835<M: Mmio = DevMem> {
    regs: M,
    timer: MonotonicTimer,
    rev: PcbRev,
    open: bool,
    i2c: Session<I2cSession>,
    pwm: [Session<PwmSession>; Channel::COUNT],
    /// Divisor of the PWM clock while the generator runs.
    pwm_clock: Option<u32>,
}

impl Bcm2835<DevMem> {
    /// Detect the board and map the peripheral registers.
    ///
    /// Detection runs first, so an unsupported board is reported without
    /// touching `/dev/mem`. Fails with [`Error::AlreadyInitialised`] while
    /// another handle is alive in this process.
    pub fn setup(config: SetupConfig) -> Result<Self> {
        let rev = match config.revision {
            Some(rev) => rev,
            None => board::detect(&config.cpuinfo, &config.device_tree_revision)?,
        };

        let regs = DevMem::open(&config.dev_mem)?;
        info!("mapped bcm2835 peripherals for {rev:?} board");

        Ok(Self::with_registers(regs, rev))
    }
}

impl<M: Mmio> Bcm2835<M> {
    /// Build a handle over an already prepared register backend.
    pub fn with_registers(regs: M, rev: PcbRev) -> Self {
        Self {
            regs,
            timer: MonotonicTimer::new(),
            rev,
            open: true,
            i2c: Session::Uninitialised,
            pwm: [Session::Uninitialised, Session::Uninitialised],
            pwm_clock: None,
        }
    }

    /// Board layout this handle validates pins against.
    pub fn revision(&self) -> PcbRev {
        self.rev
    }

    /// False once [`Bcm2835::cleanup`] has run.
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn registers(&self) -> &M {
        &self.regs
    }

    /// Stop every active peripheral session and release the mapping.
    ///
    /// Teardown continues past failures and the first one is returned.
    /// Calling this again is a no-op that returns `Ok`; every other
    /// operation reports [`Error::NotInitialised`] afterwards.
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.open {
            debug!("cleanup called on a closed handle");
            return Ok(());
        }

        let mut first_error = None;

        if self.i2c.is_active() {
            if let Err(err) = self.i2c().cleanup() {
                first_error.get_or_insert(err);
            }
        }

        for channel in Channel::ALL {
            if self.pwm[channel.index()].is_active() {
                if let Err(err) = self.pwm(channel).cleanup() {
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Err(err) = self.regs.release() {
            first_error.get_or_insert(err);
        }

        self.open = false;
        info!("bcm2835 peripherals released");

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            debug!("handle used after cleanup");
            Err(Error::NotInitialised("gpio"))
        }
    }
}

impl Bcm2835<MockMmio> {
    /// Simulated register file, for attaching devices and driving inputs.
    pub fn registers_mut(&mut self) -> &mut MockMmio {
        &mut self.regs
    }
}

impl<M: Mmio> Drop for Bcm2835<M> {
    fn drop(&mut self) {
        if let Err(err) = self.cleanup() {
            warn!("cleanup on drop failed: {err}");
        }
    }
}

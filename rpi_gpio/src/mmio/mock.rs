//! Register-level mock of the peripheral blocks.
//!
//! [`MockMmio`] stores every register in a plain map and layers just enough
//! behaviour on top for the drivers to be exercised end to end:
//!
//! - GPSETn / GPCLRn drive the matching GPLEVn bits;
//! - each BSC block runs a simulated bus with attachable [`MockI2cDevice`]s;
//! - CM_PWMCTL reports BUSY while the generator is enabled, or always
//!   once [`MockMmio::hold_clock_busy`] jams it.
//!
//! Every access is recorded so tests can assert on exact register
//! sequences, or on the absence of any access at all.

use core::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use super::{Block, Mmio};
use crate::hal::gpio::PinState;
use crate::hw::bcm2835::{bsc, clock, gpio};

/// One recorded register access.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    Read { block: Block, offset: usize },
    Write { block: Block, offset: usize, value: u32 },
}

/// How a simulated slave reacts when addressed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum DeviceBehavior {
    /// Acknowledge and transfer normally.
    #[default]
    Ack,
    /// Never acknowledge the address.
    Nack,
    /// Hold SCL past the controller's stretch limit.
    ClockStretch,
    /// Leave the transfer active forever.
    Hang,
    /// Acknowledge, then end the transfer after this many data bytes.
    StopAfter(usize),
}

/// A simulated I2C slave.
#[derive(Debug, Clone, Default)]
pub struct MockI2cDevice {
    /// Bytes returned to reads, front first. Exhausted reads return 0xFF.
    pub response: VecDeque<u8>,
    /// Every byte written to the device.
    pub received: Vec<u8>,
    pub behavior: DeviceBehavior,
}

impl MockI2cDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, bytes: &[u8]) -> Self {
        self.response.extend(bytes);
        self
    }

    pub fn with_behavior(mut self, behavior: DeviceBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

#[derive(Debug, Default)]
struct BusState {
    rx: VecDeque<u8>,
    writing_to: Option<u8>,
    expected: usize,
    written: usize,
    active: bool,
    done: bool,
    nack: bool,
    clock_stretch: bool,
}

#[derive(Debug, Default)]
struct State {
    regs: HashMap<(Block, usize), u32>,
    log: Vec<Access>,
    devices: HashMap<(Block, u8), MockI2cDevice>,
    bsc0: BusState,
    bsc1: BusState,
    clock_stuck: bool,
    released: bool,
}

impl State {
    fn reg(&self, block: Block, offset: usize) -> u32 {
        self.regs.get(&(block, offset)).copied().unwrap_or(0)
    }

    fn bus(&mut self, block: Block) -> &mut BusState {
        match block {
            Block::Bsc1 => &mut self.bsc1,
            _ => &mut self.bsc0,
        }
    }
}

/// In-memory stand-in for [`super::DevMem`].
#[derive(Debug, Default)]
pub struct MockMmio {
    state: RefCell<State>,
}

impl MockMmio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a simulated slave at `address` on the bus served by `block`.
    pub fn attach_i2c_device(&mut self, block: Block, address: u8, device: MockI2cDevice) {
        self.state
            .get_mut()
            .devices
            .insert((block, address), device);
    }

    /// Snapshot of an attached slave.
    pub fn i2c_device(&self, block: Block, address: u8) -> Option<MockI2cDevice> {
        self.state.borrow().devices.get(&(block, address)).cloned()
    }

    /// Drive an input pin from outside, as an external circuit would.
    pub fn drive_pin(&mut self, pin: u8, state: PinState) {
        let (word, bit) = gpio::bank_slot(pin);
        let regs = &mut self.state.get_mut().regs;
        let level = regs.entry((Block::Gpio, gpio::GPLEV0 + word)).or_insert(0);
        match state {
            PinState::High => *level |= bit,
            PinState::Low => *level &= !bit,
        }
    }

    /// Make CM_PWMCTL report BUSY whatever is written to it.
    pub fn hold_clock_busy(&mut self, stuck: bool) {
        self.state.get_mut().clock_stuck = stuck;
    }

    /// Register value without recording an access.
    pub fn peek(&self, block: Block, offset: usize) -> u32 {
        self.state.borrow().reg(block, offset)
    }

    /// Overwrite a register without recording an access or triggering
    /// any simulated behaviour.
    pub fn poke(&mut self, block: Block, offset: usize, value: u32) {
        self.state.get_mut().regs.insert((block, offset), value);
    }

    /// Every access since creation or the last [`MockMmio::clear_log`].
    pub fn accesses(&self) -> Vec<Access> {
        self.state.borrow().log.clone()
    }

    /// `(offset, value)` of every write to `block`, in order.
    pub fn writes_to(&self, block: Block) -> Vec<(usize, u32)> {
        self.state
            .borrow()
            .log
            .iter()
            .filter_map(|access| match *access {
                Access::Write {
                    block: b,
                    offset,
                    value,
                } if b == block => Some((offset, value)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.state.get_mut().log.clear();
    }

    /// True once [`Mmio::release`] has been called.
    pub fn is_released(&self) -> bool {
        self.state.borrow().released
    }
}

impl Mmio for MockMmio {
    fn read(&self, block: Block, offset: usize) -> u32 {
        let mut state = self.state.borrow_mut();
        state.log.push(Access::Read { block, offset });

        match (block, offset) {
            (Block::Bsc0 | Block::Bsc1, bsc::S) => bus_status(state.bus(block)),
            (Block::Bsc0 | Block::Bsc1, bsc::FIFO) => {
                state.bus(block).rx.pop_front().map_or(0, u32::from)
            }
            (Block::Clock, clock::CM_PWMCTL) if state.clock_stuck => {
                state.reg(block, offset) | clock::Control::BUSY.bits()
            }
            _ => state.reg(block, offset),
        }
    }

    fn write(&mut self, block: Block, offset: usize, value: u32) {
        let state = self.state.get_mut();
        state.log.push(Access::Write {
            block,
            offset,
            value,
        });

        match (block, offset) {
            (Block::Gpio, o) if (gpio::GPSET0..gpio::GPSET0 + 8).contains(&o) => {
                let level = gpio::GPLEV0 + (o - gpio::GPSET0);
                *state.regs.entry((block, level)).or_insert(0) |= value;
            }
            (Block::Gpio, o) if (gpio::GPCLR0..gpio::GPCLR0 + 8).contains(&o) => {
                let level = gpio::GPLEV0 + (o - gpio::GPCLR0);
                *state.regs.entry((block, level)).or_insert(0) &= !value;
            }
            (Block::Bsc0 | Block::Bsc1, bsc::C) => bus_control(state, block, value),
            (Block::Bsc0 | Block::Bsc1, bsc::S) => {
                let clear = bsc::Status::from_bits_truncate(value);
                let bus = state.bus(block);
                bus.done &= !clear.contains(bsc::Status::DONE);
                bus.nack &= !clear.contains(bsc::Status::ERR);
                bus.clock_stretch &= !clear.contains(bsc::Status::CLKT);
            }
            (Block::Bsc0 | Block::Bsc1, bsc::FIFO) => bus_fifo_write(state, block, value as u8),
            (Block::Clock, clock::CM_PWMCTL) => {
                // BUSY mirrors ENAB; the generator stops instantly.
                let mut stored = value & !clock::PASSWD & !clock::Control::BUSY.bits();
                if stored & clock::Control::ENAB.bits() != 0 {
                    stored |= clock::Control::BUSY.bits();
                }
                state.regs.insert((block, offset), stored);
            }
            (Block::Clock, _) => {
                state.regs.insert((block, offset), value & !clock::PASSWD);
            }
            _ => {
                state.regs.insert((block, offset), value);
            }
        }
    }

    fn release(&mut self) -> common::Result<()> {
        self.state.get_mut().released = true;
        Ok(())
    }
}

fn bus_status(bus: &BusState) -> u32 {
    let mut status = bsc::Status::empty();
    status.set(bsc::Status::TA, bus.active);
    status.set(bsc::Status::DONE, bus.done);
    status.set(bsc::Status::ERR, bus.nack);
    status.set(bsc::Status::CLKT, bus.clock_stretch);
    status.set(bsc::Status::RXD, !bus.rx.is_empty());
    status.set(bsc::Status::RXF, bus.rx.len() >= bsc::FIFO_SIZE);
    status.set(bsc::Status::TXD, bus.writing_to.is_some());
    status.set(bsc::Status::TXE, bus.writing_to.is_none() || bus.written == bus.expected);
    status.bits()
}

fn bus_control(state: &mut State, block: Block, value: u32) {
    let control = bsc::Control::from_bits_truncate(value);

    // ST and CLEAR are actions, not state.
    let stored = control.difference(bsc::Control::ST | bsc::Control::CLEAR);
    state.regs.insert((block, bsc::C), stored.bits());

    if control.contains(bsc::Control::CLEAR) {
        let bus = state.bus(block);
        bus.rx.clear();
        bus.written = 0;
    }

    if !control.contains(bsc::Control::I2CEN) {
        let bus = state.bus(block);
        bus.active = false;
        bus.writing_to = None;
        return;
    }

    if control.contains(bsc::Control::ST) {
        start_transfer(state, block, control.contains(bsc::Control::READ));
    }
}

fn start_transfer(state: &mut State, block: Block, read: bool) {
    let address = (state.reg(block, bsc::A) & u32::from(bsc::ADDRESS_MAX)) as u8;
    let length = (state.reg(block, bsc::DLEN) & bsc::DLEN_MAX as u32) as usize;
    let device = state.devices.get_mut(&(block, address));

    let behavior = device.as_ref().map(|device| device.behavior);
    // Bytes the slave takes part in before the transfer ends.
    let served = match behavior {
        Some(DeviceBehavior::StopAfter(limit)) => limit.min(length),
        _ => length,
    };

    let acked = matches!(behavior, Some(DeviceBehavior::Ack | DeviceBehavior::StopAfter(_)));
    let mut incoming = Vec::new();
    if let (Some(device), true, true) = (device, acked, read) {
        incoming = (0..served)
            .map(|_| device.response.pop_front().unwrap_or(0xFF))
            .collect();
    }

    let bus = state.bus(block);
    bus.done = false;
    bus.nack = false;
    bus.clock_stretch = false;
    bus.active = false;
    bus.writing_to = None;

    match behavior {
        None | Some(DeviceBehavior::Nack) => {
            bus.nack = true;
            bus.done = true;
        }
        Some(DeviceBehavior::ClockStretch) => {
            bus.clock_stretch = true;
            bus.done = true;
        }
        Some(DeviceBehavior::Hang) => bus.active = true,
        Some(DeviceBehavior::Ack | DeviceBehavior::StopAfter(_)) if read => {
            bus.rx.extend(incoming);
            bus.done = true;
        }
        Some(DeviceBehavior::Ack | DeviceBehavior::StopAfter(_)) => {
            bus.expected = served;
            bus.written = 0;
            if served == 0 {
                bus.done = true;
            } else {
                bus.active = true;
                bus.writing_to = Some(address);
            }
        }
    }
}

fn bus_fifo_write(state: &mut State, block: Block, byte: u8) {
    let Some(address) = state.bus(block).writing_to else {
        return;
    };

    if let Some(device) = state.devices.get_mut(&(block, address)) {
        device.received.push(byte);
    }

    let bus = state.bus(block);
    bus.written += 1;
    if bus.written == bus.expected {
        bus.writing_to = None;
        bus.active = false;
        bus.done = true;
    }
}

//! Whole-handle scenarios against the register mock.

use rpi_gpio::hw::bcm2835::bsc;
use rpi_gpio::mmio::mock::{MockI2cDevice, MockMmio};
use rpi_gpio::mmio::{Block, Mmio};
use rpi_gpio::{
    Bcm2835, Channel, CORE_CLK_HZ, Error, Function, I2cConfig, PcbRev, PinState, PwmConfig,
    PwmMode, PwmState, PwmSubMode, REV2_SCL, REV2_SDA, Resistor, SessionState, Status,
    err_to_string,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rev2() -> Bcm2835<MockMmio> {
    init_logger();
    Bcm2835::with_registers(MockMmio::new(), PcbRev::Rev2)
}

#[test]
fn rev2_eeprom_session() {
    let mut hw = rev2();
    hw.registers_mut().attach_i2c_device(
        Block::Bsc1,
        0x50,
        MockI2cDevice::new().with_response(&[0xA5]),
    );

    assert_eq!(hw.i2c_pins().unwrap(), (REV2_SDA, REV2_SCL));

    let mut i2c = hw.i2c();
    i2c.setup(I2cConfig::default()).unwrap();
    i2c.set_clock_freq(100_000).unwrap();
    i2c.set_7bit_slave(0x50).unwrap();
    i2c.write(&[0x00]).unwrap();
    let data = i2c.read(1).unwrap();

    assert_eq!(data, vec![0xA5]);
    let divisor = hw.registers().peek(Block::Bsc1, bsc::DIV);
    assert_eq!(divisor, CORE_CLK_HZ / 100_000);

    hw.cleanup().unwrap();
    hw.cleanup().unwrap();
}

#[test]
fn rev2_session_without_a_device_reports_a_transfer_error() {
    let mut hw = rev2();
    let mut i2c = hw.i2c();
    i2c.setup(I2cConfig::default()).unwrap();
    i2c.set_7bit_slave(0x50).unwrap();

    let err = i2c.write(&[0x00]).unwrap_err();
    assert!(matches!(err, Error::I2cNack));
    assert!(err.is_retryable());
    assert_eq!(err_to_string(err.status().code()), Status::I2cNack.as_str());

    let err = i2c.read(1).unwrap_err();
    assert_eq!(err.status(), Status::I2cNack);
}

#[test]
fn gpio_output_round_trip_with_pull_up() {
    let mut hw = rev2();

    hw.set_pull_resistor(4, Resistor::PullUp).unwrap();
    hw.set_function(4, Function::Output).unwrap();

    for state in [PinState::High, PinState::Low, PinState::High] {
        hw.set_pin(4, state).unwrap();
        assert_eq!(hw.read_pin(4).unwrap(), state);
    }
}

#[test]
fn invalid_pins_never_reach_the_registers() {
    let mut hw = rev2();

    for pin in [0, 1, 5, 21, 28, 53, 54, 255] {
        assert!(matches!(
            hw.set_function(pin, Function::Output),
            Err(Error::InvalidPin(p)) if p == pin
        ));
        assert_eq!(
            hw.set_pin(pin, PinState::High).unwrap_err().status(),
            Status::InvalidPinNumber
        );
        assert!(hw.set_pull_resistor(pin, Resistor::PullDown).is_err());
    }

    let writes: usize = Block::ALL
        .iter()
        .map(|&block| hw.registers().writes_to(block).len())
        .sum();
    assert_eq!(writes, 0);
}

#[test]
fn i2c_read_before_setup_is_a_usage_error() {
    let mut hw = rev2();

    let err = hw.i2c().read(1).unwrap_err();

    assert_eq!(err.status(), Status::NotInitialised);
    assert!(!err.is_retryable());
    assert!(hw.registers().accesses().is_empty());
    assert_eq!(hw.i2c().state(), SessionState::Uninitialised);
}

#[test]
fn pwm_mark_space_on_gpio18() {
    let mut hw = rev2();
    let mut pwm = hw.pwm(Channel::One);

    pwm.setup(PwmConfig::default()).unwrap();
    pwm.set_modes(PwmMode::Pwm, PwmSubMode::MarkSpace).unwrap();
    pwm.set_clock_freq(1_000_000).unwrap();
    pwm.set_range(1000).unwrap();
    pwm.set_data(250).unwrap();
    pwm.enable(true).unwrap();
    assert_eq!(pwm.state(), PwmState::Enabled);

    assert_eq!(hw.function(18).unwrap(), Function::Alt5);

    // Handle cleanup tears the channel down too.
    hw.cleanup().unwrap();
    assert_eq!(hw.registers().peek(Block::Pwm, 0), 0);
    assert_eq!(hw.function(18).unwrap_err().status(), Status::NotInitialised);
}

#[test]
fn drop_releases_the_backend() {
    struct Flagged<'a>(&'a mut bool);

    impl Mmio for Flagged<'_> {
        fn read(&self, _: Block, _: usize) -> u32 {
            0
        }

        fn write(&mut self, _: Block, _: usize, _: u32) {}

        fn release(&mut self) -> rpi_gpio::Result<()> {
            *self.0 = true;
            Ok(())
        }
    }

    init_logger();
    let mut released = false;
    drop(Bcm2835::with_registers(Flagged(&mut released), PcbRev::Rev1));
    assert!(released);
}

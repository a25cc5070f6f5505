//! I2C master Hardware Abstraction Layer.

/// Blocking I2C master addressing one 7-bit slave at a time.
pub trait I2cMaster {
    /// Error type for bus operations.
    type Error: core::fmt::Debug;

    /// Program the SCL frequency in Hz.
    fn set_clock_freq(&mut self, hz: u32) -> Result<(), Self::Error>;

    /// Select the slave addressed by subsequent transfers.
    fn set_7bit_slave(&mut self, address: u8) -> Result<(), Self::Error>;

    /// Write `data` to the selected slave.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read `len` bytes from the selected slave.
    fn read(&mut self, len: usize) -> Result<Vec<u8>, Self::Error>;

    /// Write `data`, then read `len` bytes back.
    ///
    /// The two transfers are separate; a stop condition is sent between
    /// them.
    fn write_read(&mut self, data: &[u8], len: usize) -> Result<Vec<u8>, Self::Error> {
        self.write(data)?;
        self.read(len)
    }
}

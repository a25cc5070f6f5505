//! Error reporting.
//!
//! Every fallible driver operation returns [`Result`]. The [`Error`] carried
//! in it holds the details useful for diagnostics, while [`Status`] is the
//! closed set of stable numeric codes callers can store, compare, or hand to
//! [`err_to_string`].
//!
//! # Categories
//!
//! | Category               | Codes                                                   |
//! |------------------------|---------------------------------------------------------|
//! | usage                  | `InvalidPinNumber`, `Range`, `Null`, `NotInitialised`,  |
//! |                        | `AlreadyInitialised`, `PinNotOutput`                    |
//! | resource               | `External`                                              |
//! | transient hardware     | `I2cNack`, `I2cClkTimeout`, `I2c`, `I2cTimeout`         |
//! | revision detection     | `PcbRev`                                                |
//! | unclassified           | `Default` (clock generator stuck busy)                  |

use core::fmt;
use std::io;

use thiserror::Error;

/// Numeric status codes.
///
/// The discriminants are stable. `Max` is a sentinel one past the last real
/// code and is never produced by an operation.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// No error.
    Ok = 0,
    /// Unclassified failure.
    Default = 1,
    /// Pin is not available on the detected board revision.
    InvalidPinNumber = 2,
    /// Argument outside its permitted range.
    Range = 3,
    /// A required value was absent.
    Null = 4,
    /// The operating system refused a request (open, mmap, read).
    External = 5,
    /// Operation invoked before setup or after cleanup.
    NotInitialised = 6,
    /// Setup invoked twice.
    AlreadyInitialised = 7,
    /// Slave did not acknowledge.
    I2cNack = 8,
    /// Slave held SCL low longer than the controller allows.
    I2cClkTimeout = 9,
    /// Transfer finished with bytes outstanding.
    I2c = 10,
    /// Transfer did not finish within the poll timeout.
    I2cTimeout = 11,
    /// Level written to a pin that is not configured as an output.
    PinNotOutput = 12,
    /// Board revision could not be determined.
    PcbRev = 13,
    /// Sentinel.
    Max = 14,
}

impl Status {
    const ALL: [Status; 15] = [
        Status::Ok,
        Status::Default,
        Status::InvalidPinNumber,
        Status::Range,
        Status::Null,
        Status::External,
        Status::NotInitialised,
        Status::AlreadyInitialised,
        Status::I2cNack,
        Status::I2cClkTimeout,
        Status::I2c,
        Status::I2cTimeout,
        Status::PinNotOutput,
        Status::PcbRev,
        Status::Max,
    ];

    /// Look up the status for a raw code. Returns `None` outside `0..=Max`.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// The raw numeric code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Fixed human-readable description.
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "no error",
            Status::Default => "unspecified error",
            Status::InvalidPinNumber => "invalid pin number",
            Status::Range => "value out of range",
            Status::Null => "required value missing",
            Status::External => "operating system call failed",
            Status::NotInitialised => "not initialised",
            Status::AlreadyInitialised => "already initialised",
            Status::I2cNack => "i2c slave did not acknowledge",
            Status::I2cClkTimeout => "i2c clock stretch timeout",
            Status::I2c => "i2c transfer incomplete",
            Status::I2cTimeout => "i2c transfer timed out",
            Status::PinNotOutput => "pin is not configured as an output",
            Status::PcbRev => "board revision could not be determined",
            Status::Max => "error code sentinel",
        }
    }

    /// True for failures a caller may retry: transient bus conditions.
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Status::I2cNack | Status::I2cClkTimeout | Status::I2c | Status::I2cTimeout
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render any raw status code.
///
/// Every code in `0..=Status::Max` has a fixed string; anything else renders
/// as `"unknown error"`.
pub fn err_to_string(code: i32) -> &'static str {
    Status::from_code(code).map_or("unknown error", Status::as_str)
}

/// Errors returned by driver operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("gpio {0} is not available on this board revision")]
    InvalidPin(u8),

    #[error("{what} {value} is outside {min}..={max}")]
    Range {
        what: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("{0} was not provided")]
    Missing(&'static str),

    #[error("{context}: {source}")]
    External {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{0} is not initialised")]
    NotInitialised(&'static str),

    #[error("{0} is already initialised")]
    AlreadyInitialised(&'static str),

    #[error("i2c slave did not acknowledge")]
    I2cNack,

    #[error("i2c clock stretch timeout")]
    I2cClockStretch,

    #[error("i2c transfer finished with {remaining} bytes outstanding")]
    I2cIncomplete { remaining: usize },

    #[error("i2c transfer did not complete in time")]
    I2cTimeout,

    #[error("gpio {0} is not configured as an output")]
    PinNotOutput(u8),

    #[error("board revision could not be determined: {0}")]
    PcbRevision(String),

    #[error("{0} clock generator did not stop")]
    ClockBusy(&'static str),
}

impl Error {
    /// Shorthand for a [`Error::Range`] over unsigned values.
    pub fn range(
        what: &'static str,
        value: impl Into<u64>,
        min: impl Into<u64>,
        max: impl Into<u64>,
    ) -> Self {
        Error::Range {
            what,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        }
    }

    /// The status code this error reports as.
    pub fn status(&self) -> Status {
        match self {
            Error::InvalidPin(_) => Status::InvalidPinNumber,
            Error::Range { .. } => Status::Range,
            Error::Missing(_) => Status::Null,
            Error::External { .. } => Status::External,
            Error::NotInitialised(_) => Status::NotInitialised,
            Error::AlreadyInitialised(_) => Status::AlreadyInitialised,
            Error::I2cNack => Status::I2cNack,
            Error::I2cClockStretch => Status::I2cClkTimeout,
            Error::I2cIncomplete { .. } => Status::I2c,
            Error::I2cTimeout => Status::I2cTimeout,
            Error::PinNotOutput(_) => Status::PinNotOutput,
            Error::PcbRevision(_) => Status::PcbRev,
            Error::ClockBusy(_) => Status::Default,
        }
    }

    /// See [`Status::is_retryable`].
    pub fn is_retryable(&self) -> bool {
        self.status().is_retryable()
    }
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        err.status()
    }
}

/// Result alias used throughout the drivers.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_renders_a_distinct_string() {
        let mut seen = std::collections::HashSet::new();
        for code in 0..=Status::Max.code() {
            let s = err_to_string(code);
            assert!(!s.is_empty());
            assert_ne!(s, "unknown error");
            assert!(seen.insert(s), "duplicate string for code {code}");
        }
    }

    #[test]
    fn codes_outside_the_enumeration_are_unknown() {
        assert_eq!(err_to_string(-1), "unknown error");
        assert_eq!(err_to_string(Status::Max.code() + 1), "unknown error");
        assert_eq!(err_to_string(i32::MAX), "unknown error");
        assert_eq!(err_to_string(i32::MIN), "unknown error");
    }

    #[test]
    fn from_code_matches_discriminants() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
    }

    #[test]
    fn only_bus_errors_are_retryable() {
        assert!(Error::I2cNack.is_retryable());
        assert!(Error::I2cTimeout.is_retryable());
        assert!(Error::I2cIncomplete { remaining: 2 }.is_retryable());
        assert!(!Error::InvalidPin(5).is_retryable());
        assert!(!Error::NotInitialised("i2c").is_retryable());
        assert!(!Error::PcbRevision("none".into()).is_retryable());
    }

    #[test]
    fn range_error_reports_bounds() {
        let err = Error::range("i2c clock frequency", 5u32, 10_000u32, 400_000u32);
        assert_eq!(err.status(), Status::Range);
        assert_eq!(
            err.to_string(),
            "i2c clock frequency 5 is outside 10000..=400000"
        );
    }
}

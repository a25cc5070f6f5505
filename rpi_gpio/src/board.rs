//! Board revision detection and per-revision pin tables.
//!
//! The first Model B boards (revision 1) route a slightly different set of
//! SoC pins to the 26-pin header than every later BCM2835 board. The
//! revision decides which pins the drivers accept and which BSC block the
//! default I2C pins belong to.

use std::fs;
use std::path::Path;

use common::{Error, Result};
use log::{debug, info};

/// Header pins usable on revision 1 boards.
pub const REV1_PINS: [u8; REV1_PINCNT] = [
    0, 1, 4, 7, 8, 9, 10, 11, 14, 15, 17, 18, 21, 22, 23, 24, 25,
];
/// Header pins usable on revision 2 boards.
pub const REV2_PINS: [u8; REV2_PINCNT] = [
    2, 3, 4, 7, 8, 9, 10, 11, 14, 15, 17, 18, 22, 23, 24, 25, 27,
];

pub const REV1_PINCNT: usize = 17;
pub const REV2_PINCNT: usize = 17;

pub const REV1_SDA: u8 = 0;
pub const REV1_SCL: u8 = 1;
pub const REV2_SDA: u8 = 2;
pub const REV2_SCL: u8 = 3;

/// Set on old-style codes of boards that have been over-volted.
const WARRANTY_BIT: u32 = 1 << 24;
/// Marks a new-style (bit-field) revision code.
const NEW_STYLE_BIT: u32 = 1 << 23;
const PROCESSOR_SHIFT: u32 = 12;
const PROCESSOR_MASK: u32 = 0xF;
const PROCESSOR_BCM2835: u32 = 0;

/// Header layout of the board.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PcbRev {
    Rev1,
    Rev2,
}

impl PcbRev {
    /// Map a firmware revision code to a header layout.
    ///
    /// Old-style codes 0x2..=0x3 are revision 1 and 0x4..=0x15 revision 2.
    /// New-style codes are accepted only for BCM2835 boards, which all use
    /// the revision 2 layout; other SoCs have their peripherals elsewhere.
    pub fn from_revision_code(code: u32) -> Result<Self> {
        if code & NEW_STYLE_BIT != 0 {
            let processor = (code >> PROCESSOR_SHIFT) & PROCESSOR_MASK;
            return if processor == PROCESSOR_BCM2835 {
                Ok(PcbRev::Rev2)
            } else {
                Err(Error::PcbRevision(format!(
                    "revision {code:#x} is not a BCM2835 board"
                )))
            };
        }

        match code & !WARRANTY_BIT {
            0x2..=0x3 => Ok(PcbRev::Rev1),
            0x4..=0x15 => Ok(PcbRev::Rev2),
            other => Err(Error::PcbRevision(format!(
                "unknown revision code {other:#x}"
            ))),
        }
    }

    /// Every pin the drivers accept on this board.
    pub const fn pins(self) -> &'static [u8] {
        match self {
            PcbRev::Rev1 => &REV1_PINS,
            PcbRev::Rev2 => &REV2_PINS,
        }
    }

    pub const fn pin_count(self) -> usize {
        match self {
            PcbRev::Rev1 => REV1_PINCNT,
            PcbRev::Rev2 => REV2_PINCNT,
        }
    }

    /// Default `(SDA, SCL)` pins.
    pub const fn i2c_pins(self) -> (u8, u8) {
        match self {
            PcbRev::Rev1 => (REV1_SDA, REV1_SCL),
            PcbRev::Rev2 => (REV2_SDA, REV2_SCL),
        }
    }

    pub fn is_valid_pin(self, pin: u8) -> bool {
        self.pins().contains(&pin)
    }

    /// Ok if `pin` is on this board's header.
    pub fn check_pin(self, pin: u8) -> Result<()> {
        if self.is_valid_pin(pin) {
            Ok(())
        } else {
            debug!("gpio {pin} is not available on {self:?}");
            Err(Error::InvalidPin(pin))
        }
    }
}

/// Extract the hex code from the `Revision` line of `/proc/cpuinfo` text.
pub fn parse_cpuinfo(text: &str) -> Option<u32> {
    text.lines()
        .filter(|line| line.starts_with("Revision"))
        .find_map(|line| {
            let (_, value) = line.split_once(':')?;
            u32::from_str_radix(value.trim(), 16).ok()
        })
}

/// Decode the big-endian cell of `/proc/device-tree/system/linux,revision`.
pub fn parse_device_tree(bytes: &[u8]) -> Option<u32> {
    let cell: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(cell))
}

/// Resolve the board revision.
///
/// `cpuinfo` is consulted first and `device_tree` only if it yields no
/// code. Neither file needs elevated privileges.
pub fn detect(cpuinfo: &Path, device_tree: &Path) -> Result<PcbRev> {
    let code = match fs::read_to_string(cpuinfo) {
        Ok(text) => parse_cpuinfo(&text),
        Err(err) => {
            debug!("can't read {}: {err}", cpuinfo.display());
            None
        }
    };

    let code = match code {
        Some(code) => code,
        None => {
            debug!(
                "no revision in {}, trying {}",
                cpuinfo.display(),
                device_tree.display()
            );
            fs::read(device_tree)
                .ok()
                .as_deref()
                .and_then(parse_device_tree)
                .ok_or_else(|| Error::PcbRevision("no revision code found".into()))?
        }
    };

    let rev = PcbRev::from_revision_code(code)?;
    info!("board revision code {code:#x}: {rev:?}");
    Ok(rev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const CPUINFO_REV2: &str = "\
processor\t: 0
model name\t: ARMv6-compatible processor rev 7 (v6l)
Features\t: half thumb fastmult vfp edsp java tls

Hardware\t: BCM2708
Revision\t: 000e
Serial\t\t: 00000000d2a1f7c3
";

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rpi_gpio-board-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn old_style_codes_map_to_header_layouts() {
        assert_eq!(PcbRev::from_revision_code(0x2).unwrap(), PcbRev::Rev1);
        assert_eq!(PcbRev::from_revision_code(0x3).unwrap(), PcbRev::Rev1);
        assert_eq!(PcbRev::from_revision_code(0x4).unwrap(), PcbRev::Rev2);
        assert_eq!(PcbRev::from_revision_code(0xF).unwrap(), PcbRev::Rev2);
        assert_eq!(PcbRev::from_revision_code(0x15).unwrap(), PcbRev::Rev2);
        assert_eq!(PcbRev::from_revision_code(0x1000002).unwrap(), PcbRev::Rev1);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        for code in [0x0, 0x1, 0x16, 0xFFFF] {
            let err = PcbRev::from_revision_code(code).unwrap_err();
            assert_eq!(err.status(), common::Status::PcbRev);
        }
    }

    #[test]
    fn new_style_codes_depend_on_the_processor() {
        // Pi Zero W, BCM2835.
        assert_eq!(PcbRev::from_revision_code(0x9000c1).unwrap(), PcbRev::Rev2);
        // Pi 3 B, BCM2837.
        assert!(PcbRev::from_revision_code(0xa02082).is_err());
    }

    #[test]
    fn pin_tables_match_their_counts() {
        assert_eq!(PcbRev::Rev1.pins().len(), PcbRev::Rev1.pin_count());
        assert_eq!(PcbRev::Rev2.pins().len(), PcbRev::Rev2.pin_count());
        assert!(PcbRev::Rev1.is_valid_pin(REV1_SDA));
        assert!(!PcbRev::Rev1.is_valid_pin(REV2_SDA));
        assert!(PcbRev::Rev2.is_valid_pin(27));
        assert!(!PcbRev::Rev2.is_valid_pin(21));
        assert_eq!(PcbRev::Rev2.i2c_pins(), (2, 3));
    }

    #[test]
    fn cpuinfo_revision_line_is_parsed_as_hex() {
        assert_eq!(parse_cpuinfo(CPUINFO_REV2), Some(0xe));
        assert_eq!(parse_cpuinfo("Hardware\t: BCM2708\n"), None);
        assert_eq!(parse_cpuinfo("Revision\t: zz\n"), None);
    }

    #[test]
    fn detect_falls_back_to_the_device_tree() {
        let cpuinfo = scratch("cpuinfo-without-revision");
        let dt = scratch("linux,revision");
        fs::write(&cpuinfo, "Hardware\t: BCM2708\n").unwrap();
        fs::write(&dt, 0x0000_0003u32.to_be_bytes()).unwrap();

        assert_eq!(detect(&cpuinfo, &dt).unwrap(), PcbRev::Rev1);
    }

    #[test]
    fn detect_prefers_cpuinfo() {
        let cpuinfo = scratch("cpuinfo-rev2");
        fs::write(&cpuinfo, CPUINFO_REV2).unwrap();

        let rev = detect(&cpuinfo, Path::new("/nonexistent/linux,revision")).unwrap();
        assert_eq!(rev, PcbRev::Rev2);
    }

    #[test]
    fn detect_without_any_source_fails() {
        let err = detect(
            Path::new("/nonexistent/cpuinfo"),
            Path::new("/nonexistent/linux,revision"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PcbRevision(_)));
    }
}

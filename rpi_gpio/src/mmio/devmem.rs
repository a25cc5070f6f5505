//! `/dev/mem` backed register access.
//!
//! Every block in [`Block::ALL`] is mapped once, when the mapping is opened,
//! and unmapped when it is released or dropped. Only one live mapping may
//! exist per process.

use core::ptr::{self, read_volatile, write_volatile};
use core::sync::atomic::{AtomicBool, Ordering};
use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use common::{Error, Result};
use log::{debug, trace};

use super::{Block, Mmio};
use crate::hw::bcm2835::BLOCK_SIZE;

/// Set while a [`DevMem`] holds the peripheral mapping.
static MAPPED: AtomicBool = AtomicBool::new(false);

/// Memory-mapped view of the peripheral blocks.
#[derive(Debug)]
pub struct DevMem {
    regions: [*mut u32; Block::COUNT],
    mapped: bool,
}

// SAFETY: DevMem exclusively owns its mappings; moving it between threads
// moves that ownership. It is not Sync, so accesses stay serialised.
unsafe impl Send for DevMem {}

impl DevMem {
    /// Map every peripheral block through the memory device at `path`.
    ///
    /// Fails with [`Error::AlreadyInitialised`] while another mapping is
    /// alive, and with [`Error::External`] if the device cannot be opened
    /// (usually missing privileges) or a block cannot be mapped. On failure
    /// nothing stays mapped.
    pub fn open(path: &Path) -> Result<Self> {
        if MAPPED
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!("peripheral registers are already mapped");
            return Err(Error::AlreadyInitialised("peripheral mapping"));
        }

        match map_all(path) {
            Ok(regions) => Ok(Self {
                regions,
                mapped: true,
            }),
            Err(err) => {
                MAPPED.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    #[inline]
    fn register(&self, block: Block, offset: usize) -> Option<*mut u32> {
        debug_assert!(offset % 4 == 0, "unaligned register offset {offset:#x}");
        debug_assert!(offset < BLOCK_SIZE, "register offset {offset:#x} outside block");

        if !self.mapped {
            return None;
        }
        // SAFETY: offset is inside the mapped page of this block.
        Some(unsafe { self.regions[block.index()].add(offset / 4) })
    }
}

impl Mmio for DevMem {
    fn read(&self, block: Block, offset: usize) -> u32 {
        match self.register(block, offset) {
            // SAFETY: the pointer targets a live device mapping.
            Some(reg) => unsafe { read_volatile(reg) },
            None => 0,
        }
    }

    fn write(&mut self, block: Block, offset: usize, value: u32) {
        if let Some(reg) = self.register(block, offset) {
            // SAFETY: the pointer targets a live device mapping.
            unsafe { write_volatile(reg, value) }
        }
    }

    fn release(&mut self) -> Result<()> {
        if !self.mapped {
            return Ok(());
        }

        self.mapped = false;
        // SAFETY: every region was returned by mmap with BLOCK_SIZE and is
        // not accessed again.
        let result = unsafe { unmap_all(&self.regions) };
        self.regions = [ptr::null_mut(); Block::COUNT];
        MAPPED.store(false, Ordering::Release);

        result.map_err(|source| Error::External {
            context: "munmap peripheral block",
            source,
        })
    }
}

impl Drop for DevMem {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            debug!("releasing peripheral mapping failed: {err}");
        }
    }
}

fn map_all(path: &Path) -> Result<[*mut u32; Block::COUNT]> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC)
        .open(path)
        .map_err(|source| {
            debug!("open({}) failed: {source}", path.display());
            Error::External {
                context: "open memory device",
                source,
            }
        })?;

    let mut regions = [ptr::null_mut(); Block::COUNT];

    for block in Block::ALL {
        // SAFETY: mapping a device page; the result is checked below.
        match unsafe { map_block(file.as_raw_fd(), block.base()) } {
            Ok(region) => {
                trace!("mapped {block:?} at {:#010x}", block.base());
                regions[block.index()] = region;
            }
            Err(source) => {
                debug!("mmap of {block:?} failed: {source}");
                // SAFETY: only regions mapped above are non-null.
                let _ = unsafe { unmap_all(&regions) };
                return Err(Error::External {
                    context: "mmap peripheral block",
                    source,
                });
            }
        }
    }

    // The descriptor is closed here; the mappings stay valid.
    Ok(regions)
}

unsafe fn map_block(fd: libc::c_int, base: usize) -> io::Result<*mut u32> {
    let region = unsafe {
        libc::mmap(
            ptr::null_mut(),
            BLOCK_SIZE,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            base as libc::off_t,
        )
    };

    if region == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(region.cast())
    }
}

unsafe fn unmap_all(regions: &[*mut u32; Block::COUNT]) -> io::Result<()> {
    let mut result = Ok(());

    for &region in regions.iter().filter(|region| !region.is_null()) {
        if unsafe { libc::munmap(region.cast(), BLOCK_SIZE) } != 0 {
            result = Err(io::Error::last_os_error());
        }
    }

    result
}

//! Register access layer.
//!
//! Maps physical 32-bit register addresses into [`RegisterHandle`]s and
//! performs direct, unbuffered single-word reads and writes on them.  The
//! registers have side effects on every access (writing GPSET0 *is* the
//! actuation), so nothing here caches a value.
//!
//! ## Dual-target design
//!
//! With the `rpi` feature on Linux: [`DevMemMapper`] maps the page holding
//! each register out of `/dev/gpiomem` (or `/dev/mem`) with `mmap`.
//! Everywhere else: [`SimMapper`] hands out windows onto [`SimMemory`], an
//! in-memory model of the GPIO block that keeps a window of recent writes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use heapless::HistoryBuffer;
use log::{debug, info};

use crate::error::{MapError, MapErrorKind};
use crate::pins;

/// One mapped 32-bit register.
pub trait RegisterWindow: Send + Sync {
    fn read(&self) -> u32;
    fn write(&self, value: u32);
}

/// An addressable register, valid from a successful `map` until `unmap`.
///
/// Handles are not `Clone`: whoever owns the handle owns the mapping, and
/// giving it back to [`RegisterMapper::unmap`] consumes it, so a handle can
/// be neither used after unmapping nor unmapped twice.
pub struct RegisterHandle {
    phys: u32,
    window: Box<dyn RegisterWindow>,
}

impl RegisterHandle {
    pub fn new(phys: u32, window: Box<dyn RegisterWindow>) -> Self {
        Self { phys, window }
    }

    /// Physical address this handle maps.
    pub fn phys(&self) -> u32 {
        self.phys
    }

    #[inline]
    pub fn read_word(&self) -> u32 {
        self.window.read()
    }

    #[inline]
    pub fn write_word(&self, value: u32) {
        self.window.write(value);
    }
}

impl core::fmt::Debug for RegisterHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisterHandle")
            .field("phys", &format_args!("0x{:08X}", self.phys))
            .finish_non_exhaustive()
    }
}

/// Source of register mappings.
pub trait RegisterMapper {
    /// Make the 32-bit register at `phys` addressable.
    fn map(&mut self, phys: u32) -> Result<RegisterHandle, MapError>;

    /// Release a mapping obtained from [`map`](Self::map).
    fn unmap(&mut self, handle: RegisterHandle);
}

fn check_aligned(phys: u32) -> Result<(), MapError> {
    if phys % 4 == 0 {
        Ok(())
    } else {
        Err(MapError::new(phys, MapErrorKind::Unaligned))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Simulation backend
// ═══════════════════════════════════════════════════════════════

/// A single write observed by [`SimMemory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub phys: u32,
    pub value: u32,
}

/// Writes kept by [`SimMemory`]; older ones are overwritten.
pub const HISTORY_DEPTH: usize = 4096;

#[derive(Default)]
struct SimState {
    words: HashMap<u32, u32>,
    levels: u32,
    stuck_low: u32,
    stuck_high: u32,
    history: HistoryBuffer<RegisterWrite, HISTORY_DEPTH>,
    writes: u64,
    mapped: HashSet<u32>,
    refuse: HashSet<u32>,
}

/// In-memory model of the BCM283x GPIO block.
///
/// Function-select words hold whatever is written to them.  Writes to GPSET0
/// and GPCLR0 raise and lower bits of the level word read back at GPLEV0,
/// unless a pin has been forced stuck with [`stick`](Self::stick).
///
/// Only the last [`HISTORY_DEPTH`] writes are kept, so the daemon can run on
/// this backend indefinitely.
pub struct SimMemory {
    gpio_base: u32,
    state: Mutex<SimState>,
}

impl SimMemory {
    pub fn new(gpio_base: u32) -> Arc<Self> {
        Arc::new(Self {
            gpio_base,
            state: Mutex::new(SimState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gpio_base(&self) -> u32 {
        self.gpio_base
    }

    /// Current word at `offset` from the GPIO base.
    pub fn word(&self, offset: u32) -> u32 {
        self.read_phys(self.gpio_base + offset)
    }

    /// Preload a word without recording it as a write (power-on contents).
    pub fn preload(&self, offset: u32, value: u32) {
        self.state().words.insert(self.gpio_base + offset, value);
    }

    /// Output level of `pin` as seen through GPLEV0.
    pub fn level(&self, pin: u8) -> bool {
        self.state().levels & (1 << (pin % 32)) != 0
    }

    /// Force a pin to ignore set (`high == false`) or clear (`high == true`) writes.
    pub fn stick(&self, pin: u8, high: bool) {
        let mut st = self.state();
        let bit = 1 << (pin % 32);
        if high {
            st.stuck_high |= bit;
            st.levels |= bit;
        } else {
            st.stuck_low |= bit;
            st.levels &= !bit;
        }
    }

    /// Make the next `map` of `offset` fail.
    pub fn refuse_map(&self, offset: u32) {
        self.state().refuse.insert(self.gpio_base + offset);
    }

    /// Recent writes since the last [`clear_history`](Self::clear_history),
    /// oldest first.
    pub fn history(&self) -> Vec<RegisterWrite> {
        self.state().history.oldest_ordered().copied().collect()
    }

    /// Recent values written to the register at `offset`, oldest first.
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        let phys = self.gpio_base + offset;
        self.state()
            .history
            .oldest_ordered()
            .filter(|w| w.phys == phys)
            .map(|w| w.value)
            .collect()
    }

    /// Writes since creation, including those no longer in the history.
    pub fn write_count(&self) -> u64 {
        self.state().writes
    }

    pub fn clear_history(&self) {
        self.state().history.clear();
    }

    /// Number of live mappings.
    pub fn mapped_count(&self) -> usize {
        self.state().mapped.len()
    }

    fn read_phys(&self, phys: u32) -> u32 {
        let st = self.state();
        if phys == self.gpio_base + pins::GPLEV0 {
            st.levels
        } else {
            st.words.get(&phys).copied().unwrap_or(0)
        }
    }

    fn write_phys(&self, phys: u32, value: u32) {
        let mut st = self.state();
        st.history.write(RegisterWrite { phys, value });
        st.writes += 1;
        match phys.wrapping_sub(self.gpio_base) {
            pins::GPSET0 => {
                let stuck = st.stuck_low;
                st.levels |= value & !stuck;
            }
            pins::GPCLR0 => {
                let stuck = st.stuck_high;
                st.levels &= !(value & !stuck);
            }
            pins::GPLEV0 => {}
            _ => {
                st.words.insert(phys, value);
            }
        }
    }
}

impl core::fmt::Debug for SimMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimMemory")
            .field("gpio_base", &format_args!("0x{:08X}", self.gpio_base))
            .finish_non_exhaustive()
    }
}

struct SimWindow {
    memory: Arc<SimMemory>,
    phys: u32,
}

impl RegisterWindow for SimWindow {
    fn read(&self) -> u32 {
        self.memory.read_phys(self.phys)
    }

    fn write(&self, value: u32) {
        self.memory.write_phys(self.phys, value);
    }
}

/// Mapper over a shared [`SimMemory`].
pub struct SimMapper {
    memory: Arc<SimMemory>,
}

impl SimMapper {
    pub fn new(memory: Arc<SimMemory>) -> Self {
        Self { memory }
    }
}

impl RegisterMapper for SimMapper {
    fn map(&mut self, phys: u32) -> Result<RegisterHandle, MapError> {
        check_aligned(phys)?;
        {
            let mut st = self.memory.state();
            if st.refuse.remove(&phys) {
                return Err(MapError::new(phys, MapErrorKind::Mmap));
            }
            if !st.mapped.insert(phys) {
                return Err(MapError::new(phys, MapErrorKind::AlreadyMapped));
            }
        }
        debug!("registers(sim): mapped 0x{:08X}", phys);
        Ok(RegisterHandle::new(
            phys,
            Box::new(SimWindow {
                memory: Arc::clone(&self.memory),
                phys,
            }),
        ))
    }

    fn unmap(&mut self, handle: RegisterHandle) {
        self.memory.state().mapped.remove(&handle.phys());
        debug!("registers(sim): unmapped 0x{:08X}", handle.phys());
    }
}

// ═══════════════════════════════════════════════════════════════
//  /dev/gpiomem backend
// ═══════════════════════════════════════════════════════════════

#[cfg(all(feature = "rpi", target_os = "linux"))]
pub use mmio::DevMemMapper;

#[cfg(all(feature = "rpi", target_os = "linux"))]
mod mmio {
    use std::fs::{File, OpenOptions};
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    use log::{debug, info};

    use super::{RegisterHandle, RegisterMapper, RegisterWindow, check_aligned};
    use crate::error::{MapError, MapErrorKind};

    const PAGE_SIZE: u32 = 4096;

    struct MmioWindow {
        page: *mut libc::c_void,
        reg: *mut u32,
    }

    // SAFETY: the window owns its page mapping exclusively and every access
    // is a single volatile 32-bit load or store, which the GPIO block
    // tolerates from any thread.
    unsafe impl Send for MmioWindow {}
    // SAFETY: see above; no access holds state across calls.
    unsafe impl Sync for MmioWindow {}

    impl RegisterWindow for MmioWindow {
        fn read(&self) -> u32 {
            // SAFETY: `reg` points into a live, word-aligned mapping until drop.
            unsafe { core::ptr::read_volatile(self.reg) }
        }

        fn write(&self, value: u32) {
            // SAFETY: as for `read`.
            unsafe { core::ptr::write_volatile(self.reg, value) }
        }
    }

    impl Drop for MmioWindow {
        fn drop(&mut self) {
            // SAFETY: `page` came from a successful mmap of PAGE_SIZE bytes and
            // is unmapped exactly once, here.
            unsafe {
                libc::munmap(self.page, PAGE_SIZE as usize);
            }
        }
    }

    /// Maps registers out of a memory character device.
    ///
    /// `/dev/gpiomem` exposes only the GPIO block at file offset 0;
    /// `/dev/mem` exposes the whole physical address space.
    pub struct DevMemMapper {
        file: File,
        window_base: u32,
    }

    impl DevMemMapper {
        pub fn open(path: &str, gpio_base: u32) -> Result<Self, MapError> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_SYNC)
                .open(path)
                .map_err(|_| MapError::new(gpio_base, MapErrorKind::DeviceOpen))?;
            let window_base = if path.ends_with("gpiomem") { gpio_base } else { 0 };
            info!("registers: opened {} (window base 0x{:08X})", path, window_base);
            Ok(Self { file, window_base })
        }
    }

    impl RegisterMapper for DevMemMapper {
        fn map(&mut self, phys: u32) -> Result<RegisterHandle, MapError> {
            check_aligned(phys)?;
            let rel = phys
                .checked_sub(self.window_base)
                .ok_or(MapError::new(phys, MapErrorKind::Mmap))?;
            let page_off = rel & !(PAGE_SIZE - 1);

            // SAFETY: plain mmap of one page of an open device; the result is
            // checked before use.
            let page = unsafe {
                libc::mmap(
                    core::ptr::null_mut(),
                    PAGE_SIZE as usize,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    self.file.as_raw_fd(),
                    page_off as libc::off_t,
                )
            };
            if page == libc::MAP_FAILED {
                return Err(MapError::new(phys, MapErrorKind::Mmap));
            }

            // SAFETY: `rel - page_off` < PAGE_SIZE and word aligned.
            let reg = unsafe { page.cast::<u8>().add((rel - page_off) as usize) }.cast::<u32>();
            debug!("registers: mapped 0x{:08X}", phys);
            Ok(RegisterHandle::new(phys, Box::new(MmioWindow { page, reg })))
        }

        fn unmap(&mut self, handle: RegisterHandle) {
            debug!("registers: unmapping 0x{:08X}", handle.phys());
            drop(handle);
        }
    }
}

/// Log a summary line once a set of registers has been mapped.
pub(crate) fn log_mapped(what: &str, handles: &[&RegisterHandle]) {
    let first = handles.iter().map(|h| h.phys()).min().unwrap_or(0);
    info!(
        "registers: {} mapped ({} words from 0x{:08X})",
        what,
        handles.len(),
        first
    );
}

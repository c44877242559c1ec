//! Device context: the root owner of one AX100 session.
//!
//! A context owns the open device node, the mapped register window, the
//! mapped device memory window, the arena allocator over that window, and
//! the status word. Everything else in the driver borrows from it and
//! must not outlive it.
//!
//! Construction acquires resources in a fixed order (device node, register
//! window, memory window, allocator) and any failure part-way simply drops
//! what was already acquired; a partially-constructed context is never
//! visible to callers. Teardown is `Drop`, in the reverse order of
//! acquisition.

use crate::arena::Arena;
use crate::error::{AxonError, Result};
use crate::mmio::MappedRegion;
use axon_chip::mem::{ARENA_DEVICE_BASE, ARENA_SIZE};
use axon_chip::regs::{self, status};
use rustix::fs::OFlags;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Open handle to the accelerator device node.
#[derive(Debug)]
struct DeviceHandle {
    file: File,
    path: PathBuf,
}

impl DeviceHandle {
    fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AxonError::device_error(format!(
                "device not found: {}",
                path.display()
            )));
        }

        // Flag bits are small positive values, the wrap cannot happen.
        #[allow(clippy::cast_possible_wrap)]
        let nonblock_flag = OFlags::NONBLOCK.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nonblock_flag)
            .open(path)
            .map_err(|e| {
                AxonError::device_error(format!("cannot open {}: {e}", path.display()))
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

/// One open AX100 session.
///
/// Single-threaded: the status word and the allocator's block table are
/// not safe for concurrent mutation.
#[derive(Debug)]
pub struct DeviceContext {
    // Field order is teardown order: allocator state first, then the two
    // mappings, then the device node.
    arena: Arena,
    arena_window: MappedRegion,
    regs: MappedRegion,
    handle: Option<DeviceHandle>,
    status: u32,
}

impl DeviceContext {
    /// Open the device node and map both hardware windows.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::DeviceError` if the node cannot be opened or a
    /// window cannot be mapped. Resources acquired before the failure are
    /// released before returning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("opening device {}", path.display());

        let handle = DeviceHandle::open(path)?;
        let regs = MappedRegion::map_file(&handle.file, rustix::param::page_size(), 0)?;
        #[allow(clippy::cast_possible_truncation)]
        let arena_window =
            MappedRegion::map_file(&handle.file, ARENA_SIZE as usize, ARENA_DEVICE_BASE)?;
        let arena = Arena::new(ARENA_SIZE, ARENA_DEVICE_BASE);

        tracing::info!(
            "opened device {} ({} MiB arena)",
            path.display(),
            ARENA_SIZE / (1024 * 1024)
        );

        let mut ctx = Self {
            arena,
            arena_window,
            regs,
            handle: Some(handle),
            status: 0,
        };
        ctx.set_status(status::READY);
        Ok(ctx)
    }

    /// Build a context over anonymous memory instead of the device node.
    ///
    /// The register window and arena behave exactly as in the hardware
    /// path; only the backing bytes differ. This is how the stack runs in
    /// CI without an AX100 present.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::DeviceError` if a mapping cannot be created.
    pub fn simulated() -> Result<Self> {
        #[allow(clippy::cast_possible_truncation)]
        let arena_window = MappedRegion::anonymous(ARENA_SIZE as usize)?;
        let regs = MappedRegion::anonymous(rustix::param::page_size())?;
        let arena = Arena::new(ARENA_SIZE, ARENA_DEVICE_BASE);

        tracing::info!("opened simulated device ({} MiB arena)", ARENA_SIZE / (1024 * 1024));

        let mut ctx = Self {
            arena,
            arena_window,
            regs,
            handle: None,
            status: 0,
        };
        ctx.set_status(status::READY);
        Ok(ctx)
    }

    /// Current status word.
    pub const fn get_status(&self) -> u32 {
        self.status
    }

    /// Force the status word.
    ///
    /// The word is also mirrored into the STATUS register so a later
    /// [`Self::refresh_status`] reads back the same value. In production
    /// the mirror runs the other way (hardware writes the register and
    /// software refreshes from it), so callers should not treat
    /// `set_status` as authoritative outside simulation.
    pub fn set_status(&mut self, value: u32) {
        self.status = value;
        if let Err(e) = self.regs.write_u32(regs::STATUS, value) {
            tracing::warn!("status mirror write failed: {e}");
        }
    }

    /// Re-read the status word from the STATUS register.
    pub fn refresh_status(&mut self) -> u32 {
        match self.regs.read_u32(regs::STATUS) {
            Ok(value) => self.status = value,
            Err(e) => tracing::warn!("status readback failed: {e}"),
        }
        self.status
    }

    /// Ready bit test.
    pub const fn is_ready(&self) -> bool {
        self.status & status::READY != 0
    }

    /// Busy bit test.
    pub const fn is_busy(&self) -> bool {
        self.status & status::BUSY != 0
    }

    /// Complete bit test.
    pub const fn is_complete(&self) -> bool {
        self.status & status::COMPLETE != 0
    }

    /// Error bit test.
    pub const fn is_error(&self) -> bool {
        self.status & status::ERROR != 0
    }

    /// The arena allocator over the device memory window.
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable access to the arena allocator.
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// The mapped register window.
    pub(crate) fn regs_mut(&mut self) -> &mut MappedRegion {
        &mut self.regs
    }

    /// Copy bytes into the device memory window at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::InvalidParameter` if the range leaves the window.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_arena(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.arena_window.write_bytes(offset as usize, data)
    }

    /// Copy bytes out of the device memory window at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::InvalidParameter` if the range leaves the window.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_arena(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        self.arena_window.read_bytes(offset as usize, buffer)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        // The fields unwind themselves in declaration order (allocator,
        // memory window, register window, device node), the reverse of
        // acquisition.
        match &self.handle {
            Some(h) => tracing::info!("closing device {}", h.path.display()),
            None => tracing::info!("closing simulated device"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_context_starts_ready() {
        let ctx = DeviceContext::simulated().unwrap();
        assert!(ctx.is_ready());
        assert!(!ctx.is_busy());
        assert!(!ctx.is_complete());
        assert!(!ctx.is_error());
        assert_eq!(ctx.arena().available(), ARENA_SIZE);
    }

    #[test]
    fn status_word_mirrors_to_register() {
        let mut ctx = DeviceContext::simulated().unwrap();
        ctx.set_status(status::BUSY | status::ERROR);
        assert!(ctx.is_busy());
        assert!(ctx.is_error());
        assert!(!ctx.is_ready());
        assert_eq!(ctx.refresh_status(), status::BUSY | status::ERROR);
    }

    #[test]
    fn arena_window_roundtrip() {
        let mut ctx = DeviceContext::simulated().unwrap();
        let offset = ctx.arena_mut().alloc(1024).unwrap();

        let data: Vec<u8> = (0..255).collect();
        ctx.write_arena(offset, &data).unwrap();

        let mut out = vec![0u8; data.len()];
        ctx.read_arena(offset, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn open_missing_device_fails_cleanly() {
        let err = DeviceContext::open("/dev/ax100-does-not-exist").unwrap_err();
        assert!(matches!(err, AxonError::DeviceError { .. }));
    }
}

//! Memory-mapped windows onto the AX100.
//!
//! Provides a bounds-checked abstraction over the two mappings the driver
//! owns: the register window and the device memory window. All unsafe is
//! confined to this module; callers get checked register accesses and
//! byte copies.

// MMIO registers are naturally aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_ptr_alignment)]

use crate::error::{AxonError, Result};
use rustix::mm::{mmap, mmap_anonymous, munmap, MapFlags, ProtFlags};
use std::fs::File;
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

/// A mapped window of device (or simulated) memory.
///
/// Not `Send`/`Sync`: the driver stack is single-threaded and the status
/// and command registers are not safe for concurrent mutation.
pub struct MappedRegion {
    ptr: NonNull<u8>,
    size: usize,
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .finish()
    }
}

impl MappedRegion {
    /// Map `size` bytes of `file` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::DeviceError` if the mapping fails.
    pub fn map_file(file: &File, size: usize, offset: u64) -> Result<Self> {
        if size == 0 {
            return Err(AxonError::device_error("cannot map a zero-sized window"));
        }

        // SAFETY: mmap is required to reach the device window. The fd is
        // open, size is non-zero, and rustix reports failure as Err rather
        // than a sentinel pointer. The mapping is released in Drop.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                offset,
            )
            .map_err(|e| AxonError::device_error(format!("mmap at {offset:#x} failed: {e}")))?
        };

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| AxonError::device_error("mmap returned a null mapping"))?;

        tracing::debug!("mapped {size:#x} bytes at {ptr:p} (file offset {offset:#x})");
        Ok(Self { ptr, size })
    }

    /// Map `size` bytes of anonymous memory.
    ///
    /// Backs the simulated device: the register window and arena behave
    /// identically whether the bytes come from the device node or from an
    /// anonymous mapping.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::DeviceError` if the mapping fails.
    pub fn anonymous(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(AxonError::device_error("cannot map a zero-sized window"));
        }

        // SAFETY: anonymous private mapping; rustix reports failure as Err.
        // Released in Drop.
        let ptr = unsafe {
            mmap_anonymous(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )
            .map_err(|e| AxonError::device_error(format!("anonymous mmap failed: {e}")))?
        };

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| AxonError::device_error("mmap returned a null mapping"))?;

        tracing::debug!("mapped {size:#x} anonymous bytes at {ptr:p}");
        Ok(Self { ptr, size })
    }

    /// Read a 32-bit register at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::InvalidParameter` if the access is out of bounds.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        // SAFETY: bounds validated above; the pointer comes from a live
        // mapping. read_volatile because hardware can change the value.
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };
        Ok(value)
    }

    /// Write a 32-bit register at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::InvalidParameter` if the access is out of bounds.
    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset, 4)?;
        // SAFETY: bounds validated above. write_volatile because register
        // writes have side effects the compiler must not elide or reorder.
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
        Ok(())
    }

    /// Copy bytes out of the window at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::InvalidParameter` if the range is out of bounds.
    pub fn read_bytes(&self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        self.check(offset, buffer.len())?;
        // SAFETY: bounds validated above; source is the mapping, destination
        // is a caller slice, the two cannot overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.ptr.as_ptr().add(offset),
                buffer.as_mut_ptr(),
                buffer.len(),
            );
        }
        Ok(())
    }

    /// Copy bytes into the window at `offset` in a single pass.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::InvalidParameter` if the range is out of bounds.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.check(offset, data.len())?;
        // SAFETY: bounds validated above; source is a caller slice,
        // destination is the mapping, the two cannot overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.ptr.as_ptr().add(offset),
                data.len(),
            );
        }
        Ok(())
    }

    /// Window size in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).map_or(true, |end| end > self.size) {
            return Err(AxonError::invalid_parameter(format!(
                "access out of bounds: offset={offset:#x}, len={len}, window={:#x}",
                self.size
            )));
        }
        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: ptr/size describe exactly the mapping created in
        // map_file/anonymous, and Drop runs at most once.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::warn!("munmap failed: {e}");
            }
        }
        tracing::debug!("unmapped {:#x} bytes at {:p}", self.size, self.ptr);
    }
}

//! Device memory map for the AX100.
//!
//! The accelerator owns a fixed 256 MiB SRAM window. From the device's
//! point of view it starts at [`ARENA_DEVICE_BASE`]; the host reaches the
//! same bytes through an mmap of the device node at that offset. The two
//! address spaces are related by a fixed affine mapping set at context
//! creation, so a host offset `o` within the window is device address
//! `ARENA_DEVICE_BASE + o`.
//!
//! These are constants of the hardware target, not tunables.

/// Base of the device memory window as the accelerator sees it.
pub const ARENA_DEVICE_BASE: u64 = 0x3000_0000;

/// Size of the device memory window in bytes (256 MiB).
pub const ARENA_SIZE: u64 = 256 * 1024 * 1024;

/// Required alignment for device buffers. The DMA engine transfers in
/// 64-byte beats and faults on unaligned descriptors.
pub const MEM_ALIGN: u64 = 64;

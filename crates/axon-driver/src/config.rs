//! Process-wide device configuration.
//!
//! Held by the orchestration layer, independent of any single context but
//! meaningful only while one is open.

/// Configuration flag bits.
pub mod flags {
    /// Use the DMA engine for transfers.
    pub const ENABLE_DMA: u32 = 1 << 0;
    /// Synchronous transfer mode.
    pub const SYNC_MODE: u32 = 1 << 1;
    /// High-priority scheduling on the device.
    pub const HIGH_PRIORITY: u32 = 1 << 2;
}

/// Default maximum transfer size (16 MiB).
pub const DEFAULT_MAX_TRANSFER: u32 = 16 * 1024 * 1024;

/// Default operation timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Flag bits, see [`flags`]
    pub flags: u32,
    /// Number of DMA channels
    pub channels: u32,
    /// Maximum transfer size in bytes
    pub max_transfer: u32,
    /// Operation timeout in milliseconds
    pub timeout_ms: u32,
}

impl Default for DeviceConfig {
    /// The documented defaults: DMA enabled, one channel, 16 MiB transfer
    /// limit, one second timeout.
    fn default() -> Self {
        Self {
            flags: flags::ENABLE_DMA,
            channels: 1,
            max_transfer: DEFAULT_MAX_TRANSFER,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

//! Register window map for the AX100.
//!
//! The device maps a single page of control registers at offset 0 of its
//! device node. The front of the window is the controller instruction
//! register: a fixed 72-byte command record image that the device latches
//! as one unit when a complete record is written. The status word follows
//! the command image.
//!
//! ```text
//! 0x0000..0x0048  Command record image (header + payload, 72 bytes)
//! 0x0048          Status word
//! ```

/// Controller instruction register, base of the command record image.
pub const COMMAND: usize = 0x0000;

/// Size of the command record image in bytes.
///
/// 32-byte common header plus the largest payload variant (systolic,
/// 40 bytes). Shorter payloads are zero-padded to this length so every
/// command write covers the full image.
pub const COMMAND_LEN: usize = 72;

/// Status word, directly after the command image.
pub const STATUS: usize = 0x0048;

/// Status word bit definitions.
pub mod status {
    /// Device ready to accept a command.
    pub const READY: u32 = 1 << 0;
    /// Device currently processing.
    pub const BUSY: u32 = 1 << 1;
    /// Last operation completed.
    pub const COMPLETE: u32 = 1 << 2;
    /// Error during last operation.
    pub const ERROR: u32 = 1 << 3;
}

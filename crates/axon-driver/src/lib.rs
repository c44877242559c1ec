//! Pure Rust driver stack for the AX100 memory-mapped NN accelerator.
//!
//! The AX100 exposes a register window and a 256 MiB memory window through
//! its device node. This crate owns both: it carves buffers out of the
//! memory window with a best-fit arena allocator, encodes operations as
//! fixed-layout command records, writes them into the register window, and
//! synchronizes with the device through a bounded readiness poll.
//!
//! # Layer stack
//!
//! ```text
//! Runtime / Buffer      scoped handles: open-on-construct, free-on-drop
//!   AxonDriver          orchestration: buffers, config, submit, wait
//!     DeviceContext     one open session: device node + both windows
//!       Arena           best-fit allocator over the memory window
//!       protocol        readiness-gated command record writes
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use axon_driver::Runtime;
//!
//! # fn main() -> axon_driver::Result<()> {
//! let rt = Runtime::new("/dev/ax100")?;
//!
//! let mut input = rt.alloc(1024)?;
//! let weights = rt.alloc(1024)?;
//! let mut output = rt.alloc(1024)?;
//!
//! input.write(&[0u8; 1024])?;
//! rt.matrix_multiply(&input, &weights, &mut output)?;
//!
//! let mut result = vec![0u8; 1024];
//! output.read(&mut result)?;
//! # Ok(())
//! # }
//! ```
//!
//! Everything is single-threaded and synchronous: one context per driver,
//! one submission in flight, and the only suspension point is the bounded
//! readiness poll (100 attempts × 1 ms). Callers needing concurrency must
//! serialize externally.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod arena;
pub mod command;
pub mod config;
mod context;
mod driver;
mod error;
mod mmio;
pub mod protocol;
mod runtime;
pub mod sync;

pub use arena::Arena;
pub use command::{
    CommandHeader, CommandPayload, CommandRecord, Img2colParams, LsuParams, Opcode,
    SystolicParams,
};
pub use config::DeviceConfig;
pub use context::DeviceContext;
pub use driver::{AxonDriver, BufferDescriptor, OpKind, OpRequest};
pub use error::{AxonError, Result};
pub use mmio::MappedRegion;
pub use runtime::{Buffer, Runtime};
pub use sync::WaitPolicy;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AxonDriver, AxonError, Buffer, DeviceConfig, DeviceContext, OpKind, OpRequest, Result,
        Runtime, WaitPolicy,
    };
}

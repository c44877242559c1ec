//! Silicon model for the AX100 memory-mapped neural-network accelerator.
//!
//! This crate has **no dependencies** and **no hardware access**; it is a
//! pure model of the silicon: the register window layout, status bit
//! definitions, and the device memory map the driver programs against.
//!
//! The AX100 exposes two memory-mapped windows through its device node:
//! a small register window holding the command record and status word, and
//! a 256 MiB memory window the driver carves buffers out of.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Register window map: command image, status word, bit definitions |
//! | [`mem`]  | Device memory map: arena base address, size, alignment |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod mem;
pub mod regs;

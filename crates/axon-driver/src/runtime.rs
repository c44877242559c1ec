//! Scoped consumer interface: a runtime handle that owns the driver for
//! its lifetime, and buffer handles that free themselves.
//!
//! The driver stack is single-threaded, so the runtime and its buffers
//! share the underlying [`AxonDriver`] through `Rc<RefCell<_>>`; a buffer
//! can outlive the statement that produced it but never the runtime, and
//! dropping it returns the device memory without any explicit call.

use crate::config::DeviceConfig;
use crate::driver::{AxonDriver, BufferDescriptor, OpKind, OpRequest};
use crate::error::Result;
use crate::sync::WaitPolicy;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Open session with the accelerator.
///
/// Construction opens the device and applies the default configuration;
/// Drop tears the context down. Not copyable or clonable: one session,
/// one owner.
#[derive(Debug)]
pub struct Runtime {
    driver: Rc<RefCell<AxonDriver>>,
}

impl Runtime {
    /// Open the device at `path` and apply the default configuration.
    ///
    /// # Errors
    ///
    /// Returns the failure of the underlying open or configuration reset.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut driver = AxonDriver::new();
        driver.open(path)?;
        driver.reset_config()?;
        Ok(Self {
            driver: Rc::new(RefCell::new(driver)),
        })
    }

    /// Open a simulated device (anonymous memory, no hardware).
    ///
    /// # Errors
    ///
    /// Returns the failure of the underlying open or configuration reset.
    pub fn simulated() -> Result<Self> {
        let mut driver = AxonDriver::new();
        driver.open_simulated()?;
        driver.reset_config()?;
        Ok(Self {
            driver: Rc::new(RefCell::new(driver)),
        })
    }

    /// Replace the device configuration.
    ///
    /// # Errors
    ///
    /// Propagates the driver's `configure` failure.
    pub fn configure(
        &self,
        flags: u32,
        channels: u32,
        max_transfer: u32,
        timeout_ms: u32,
    ) -> Result<()> {
        self.driver.borrow_mut().configure(DeviceConfig {
            flags,
            channels,
            max_transfer,
            timeout_ms,
        })
    }

    /// Override the readiness poll budget for this session.
    pub fn set_wait_policy(&self, policy: WaitPolicy) {
        self.driver.borrow_mut().set_wait_policy(policy);
    }

    /// Allocate a device buffer that frees itself on drop.
    ///
    /// # Errors
    ///
    /// Propagates the driver's `alloc_buffer` failure.
    pub fn alloc(&self, size: u32) -> Result<Buffer> {
        let desc = self.driver.borrow_mut().alloc_buffer(size)?;
        Ok(Buffer {
            driver: Rc::clone(&self.driver),
            desc,
        })
    }

    /// Run a matrix multiplication synchronously.
    ///
    /// # Errors
    ///
    /// Returns any non-ok submit or completion result.
    pub fn matrix_multiply(
        &self,
        input: &Buffer,
        weights: &Buffer,
        output: &mut Buffer,
    ) -> Result<()> {
        self.submit_and_wait(OpKind::MatMul, input, weights, output)
    }

    /// Run a 2D convolution synchronously.
    ///
    /// # Errors
    ///
    /// Returns any non-ok submit or completion result.
    pub fn convolution_2d(
        &self,
        input: &Buffer,
        weights: &Buffer,
        output: &mut Buffer,
    ) -> Result<()> {
        self.submit_and_wait(OpKind::Conv2d, input, weights, output)
    }

    fn submit_and_wait(
        &self,
        op: OpKind,
        input: &Buffer,
        weights: &Buffer,
        output: &mut Buffer,
    ) -> Result<()> {
        let mut driver = self.driver.borrow_mut();
        let timeout_ms = driver.config()?.timeout_ms;

        driver.submit(&OpRequest {
            op,
            input: input.desc,
            output: output.desc,
            weights: weights.desc,
            flags: 0,
        })?;
        driver.wait_complete(timeout_ms)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.driver.borrow_mut().close();
    }
}

/// Scoped device buffer: allocated on construction, freed on drop.
///
/// Move-only; device-backed memory cannot be duplicated.
#[derive(Debug)]
pub struct Buffer {
    driver: Rc<RefCell<AxonDriver>>,
    desc: BufferDescriptor,
}

impl Buffer {
    /// Buffer size in bytes.
    pub const fn size(&self) -> u32 {
        self.desc.size()
    }

    /// The underlying descriptor.
    pub const fn descriptor(&self) -> BufferDescriptor {
        self.desc
    }

    /// Copy `data` into the buffer.
    ///
    /// # Errors
    ///
    /// Propagates the driver's `write_buffer` failure.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.driver.borrow_mut().write_buffer(&self.desc, data)
    }

    /// Copy the buffer's contents into `out`.
    ///
    /// # Errors
    ///
    /// Propagates the driver's `read_buffer` failure.
    pub fn read(&self, out: &mut [u8]) -> Result<()> {
        self.driver.borrow_mut().read_buffer(&self.desc, out)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.driver.borrow_mut().free_buffer(self.desc);
    }
}

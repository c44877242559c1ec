//! Driver orchestration: buffer lifecycle, configuration, operation
//! submission and completion.
//!
//! One [`AxonDriver`] owns at most one [`DeviceContext`] at a time; the
//! device has a single in-process owner, and that ownership lives in this
//! object rather than in a global. Opening while already open is an
//! idempotent success, matching the device node's open semantics; every
//! other operation fails with `NotInitialized` until a context exists.

use crate::command::{op, LsuParams, SystolicParams};
use crate::config::DeviceConfig;
use crate::context::DeviceContext;
use crate::error::{AxonError, Result};
use crate::protocol;
use crate::sync::{wait_for_ready_blocking, WaitPolicy};
use std::path::Path;

/// Handle to a device-memory buffer.
///
/// `device_addr` is the address the accelerator uses for the same bytes;
/// it is derived from the arena's fixed affine mapping, never stored
/// independently. The descriptor is only meaningful while the driver that
/// issued it holds an open context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub(crate) offset: u64,
    device_addr: u64,
    size: u32,
}

impl BufferDescriptor {
    /// Address of the buffer as the accelerator sees it.
    pub const fn device_addr(&self) -> u64 {
        self.device_addr
    }

    /// Buffer size in bytes.
    pub const fn size(&self) -> u32 {
        self.size
    }
}

/// Operation selector for [`OpRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Matrix multiplication
    MatMul,
    /// 2D convolution
    Conv2d,
}

/// One operation submission.
#[derive(Debug, Clone, Copy)]
pub struct OpRequest {
    /// Which operation to run
    pub op: OpKind,
    /// Input activations
    pub input: BufferDescriptor,
    /// Result buffer
    pub output: BufferDescriptor,
    /// Weight buffer
    pub weights: BufferDescriptor,
    /// Operation control flags
    pub flags: u32,
}

/// The process-wide driver entry point.
#[derive(Debug, Default)]
pub struct AxonDriver {
    ctx: Option<DeviceContext>,
    config: DeviceConfig,
    wait_policy: WaitPolicy,
    last_error: Option<String>,
}

impl AxonDriver {
    /// Create a driver with no open context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the device at `path`. Idempotent: a second open while a
    /// context exists is a success and acquires nothing new.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::DeviceError` if the context cannot be built.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.ctx.is_some() {
            tracing::debug!("open on an already-open driver is a no-op");
            return Ok(());
        }
        match DeviceContext::open(path) {
            Ok(ctx) => {
                self.ctx = Some(ctx);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Open a simulated device backed by anonymous memory. Idempotent,
    /// like [`Self::open`].
    ///
    /// # Errors
    ///
    /// Returns `AxonError::DeviceError` if a mapping cannot be created.
    pub fn open_simulated(&mut self) -> Result<()> {
        if self.ctx.is_some() {
            return Ok(());
        }
        match DeviceContext::simulated() {
            Ok(ctx) => {
                self.ctx = Some(ctx);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Tear down the context and restore the default configuration.
    /// A no-op when nothing is open.
    pub fn close(&mut self) {
        if self.ctx.take().is_some() {
            self.config = DeviceConfig::default();
            self.last_error = None;
        }
    }

    /// Whether a context is open.
    pub const fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    /// The open context, for status inspection and simulation.
    pub fn context_mut(&mut self) -> Result<&mut DeviceContext> {
        self.ctx.as_mut().ok_or(AxonError::NotInitialized)
    }

    /// Override the readiness poll budget (tests inject a zero-delay
    /// policy; production keeps the default 100 × 1 ms contract).
    pub fn set_wait_policy(&mut self, policy: WaitPolicy) {
        self.wait_policy = policy;
    }

    /// Allocate `size` bytes of device memory.
    ///
    /// # Errors
    ///
    /// `NotInitialized` with no open context, `InvalidParameter` for a
    /// zero size, `NoMemory` when the arena cannot satisfy the request.
    pub fn alloc_buffer(&mut self, size: u32) -> Result<BufferDescriptor> {
        let outcome = match self.ctx.as_mut() {
            None => Err(AxonError::NotInitialized),
            Some(_) if size == 0 => {
                Err(AxonError::invalid_parameter("zero-sized buffer"))
            }
            Some(ctx) => ctx.arena_mut().alloc(u64::from(size)).and_then(|offset| {
                let device_addr = ctx.arena().to_device(offset).ok_or_else(|| {
                    AxonError::device_error("allocated offset outside the arena")
                })?;
                Ok(BufferDescriptor {
                    offset,
                    device_addr,
                    size,
                })
            }),
        };
        outcome.map_err(|e| self.fail(e))
    }

    /// Return a buffer to the arena. Tolerates an unknown or already
    /// freed descriptor and a closed driver, never an error.
    pub fn free_buffer(&mut self, desc: BufferDescriptor) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.arena_mut().free(desc.offset);
        }
    }

    /// Copy `data` into the buffer's device memory.
    ///
    /// # Errors
    ///
    /// `NotInitialized` with no open context, `InvalidParameter` when
    /// `data` exceeds the buffer.
    pub fn write_buffer(&mut self, desc: &BufferDescriptor, data: &[u8]) -> Result<()> {
        let outcome = match self.ctx.as_mut() {
            None => Err(AxonError::NotInitialized),
            Some(_) if data.len() > desc.size as usize => Err(AxonError::invalid_parameter(
                format!("{} bytes into a {}-byte buffer", data.len(), desc.size),
            )),
            Some(ctx) => ctx.write_arena(desc.offset, data),
        };
        outcome.map_err(|e| self.fail(e))
    }

    /// Copy the buffer's device memory into `out`.
    ///
    /// # Errors
    ///
    /// `NotInitialized` with no open context, `InvalidParameter` when
    /// `out` exceeds the buffer.
    pub fn read_buffer(&mut self, desc: &BufferDescriptor, out: &mut [u8]) -> Result<()> {
        let outcome = match self.ctx.as_ref() {
            None => Err(AxonError::NotInitialized),
            Some(_) if out.len() > desc.size as usize => Err(AxonError::invalid_parameter(
                format!("{} bytes from a {}-byte buffer", out.len(), desc.size),
            )),
            Some(ctx) => ctx.read_arena(desc.offset, out),
        };
        outcome.map_err(|e| self.fail(e))
    }

    /// Submit an operation: one systolic command selecting the operation,
    /// then one LSU command describing the input→output transfer. Each
    /// write individually waits for readiness.
    ///
    /// # Errors
    ///
    /// `NotInitialized` with no open context, `InvalidParameter` for
    /// empty buffers, `Timeout` if the device never reports ready.
    pub fn submit(&mut self, req: &OpRequest) -> Result<()> {
        let policy = self.wait_policy;
        let outcome = match self.ctx.as_mut() {
            None => Err(AxonError::NotInitialized),
            Some(ctx) => submit_inner(ctx, req, &policy),
        };
        outcome.map_err(|e| self.fail(e))
    }

    /// Wait for the submitted operation to finish, then translate the
    /// status word: error bit set → `DeviceError`, busy bit set → `Busy`,
    /// otherwise success.
    ///
    /// The wall-clock bound comes from the readiness poll budget;
    /// `timeout_ms` is the caller's expectation and is logged against it.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, `Timeout`, `DeviceError` or `Busy` as above.
    pub fn wait_complete(&mut self, timeout_ms: u32) -> Result<()> {
        let policy = self.wait_policy;
        let outcome = match self.ctx.as_mut() {
            None => Err(AxonError::NotInitialized),
            Some(ctx) => {
                tracing::debug!(
                    timeout_ms,
                    budget_ms = budget_ms(&policy),
                    "waiting for completion"
                );
                if wait_for_ready_blocking(ctx, &policy) {
                    translate_status(ctx)
                } else {
                    Err(AxonError::timeout(budget_ms(&policy)))
                }
            }
        };
        outcome.map_err(|e| self.fail(e))
    }

    /// Replace the device configuration.
    ///
    /// # Errors
    ///
    /// `NotInitialized` with no open context.
    pub fn configure(&mut self, config: DeviceConfig) -> Result<()> {
        if self.ctx.is_none() {
            return Err(self.fail(AxonError::NotInitialized));
        }
        self.config = config;
        Ok(())
    }

    /// The current device configuration.
    ///
    /// # Errors
    ///
    /// `NotInitialized` with no open context.
    pub fn config(&mut self) -> Result<DeviceConfig> {
        if self.ctx.is_none() {
            return Err(self.fail(AxonError::NotInitialized));
        }
        Ok(self.config)
    }

    /// Restore the documented default configuration.
    ///
    /// # Errors
    ///
    /// `NotInitialized` with no open context.
    pub fn reset_config(&mut self) -> Result<()> {
        self.configure(DeviceConfig::default())
    }

    /// The most recent failure message, for diagnostics.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn fail(&mut self, e: AxonError) -> AxonError {
        tracing::debug!("driver operation failed: {e}");
        self.last_error = Some(e.to_string());
        e
    }
}

fn submit_inner(ctx: &mut DeviceContext, req: &OpRequest, policy: &WaitPolicy) -> Result<()> {
    if req.input.size() == 0 || req.output.size() == 0 {
        return Err(AxonError::invalid_parameter("empty operation buffer"));
    }

    let opcode = match req.op {
        OpKind::MatMul => op::MATMUL,
        OpKind::Conv2d => op::CONV,
    };

    protocol::configure_systolic(
        ctx,
        SystolicParams {
            opcode,
            control: req.flags,
            ..Default::default()
        },
        policy,
    )?;

    protocol::configure_lsu(
        ctx,
        LsuParams {
            src_addr: req.input.device_addr(),
            dst_addr: req.output.device_addr(),
            length: req.input.size(),
            ..Default::default()
        },
        policy,
    )?;

    tracing::debug!(?req.op, length = req.input.size(), "operation submitted");
    Ok(())
}

fn translate_status(ctx: &DeviceContext) -> Result<()> {
    if ctx.is_error() {
        return Err(AxonError::device_error(format!(
            "status word {:#x}",
            ctx.get_status()
        )));
    }
    if ctx.is_busy() {
        return Err(AxonError::Busy);
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn budget_ms(policy: &WaitPolicy) -> u64 {
    policy.budget().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_chip::regs::status;

    fn open_driver() -> AxonDriver {
        let mut d = AxonDriver::new();
        d.open_simulated().unwrap();
        d.set_wait_policy(WaitPolicy::immediate());
        d
    }

    #[test]
    fn operations_fail_before_init() {
        let mut d = AxonDriver::new();
        assert!(matches!(d.alloc_buffer(1024), Err(AxonError::NotInitialized)));
        assert!(matches!(d.wait_complete(1000), Err(AxonError::NotInitialized)));
        assert!(matches!(d.configure(DeviceConfig::default()), Err(AxonError::NotInitialized)));
        assert!(matches!(d.config(), Err(AxonError::NotInitialized)));

        let req = OpRequest {
            op: OpKind::MatMul,
            input: BufferDescriptor::default(),
            output: BufferDescriptor::default(),
            weights: BufferDescriptor::default(),
            flags: 0,
        };
        assert!(matches!(d.submit(&req), Err(AxonError::NotInitialized)));
        assert_eq!(d.last_error(), Some("Driver not initialized"));
    }

    #[test]
    fn open_is_idempotent() {
        let mut d = open_driver();
        let before = d.context_mut().unwrap().arena().available();

        d.open_simulated().unwrap();
        // The second open did not rebuild the context or its arena.
        let buf = d.alloc_buffer(1024).unwrap();
        assert!(d.context_mut().unwrap().arena().available() < before);
        d.free_buffer(buf);

        d.close();
        d.close(); // double close is a no-op
        assert!(!d.is_open());
    }

    #[test]
    fn buffer_lifecycle() {
        let mut d = open_driver();
        let buf = d.alloc_buffer(4096).unwrap();
        assert_eq!(buf.size(), 4096);
        assert!(buf.device_addr() >= axon_chip::mem::ARENA_DEVICE_BASE);

        d.write_buffer(&buf, &[7u8; 4096]).unwrap();
        let mut out = [0u8; 16];
        d.read_buffer(&buf, &mut out).unwrap();
        assert_eq!(out, [7u8; 16]);

        assert!(matches!(
            d.write_buffer(&buf, &[0u8; 8192]),
            Err(AxonError::InvalidParameter { .. })
        ));

        d.free_buffer(buf);
        d.free_buffer(buf); // tolerated
    }

    #[test]
    fn zero_sized_alloc_rejected() {
        let mut d = open_driver();
        assert!(matches!(d.alloc_buffer(0), Err(AxonError::InvalidParameter { .. })));
        assert!(d.last_error().unwrap().contains("zero-sized"));
    }

    #[test]
    fn submit_rejects_empty_buffers() {
        let mut d = open_driver();
        let req = OpRequest {
            op: OpKind::Conv2d,
            input: BufferDescriptor::default(),
            output: BufferDescriptor::default(),
            weights: BufferDescriptor::default(),
            flags: 0,
        };
        assert!(matches!(d.submit(&req), Err(AxonError::InvalidParameter { .. })));
    }

    #[test]
    fn wait_complete_translates_status() {
        let mut d = open_driver();

        d.context_mut().unwrap().set_status(status::READY | status::COMPLETE);
        assert!(d.wait_complete(1000).is_ok());

        d.context_mut().unwrap().set_status(status::READY | status::BUSY);
        assert!(matches!(d.wait_complete(1000), Err(AxonError::Busy)));

        d.context_mut().unwrap().set_status(status::READY | status::ERROR);
        assert!(matches!(d.wait_complete(1000), Err(AxonError::DeviceError { .. })));

        d.context_mut().unwrap().set_status(0);
        assert!(matches!(d.wait_complete(1000), Err(AxonError::Timeout { .. })));
        assert_eq!(d.last_error(), Some("Operation timeout after 0ms"));
    }

    #[test]
    fn configure_and_reset() {
        let mut d = open_driver();
        d.configure(DeviceConfig {
            channels: 4,
            timeout_ms: 10_000,
            ..DeviceConfig::default()
        })
        .unwrap();
        assert_eq!(d.config().unwrap().channels, 4);

        d.reset_config().unwrap();
        assert_eq!(d.config().unwrap(), DeviceConfig::default());
    }
}

//! Register-programming protocol: turning command records into register
//! window writes.
//!
//! Every write is gated on readiness: the device latches the instruction
//! register as a unit, so a command must only land while the ready bit is
//! up, and the full 72-byte image goes in with one copy. A sequence of
//! partial field writes could be latched as a torn command.

use crate::command::{
    CommandHeader, CommandPayload, CommandRecord, Img2colParams, LsuParams, SystolicParams,
};
use crate::context::DeviceContext;
use crate::error::{AxonError, Result};
use crate::sync::{wait_for_ready_blocking, WaitPolicy};
use axon_chip::regs;

/// Write a command record into the instruction register.
///
/// Waits for readiness first; on budget exhaustion nothing is written.
///
/// # Errors
///
/// Returns `AxonError::Timeout` if the device never reported ready within
/// the policy's budget.
#[allow(clippy::cast_possible_truncation)]
pub fn write_command(
    ctx: &mut DeviceContext,
    record: &CommandRecord,
    policy: &WaitPolicy,
) -> Result<()> {
    if !wait_for_ready_blocking(ctx, policy) {
        return Err(AxonError::timeout(policy.budget().as_millis() as u64));
    }

    let image = record.encode();
    ctx.regs_mut().write_bytes(regs::COMMAND, &image)?;

    tracing::debug!(opcode = record.header.opcode, "command written");
    Ok(())
}

/// Program a load-store unit transfer.
///
/// # Errors
///
/// Propagates [`write_command`] failures.
pub fn configure_lsu(
    ctx: &mut DeviceContext,
    params: LsuParams,
    policy: &WaitPolicy,
) -> Result<()> {
    let header = CommandHeader {
        src_addr: params.src_addr,
        dst_addr: params.dst_addr,
        length: params.length,
        control: params.control,
        ..Default::default()
    };
    write_command(ctx, &CommandRecord::new(header, CommandPayload::Lsu(params)), policy)
}

/// Program a systolic array operation.
///
/// # Errors
///
/// Propagates [`write_command`] failures.
pub fn configure_systolic(
    ctx: &mut DeviceContext,
    params: SystolicParams,
    policy: &WaitPolicy,
) -> Result<()> {
    let header = CommandHeader {
        control: params.control,
        ..Default::default()
    };
    write_command(
        ctx,
        &CommandRecord::new(header, CommandPayload::Systolic(params)),
        policy,
    )
}

/// Program an image-to-column transform.
///
/// # Errors
///
/// Propagates [`write_command`] failures.
pub fn configure_img2col(
    ctx: &mut DeviceContext,
    params: Img2colParams,
    policy: &WaitPolicy,
) -> Result<()> {
    let header = CommandHeader {
        control: params.control,
        ..Default::default()
    };
    write_command(
        ctx,
        &CommandRecord::new(header, CommandPayload::Img2col(params)),
        policy,
    )
}

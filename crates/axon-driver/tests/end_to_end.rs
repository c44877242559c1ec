//! End-to-end driver scenarios over the simulated device.

use axon_driver::config::flags;
use axon_driver::prelude::*;
use axon_driver::BufferDescriptor;

fn open_driver() -> AxonDriver {
    let mut d = AxonDriver::new();
    d.open_simulated().expect("simulated open");
    d.set_wait_policy(WaitPolicy::immediate());
    d
}

#[test]
fn matmul_end_to_end() {
    let mut d = open_driver();

    let input = d.alloc_buffer(1024).unwrap();
    let output = d.alloc_buffer(1024).unwrap();
    let weights = d.alloc_buffer(1024).unwrap();

    // Fill the input with f32 activations, byte-viewed for the transfer.
    let activations = [0.5f32; 256];
    d.write_buffer(&input, bytemuck::cast_slice(&activations))
        .unwrap();

    d.submit(&OpRequest {
        op: OpKind::MatMul,
        input,
        output,
        weights,
        flags: 0,
    })
    .unwrap();
    d.wait_complete(1000).unwrap();

    // A malformed request afterwards is rejected without disturbing the
    // driver state.
    let bad = OpRequest {
        op: OpKind::MatMul,
        input: BufferDescriptor::default(),
        output: BufferDescriptor::default(),
        weights: BufferDescriptor::default(),
        flags: 0,
    };
    assert!(matches!(d.submit(&bad), Err(AxonError::InvalidParameter { .. })));
    assert!(d.last_error().is_some());

    d.free_buffer(input);
    d.free_buffer(output);
    d.free_buffer(weights);
    d.close();
}

#[test]
fn reset_restores_documented_defaults() {
    let mut d = open_driver();

    d.configure(DeviceConfig {
        channels: 4,
        timeout_ms: 10_000,
        ..DeviceConfig::default()
    })
    .unwrap();

    d.reset_config().unwrap();
    let cfg = d.config().unwrap();
    assert_eq!(cfg.flags, flags::ENABLE_DMA);
    assert_eq!(cfg.channels, 1);
    assert_eq!(cfg.max_transfer, 16 * 1024 * 1024);
    assert_eq!(cfg.timeout_ms, 1000);
}

#[test]
fn runtime_scoped_session() {
    let rt = Runtime::simulated().unwrap();
    rt.set_wait_policy(WaitPolicy::immediate());
    rt.configure(flags::ENABLE_DMA | flags::SYNC_MODE, 1, 16 * 1024 * 1024, 1000)
        .unwrap();

    let mut input = rt.alloc(1024).unwrap();
    let weights = rt.alloc(1024).unwrap();
    let mut output = rt.alloc(1024).unwrap();

    input.write(&[3u8; 1024]).unwrap();
    rt.matrix_multiply(&input, &weights, &mut output).unwrap();
    rt.convolution_2d(&input, &weights, &mut output).unwrap();

    let mut out = vec![0u8; output.size() as usize];
    output.read(&mut out).unwrap();
}

#[test]
fn allocation_survives_heavy_churn() {
    let mut d = open_driver();

    // Interleave allocations and frees, then confirm the arena drains
    // back to a single free run.
    let full = d.context_mut().unwrap().arena().available();
    let mut live = Vec::new();
    for round in 0u32..32 {
        live.push(d.alloc_buffer(1024 * (round % 7 + 1)).unwrap());
        if round % 3 == 0 {
            let victim = live.swap_remove(round as usize % live.len());
            d.free_buffer(victim);
        }
    }
    for buf in live.drain(..) {
        d.free_buffer(buf);
    }
    assert_eq!(d.context_mut().unwrap().arena().available(), full);
    assert!(d.alloc_buffer(full as u32 / 2).is_ok());
}

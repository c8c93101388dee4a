//! End-to-end tests against a real adapter. Each test skips when the machine
//! exposes no compute device.

use std::time::Duration;

use kernelrun_engine::device::{DeviceFilter, Enumerator, EnumeratorConfig};
use kernelrun_engine::memory::{AccessFlags, Buffer};
use kernelrun_engine::program::{BuildStatus, Program};
use kernelrun_engine::session::{QueueOrdering, Session, SessionConfig};
use kernelrun_engine::sync::{self, EventStatus, Operation};
use kernelrun_engine::teardown::{self, Release, ReleaseLedger, Stage, Teardown};
use kernelrun_engine::ComputeError;

const KERNELS: &str = r#"
@group(0) @binding(0) var<storage, read> a: array<f32>;
@group(0) @binding(1) var<storage, read> b: array<f32>;
@group(0) @binding(2) var<storage, read_write> c: array<f32>;
@group(0) @binding(3) var<uniform> factor: f32;

@compute @workgroup_size(64)
fn vector_sum(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i < arrayLength(&c)) {
        c[i] = a[i] + b[i];
    }
}

@compute @workgroup_size(64)
fn vector_scale(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i < arrayLength(&c)) {
        c[i] = c[i] * factor;
    }
}
"#;

const N: usize = 256;

fn open_session(ordering: QueueOrdering) -> Option<Session> {
    let enumerator = Enumerator::new(EnumeratorConfig {
        device_filter: DeviceFilter::Any,
        ..Default::default()
    });
    let device = match enumerator.select_device(&[""]) {
        Ok(device) => device,
        Err(err) => {
            eprintln!("skipping: no compute device ({err})");
            return None;
        }
    };
    let config = SessionConfig {
        ordering,
        ..Default::default()
    };
    match Session::open(&device, &config) {
        Ok(session) => Some(session),
        Err(err) => {
            eprintln!("skipping: {err}");
            None
        }
    }
}

fn f32_bytes(len: usize) -> usize {
    len * std::mem::size_of::<f32>()
}

#[test]
fn write_then_read_round_trips() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let queue = session.queue().unwrap();
    let data: Vec<u32> = (0..64).map(|i| i * 3 + 1).collect();
    let buffer = Buffer::allocate(&session, 64 * 4, AccessFlags::ReadWrite).unwrap();

    let wrote = queue.enqueue_write(&buffer, &data, false, &[]).unwrap();
    assert_eq!(wrote.operation(), Operation::Write);
    queue.finish().unwrap();
    assert_eq!(wrote.status(), EventStatus::Complete);

    let mut back = vec![0u32; 64];
    let pending = queue.enqueue_read(&buffer, &mut back, true, &[]).unwrap();
    assert!(pending.is_complete());
    drop(pending);
    assert_eq!(back, data);
}

#[test]
fn vector_sum_adds_squares() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let a: Vec<f32> = (0..N).map(|i| (i * i) as f32).collect();
    let b: Vec<f32> = (0..N).map(|i| i as f32).collect();
    let mut c = vec![0.0f32; N];

    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    let kernel = program.create_kernel("vector_sum").unwrap();
    assert_eq!(kernel.param_count(), 3);

    let a_buf = Buffer::allocate(&session, f32_bytes(N), AccessFlags::ReadOnly).unwrap();
    let b_buf = Buffer::allocate(&session, f32_bytes(N), AccessFlags::ReadOnly).unwrap();
    let c_buf = Buffer::allocate(&session, f32_bytes(N), AccessFlags::WriteOnly).unwrap();
    kernel.set_argument(0, &a_buf).unwrap();
    kernel.set_argument(1, &b_buf).unwrap();
    kernel.set_argument(2, &c_buf).unwrap();

    let queue = session.queue().unwrap();
    let wa = queue.enqueue_write(&a_buf, &a, false, &[]).unwrap();
    let wb = queue.enqueue_write(&b_buf, &b, false, &[]).unwrap();
    let ran = queue.dispatch(&kernel, &[N], Some(&[64]), &[wa, wb]).unwrap();
    queue.enqueue_read(&c_buf, &mut c, false, &[ran]).unwrap().wait().unwrap();

    for (i, value) in c.iter().enumerate() {
        assert_eq!(*value, (i * i + i) as f32, "c[{i}]");
    }
}

#[test]
fn scalar_arguments_reach_the_kernel() {
    let Some(session) = open_session(QueueOrdering::OutOfOrder) else {
        return;
    };
    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    let kernel = program.create_kernel("vector_scale").unwrap();
    let buffer = Buffer::allocate(&session, f32_bytes(100), AccessFlags::ReadWrite).unwrap();
    kernel.set_argument(0, &buffer).unwrap();
    kernel.set_argument(1, 2.5f32).unwrap();

    let queue = session.queue().unwrap();
    let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
    let wrote = queue.enqueue_write(&buffer, &input, false, &[]).unwrap();
    // 100 items with a declared size of 64 rounds up to two groups.
    let ran = queue.dispatch(&kernel, &[100], None, &[wrote]).unwrap();
    sync::wait_within(&[ran.clone()], Duration::from_secs(30)).unwrap();
    assert!(ran.is_complete());

    let mut out = vec![0.0f32; 100];
    queue.enqueue_read(&buffer, &mut out, true, &[ran]).unwrap().wait().unwrap();
    for (i, value) in out.iter().enumerate() {
        assert_eq!(*value, i as f32 * 2.5);
    }
}

#[test]
fn zero_sized_allocation_fails() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let err = Buffer::allocate(&session, 0, AccessFlags::ReadWrite).unwrap_err();
    assert!(matches!(err, ComputeError::BufferAllocation { size: 0, .. }));
}

#[test]
fn transfer_size_must_match_exactly() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let queue = session.queue().unwrap();
    let buffer = Buffer::allocate(&session, 16, AccessFlags::ReadWrite).unwrap();

    let err = queue.enqueue_write(&buffer, &[1u32, 2, 3], true, &[]).unwrap_err();
    assert!(matches!(
        err,
        ComputeError::SizeMismatch { expected: 16, actual: 12, .. }
    ));

    let mut too_big = [0u32; 5];
    let err = queue.enqueue_read(&buffer, &mut too_big, true, &[]).err().unwrap();
    assert!(matches!(err, ComputeError::SizeMismatch { actual: 20, .. }));
}

#[test]
fn dispatch_rejects_indivisible_global_size() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    let kernel = program.create_kernel("vector_sum").unwrap();
    let queue = session.queue().unwrap();

    let err = queue.dispatch(&kernel, &[100], Some(&[64]), &[]).unwrap_err();
    assert!(matches!(err, ComputeError::WorkGroupSize { .. }));
}

#[test]
fn unbound_and_out_of_range_arguments_are_rejected() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    let kernel = program.create_kernel("vector_sum").unwrap();
    let buffer = Buffer::allocate(&session, f32_bytes(N), AccessFlags::ReadWrite).unwrap();

    let err = kernel.set_argument(5, &buffer).unwrap_err();
    assert!(matches!(
        err,
        ComputeError::InvalidArgumentIndex { index: 5, count: 3, .. }
    ));

    kernel.set_argument(0, &buffer).unwrap();
    let err = session.queue().unwrap().dispatch(&kernel, &[N], None, &[]).unwrap_err();
    assert!(matches!(err, ComputeError::UnboundArgument { index: 1, .. }));
}

#[test]
fn read_only_buffer_cannot_back_a_writable_parameter() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    let kernel = program.create_kernel("vector_sum").unwrap();
    let buffer = Buffer::allocate(&session, f32_bytes(N), AccessFlags::ReadOnly).unwrap();

    let err = kernel.set_argument(2, &buffer).unwrap_err();
    assert!(matches!(err, ComputeError::ArgumentType { index: 2, .. }));
    assert!(!kernel.is_bound(2));
}

#[test]
fn writable_argument_may_not_alias() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    let kernel = program.create_kernel("vector_sum").unwrap();
    let shared = Buffer::allocate(&session, f32_bytes(N), AccessFlags::ReadWrite).unwrap();
    let other = Buffer::allocate(&session, f32_bytes(N), AccessFlags::ReadWrite).unwrap();

    kernel.set_argument(0, &other).unwrap();
    kernel.set_argument(1, &shared).unwrap();
    kernel.set_argument(2, &shared).unwrap();

    let err = session.queue().unwrap().dispatch(&kernel, &[N], None, &[]).unwrap_err();
    assert!(matches!(
        err,
        ComputeError::ArgumentAliasing { first: 1, second: 2, .. }
    ));
}

#[test]
fn released_buffer_cannot_be_dispatched() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    let kernel = program.create_kernel("vector_sum").unwrap();
    let mut buffers: Vec<Buffer> = (0..3)
        .map(|_| Buffer::allocate(&session, f32_bytes(N), AccessFlags::ReadWrite).unwrap())
        .collect();
    for (i, buffer) in buffers.iter().enumerate() {
        kernel.set_argument(i as u32, buffer).unwrap();
    }

    let mut ledger = ReleaseLedger::default();
    buffers[1].release(&mut ledger);
    assert!(buffers[1].is_released());

    let err = session.queue().unwrap().dispatch(&kernel, &[N], None, &[]).unwrap_err();
    assert!(matches!(err, ComputeError::Released { .. }));

    let queue = session.queue().unwrap();
    let err = queue.enqueue_write(&buffers[1], &[0.0f32; N], true, &[]).unwrap_err();
    assert!(matches!(err, ComputeError::Released { .. }));
}

#[test]
fn failed_build_reports_log_and_notifies() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let program = Program::from_source(&session, "@compute @workgroup_size(1) fn broken( {").unwrap();
    assert!(matches!(
        program.create_kernel("broken").unwrap_err(),
        ComputeError::ProgramNotBuilt { status: "unbuilt" }
    ));

    let mut notified = String::new();
    let err = program
        .build_with_notify("", |log| notified = log.to_string())
        .unwrap_err();
    let log = err.build_log().unwrap();
    assert!(!log.is_empty());
    assert_eq!(notified, log);
    assert!(matches!(program.status(), BuildStatus::Failed { .. }));
}

#[test]
fn missing_entry_point_is_kernel_not_found() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    assert_eq!(program.status(), BuildStatus::Built);
    let err = program.create_kernel("vector_mul").unwrap_err();
    assert!(matches!(err, ComputeError::KernelNotFound { .. }));
}

#[test]
fn oversized_work_group_memory_is_a_signature_error() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let src = r#"
@group(0) @binding(0) var<storage, read_write> out: array<f32>;
var<workgroup> tile: array<f32, 262144>;

@compute @workgroup_size(64)
fn tiled(@builtin(local_invocation_index) lid: u32) {
    tile[lid] = f32(lid);
    workgroupBarrier();
    out[lid] = tile[lid];
}
"#;
    let program = Program::build_from_source(&session, src, "").unwrap();
    let err = program.create_kernel("tiled").unwrap_err();
    assert!(matches!(err, ComputeError::KernelSignature { .. }), "{err}");
}

#[test]
fn foreign_buffers_are_rejected() {
    let (Some(first), Some(second)) = (
        open_session(QueueOrdering::InOrder),
        open_session(QueueOrdering::InOrder),
    ) else {
        return;
    };
    let buffer = Buffer::allocate(&second, 16, AccessFlags::ReadWrite).unwrap();
    let err = first
        .queue()
        .unwrap()
        .enqueue_write(&buffer, &[0u32; 4], true, &[])
        .unwrap_err();
    assert!(matches!(err, ComputeError::SessionMismatch { .. }));
}

#[test]
fn session_release_is_idempotent() {
    let Some(mut session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    session.close();
    assert!(session.is_closed());

    let mut ledger = ReleaseLedger::default();
    session.release(&mut ledger);
    assert_eq!(ledger.released_count(), 0);
    assert_eq!(ledger.already_released_count(), 3);

    assert!(matches!(
        session.queue().unwrap_err(),
        ComputeError::SessionClosed { .. }
    ));
    assert!(matches!(
        Buffer::allocate(&session, 16, AccessFlags::ReadWrite).unwrap_err(),
        ComputeError::SessionClosed { .. }
    ));
}

#[test]
fn release_visits_stages_in_dependency_order() {
    let Some(mut session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let program = Program::build_from_source(&session, KERNELS, "").unwrap();
    let kernel = program.create_kernel("vector_sum").unwrap();
    let buffers: Vec<Buffer> = (0..3)
        .map(|_| Buffer::allocate(&session, 64, AccessFlags::ReadWrite).unwrap())
        .collect();

    let ledger = teardown::release(&mut session, program, kernel, buffers);
    assert_eq!(
        ledger.released_stages(),
        [
            Stage::Buffer,
            Stage::Buffer,
            Stage::Buffer,
            Stage::Kernel,
            Stage::Program,
            Stage::Queue,
            Stage::Context,
            Stage::Device,
        ]
    );
    assert!(session.is_closed());
}

#[test]
fn teardown_scope_unwinds_tracked_handles() {
    let Some(session) = open_session(QueueOrdering::InOrder) else {
        return;
    };
    let mut scope = Teardown::new(session);
    let buffer = Buffer::allocate(scope.session(), 64, AccessFlags::ReadWrite).unwrap();
    let buffer = scope.adopt(buffer);
    let program = Program::build_from_source(scope.session(), KERNELS, "").unwrap();
    let program = scope.adopt(program);

    let ledger = scope.release_all().clone();
    assert!(buffer.is_released());
    assert_eq!(ledger.steps()[0].stage, Stage::Buffer);
    assert_eq!(ledger.steps()[1].stage, Stage::Program);
    assert!(scope.session().is_closed());
    assert!(matches!(
        program.create_kernel("vector_sum").unwrap_err(),
        ComputeError::Released { .. }
    ));
}

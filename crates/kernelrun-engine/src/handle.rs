//! Shared plumbing for the reference-counted handle types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id for buffers, programs and kernels.
pub(crate) fn next_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Locks handle state. A panic while holding the lock leaves the state
/// consistent (every mutation is a single assignment), so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `create` inside validation and out-of-memory error scopes and
/// returns whatever error wgpu reported for it.
pub(crate) fn captured<T>(
    device: &wgpu::Device,
    create: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    let oom = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let invalid = pollster::block_on(validation.pop());
    let exhausted = pollster::block_on(oom.pop());
    (value, invalid.or(exhausted))
}

use std::sync::{Arc, Mutex};

use crate::device::DeviceLimits;
use crate::dispatch::{ArgumentTable, KernelArg, ResolvedArg};
use crate::error::{ComputeError, Result};
use crate::handle::{lock, next_id};
use crate::teardown::{Release, ReleaseLedger, Stage};

use super::KernelSignature;

/// One entry point of a built program plus its argument bindings.
///
/// Cloning yields another handle to the same kernel and bindings.
#[derive(Clone)]
pub struct Kernel {
    shared: Arc<KernelShared>,
}

struct KernelShared {
    id: u64,
    session_id: u64,
    signature: KernelSignature,
    state: Mutex<KernelState>,
}

struct KernelState {
    pipeline: Option<wgpu::ComputePipeline>,
    args: ArgumentTable,
}

impl Kernel {
    pub(crate) fn new(
        session_id: u64,
        signature: KernelSignature,
        pipeline: wgpu::ComputePipeline,
        limits: DeviceLimits,
    ) -> Self {
        let args = ArgumentTable::new(&signature, limits);
        Self {
            shared: Arc::new(KernelShared {
                id: next_id(),
                session_id,
                signature,
                state: Mutex::new(KernelState {
                    pipeline: Some(pipeline),
                    args,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.signature.name
    }

    pub fn session_id(&self) -> u64 {
        self.shared.session_id
    }

    pub fn signature(&self) -> &KernelSignature {
        &self.shared.signature
    }

    pub fn param_count(&self) -> usize {
        self.shared.signature.param_count()
    }

    /// Binds argument `index` to a buffer (by weak reference) or a scalar.
    pub fn set_argument<'a>(&self, index: u32, value: impl Into<KernelArg<'a>>) -> Result<()> {
        let value = value.into();
        if let KernelArg::Buffer(buffer) = &value {
            if buffer.session_id() != self.shared.session_id {
                return Err(ComputeError::SessionMismatch { op: "set_argument" });
            }
        }

        let mut state = lock(&self.shared.state);
        if state.pipeline.is_none() {
            return Err(ComputeError::Released {
                op: "set_argument",
                what: self.label(),
            });
        }
        state.args.bind(index, value)
    }

    pub fn is_bound(&self, index: u32) -> bool {
        lock(&self.shared.state).args.is_bound(index)
    }

    /// Pipeline and resolved arguments for one dispatch.
    pub(crate) fn prepare(&self, op: &'static str) -> Result<(wgpu::ComputePipeline, Vec<ResolvedArg>)> {
        let state = lock(&self.shared.state);
        let pipeline = state.pipeline.clone().ok_or_else(|| ComputeError::Released {
            op,
            what: self.label(),
        })?;
        let args = state.args.resolve(op)?;
        Ok((pipeline, args))
    }
}

impl Release for Kernel {
    fn stage(&self) -> Stage {
        Stage::Kernel
    }

    fn label(&self) -> String {
        format!("kernel `{}` ({})", self.shared.signature.name, self.shared.id)
    }

    fn release(&mut self, ledger: &mut ReleaseLedger) {
        let mut state = lock(&self.shared.state);
        let first = state.pipeline.take().is_some();
        if first {
            state.args.clear();
        }
        drop(state);
        ledger.record(Stage::Kernel, &self.label(), first);
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("id", &self.shared.id)
            .field("name", &self.shared.signature.name)
            .field("params", &self.shared.signature.param_count())
            .finish()
    }
}

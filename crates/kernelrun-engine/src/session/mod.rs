//! Compute sessions: one device reference, one context, one command queue.
//!
//! The context is a `wgpu::Device`. Programs, kernels and buffers created
//! against a session hold their own reference-counted handles to it, so the
//! native context can never be freed while they are alive. Closing a session
//! drops the session's references and stops further submissions.

mod config;
mod queue;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use config::{QueueOrdering, SessionConfig};
pub use queue::CommandQueue;

use crate::device::{Device, DeviceInfo, DeviceLimits};
use crate::error::{ComputeError, Result};
use crate::teardown::{Release, ReleaseLedger, Stage};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Owns the device reference, context and queue of one compute session.
pub struct Session {
    id: u64,
    label: String,
    info: DeviceInfo,
    limits: DeviceLimits,

    /// Device reference; dropped last.
    adapter: Option<wgpu::Adapter>,

    /// Logical device; dropped after the queue.
    context: Option<wgpu::Device>,

    queue: Option<CommandQueue>,
}

impl Session {
    /// Creates a context on `device`, then its command queue.
    ///
    /// The queue is probed with an empty submission bounded by
    /// `config.queue_probe_timeout`; a queue that cannot complete it is a
    /// queue creation failure.
    pub fn open(device: &Device, config: &SessionConfig) -> Result<Self> {
        let adapter = device.adapter().clone();
        let info = device.info().clone();

        let required_limits = config
            .required_limits
            .clone()
            .unwrap_or_else(|| adapter.limits());

        let (context, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(&config.label),
            required_features: config.required_features,
            required_limits,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| ComputeError::ContextCreation {
            op: "open_session",
            status: e.to_string(),
        })?;

        let probe = queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
        context
            .poll(wgpu::PollType::Wait {
                submission_index: Some(probe),
                timeout: Some(config.queue_probe_timeout),
            })
            .map_err(|e| ComputeError::QueueCreation {
                op: "open_session",
                status: e.to_string(),
            })?;

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        install_error_handlers(id, &context);
        let limits = DeviceLimits::from_wgpu(&context.limits());
        let queue = CommandQueue::new(id, context.clone(), queue, limits, config.ordering);

        log::info!(
            "session {id} opened on {} ({:?} queue)",
            info.name,
            config.ordering
        );

        Ok(Self {
            id,
            label: config.label.clone(),
            info,
            limits,
            adapter: Some(adapter),
            context: Some(context),
            queue: Some(queue),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Limits granted to this session's context.
    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_none() && self.context.is_none() && self.adapter.is_none()
    }

    /// The session's command queue.
    pub fn queue(&self) -> Result<&CommandQueue> {
        self.queue
            .as_ref()
            .ok_or(ComputeError::SessionClosed { op: "queue" })
    }

    pub(crate) fn context(&self, op: &'static str) -> Result<&wgpu::Device> {
        self.context.as_ref().ok_or(ComputeError::SessionClosed { op })
    }

    /// Releases queue, context and device reference, in that order.
    ///
    /// Calling this again is a no-op.
    pub fn close(&mut self) {
        let mut ledger = ReleaseLedger::default();
        self.release(&mut ledger);
    }
}

/// Errors no scope captured, and device loss, end up in the log instead of
/// wgpu's default panic.
fn install_error_handlers(id: u64, context: &wgpu::Device) {
    context.on_uncaptured_error(Arc::new(move |error: wgpu::Error| {
        log::error!("session {id}: uncaptured device error: {error}");
    }));
    context.set_device_lost_callback(move |reason, message| {
        log::error!("session {id}: device lost ({reason:?}): {message}");
    });
}

impl Release for Session {
    fn stage(&self) -> Stage {
        Stage::Queue
    }

    fn label(&self) -> String {
        format!("session {} ({})", self.id, self.label)
    }

    fn release(&mut self, ledger: &mut ReleaseLedger) {
        let label = self.label();

        let queue = self.queue.take();
        if queue.is_some() {
            log::debug!("{label}: releasing command queue");
        }
        ledger.record(Stage::Queue, &label, queue.is_some());
        drop(queue);

        let context = self.context.take();
        if context.is_some() {
            log::debug!("{label}: releasing context");
        }
        ledger.record(Stage::Context, &label, context.is_some());
        drop(context);

        let adapter = self.adapter.take();
        ledger.record(Stage::Device, &label, adapter.is_some());
        drop(adapter);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("device", &self.info.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

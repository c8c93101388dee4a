use std::sync::{Arc, Mutex, Weak};

use crate::error::{ComputeError, Result};
use crate::handle::{captured, lock, next_id};
use crate::session::Session;
use crate::teardown::{Release, ReleaseLedger, Stage};

/// How kernels may use a buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum AccessFlags {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

impl AccessFlags {
    pub fn device_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::WriteOnly => "write-only",
            Self::ReadWrite => "read-write",
        }
    }
}

/// Fixed-size device memory owned by one session.
///
/// Cloning yields another handle to the same allocation. The allocation is
/// freed on release or when the last handle drops; kernels only keep weak
/// references to the buffers bound to them.
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<BufferShared>,
}

struct BufferShared {
    id: u64,
    session_id: u64,
    size: usize,
    access: AccessFlags,
    raw: Mutex<Option<wgpu::Buffer>>,
}

/// Non-owning buffer reference held by argument bindings.
#[derive(Clone)]
pub(crate) struct WeakBuffer {
    id: u64,
    shared: Weak<BufferShared>,
}

impl WeakBuffer {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn upgrade(&self) -> Option<Buffer> {
        self.shared.upgrade().map(|shared| Buffer { shared })
    }
}

impl Buffer {
    /// Allocates `size` bytes of device memory.
    pub fn allocate(session: &Session, size: usize, access: AccessFlags) -> Result<Self> {
        let device = session.context("allocate_buffer")?;
        let max = session.limits().max_buffer_size;

        if size == 0 {
            return Err(ComputeError::BufferAllocation {
                size,
                reason: "buffer size must be non-zero".to_string(),
            });
        }
        let padded = padded_size(size);
        if padded > max {
            return Err(ComputeError::BufferAllocation {
                size,
                reason: format!("device maximum is {max} bytes"),
            });
        }

        let id = next_id();
        let label = format!("buffer {id}");
        let (raw, error) = captured(device, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&label),
                size: padded,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        if let Some(err) = error {
            raw.destroy();
            return Err(ComputeError::BufferAllocation {
                size,
                reason: err.to_string(),
            });
        }
        log::trace!("{label}: {size} bytes, {}", access.name());

        Ok(Self {
            shared: Arc::new(BufferShared {
                id,
                session_id: session.id(),
                size,
                access,
                raw: Mutex::new(Some(raw)),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn session_id(&self) -> u64 {
        self.shared.session_id
    }

    /// Size in bytes as requested at allocation.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    pub fn access(&self) -> AccessFlags {
        self.shared.access
    }

    pub fn is_released(&self) -> bool {
        lock(&self.shared.raw).is_none()
    }

    pub(crate) fn raw(&self, op: &'static str) -> Result<wgpu::Buffer> {
        lock(&self.shared.raw)
            .clone()
            .ok_or_else(|| ComputeError::Released {
                op,
                what: self.label(),
            })
    }

    pub(crate) fn downgrade(&self) -> WeakBuffer {
        WeakBuffer {
            id: self.shared.id,
            shared: Arc::downgrade(&self.shared),
        }
    }
}

/// Allocation size rounded up to the copy alignment.
pub(crate) fn padded_size(size: usize) -> u64 {
    (size as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

impl Release for Buffer {
    fn stage(&self) -> Stage {
        Stage::Buffer
    }

    fn label(&self) -> String {
        format!("buffer {}", self.shared.id)
    }

    fn release(&mut self, ledger: &mut ReleaseLedger) {
        let raw = lock(&self.shared.raw).take();
        if let Some(raw) = &raw {
            raw.destroy();
        }
        ledger.record(Stage::Buffer, &self.label(), raw.is_some());
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.shared.id)
            .field("size", &self.shared.size)
            .field("access", &self.shared.access)
            .field("released", &self.is_released())
            .finish()
    }
}

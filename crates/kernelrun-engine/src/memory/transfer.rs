use std::sync::mpsc;

use bytemuck::Pod;

use crate::error::{ComputeError, Result};
use crate::session::CommandQueue;
use crate::sync::{self, Event, Operation};

use super::buffer::padded_size;
use super::Buffer;

type MapResult = std::result::Result<(), wgpu::BufferAsyncError>;

impl CommandQueue {
    /// Copies `data` into `buffer`.
    ///
    /// `data` must cover the buffer exactly. With `blocking` the call returns
    /// after the transfer completed; otherwise await the returned event.
    pub fn enqueue_write<T: Pod>(
        &self,
        buffer: &Buffer,
        data: &[T],
        blocking: bool,
        wait_on: &[Event],
    ) -> Result<Event> {
        const OP: &str = "enqueue_write";
        self.check_session(OP, buffer.session_id())?;
        let raw = buffer.raw(OP)?;

        let bytes: &[u8] = bytemuck::cast_slice(data);
        check_len(OP, buffer, bytes.len())?;
        self.honor_wait_list(OP, wait_on)?;

        let padded = padded_size(bytes.len()) as usize;
        if padded == bytes.len() {
            self.queue.write_buffer(&raw, 0, bytes);
        } else {
            let mut staged = Vec::with_capacity(padded);
            staged.extend_from_slice(bytes);
            staged.resize(padded, 0);
            self.queue.write_buffer(&raw, 0, &staged);
        }

        let event = self.submit(Operation::Write, std::iter::empty());
        log::trace!("{OP}: {} bytes, event {}", bytes.len(), event.sequence());
        if blocking {
            sync::wait(std::slice::from_ref(&event))?;
        }
        Ok(event)
    }

    /// Copies `buffer` into `host`.
    ///
    /// The returned [`PendingRead`] borrows `host` until the copy is done.
    /// With `blocking` it is already complete.
    pub fn enqueue_read<'h, T: Pod>(
        &self,
        buffer: &Buffer,
        host: &'h mut [T],
        blocking: bool,
        wait_on: &[Event],
    ) -> Result<PendingRead<'h, T>> {
        const OP: &str = "enqueue_read";
        self.check_session(OP, buffer.session_id())?;
        let raw = buffer.raw(OP)?;
        check_len(OP, buffer, std::mem::size_of_val(host))?;
        self.honor_wait_list(OP, wait_on)?;

        let len = buffer.size();
        let padded = padded_size(len);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("read staging"),
            size: padded,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(OP) });
        encoder.copy_buffer_to_buffer(&raw, 0, &staging, 0, padded);
        let event = self.submit(Operation::Read, Some(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        log::trace!("{OP}: {len} bytes, event {}", event.sequence());

        let mut pending = PendingRead {
            host: Some(host),
            staging,
            len,
            event,
            mapped: rx,
        };
        if blocking {
            pending.complete()?;
        }
        Ok(pending)
    }
}

fn check_len(op: &'static str, buffer: &Buffer, actual: usize) -> Result<()> {
    if actual == buffer.size() {
        Ok(())
    } else {
        Err(ComputeError::SizeMismatch {
            op,
            expected: buffer.size(),
            actual,
        })
    }
}

/// A device-to-host copy in flight.
///
/// Holds the host region until the copy lands. Dropping an incomplete read
/// blocks until it completes.
#[must_use = "a pending read fills the host region only once completed"]
pub struct PendingRead<'h, T: Pod> {
    host: Option<&'h mut [T]>,
    staging: wgpu::Buffer,
    len: usize,
    event: Event,
    mapped: mpsc::Receiver<MapResult>,
}

impl<T: Pod> PendingRead<'_, T> {
    /// Completion token of the device-side copy.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Whether the host region has been filled.
    pub fn is_complete(&self) -> bool {
        self.host.is_none()
    }

    /// Blocks until the host region holds the buffer contents.
    pub fn wait(mut self) -> Result<()> {
        self.complete()
    }

    fn complete(&mut self) -> Result<()> {
        let Some(host) = self.host.take() else {
            return Ok(());
        };

        let device = &self.event.device;
        sync::poll_wait("enqueue_read", device, Some(self.event.index.clone()), None)?;
        let mapped = match self.mapped.try_recv() {
            Ok(result) => result,
            Err(_) => {
                // The map callback may trail its submission by one poll.
                sync::poll_wait("enqueue_read", device, None, None)?;
                self.mapped.recv().map_err(|_| ComputeError::Device {
                    op: "enqueue_read",
                    status: "buffer mapping was abandoned".to_string(),
                })?
            }
        };
        mapped.map_err(|e| ComputeError::Device {
            op: "enqueue_read",
            status: e.to_string(),
        })?;

        {
            let view = self.staging.slice(..).get_mapped_range();
            bytemuck::cast_slice_mut::<T, u8>(host).copy_from_slice(&view[..self.len]);
        }
        self.staging.unmap();
        Ok(())
    }
}

impl<T: Pod> Drop for PendingRead<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.complete() {
            log::warn!("pending read dropped: {err}");
        }
    }
}

impl<T: Pod> std::fmt::Debug for PendingRead<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRead")
            .field("len", &self.len)
            .field("event", &self.event)
            .field("complete", &self.is_complete())
            .finish()
    }
}

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::device::DeviceLimits;
use crate::error::{ComputeError, Result};
use crate::sync::{self, Event, Operation};

use super::QueueOrdering;

/// Submission channel of one session.
///
/// The queue is `Send` but not `Sync`: exactly one logical owner submits.
/// Enqueue methods live next to the components that issue them
/// (`memory`, `dispatch`, `sync`).
pub struct CommandQueue {
    pub(crate) session_id: u64,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) limits: DeviceLimits,
    ordering: QueueOrdering,
    next_seq: Cell<u64>,
}

impl CommandQueue {
    pub(crate) fn new(
        session_id: u64,
        device: wgpu::Device,
        queue: wgpu::Queue,
        limits: DeviceLimits,
        ordering: QueueOrdering,
    ) -> Self {
        Self {
            session_id,
            device,
            queue,
            limits,
            ordering,
            next_seq: Cell::new(0),
        }
    }

    pub fn ordering(&self) -> QueueOrdering {
        self.ordering
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Blocks on the wait-list entries this queue does not order implicitly.
    pub(crate) fn honor_wait_list(&self, op: &'static str, wait_on: &[Event]) -> Result<()> {
        let explicit: Vec<Event> = wait_on
            .iter()
            .filter(|e| needs_host_wait(self.ordering, self.session_id, e.queue_id()))
            .cloned()
            .collect();
        if explicit.is_empty() {
            return Ok(());
        }
        log::trace!("{op}: host wait on {} event(s)", explicit.len());
        sync::wait(&explicit)
    }

    /// Submits `commands` and returns the completion token for them.
    pub(crate) fn submit<I>(&self, op: Operation, commands: I) -> Event
    where
        I: IntoIterator<Item = wgpu::CommandBuffer>,
    {
        let index = self.queue.submit(commands);

        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        self.queue.on_submitted_work_done(move || {
            flag.store(true, Ordering::Release);
        });

        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        Event::new(op, self.session_id, seq, index, self.device.clone(), done)
    }

    pub(crate) fn check_session(&self, op: &'static str, session_id: u64) -> Result<()> {
        if session_id == self.session_id {
            Ok(())
        } else {
            Err(ComputeError::SessionMismatch { op })
        }
    }
}

/// Whether a wait-list event from `event_queue` needs a host-side wait
/// before work is submitted to `own_queue`. An in-order queue already orders
/// its own submissions.
pub(crate) fn needs_host_wait(ordering: QueueOrdering, own_queue: u64, event_queue: u64) -> bool {
    ordering == QueueOrdering::OutOfOrder || event_queue != own_queue
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("session_id", &self.session_id)
            .field("ordering", &self.ordering)
            .field("submitted", &self.next_seq.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_queue_skips_its_own_events() {
        assert!(!needs_host_wait(QueueOrdering::InOrder, 3, 3));
        assert!(needs_host_wait(QueueOrdering::InOrder, 3, 4));
    }

    #[test]
    fn out_of_order_queue_waits_on_every_event() {
        assert!(needs_host_wait(QueueOrdering::OutOfOrder, 3, 3));
        assert!(needs_host_wait(QueueOrdering::OutOfOrder, 3, 4));
    }
}

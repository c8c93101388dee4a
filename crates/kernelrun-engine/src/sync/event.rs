use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Kind of enqueued operation an [`Event`] tracks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operation {
    Write,
    Read,
    Dispatch,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EventStatus {
    /// Handed to the device, not yet known to be finished.
    Submitted,
    Complete,
}

/// Completion token for one enqueued operation.
///
/// Cloning is cheap; all clones observe the same completion.
#[derive(Clone)]
pub struct Event {
    op: Operation,
    queue_id: u64,
    seq: u64,
    pub(crate) index: wgpu::SubmissionIndex,
    pub(crate) device: wgpu::Device,
    done: Arc<AtomicBool>,
}

impl Event {
    pub(crate) fn new(
        op: Operation,
        queue_id: u64,
        seq: u64,
        index: wgpu::SubmissionIndex,
        device: wgpu::Device,
        done: Arc<AtomicBool>,
    ) -> Self {
        Self {
            op,
            queue_id,
            seq,
            index,
            device,
            done,
        }
    }

    pub fn operation(&self) -> Operation {
        self.op
    }

    /// Id of the session whose queue produced this event.
    pub fn queue_id(&self) -> u64 {
        self.queue_id
    }

    /// Submission sequence number within the producing queue.
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Non-blocking completion query.
    pub fn status(&self) -> EventStatus {
        if !self.done.load(Ordering::Acquire) {
            // Completion callbacks only run while the device is polled.
            if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
                log::warn!("event {} ({:?}): device poll failed: {err}", self.seq, self.op);
            }
        }
        if self.done.load(Ordering::Acquire) {
            EventStatus::Complete
        } else {
            EventStatus::Submitted
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == EventStatus::Complete
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("op", &self.op)
            .field("queue_id", &self.queue_id)
            .field("seq", &self.seq)
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish()
    }
}

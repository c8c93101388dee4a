use std::time::Duration;

use crate::error::{ComputeError, Result};
use crate::session::CommandQueue;

use super::Event;

/// Blocks until every event in `events` is complete.
pub fn wait(events: &[Event]) -> Result<()> {
    wait_events("wait", events, None)
}

/// Like [`wait`], but abandons waiting after `timeout`.
///
/// On [`ComputeError::WaitTimeout`] the operations keep running on the
/// device; the state of the buffers they touch is undefined until a later
/// wait succeeds.
pub fn wait_within(events: &[Event], timeout: Duration) -> Result<()> {
    wait_events("wait", events, Some(timeout))
}

fn wait_events(op: &'static str, events: &[Event], timeout: Option<Duration>) -> Result<()> {
    for event in newest_per_queue(events, |e| (e.queue_id(), e.sequence())) {
        poll_wait(op, &event.device, Some(event.index.clone()), timeout)?;
    }
    Ok(())
}

/// The item with the highest sequence number for each queue, in order of
/// first appearance. `key` yields `(queue id, sequence)`.
///
/// A queue retires submissions in order, so waiting for the newest event of
/// each queue covers the older ones.
fn newest_per_queue<T>(items: &[T], key: impl Fn(&T) -> (u64, u64)) -> Vec<&T> {
    let mut newest: Vec<&T> = Vec::new();
    for item in items {
        let (queue, seq) = key(item);
        match newest.iter().position(|&n| key(n).0 == queue) {
            Some(i) if key(newest[i]).1 < seq => newest[i] = item,
            Some(_) => {}
            None => newest.push(item),
        }
    }
    newest
}

pub(crate) fn poll_wait(
    op: &'static str,
    device: &wgpu::Device,
    submission_index: Option<wgpu::SubmissionIndex>,
    timeout: Option<Duration>,
) -> Result<()> {
    match device.poll(wgpu::PollType::Wait {
        submission_index,
        timeout,
    }) {
        Ok(_) => Ok(()),
        Err(wgpu::PollError::Timeout) => Err(ComputeError::WaitTimeout {
            op,
            timeout: timeout.unwrap_or_default(),
        }),
        Err(e) => Err(ComputeError::Device {
            op,
            status: e.to_string(),
        }),
    }
}

impl CommandQueue {
    /// Full barrier: blocks until every operation enqueued so far completed.
    pub fn finish(&self) -> Result<()> {
        log::trace!("finish: session {}", self.session_id);
        poll_wait("finish", &self.device, None, None)
    }

    /// Like [`finish`](Self::finish), but abandons waiting after `timeout`.
    ///
    /// See [`wait_within`] for what a timeout means.
    pub fn finish_within(&self, timeout: Duration) -> Result<()> {
        poll_wait("finish", &self.device, None, Some(timeout))
    }
}

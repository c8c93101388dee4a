//! Completion tracking.
//!
//! Suspension points of the pipeline are exactly the blocking transfer
//! variants, [`CommandQueue::finish`](crate::session::CommandQueue::finish)
//! and [`wait`]. Enqueued device work cannot be cancelled; the `*_within`
//! variants only bound how long the host waits.

mod event;
mod wait;

pub use event::{Event, EventStatus, Operation};
pub use wait::{wait, wait_within};
pub(crate) use wait::poll_wait;

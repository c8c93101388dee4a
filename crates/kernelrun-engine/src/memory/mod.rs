//! Device buffers and host/device transfers.

mod buffer;
mod transfer;

pub use buffer::{AccessFlags, Buffer};
pub(crate) use buffer::WeakBuffer;
pub use transfer::PendingRead;

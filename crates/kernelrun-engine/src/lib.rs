//! Kernelrun engine crate.
//!
//! Runs compute kernels on a GPU through wgpu: pick a device, open a
//! session, build a program, move data in and out of device buffers,
//! dispatch kernels, synchronize on events, and release everything in
//! dependency order.

pub mod device;
pub mod session;
pub mod program;
pub mod memory;
pub mod dispatch;
pub mod sync;
pub mod teardown;

pub mod error;
pub mod logging;
mod handle;

pub use error::{ComputeError, Result};

//! Compute device discovery and selection.
//!
//! This module is responsible for:
//! - creating the wgpu instance for the configured backends
//! - enumerating platforms (backends) and their devices (adapters)
//! - choosing one device by vendor priority

mod enumerate;
mod info;
mod select;

pub use enumerate::{Device, Enumerator, EnumeratorConfig, Platform};
pub use info::{DeviceClass, DeviceFilter, DeviceInfo, DeviceLimits};
pub use select::{select_by_priority, vendor_rank};

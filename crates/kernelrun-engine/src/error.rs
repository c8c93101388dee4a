//! Error taxonomy for the dispatch pipeline.
//!
//! Every variant names the failing operation. Variants raised by the native
//! layer also carry its status text; compile failures carry the full log.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by any stage of the pipeline.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("{op}: platform query failed: {status}")]
    PlatformQuery { op: &'static str, status: String },

    #[error("select_device: no device matches vendor priority {priority:?}")]
    NoMatchingDevice { priority: Vec<String> },

    #[error("{op}: context creation failed: {status}")]
    ContextCreation { op: &'static str, status: String },

    #[error("{op}: command queue creation failed: {status}")]
    QueueCreation { op: &'static str, status: String },

    #[error("build_program: compilation failed\n{log}")]
    Compile { log: String },

    #[error("create_kernel: no compute entry point named `{name}`")]
    KernelNotFound { name: String },

    #[error("create_kernel: program is not built (status: {status})")]
    ProgramNotBuilt { status: &'static str },

    #[error("create_kernel: kernel `{kernel}` cannot be dispatched: {reason}")]
    KernelSignature { kernel: String, reason: String },

    #[error("allocate: cannot allocate {size} bytes: {reason}")]
    BufferAllocation { size: usize, reason: String },

    #[error("{op}: size mismatch, buffer holds {expected} bytes but the region is {actual} bytes")]
    SizeMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("set_argument: index {index} out of range for kernel `{kernel}` ({count} parameters)")]
    InvalidArgumentIndex {
        kernel: String,
        index: u32,
        count: usize,
    },

    #[error("set_argument: argument {index} of kernel `{kernel}` expects {expected}, got {found}")]
    ArgumentType {
        kernel: String,
        index: u32,
        expected: String,
        found: String,
    },

    #[error("dispatch: argument {index} of kernel `{kernel}` is not bound")]
    UnboundArgument { kernel: String, index: u32 },

    #[error("dispatch: kernel `{kernel}` binds one buffer to writable argument {first} and to argument {second}")]
    ArgumentAliasing {
        kernel: String,
        first: u32,
        second: u32,
    },

    #[error("dispatch: {reason}")]
    WorkGroupSize { reason: String },

    #[error("{op}: session is closed")]
    SessionClosed { op: &'static str },

    #[error("{op}: handle belongs to a different session")]
    SessionMismatch { op: &'static str },

    #[error("{op}: {what} has already been released")]
    Released { op: &'static str, what: String },

    #[error("{op}: gave up waiting after {timeout:?}; device state is undefined")]
    WaitTimeout { op: &'static str, timeout: Duration },

    #[error("{op}: device error: {status}")]
    Device { op: &'static str, status: String },
}

impl ComputeError {
    /// Name of the host operation that failed.
    pub fn operation(&self) -> &str {
        match self {
            Self::PlatformQuery { op, .. }
            | Self::ContextCreation { op, .. }
            | Self::QueueCreation { op, .. }
            | Self::SizeMismatch { op, .. }
            | Self::SessionClosed { op }
            | Self::SessionMismatch { op }
            | Self::Released { op, .. }
            | Self::WaitTimeout { op, .. }
            | Self::Device { op, .. } => op,
            Self::NoMatchingDevice { .. } => "select_device",
            Self::Compile { .. } => "build_program",
            Self::KernelNotFound { .. }
            | Self::ProgramNotBuilt { .. }
            | Self::KernelSignature { .. } => "create_kernel",
            Self::BufferAllocation { .. } => "allocate",
            Self::InvalidArgumentIndex { .. } | Self::ArgumentType { .. } => "set_argument",
            Self::UnboundArgument { .. }
            | Self::ArgumentAliasing { .. }
            | Self::WorkGroupSize { .. } => "dispatch",
        }
    }

    /// Build log for compile failures.
    pub fn build_log(&self) -> Option<&str> {
        match self {
            Self::Compile { log } => Some(log),
            _ => None,
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ComputeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_the_failing_stage() {
        let err = ComputeError::SizeMismatch {
            op: "enqueue_write",
            expected: 16,
            actual: 12,
        };
        assert_eq!(err.operation(), "enqueue_write");
        assert_eq!(
            ComputeError::WorkGroupSize { reason: String::new() }.operation(),
            "dispatch"
        );
    }

    #[test]
    fn compile_error_display_includes_log() {
        let err = ComputeError::Compile {
            log: "error: expected `;`".to_string(),
        };
        assert!(err.to_string().contains("expected `;`"));
        assert_eq!(err.build_log(), Some("error: expected `;`"));
    }
}

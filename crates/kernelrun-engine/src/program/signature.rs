use crate::device::DeviceLimits;
use crate::error::{ComputeError, Result};

/// 32-bit scalar types a kernel can take by value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScalarType {
    U32,
    I32,
    F32,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::F32 => "f32",
        }
    }
}

/// How a kernel parameter is bound.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ParamKind {
    /// `var<storage, read>` / `var<storage, read_write>`.
    Storage { writable: bool },
    /// `var<uniform>` holding a composite type; bound to a buffer.
    Uniform,
    /// `var<uniform>` holding a single 32-bit scalar; bound by value.
    Scalar(ScalarType),
}

impl ParamKind {
    pub fn describe(self) -> String {
        match self {
            Self::Storage { writable: true } => "device-writable buffer".to_string(),
            Self::Storage { writable: false } => "device-readable buffer".to_string(),
            Self::Uniform => "uniform buffer".to_string(),
            Self::Scalar(ty) => format!("{} scalar", ty.name()),
        }
    }
}

/// One kernel parameter: a `@group(0)` binding used by the entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelParam {
    pub binding: u32,
    pub name: Option<String>,
    pub kind: ParamKind,
    /// Smallest buffer that satisfies the declared type (one element for
    /// runtime-sized arrays).
    pub min_size: u64,
}

/// Parameter list and launch shape of one entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelSignature {
    pub name: String,
    /// Parameters ordered by binding slot; argument index `i` is `params[i]`.
    pub params: Vec<KernelParam>,
    pub workgroup_size: [u32; 3],
    /// Bytes of `var<workgroup>` memory the entry point uses.
    pub workgroup_storage: u64,
}

impl KernelSignature {
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Rejects work-group shapes the device cannot launch.
    pub fn check_limits(&self, limits: &DeviceLimits) -> Result<()> {
        let invocations: u64 = self.workgroup_size.iter().map(|&d| u64::from(d)).product();
        if invocations > u64::from(limits.max_work_group_size) {
            return Err(self.unsupported(format!(
                "work-group size {:?} has {invocations} invocations, device allows {}",
                self.workgroup_size, limits.max_work_group_size
            )));
        }
        for (axis, (&size, &max)) in self
            .workgroup_size
            .iter()
            .zip(limits.max_work_item_sizes.iter())
            .enumerate()
        {
            if size > max {
                return Err(self.unsupported(format!(
                    "work-group size {size} in dimension {axis} exceeds device maximum {max}"
                )));
            }
        }

        if self.workgroup_storage > u64::from(limits.max_workgroup_storage_size) {
            return Err(self.unsupported(format!(
                "uses {} bytes of work-group memory, device allows {}",
                self.workgroup_storage, limits.max_workgroup_storage_size
            )));
        }

        let storage = self
            .params
            .iter()
            .filter(|p| matches!(p.kind, ParamKind::Storage { .. }))
            .count();
        if storage > limits.max_storage_buffers_per_stage as usize {
            return Err(self.unsupported(format!(
                "binds {storage} storage buffers, device allows {}",
                limits.max_storage_buffers_per_stage
            )));
        }
        let uniform = self.params.len() - storage;
        if uniform > limits.max_uniform_buffers_per_stage as usize {
            return Err(self.unsupported(format!(
                "binds {uniform} uniform buffers, device allows {}",
                limits.max_uniform_buffers_per_stage
            )));
        }
        Ok(())
    }

    fn unsupported(&self, reason: String) -> ComputeError {
        ComputeError::KernelSignature {
            kernel: self.name.clone(),
            reason,
        }
    }
}

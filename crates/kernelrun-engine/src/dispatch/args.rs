use crate::device::DeviceLimits;
use crate::error::{ComputeError, Result};
use crate::memory::{Buffer, WeakBuffer};
use crate::program::{KernelParam, KernelSignature, ParamKind, ScalarType};

/// A by-value kernel argument.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Scalar {
    U32(u32),
    I32(i32),
    F32(f32),
}

impl Scalar {
    pub fn scalar_type(self) -> ScalarType {
        match self {
            Self::U32(_) => ScalarType::U32,
            Self::I32(_) => ScalarType::I32,
            Self::F32(_) => ScalarType::F32,
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; 4] {
        match self {
            Self::U32(v) => v.to_le_bytes(),
            Self::I32(v) => v.to_le_bytes(),
            Self::F32(v) => v.to_le_bytes(),
        }
    }
}

/// Value passed to [`Kernel::set_argument`](crate::program::Kernel::set_argument).
#[derive(Debug, Clone, Copy)]
pub enum KernelArg<'a> {
    Buffer(&'a Buffer),
    Scalar(Scalar),
}

impl<'a> From<&'a Buffer> for KernelArg<'a> {
    fn from(buffer: &'a Buffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<u32> for KernelArg<'_> {
    fn from(v: u32) -> Self {
        Self::Scalar(Scalar::U32(v))
    }
}

impl From<i32> for KernelArg<'_> {
    fn from(v: i32) -> Self {
        Self::Scalar(Scalar::I32(v))
    }
}

impl From<f32> for KernelArg<'_> {
    fn from(v: f32) -> Self {
        Self::Scalar(Scalar::F32(v))
    }
}

impl From<Scalar> for KernelArg<'_> {
    fn from(v: Scalar) -> Self {
        Self::Scalar(v)
    }
}

enum Slot {
    Buffer(WeakBuffer),
    Scalar(Scalar),
}

/// A bound argument, ready to go into a bind group.
pub(crate) enum ResolvedArg {
    Buffer { binding: u32, buffer: wgpu::Buffer },
    Scalar { binding: u32, value: Scalar },
}

/// Argument slots of one kernel, checked against its signature as they are
/// bound.
pub(crate) struct ArgumentTable {
    kernel: String,
    params: Vec<KernelParam>,
    limits: DeviceLimits,
    slots: Vec<Option<Slot>>,
}

impl ArgumentTable {
    pub(crate) fn new(signature: &KernelSignature, limits: DeviceLimits) -> Self {
        Self {
            kernel: signature.name.clone(),
            params: signature.params.clone(),
            limits,
            slots: signature.params.iter().map(|_| None).collect(),
        }
    }

    pub(crate) fn is_bound(&self, index: u32) -> bool {
        matches!(self.slots.get(index as usize), Some(Some(_)))
    }

    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    pub(crate) fn bind(&mut self, index: u32, value: KernelArg<'_>) -> Result<()> {
        let Some(param) = self.params.get(index as usize) else {
            return Err(ComputeError::InvalidArgumentIndex {
                kernel: self.kernel.clone(),
                index,
                count: self.params.len(),
            });
        };

        let slot = match (param.kind, value) {
            (ParamKind::Scalar(expected), KernelArg::Scalar(scalar)) => {
                if scalar.scalar_type() != expected {
                    return Err(self.mismatch(index, param, format!("{} scalar", scalar.scalar_type().name())));
                }
                Slot::Scalar(scalar)
            }
            (ParamKind::Storage { .. } | ParamKind::Uniform, KernelArg::Buffer(buffer)) => {
                self.check_buffer(index, param, buffer)?;
                Slot::Buffer(buffer.downgrade())
            }
            (_, KernelArg::Buffer(buffer)) => {
                return Err(self.mismatch(index, param, format!("{}-byte buffer", buffer.size())));
            }
            (_, KernelArg::Scalar(scalar)) => {
                return Err(self.mismatch(index, param, format!("{} scalar", scalar.scalar_type().name())));
            }
        };

        self.slots[index as usize] = Some(slot);
        Ok(())
    }

    fn check_buffer(&self, index: u32, param: &KernelParam, buffer: &Buffer) -> Result<()> {
        if param.kind == (ParamKind::Storage { writable: true }) && !buffer.access().device_writable() {
            return Err(self.mismatch(index, param, format!("{} buffer", buffer.access().name())));
        }

        let size = buffer.size() as u64;
        if size < param.min_size {
            return Err(ComputeError::ArgumentType {
                kernel: self.kernel.clone(),
                index,
                expected: format!("{} of at least {} bytes", param.kind.describe(), param.min_size),
                found: format!("{size}-byte buffer"),
            });
        }

        let max = match param.kind {
            ParamKind::Uniform => self.limits.max_uniform_binding_size,
            _ => self.limits.max_storage_binding_size,
        };
        if size > max {
            return Err(ComputeError::ArgumentType {
                kernel: self.kernel.clone(),
                index,
                expected: format!("{} of at most {max} bytes", param.kind.describe()),
                found: format!("{size}-byte buffer"),
            });
        }
        Ok(())
    }

    fn mismatch(&self, index: u32, param: &KernelParam, found: String) -> ComputeError {
        ComputeError::ArgumentType {
            kernel: self.kernel.clone(),
            index,
            expected: param.kind.describe(),
            found,
        }
    }

    /// Checks every slot is bound, every bound buffer is still live, and no
    /// writable buffer appears twice.
    pub(crate) fn resolve(&self, op: &'static str) -> Result<Vec<ResolvedArg>> {
        let mut resolved = Vec::with_capacity(self.params.len());
        // (buffer id, argument index, writable)
        let mut seen: Vec<(u64, u32, bool)> = Vec::new();

        for (index, (param, slot)) in self.params.iter().zip(&self.slots).enumerate() {
            let index = index as u32;
            match slot {
                None => {
                    return Err(ComputeError::UnboundArgument {
                        kernel: self.kernel.clone(),
                        index,
                    });
                }
                Some(Slot::Scalar(value)) => resolved.push(ResolvedArg::Scalar {
                    binding: param.binding,
                    value: *value,
                }),
                Some(Slot::Buffer(weak)) => {
                    let writable = param.kind == (ParamKind::Storage { writable: true });
                    if let Some(&(_, first, first_writable)) =
                        seen.iter().find(|(id, _, _)| *id == weak.id())
                    {
                        if writable || first_writable {
                            return Err(ComputeError::ArgumentAliasing {
                                kernel: self.kernel.clone(),
                                first,
                                second: index,
                            });
                        }
                    }
                    seen.push((weak.id(), index, writable));

                    let buffer = weak.upgrade().ok_or_else(|| ComputeError::Released {
                        op,
                        what: format!("buffer bound to argument {index} of `{}`", self.kernel),
                    })?;
                    resolved.push(ResolvedArg::Buffer {
                        binding: param.binding,
                        buffer: buffer.raw(op)?,
                    });
                }
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::compile;

    const KERNELS: &str = r#"
@group(0) @binding(0) var<storage, read> a: array<f32>;
@group(0) @binding(1) var<storage, read> b: array<f32>;
@group(0) @binding(2) var<storage, read_write> c: array<f32>;
@group(0) @binding(3) var<uniform> n: u32;
@group(0) @binding(4) var<uniform> factor: f32;

@compute @workgroup_size(64)
fn vector_sum(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i < arrayLength(&c)) {
        c[i] = a[i] + b[i];
    }
}

@compute @workgroup_size(1)
fn scalars_only() {
    let x = f32(n) * factor;
}
"#;

    fn table(kernel: &str) -> ArgumentTable {
        let signature = compile(KERNELS, "").unwrap().kernel_signature(kernel).unwrap();
        ArgumentTable::new(&signature, DeviceLimits::default())
    }

    #[test]
    fn index_past_parameter_count_is_rejected() {
        let mut args = table("vector_sum");
        let err = args.bind(5, KernelArg::from(1.0f32)).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::InvalidArgumentIndex { index: 5, count: 3, .. }
        ));
    }

    #[test]
    fn scalar_for_buffer_parameter_is_a_type_error() {
        let mut args = table("vector_sum");
        let err = args.bind(0, KernelArg::from(3u32)).unwrap_err();
        assert!(matches!(err, ComputeError::ArgumentType { index: 0, .. }));
        assert!(!args.is_bound(0));
    }

    #[test]
    fn scalar_types_must_match() {
        let mut args = table("scalars_only");
        assert!(args.bind(0, KernelArg::from(16u32)).is_ok());
        let err = args.bind(1, KernelArg::from(2i32)).unwrap_err();
        assert!(err.to_string().contains("expects f32 scalar, got i32 scalar"));
        assert!(args.bind(1, KernelArg::from(2.0f32)).is_ok());
    }

    #[test]
    fn unbound_argument_is_reported_by_index() {
        let mut args = table("scalars_only");
        args.bind(1, KernelArg::from(0.5f32)).unwrap();
        let err = args.resolve("dispatch").err().unwrap();
        assert!(matches!(err, ComputeError::UnboundArgument { index: 0, .. }));
    }

    #[test]
    fn fully_bound_scalars_resolve_in_binding_order() {
        let mut args = table("scalars_only");
        args.bind(1, KernelArg::from(0.5f32)).unwrap();
        args.bind(0, KernelArg::from(16u32)).unwrap();
        let resolved = args.resolve("dispatch").unwrap();
        let bindings: Vec<u32> = resolved
            .iter()
            .map(|arg| match arg {
                ResolvedArg::Scalar { binding, .. } | ResolvedArg::Buffer { binding, .. } => *binding,
            })
            .collect();
        assert_eq!(bindings, [3, 4]);
    }

    #[test]
    fn clear_unbinds_everything() {
        let mut args = table("scalars_only");
        args.bind(0, KernelArg::from(1u32)).unwrap();
        args.clear();
        assert!(!args.is_bound(0));
    }

    #[test]
    fn scalar_bytes_are_little_endian() {
        assert_eq!(Scalar::U32(1).to_bytes(), [1, 0, 0, 0]);
        assert_eq!(Scalar::I32(-1).to_bytes(), [0xff; 4]);
        assert_eq!(Scalar::F32(1.0).to_bytes(), 1.0f32.to_le_bytes());
    }
}

use crate::error::{ComputeError, Result};

/// Work-group counts for one dispatch.
///
/// `global` is the N-dimensional index space (1 to 3 dimensions). With
/// `local` given, every global dimension must be a multiple of it and it must
/// equal the kernel's declared work-group size; without it the declared size
/// is used and partial groups are rounded up.
pub(crate) fn plan(
    global: &[usize],
    local: Option<&[usize]>,
    declared: [u32; 3],
    max_groups: u32,
) -> Result<[u32; 3]> {
    if global.is_empty() || global.len() > 3 {
        return Err(invalid(format!(
            "index space must have 1 to 3 dimensions, got {}",
            global.len()
        )));
    }
    if let Some(dim) = global.iter().position(|&g| g == 0) {
        return Err(invalid(format!("global size is zero in dimension {dim}")));
    }

    if let Some(local) = local {
        if local.len() != global.len() {
            return Err(invalid(format!(
                "local size has {} dimensions, global size has {}",
                local.len(),
                global.len()
            )));
        }
        for (dim, (&g, &l)) in global.iter().zip(local).enumerate() {
            if l == 0 {
                return Err(invalid(format!("local size is zero in dimension {dim}")));
            }
            if g % l != 0 {
                return Err(invalid(format!(
                    "global size {g} is not divisible by local size {l} in dimension {dim}"
                )));
            }
            if l != declared[dim] as usize {
                return Err(invalid(format!(
                    "local size {l} in dimension {dim} differs from the kernel's work-group size {}",
                    declared[dim]
                )));
            }
        }
    }

    // Dimensions past the index space have extent 1 and must run one invocation.
    for dim in global.len()..3 {
        if declared[dim] != 1 {
            return Err(invalid(format!(
                "kernel's work-group size is {} in dimension {dim} but the index space has {} dimension(s)",
                declared[dim],
                global.len()
            )));
        }
    }

    let mut groups = [1u32; 3];
    for (dim, &g) in global.iter().enumerate() {
        let count = g.div_ceil(declared[dim] as usize);
        if count > max_groups as usize {
            return Err(invalid(format!(
                "{count} work-groups in dimension {dim} exceed the device limit of {max_groups}"
            )));
        }
        groups[dim] = count as u32;
    }
    Ok(groups)
}

fn invalid(reason: String) -> ComputeError {
    ComputeError::WorkGroupSize { reason }
}

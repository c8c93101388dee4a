//! Host-side kernel compilation (WGSL via naga).
//!
//! Compiling on the host yields the full diagnostic log before any device
//! object exists, and gives the kernel signatures used for argument checks.

use crate::error::{ComputeError, Result};

use super::signature::{KernelParam, KernelSignature, ParamKind, ScalarType};

/// Parsed and validated kernel source.
#[derive(Debug)]
pub struct CompiledModule {
    source: String,
    module: naga::Module,
    info: naga::valid::ModuleInfo,
}

/// Compiles `source` with build `options`.
///
/// Options are space separated: `-D NAME=VALUE`, `-DNAME=VALUE`, `-D NAME`
/// (value 1) and `-w`. Defines become module-scope constants appended after
/// the source, so diagnostics keep the caller's line numbers.
pub fn compile(source: &str, options: &str) -> Result<CompiledModule> {
    let defines = parse_options(options).map_err(|log| ComputeError::Compile { log })?;

    let mut effective = source.to_string();
    if !defines.is_empty() {
        effective.push_str("\n// build options\n");
        for (name, value) in &defines {
            effective.push_str(&format!("const {name} = {value};\n"));
        }
    }

    let module = naga::front::wgsl::parse_str(&effective).map_err(|e| ComputeError::Compile {
        log: non_empty_log(e.emit_to_string(&effective), &e.to_string()),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    let info = validator.validate(&module).map_err(|e| ComputeError::Compile {
        log: non_empty_log(e.emit_to_string(&effective), &e.as_inner().to_string()),
    })?;

    Ok(CompiledModule {
        source: effective,
        module,
        info,
    })
}

fn non_empty_log(rendered: String, fallback: &str) -> String {
    if rendered.trim().is_empty() {
        format!("error: {fallback}")
    } else {
        rendered
    }
}

/// Parses build options into `(name, value)` defines.
fn parse_options(options: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut defines = Vec::new();
    let mut tokens = options.split_whitespace();

    while let Some(token) = tokens.next() {
        let define = match token {
            "-w" => continue,
            "-D" => tokens
                .next()
                .ok_or_else(|| "error: build option `-D` expects NAME[=VALUE]".to_string())?,
            _ => match token.strip_prefix("-D") {
                Some(rest) => rest,
                None => return Err(format!("error: unrecognized build option `{token}`")),
            },
        };

        let (name, value) = match define.split_once('=') {
            Some((name, value)) => (name, value),
            None => (define, "1"),
        };
        if !is_identifier(name) {
            return Err(format!("error: `{name}` is not a valid define name"));
        }
        if value.is_empty() {
            return Err(format!("error: define `{name}` has an empty value"));
        }
        defines.push((name.to_string(), value.to_string()));
    }

    Ok(defines)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl CompiledModule {
    /// Source as compiled, including appended defines.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the compute entry points, in declaration order.
    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.module
            .entry_points
            .iter()
            .filter(|ep| ep.stage == naga::ShaderStage::Compute)
            .map(|ep| ep.name.as_str())
    }

    /// Parameter list of the compute entry point `name`.
    pub fn kernel_signature(&self, name: &str) -> Result<KernelSignature> {
        let (index, entry) = self
            .module
            .entry_points
            .iter()
            .enumerate()
            .find(|(_, ep)| ep.stage == naga::ShaderStage::Compute && ep.name == name)
            .ok_or_else(|| ComputeError::KernelNotFound {
                name: name.to_string(),
            })?;

        let usage = self.info.get_entry_point(index);
        let mut params = Vec::new();
        let mut workgroup_storage = 0u64;

        for (handle, var) in self.module.global_variables.iter() {
            if usage[handle].is_empty() {
                continue;
            }
            if var.space == naga::AddressSpace::WorkGroup {
                let inner = &self.module.types[var.ty].inner;
                workgroup_storage += u64::from(inner.size(self.module.to_ctx()));
                continue;
            }
            let Some(binding) = &var.binding else {
                continue;
            };
            let label = var.name.clone().unwrap_or_else(|| format!("binding {}", binding.binding));
            if binding.group != 0 {
                return Err(ComputeError::KernelSignature {
                    kernel: name.to_string(),
                    reason: format!("`{label}` is in bind group {}; only group 0 is supported", binding.group),
                });
            }

            let inner = &self.module.types[var.ty].inner;
            let kind = match var.space {
                naga::AddressSpace::Storage { access } => ParamKind::Storage {
                    writable: access.contains(naga::StorageAccess::STORE),
                },
                naga::AddressSpace::Uniform => match scalar_type(inner) {
                    Some(ty) => ParamKind::Scalar(ty),
                    None => ParamKind::Uniform,
                },
                other => {
                    return Err(ComputeError::KernelSignature {
                        kernel: name.to_string(),
                        reason: format!("`{label}` lives in address space {other:?}; only buffers and scalars can be arguments"),
                    });
                }
            };

            params.push(KernelParam {
                binding: binding.binding,
                name: var.name.clone(),
                kind,
                min_size: u64::from(inner.size(self.module.to_ctx())),
            });
        }

        params.sort_by_key(|p| p.binding);

        Ok(KernelSignature {
            name: name.to_string(),
            params,
            workgroup_size: entry.workgroup_size,
            workgroup_storage,
        })
    }
}

fn scalar_type(inner: &naga::TypeInner) -> Option<ScalarType> {
    let naga::TypeInner::Scalar(scalar) = inner else {
        return None;
    };
    if scalar.width != 4 {
        return None;
    }
    match scalar.kind {
        naga::ScalarKind::Uint => Some(ScalarType::U32),
        naga::ScalarKind::Sint => Some(ScalarType::I32),
        naga::ScalarKind::Float => Some(ScalarType::F32),
        _ => None,
    }
}

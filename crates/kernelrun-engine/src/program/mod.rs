//! Program building and kernel extraction.
//!
//! A [`Program`] starts `Unbuilt`, is compiled once for its session's device,
//! and is read-only afterwards. Kernels are extracted from built programs only.

mod compile;
mod kernel;
mod signature;

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

pub use compile::{compile, CompiledModule};
pub use kernel::Kernel;
pub use signature::{KernelParam, KernelSignature, ParamKind, ScalarType};

use crate::device::DeviceLimits;
use crate::error::{ComputeError, Result};
use crate::handle::{captured, lock, next_id};
use crate::session::Session;
use crate::teardown::{Release, ReleaseLedger, Stage};

/// Build state of a program.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildStatus {
    Unbuilt,
    Built,
    Failed { log: String },
}

impl BuildStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unbuilt => "unbuilt",
            Self::Built => "built",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Kernel source compiled for one session's device.
///
/// Cloning yields another handle to the same program.
#[derive(Clone)]
pub struct Program {
    shared: Arc<ProgramShared>,
}

struct ProgramShared {
    id: u64,
    session_id: u64,
    device: wgpu::Device,
    limits: DeviceLimits,
    source: String,
    state: Mutex<ProgramState>,
}

struct ProgramState {
    status: BuildStatus,
    compiled: Option<CompiledModule>,
    module: Option<wgpu::ShaderModule>,
    released: bool,
}

impl Program {
    /// Creates an unbuilt program from kernel source.
    pub fn from_source(session: &Session, source: impl Into<String>) -> Result<Self> {
        let device = session.context("create_program")?.clone();
        let program = Self {
            shared: Arc::new(ProgramShared {
                id: next_id(),
                session_id: session.id(),
                device,
                limits: *session.limits(),
                source: source.into(),
                state: Mutex::new(ProgramState {
                    status: BuildStatus::Unbuilt,
                    compiled: None,
                    module: None,
                    released: false,
                }),
            }),
        };
        log::debug!("{} created for session {}", program.label(), session.id());
        Ok(program)
    }

    /// Creates and builds a program in one step.
    pub fn build_from_source(
        session: &Session,
        source: impl Into<String>,
        options: &str,
    ) -> Result<Self> {
        let program = Self::from_source(session, source)?;
        program.build(options)?;
        Ok(program)
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn session_id(&self) -> u64 {
        self.shared.session_id
    }

    pub fn status(&self) -> BuildStatus {
        lock(&self.shared.state).status.clone()
    }

    /// Compiles the program. A program that is already built is left as is.
    ///
    /// On failure the status becomes `Failed { log }` and the same log is
    /// returned in [`ComputeError::Compile`].
    pub fn build(&self, options: &str) -> Result<()> {
        self.build_with_notify(options, |_| {})
    }

    /// Like [`build`](Self::build), calling `on_failure` with the build log
    /// before returning a compile error.
    pub fn build_with_notify<F>(&self, options: &str, on_failure: F) -> Result<()>
    where
        F: FnOnce(&str),
    {
        let label = self.label();
        let mut state = lock(&self.shared.state);
        if state.released {
            return Err(ComputeError::Released {
                op: "build_program",
                what: label,
            });
        }
        if state.status == BuildStatus::Built {
            log::debug!("{label}: already built");
            return Ok(());
        }

        let built = compile(&self.shared.source, options).and_then(|compiled| {
            let (module, error) = captured(&self.shared.device, || {
                self.shared
                    .device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(&label),
                        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(compiled.source())),
                    })
            });
            match error {
                Some(err) => Err(ComputeError::Compile {
                    log: err.to_string(),
                }),
                None => Ok((compiled, module)),
            }
        });

        match built {
            Ok((compiled, module)) => {
                log::debug!(
                    "{label}: built ({} entry point(s))",
                    compiled.entry_points().count()
                );
                state.module = Some(module);
                state.compiled = Some(compiled);
                state.status = BuildStatus::Built;
                Ok(())
            }
            Err(err) => {
                let log = err.build_log().unwrap_or_default().to_string();
                log::debug!("{label}: build failed");
                state.status = BuildStatus::Failed { log: log.clone() };
                drop(state);
                on_failure(&log);
                Err(err)
            }
        }
    }

    /// Extracts the compute entry point `entry_point` as a kernel.
    pub fn create_kernel(&self, entry_point: &str) -> Result<Kernel> {
        let state = lock(&self.shared.state);
        if state.released {
            return Err(ComputeError::Released {
                op: "create_kernel",
                what: self.label(),
            });
        }
        let (Some(compiled), Some(module)) = (&state.compiled, &state.module) else {
            return Err(ComputeError::ProgramNotBuilt {
                status: state.status.name(),
            });
        };

        let signature = compiled.kernel_signature(entry_point)?;
        signature.check_limits(&self.shared.limits)?;

        let (pipeline, error) = captured(&self.shared.device, || {
            self.shared
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(entry_point),
                    layout: None,
                    module,
                    entry_point: Some(entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                })
        });
        if let Some(err) = error {
            return Err(ComputeError::KernelSignature {
                kernel: entry_point.to_string(),
                reason: err.to_string(),
            });
        }

        log::debug!(
            "{}: kernel `{entry_point}` with {} parameter(s)",
            self.label(),
            signature.param_count()
        );
        Ok(Kernel::new(
            self.shared.session_id,
            signature,
            pipeline,
            self.shared.limits,
        ))
    }
}

impl Release for Program {
    fn stage(&self) -> Stage {
        Stage::Program
    }

    fn label(&self) -> String {
        format!("program {}", self.shared.id)
    }

    fn release(&mut self, ledger: &mut ReleaseLedger) {
        let mut state = lock(&self.shared.state);
        let first = !std::mem::replace(&mut state.released, true);
        state.module = None;
        state.compiled = None;
        drop(state);
        ledger.record(Stage::Program, &self.label(), first);
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .finish()
    }
}

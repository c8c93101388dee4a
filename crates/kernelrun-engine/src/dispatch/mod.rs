//! Kernel arguments and N-dimensional dispatch.

mod args;
mod ndrange;

use wgpu::util::DeviceExt;

pub use args::{KernelArg, Scalar};
pub(crate) use args::{ArgumentTable, ResolvedArg};

use crate::error::{ComputeError, Result};
use crate::handle::captured;
use crate::program::Kernel;
use crate::session::CommandQueue;
use crate::sync::{Event, Operation};

/// Uniform buffers for by-value arguments; one 16-byte slot each.
const SCALAR_SLOT: usize = 16;

impl CommandQueue {
    /// Enqueues `kernel` over the index space `global`.
    ///
    /// Every argument must be bound. `local`, when given, must match the
    /// kernel's declared work-group size and divide `global` evenly.
    pub fn dispatch(
        &self,
        kernel: &Kernel,
        global: &[usize],
        local: Option<&[usize]>,
        wait_on: &[Event],
    ) -> Result<Event> {
        const OP: &str = "dispatch";
        self.check_session(OP, kernel.session_id())?;

        let groups = ndrange::plan(
            global,
            local,
            kernel.signature().workgroup_size,
            self.limits.max_work_groups_per_dimension,
        )?;
        let (pipeline, args) = kernel.prepare(OP)?;
        self.honor_wait_list(OP, wait_on)?;

        let bound: Vec<(u32, wgpu::Buffer)> = args
            .into_iter()
            .map(|arg| match arg {
                ResolvedArg::Buffer { binding, buffer } => (binding, buffer),
                ResolvedArg::Scalar { binding, value } => (binding, self.scalar_buffer(value)),
            })
            .collect();

        let bind_group = if bound.is_empty() {
            None
        } else {
            Some(self.bind_group(kernel, &pipeline, &bound)?)
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(OP) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }

        let event = self.submit(Operation::Dispatch, Some(encoder.finish()));
        log::debug!(
            "{OP}: `{}` over {global:?} as {groups:?} work-groups, event {}",
            kernel.name(),
            event.sequence()
        );
        Ok(event)
    }

    fn bind_group(
        &self,
        kernel: &Kernel,
        pipeline: &wgpu::ComputePipeline,
        bound: &[(u32, wgpu::Buffer)],
    ) -> Result<wgpu::BindGroup> {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = bound
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let (bind_group, error) = captured(&self.device, || {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(kernel.name()),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &entries,
            })
        });
        match error {
            Some(err) => Err(ComputeError::Device {
                op: "dispatch",
                status: err.to_string(),
            }),
            None => Ok(bind_group),
        }
    }

    fn scalar_buffer(&self, value: Scalar) -> wgpu::Buffer {
        let mut contents = [0u8; SCALAR_SLOT];
        contents[..4].copy_from_slice(&value.to_bytes());
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scalar argument"),
            contents: &contents,
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }
}

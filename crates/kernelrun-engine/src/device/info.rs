/// Broad class of a compute device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceClass {
    /// Discrete, integrated or virtual GPU.
    Gpu,
    /// Software rasterizer or CPU implementation.
    Cpu,
    /// Anything the backend could not classify.
    Other,
}

impl DeviceClass {
    pub fn from_wgpu(device_type: wgpu::DeviceType) -> Self {
        match device_type {
            wgpu::DeviceType::DiscreteGpu
            | wgpu::DeviceType::IntegratedGpu
            | wgpu::DeviceType::VirtualGpu => Self::Gpu,
            wgpu::DeviceType::Cpu => Self::Cpu,
            _ => Self::Other,
        }
    }
}

/// Device class filter used during enumeration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DeviceFilter {
    #[default]
    Gpu,
    Cpu,
    Other,
    Any,
}

impl DeviceFilter {
    pub fn accepts(self, class: DeviceClass) -> bool {
        match self {
            Self::Any => true,
            Self::Gpu => class == DeviceClass::Gpu,
            Self::Cpu => class == DeviceClass::Cpu,
            Self::Other => class == DeviceClass::Other,
        }
    }
}

/// Capability limits relevant to compute dispatch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeviceLimits {
    /// Max invocations in one work-group (product of its dimensions).
    pub max_work_group_size: u32,
    /// Max work-group extent per dimension.
    pub max_work_item_sizes: [u32; 3],
    /// Max work-groups per dispatch dimension.
    pub max_work_groups_per_dimension: u32,
    pub max_buffer_size: u64,
    pub max_storage_binding_size: u64,
    pub max_uniform_binding_size: u64,
    /// Max bytes of `var<workgroup>` memory one work-group may use.
    pub max_workgroup_storage_size: u32,
    pub max_storage_buffers_per_stage: u32,
    pub max_uniform_buffers_per_stage: u32,
}

impl DeviceLimits {
    pub fn from_wgpu(limits: &wgpu::Limits) -> Self {
        Self {
            max_work_group_size: limits.max_compute_invocations_per_workgroup,
            max_work_item_sizes: [
                limits.max_compute_workgroup_size_x,
                limits.max_compute_workgroup_size_y,
                limits.max_compute_workgroup_size_z,
            ],
            max_work_groups_per_dimension: limits.max_compute_workgroups_per_dimension,
            max_buffer_size: limits.max_buffer_size,
            max_storage_binding_size: limits.max_storage_buffer_binding_size.into(),
            max_uniform_binding_size: limits.max_uniform_buffer_binding_size.into(),
            max_workgroup_storage_size: limits.max_compute_workgroup_storage_size,
            max_storage_buffers_per_stage: limits.max_storage_buffers_per_shader_stage,
            max_uniform_buffers_per_stage: limits.max_uniform_buffers_per_shader_stage,
        }
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self::from_wgpu(&wgpu::Limits::default())
    }
}

/// Immutable description of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Vendor name used for selection (e.g. "NVIDIA", "Intel").
    pub vendor: String,
    /// PCI vendor id, 0 when the backend does not report one.
    pub vendor_id: u32,
    /// Adapter name as reported by the driver.
    pub name: String,
    pub driver: String,
    pub backend: wgpu::Backend,
    pub class: DeviceClass,
    pub limits: DeviceLimits,
}

impl DeviceInfo {
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        Self {
            vendor: vendor_name(info.vendor, &info.name),
            vendor_id: info.vendor,
            name: info.name.clone(),
            driver: info.driver.clone(),
            backend: info.backend,
            class: DeviceClass::from_wgpu(info.device_type),
            limits: DeviceLimits::from_wgpu(&adapter.limits()),
        }
    }
}

impl AsRef<DeviceInfo> for DeviceInfo {
    fn as_ref(&self) -> &DeviceInfo {
        self
    }
}

/// Maps a PCI vendor id to a vendor name.
///
/// Unknown ids fall back to the adapter name so substring matching still has
/// something to work with (software adapters often report 0).
pub(crate) fn vendor_name(vendor_id: u32, adapter_name: &str) -> String {
    let known = match vendor_id {
        0x1002 | 0x1022 => "AMD",
        0x10DE => "NVIDIA",
        0x8086 => "Intel",
        0x106B => "Apple",
        0x13B5 => "ARM",
        0x5143 => "Qualcomm",
        0x1010 => "Imagination Technologies",
        0x14E4 => "Broadcom",
        0x1414 => "Microsoft",
        0x10005 => "Mesa",
        _ => return adapter_name.to_string(),
    };
    known.to_string()
}

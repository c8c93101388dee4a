use crate::error::{ComputeError, Result};

use super::select::select_by_priority;
use super::{DeviceFilter, DeviceInfo};

/// Enumeration parameters.
#[derive(Debug, Clone)]
pub struct EnumeratorConfig {
    /// Backends the instance is allowed to load.
    pub backends: wgpu::Backends,

    /// Device class considered by [`Enumerator::select_device`].
    ///
    /// GPU-only by default. Use [`DeviceFilter::Any`] to admit software adapters.
    pub device_filter: DeviceFilter,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            device_filter: DeviceFilter::Gpu,
        }
    }
}

/// A selectable compute device (adapter + cached description).
#[derive(Clone)]
pub struct Device {
    adapter: wgpu::Adapter,
    info: DeviceInfo,
}

impl Device {
    fn new(adapter: wgpu::Adapter) -> Self {
        let info = DeviceInfo::from_adapter(&adapter);
        Self { adapter, info }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub(crate) fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }
}

impl AsRef<DeviceInfo> for Device {
    fn as_ref(&self) -> &DeviceInfo {
        &self.info
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("info", &self.info).finish()
    }
}

/// One compute backend and the devices it exposes, in enumeration order.
#[derive(Debug, Clone)]
pub struct Platform {
    backend: wgpu::Backend,
    devices: Vec<Device>,
}

impl Platform {
    pub fn backend(&self) -> wgpu::Backend {
        self.backend
    }

    pub fn name(&self) -> String {
        format!("{:?}", self.backend)
    }

    /// Number of devices of any class.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

/// Discovers platforms and devices through a wgpu instance.
pub struct Enumerator {
    instance: wgpu::Instance,
    config: EnumeratorConfig,
}

impl Enumerator {
    pub fn new(config: EnumeratorConfig) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        });
        Self { instance, config }
    }

    pub fn config(&self) -> &EnumeratorConfig {
        &self.config
    }

    /// Lists every platform that exposes at least one device.
    ///
    /// Platforms keep the order in which the instance first reported them.
    /// An instance that reports no adapters at all is a platform query
    /// failure, not an empty success.
    pub fn list_platforms(&self) -> Result<Vec<Platform>> {
        let adapters = pollster::block_on(self.instance.enumerate_adapters(self.config.backends));

        let devices: Vec<Device> = adapters.into_iter().map(Device::new).collect();
        let platforms: Vec<Platform> =
            group_by_backend(devices, |d| d.info.backend, self.config.backends)?
                .into_iter()
                .map(|(backend, devices)| Platform { backend, devices })
                .collect();

        for platform in &platforms {
            log::debug!(
                "platform {} exposes {} device(s)",
                platform.name(),
                platform.devices.len()
            );
        }
        Ok(platforms)
    }

    /// Lists the devices of `platform` accepted by `filter`. May be empty.
    pub fn list_devices(&self, platform: &Platform, filter: DeviceFilter) -> Vec<Device> {
        platform
            .devices
            .iter()
            .filter(|d| filter.accepts(d.info.class))
            .cloned()
            .collect()
    }

    /// Selects the device whose vendor ranks highest in `vendor_priority`.
    ///
    /// All platforms are scanned before deciding; see [`select_by_priority`].
    pub fn select_device<S: AsRef<str>>(&self, vendor_priority: &[S]) -> Result<Device> {
        let candidates: Vec<Device> = self
            .list_platforms()?
            .iter()
            .flat_map(|platform| self.list_devices(platform, self.config.device_filter))
            .collect();

        let device = select_by_priority(&candidates, vendor_priority).ok_or_else(|| {
            ComputeError::NoMatchingDevice {
                priority: vendor_priority
                    .iter()
                    .map(|v| v.as_ref().to_string())
                    .collect(),
            }
        })?;

        log::info!(
            "selected device: {} [{}] ({:?}, {:?})",
            device.info.name,
            device.info.vendor,
            device.info.class,
            device.info.backend
        );
        Ok(device.clone())
    }
}

/// Groups `items` by backend, keeping first-seen order for both groups and
/// items. No items at all is a platform query failure.
fn group_by_backend<T>(
    items: Vec<T>,
    backend_of: impl Fn(&T) -> wgpu::Backend,
    requested: wgpu::Backends,
) -> Result<Vec<(wgpu::Backend, Vec<T>)>> {
    let mut groups: Vec<(wgpu::Backend, Vec<T>)> = Vec::new();
    for item in items {
        let backend = backend_of(&item);
        match groups.iter_mut().find(|(b, _)| *b == backend) {
            Some((_, members)) => members.push(item),
            None => groups.push((backend, vec![item])),
        }
    }

    if groups.is_empty() {
        return Err(ComputeError::PlatformQuery {
            op: "list_platforms",
            status: format!("no adapters reported for backends {requested:?}"),
        });
    }
    Ok(groups)
}

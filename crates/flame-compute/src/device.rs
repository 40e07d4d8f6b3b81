//! wgpu device bring-up.

use crate::{ComputeError, ComputeResult};
use tracing::{debug, info};
use wgpu::{
    Backends, DeviceDescriptor, Instance, InstanceDescriptor, PowerPreference,
    RequestAdapterOptions,
};

/// An initialized GPU: instance, adapter, device and queue.
pub struct GpuContext {
    /// The selected adapter, kept for limit queries.
    pub adapter: wgpu::Adapter,
    /// The logical device.
    pub device: wgpu::Device,
    /// Its submission queue.
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Picks the highest-performance non-software adapter and creates a
    /// device on it.
    ///
    /// # Errors
    ///
    /// [`ComputeError::NoAdapter`] when nothing usable is present (for
    /// example only a software rasterizer), or
    /// [`ComputeError::DeviceCreation`] when the device request fails.
    pub fn new() -> ComputeResult<Self> {
        let instance = Instance::new(&InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(ComputeError::NoAdapter)?;

        let info = adapter.get_info();
        if is_software_renderer(&info) {
            debug!(name = %info.name, "rejecting software renderer");
            return Err(ComputeError::NoAdapter);
        }
        info!(name = %info.name, backend = ?info.backend, "GPU adapter selected");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("flame-compute"),
                ..Default::default()
            },
            None,
        ))
        .map_err(|e| ComputeError::DeviceCreation(e.to_string()))?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

/// Returns `true` when the adapter is a CPU-side rasterizer masquerading
/// as a GPU; falling back to the real CPU path beats running on those.
pub fn is_software_renderer(info: &wgpu::AdapterInfo) -> bool {
    let name = info.name.to_lowercase();
    name.contains("llvmpipe")
        || name.contains("softpipe")
        || name.contains("swiftshader")
        || name.contains("lavapipe")
        || name.contains("software")
        || name.contains("microsoft basic render")
        || info.device_type == wgpu::DeviceType::Cpu
}

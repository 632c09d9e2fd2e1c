use bytemuck::Pod;
use wgpu::{Adapter, Device, Queue};

use crate::error::{RenderError, Result};

/// The device and queue every renderer records against.
pub struct GpuContext {
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

impl GpuContext {
    /// Create a context without a presentation surface.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        let adapter_limits = adapter.limits();

        // Sprite expansion reads up to six storage buffers in the vertex stage, and
        // clouds of millions of elements need the adapter's full binding size.
        let needed_limits = wgpu::Limits {
            max_storage_buffers_per_shader_stage: 8,
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Render Device"),
                required_features: wgpu::Features::empty(),
                required_limits: needed_limits.using_resolution(adapter_limits),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "Created GPU context");

        Ok(Self { adapter, device, queue })
    }

    /// Wrap a device created elsewhere, e.g. by a windowing layer.
    pub fn from_parts(adapter: Adapter, device: Device, queue: Queue) -> Self {
        Self { adapter, device, queue }
    }

    /// Run `f` inside validation and out-of-memory error scopes and turn any error
    /// the device reports into a [`RenderError::Gpu`].
    pub(crate) async fn checked<R>(
        &self,
        context: &'static str,
        f: impl FnOnce(&Device) -> R,
    ) -> Result<R> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f(&self.device);
        let validation = self.device.pop_error_scope().await;
        let oom = self.device.pop_error_scope().await;

        match validation.or(oom) {
            Some(err) => Err(RenderError::Gpu { context, message: err.to_string() }),
            None => Ok(out),
        }
    }

    /// Copy the first `len` elements of `buffer` back to the host.
    ///
    /// Blocks on the device until all previously submitted work has finished.
    /// `buffer` needs `COPY_SRC` usage.
    pub async fn read_buffer<T: Pod>(&self, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<T>> {
        let bytes = (len * std::mem::size_of::<T>()) as u64;
        if bytes == 0 {
            return Ok(Vec::new());
        }
        let size = bytes.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device.poll(wgpu::PollType::Wait)?;
        rx.recv().map_err(|_| RenderError::Gpu {
            context: "mapping read-back buffer",
            message: "callback dropped".into(),
        })??;

        // Mapped ranges are only guaranteed 8-byte aligned, copy out bytewise.
        let mut data = vec![T::zeroed(); len];
        {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice_mut::<T, u8>(&mut data).copy_from_slice(&view[..bytes as usize]);
        }
        staging.unmap();
        Ok(data)
    }
}

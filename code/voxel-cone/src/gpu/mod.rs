//! GPU 端资源与算子
//!
//! 体素记录、每帧 uniform 和两张反弹纹理上传到 wgpu 资源；深度范围归约作为计算着色器运行。

mod depth_range;
mod resources;

pub use depth_range::{DepthRangeParams, GpuDepthRange};
pub use resources::{BounceTarget, VOXEL_TEXTURE_FORMAT, VoxelGpuResources};

use crate::error::ComputeError;

#[derive(Clone)]
pub struct GpuOps {
    pub depth_range: GpuDepthRange,
}

impl GpuOps {
    pub fn new(device: &wgpu::Device) -> Result<Self, ComputeError> {
        Ok(Self {
            depth_range: GpuDepthRange::new(device)?,
        })
    }
}

/// 请求默认适配器和设备；没有可用适配器时返回 [`ComputeError::AdapterUnavailable`]
pub async fn request_device() -> Result<(wgpu::Device, wgpu::Queue), ComputeError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| ComputeError::AdapterUnavailable(e.to_string()))?;

    adapter
        .request_device(&wgpu::DeviceDescriptor {
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            label: Some("voxel_cone_device"),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .map_err(|e| ComputeError::AdapterUnavailable(e.to_string()))
}

/// 拷贝到暂存缓冲区并阻塞读回 `count` 个元素
pub fn read_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<T>, ComputeError> {
    let size = (count * std::mem::size_of::<T>()) as u64;
    // copy_buffer_to_buffer 要求大小按 COPY_BUFFER_ALIGNMENT 对齐
    if size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return Err(ComputeError::ShapeMismatch {
            expected: vec![size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT) as usize],
            actual: vec![size as usize],
        });
    }
    if size > buffer.size() {
        return Err(ComputeError::ShapeMismatch {
            expected: vec![buffer.size() as usize],
            actual: vec![size as usize],
        });
    }
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("staging_buffer"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| ComputeError::Execution(e.to_string()))?;
    receiver
        .recv()
        .map_err(|e| ComputeError::Execution(e.to_string()))?
        .map_err(|e| ComputeError::Execution(e.to_string()))?;

    let data = slice.get_mapped_range();
    let result = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();
    Ok(result)
}

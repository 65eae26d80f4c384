//! GPU operator: 线性深度图的 {min, max} 原子归约

use bytemuck::{Pod, Zeroable};
use wgpu::{ShaderStages, util::DeviceExt};

use crate::depth_range::{DEPTH_RANGE_WORKGROUP, DepthImage, DepthRangeResult};
use crate::error::ComputeError;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DepthRangeParams {
    pub width: u32,
    pub height: u32,
    _padding0: u32,
    _padding1: u32,
}

impl DepthRangeParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            _padding0: 0,
            _padding1: 0,
        }
    }

    pub fn min_binding_size() -> Option<wgpu::BufferSize> {
        wgpu::BufferSize::new(std::mem::size_of::<Self>() as u64)
    }
}

#[derive(Clone)]
pub struct GpuDepthRange {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl GpuDepthRange {
    pub fn new(device: &wgpu::Device) -> Result<Self, ComputeError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("depth_range.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("depth_range.wgsl").into()),
        });
        let storage = |i, read_only, min_size| wgpu::BindGroupLayoutEntry {
            binding: i,
            visibility: ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(min_size),
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("depth_range_layout"),
            entries: &[
                // binding 0: 深度纹素
                storage(0, true, std::mem::size_of::<f32>() as u64),
                // binding 1: {min_depth, max_depth}
                storage(1, false, std::mem::size_of::<DepthRangeResult>() as u64),
                // binding 2: 图像尺寸
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: DepthRangeParams::min_binding_size(),
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("depth_range_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("depth_range_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });
        Ok(Self {
            pipeline,
            bind_group_layout,
        })
    }

    /// 提交归约，返回存放 [`DepthRangeResult`] 的缓冲区 (STORAGE | COPY_SRC)
    pub fn compute(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &DepthImage,
    ) -> Result<wgpu::Buffer, ComputeError> {
        // 空图像也需要一个非零大小的绑定；0.0 是无效样本
        let texels: &[f32] = if image.texels().is_empty() {
            &[0.0]
        } else {
            image.texels()
        };
        let depth = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("depth_texels_buffer"),
            contents: bytemuck::cast_slice(texels),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let output = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("depth_range_buffer"),
            contents: bytemuck::bytes_of(&DepthRangeResult::INIT),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let params = DepthRangeParams::new(image.width(), image.height());
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("depth_range_params_buffer"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depth_range_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: depth.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let groups_x = image.width().div_ceil(DEPTH_RANGE_WORKGROUP);
        let groups_y = image.height().div_ceil(DEPTH_RANGE_WORKGROUP);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("depth_range_command_encoder"),
        });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("depth_range_compute_pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        queue.submit(std::iter::once(encoder.finish()));
        Ok(output)
    }

    /// 提交并阻塞读回结果
    pub fn reduce(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &DepthImage,
    ) -> Result<DepthRangeResult, ComputeError> {
        let output = self.compute(device, queue, image)?;
        let result = super::read_buffer::<DepthRangeResult>(device, queue, &output, 1)?;
        result
            .into_iter()
            .next()
            .ok_or_else(|| ComputeError::Execution("empty depth range readback".to_string()))
    }
}

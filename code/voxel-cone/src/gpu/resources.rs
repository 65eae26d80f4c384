use half::f16;

use crate::error::ComputeError;
use crate::grid::arena::VoxelArena;
use crate::grid::{VoxelGridConfig, VoxelGridUniform, validate_grid_size};
use crate::texture::VoxelTexture;
use crate::VoxelRecord;

/// 反弹纹理格式，每纹素 8 字节
pub const VOXEL_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

const TEXEL_SIZE: u32 = 4 * std::mem::size_of::<f16>() as u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BounceTarget {
    First,
    Second,
}

/// 一帧体素锥追踪在 GPU 上需要的资源
pub struct VoxelGpuResources {
    grid_size: u32,
    pub uniform: wgpu::Buffer,
    pub voxels: wgpu::Buffer,
    pub first_bounce: wgpu::Texture,
    pub second_bounce: wgpu::Texture,
}

impl VoxelGpuResources {
    pub fn new(device: &wgpu::Device, grid_size: u32) -> Result<Self, ComputeError> {
        validate_grid_size(grid_size)?;
        let limits = device.limits();
        if grid_size > limits.max_texture_dimension_3d {
            return Err(ComputeError::BufferCreation(format!(
                "grid size {grid_size} exceeds max 3D texture dimension {}",
                limits.max_texture_dimension_3d
            )));
        }
        let voxel_bytes = (grid_size as u64).pow(3) * std::mem::size_of::<VoxelRecord>() as u64;
        if voxel_bytes > limits.max_storage_buffer_binding_size as u64
            || voxel_bytes > limits.max_buffer_size
        {
            return Err(ComputeError::BufferCreation(format!(
                "voxel buffer of {voxel_bytes} bytes exceeds device limits"
            )));
        }

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("voxel_grid_uniform"),
            size: VoxelGridUniform::SIZE,
            usage: wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let voxels = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("voxel_records"),
            size: voxel_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let texture = |label: &'static str| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: grid_size,
                    height: grid_size,
                    depth_or_array_layers: grid_size,
                },
                mip_level_count: grid_size.trailing_zeros() + 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format: VOXEL_TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        };

        Ok(Self {
            grid_size,
            uniform,
            voxels,
            first_bounce: texture("voxel_first_bounce"),
            second_bounce: texture("voxel_second_bounce"),
        })
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn bounce(&self, target: BounceTarget) -> &wgpu::Texture {
        match target {
            BounceTarget::First => &self.first_bounce,
            BounceTarget::Second => &self.second_bounce,
        }
    }

    pub fn bounce_view(&self, target: BounceTarget) -> wgpu::TextureView {
        self.bounce(target)
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn check_size(&self, size: u32) -> Result<(), ComputeError> {
        if size != self.grid_size {
            return Err(ComputeError::ShapeMismatch {
                expected: vec![self.grid_size as usize; 3],
                actual: vec![size as usize; 3],
            });
        }
        Ok(())
    }

    pub fn upload_config(
        &self,
        queue: &wgpu::Queue,
        config: &VoxelGridConfig,
    ) -> Result<(), ComputeError> {
        self.check_size(config.grid_size)?;
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&config.uniform()));
        Ok(())
    }

    pub fn upload_voxels(&self, queue: &wgpu::Queue, arena: &VoxelArena) -> Result<(), ComputeError> {
        self.check_size(arena.grid_size())?;
        let records = arena.snapshot();
        queue.write_buffer(&self.voxels, 0, bytemuck::cast_slice(&records));
        Ok(())
    }

    /// 上传整条 mip 链，f32 -> f16
    #[tracing::instrument(skip_all, fields(grid = self.grid_size, ?target))]
    pub fn upload_texture(
        &self,
        queue: &wgpu::Queue,
        target: BounceTarget,
        texture: &VoxelTexture,
    ) -> Result<(), ComputeError> {
        self.check_size(texture.size())?;
        let gpu_texture = self.bounce(target);

        for mip in 0..texture.mip_levels() {
            let (Some(texels), Some(size)) = (texture.level(mip), texture.level_size(mip)) else {
                continue;
            };
            let data: Vec<[f16; 4]> = texels
                .iter()
                .map(|t| t.to_array().map(f16::from_f32))
                .collect();
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: gpu_texture,
                    mip_level: mip,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(&data),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size * TEXEL_SIZE),
                    rows_per_image: Some(size),
                },
                wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: size,
                },
            );
        }
        tracing::debug!(mips = texture.mip_levels(), "bounce texture uploaded");
        Ok(())
    }
}

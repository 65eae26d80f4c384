use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};

use super::{SceneBounds, mip_count, validate_grid_size};
use crate::error::ConfigError;

/// 漫反射锥的固定方向表长度
pub const MAX_DIFFUSE_CONES: u32 = 16;

bitflags! {
    /// 每帧的 pass 开关
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct VoxelGridFlags: u32 {
        const ENABLED = 1 << 0;
        const CONSERVATIVE_RASTERIZATION = 1 << 1;
        const OCCLUSION = 1 << 2;
        const SECONDARY_BOUNCE = 1 << 3;
        const TEMPORAL_SMOOTHING = 1 << 4;
    }
}

// ===============================================================================
// 用户配置
// ===============================================================================

/// 场景级体素化设置，每帧与场景包围盒一起生成 [`VoxelGridConfig`]
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelSceneSettings {
    pub enabled: bool,
    /// 网格边长 N (2 的幂)
    pub grid_size: u32,
    /// 锥追踪最大世界距离
    pub max_distance: f32,
    /// 漫反射锥数量，1..=16
    pub num_cones: u32,
    /// 步进长度，相对当前锥直径
    pub ray_step: f32,
    /// 体素尺寸相对于 `包围盒最长边 / N` 的缩放
    pub voxel_size_factor: f32,
    pub conservative_rasterization: bool,
    pub temporal_smoothing: bool,
    pub occlusion: bool,
    pub secondary_bounce: bool,
}

impl Default for VoxelSceneSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            grid_size: 64,
            max_distance: 20.0,
            num_cones: MAX_DIFFUSE_CONES,
            ray_step: 0.75,
            voxel_size_factor: 1.0,
            conservative_rasterization: true,
            temporal_smoothing: false,
            occlusion: false,
            secondary_bounce: true,
        }
    }
}

impl VoxelSceneSettings {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_grid_size(mut self, grid_size: u32) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn with_num_cones(mut self, num_cones: u32) -> Self {
        self.num_cones = num_cones;
        self
    }

    pub fn with_ray_step(mut self, ray_step: f32) -> Self {
        self.ray_step = ray_step;
        self
    }

    pub fn with_voxel_size_factor(mut self, factor: f32) -> Self {
        self.voxel_size_factor = factor;
        self
    }

    pub fn with_conservative_rasterization(mut self, enabled: bool) -> Self {
        self.conservative_rasterization = enabled;
        self
    }

    pub fn with_temporal_smoothing(mut self, enabled: bool) -> Self {
        self.temporal_smoothing = enabled;
        self
    }

    pub fn with_occlusion(mut self, enabled: bool) -> Self {
        self.occlusion = enabled;
        self
    }

    pub fn with_secondary_bounce(mut self, enabled: bool) -> Self {
        self.secondary_bounce = enabled;
        self
    }

    pub fn flags(&self) -> VoxelGridFlags {
        let mut flags = VoxelGridFlags::empty();
        flags.set(VoxelGridFlags::ENABLED, self.enabled);
        flags.set(
            VoxelGridFlags::CONSERVATIVE_RASTERIZATION,
            self.conservative_rasterization,
        );
        flags.set(VoxelGridFlags::OCCLUSION, self.occlusion);
        flags.set(VoxelGridFlags::SECONDARY_BOUNCE, self.secondary_bounce);
        flags.set(VoxelGridFlags::TEMPORAL_SMOOTHING, self.temporal_smoothing);
        flags
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_grid_size(self.grid_size)?;
        if self.num_cones == 0 || self.num_cones > MAX_DIFFUSE_CONES {
            return Err(ConfigError::InvalidParameter {
                name: "num_cones",
                value: self.num_cones as f32,
            });
        }
        // 允许无穷远：锥离开网格时一定终止
        if !(self.max_distance > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "max_distance",
                value: self.max_distance,
            });
        }
        if !(self.ray_step > 0.0) || !self.ray_step.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "ray_step",
                value: self.ray_step,
            });
        }
        if !(self.voxel_size_factor > 0.0) || !self.voxel_size_factor.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "voxel_size_factor",
                value: self.voxel_size_factor,
            });
        }
        Ok(())
    }
}

// ===============================================================================
// 每帧网格配置
// ===============================================================================

/// 每帧从场景包围盒重新计算，帧内不可变
///
/// 坐标空间：
/// - clip: `(world - grid_center) * world_to_grid * grid_to_clip`，网格内为 [-1,1]³
/// - uvw: `clip * (0.5, -0.5, 0.5) + 0.5`，Y 轴翻转
/// - voxel: `floor(uvw * clip_to_grid)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelGridConfig {
    pub world_to_grid: f32,
    pub grid_to_world: f32,
    pub clip_to_grid: f32,
    pub grid_to_clip: f32,
    pub grid_center: Vec3,
    pub grid_size: u32,
    pub max_distance: f32,
    pub mip_count: u32,
    pub num_cones: u32,
    pub num_cones_inv: f32,
    pub ray_step: f32,
    pub flags: VoxelGridFlags,
}

impl VoxelGridConfig {
    pub fn from_scene(
        settings: &VoxelSceneSettings,
        bounds: &SceneBounds,
    ) -> Result<Self, ConfigError> {
        if let Err(err) = settings.validate() {
            tracing::warn!(%err, "rejected voxel scene settings");
            return Err(err);
        }
        if bounds.is_degenerate() {
            tracing::warn!(min = ?bounds.min, max = ?bounds.max, "degenerate scene bounds");
            return Err(ConfigError::DegenerateBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }

        let n = settings.grid_size;
        let voxel_size = bounds.extent().max_element() * settings.voxel_size_factor / n as f32;
        if !(voxel_size > 0.0) || !voxel_size.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "voxel_size",
                value: voxel_size,
            });
        }

        Ok(Self {
            world_to_grid: 1.0 / voxel_size,
            grid_to_world: voxel_size,
            clip_to_grid: n as f32,
            grid_to_clip: 2.0 / n as f32,
            grid_center: bounds.center(),
            grid_size: n,
            max_distance: settings.max_distance,
            mip_count: mip_count(n),
            num_cones: settings.num_cones,
            num_cones_inv: 1.0 / settings.num_cones as f32,
            ray_step: settings.ray_step,
            flags: settings.flags(),
        })
    }

    #[inline]
    pub fn voxel_size(&self) -> f32 {
        self.grid_to_world
    }

    pub fn voxel_count(&self) -> usize {
        let n = self.grid_size as usize;
        n * n * n
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(VoxelGridFlags::ENABLED)
    }

    pub fn conservative_rasterization(&self) -> bool {
        self.flags.contains(VoxelGridFlags::CONSERVATIVE_RASTERIZATION)
    }

    pub fn temporal_smoothing(&self) -> bool {
        self.flags.contains(VoxelGridFlags::TEMPORAL_SMOOTHING)
    }

    pub fn occlusion(&self) -> bool {
        self.flags.contains(VoxelGridFlags::OCCLUSION)
    }

    pub fn secondary_bounce(&self) -> bool {
        self.flags.contains(VoxelGridFlags::SECONDARY_BOUNCE)
    }

    #[inline]
    pub fn world_to_clip(&self, world: Vec3) -> Vec3 {
        (world - self.grid_center) * (self.world_to_grid * self.grid_to_clip)
    }

    #[inline]
    pub fn clip_to_tex(clip: Vec3) -> Vec3 {
        clip * Vec3::new(0.5, -0.5, 0.5) + 0.5
    }

    #[inline]
    pub fn world_to_tex(&self, world: Vec3) -> Vec3 {
        Self::clip_to_tex(self.world_to_clip(world))
    }

    pub fn tex_to_world(&self, uvw: Vec3) -> Vec3 {
        let clip = (uvw - 0.5) * Vec3::new(2.0, -2.0, 2.0);
        clip / (self.world_to_grid * self.grid_to_clip) + self.grid_center
    }

    /// 体素中心的世界坐标
    pub fn voxel_to_world(&self, coord: UVec3) -> Vec3 {
        self.tex_to_world((coord.as_vec3() + 0.5) / self.clip_to_grid)
    }

    /// uvw 必须已在 [0,1]³ 内；uvw == 1 归入最后一层体素
    #[inline]
    pub fn tex_to_voxel(&self, uvw: Vec3) -> UVec3 {
        (uvw * self.clip_to_grid)
            .floor()
            .as_uvec3()
            .min(UVec3::splat(self.grid_size - 1))
    }

    pub fn world_to_voxel(&self, world: Vec3) -> Option<UVec3> {
        let uvw = self.world_to_tex(world);
        super::is_saturated(uvw).then(|| self.tex_to_voxel(uvw))
    }

    pub fn uniform(&self) -> VoxelGridUniform {
        VoxelGridUniform {
            grid_conv: [
                self.world_to_grid,
                self.grid_to_world,
                self.clip_to_grid,
                self.grid_to_clip,
            ],
            radiance: [
                self.max_distance,
                self.mip_count as f32,
                self.num_cones as f32,
                self.num_cones_inv,
            ],
            other: [
                self.grid_center.x,
                self.grid_center.y,
                self.grid_center.z,
                self.ray_step,
            ],
            status: [
                self.is_enabled() as u32,
                self.conservative_rasterization() as u32,
                self.occlusion() as u32,
                self.secondary_bounce() as u32,
            ],
        }
    }
}

/// 每帧上传一次的 uniform 记录 (std140 兼容，64 字节)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct VoxelGridUniform {
    /// world_to_grid, grid_to_world, clip_to_grid, grid_to_clip
    pub grid_conv: [f32; 4],
    /// max_distance, mip_count, num_cones, num_cones_inv
    pub radiance: [f32; 4],
    /// grid_center.xyz, ray_step
    pub other: [f32; 4],
    /// enabled, conservative, occlusion, secondary_bounce
    pub status: [u32; 4],
}

impl VoxelGridUniform {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn min_binding_size() -> Option<wgpu::BufferSize> {
        wgpu::BufferSize::new(Self::SIZE)
    }
}

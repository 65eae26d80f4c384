//! 锥追踪
//!
//! 在预滤波的 mip 链中沿锥轴步进：锥直径随距离线性增长，采样层级取
//! `log2(直径 / 体素尺寸)`，由近及远做 over 合成。

use std::f32::consts::{FRAC_PI_6, PI, SQRT_2};

use glam::{Vec3, Vec4};

use crate::grid::{VoxelGridConfig, is_saturated};
use crate::texture::VoxelTexture;

/// 漫反射锥的固定方向，覆盖整个球面；使用时镜像到法线半球
pub const DIFFUSE_CONES: [Vec3; 16] = [
    Vec3::new(0.57735, 0.57735, 0.57735),
    Vec3::new(0.57735, -0.57735, -0.57735),
    Vec3::new(-0.57735, 0.57735, -0.57735),
    Vec3::new(-0.57735, -0.57735, 0.57735),
    Vec3::new(-0.903007, -0.182696, -0.388844),
    Vec3::new(-0.903007, 0.182696, 0.388844),
    Vec3::new(0.903007, -0.182696, 0.388844),
    Vec3::new(0.903007, 0.182696, -0.388844),
    Vec3::new(-0.388844, -0.903007, -0.182696),
    Vec3::new(0.388844, -0.903007, 0.182696),
    Vec3::new(0.388844, 0.903007, -0.182696),
    Vec3::new(-0.388844, 0.903007, 0.182696),
    Vec3::new(-0.182696, -0.388844, -0.903007),
    Vec3::new(0.182696, 0.388844, -0.903007),
    Vec3::new(-0.182696, 0.388844, 0.903007),
    Vec3::new(0.182696, -0.388844, 0.903007),
];

/// 起点沿法线外移的体素倍数，避免采到自身
const START_OFFSET: f32 = 2.0 * SQRT_2;

/// tan(π/8)，阴影锥的张角
const OCCLUSION_APERTURE: f32 = 0.414_213_57;

/// 单锥步进的结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConeTrace {
    /// rgb 为累积颜色，w 为累积不透明度
    pub radiance: Vec4,
    pub steps: u32,
}

/// 绑定到一张体素纹理和本帧配置的锥追踪器，只读，可在多线程间共享
#[derive(Clone, Copy, Debug)]
pub struct ConeTracer<'a> {
    voxels: &'a VoxelTexture,
    config: &'a VoxelGridConfig,
}

impl<'a> ConeTracer<'a> {
    pub fn new(voxels: &'a VoxelTexture, config: &'a VoxelGridConfig) -> Self {
        Self { voxels, config }
    }

    pub fn voxels(&self) -> &'a VoxelTexture {
        self.voxels
    }

    pub fn config(&self) -> &'a VoxelGridConfig {
        self.config
    }

    /// 任一起点在网格内的锥的步数上限
    ///
    /// 每步至少前进 `voxel * ray_step`，离开网格前最多走完网格对角线加起点偏移。
    pub fn max_steps(&self) -> u32 {
        let voxel = self.config.grid_to_world;
        let diagonal = self.config.grid_size as f32 * voxel * 3f32.sqrt();
        let reach = (diagonal + (START_OFFSET + 1.0) * voxel).min(self.config.max_distance);
        (reach / (voxel * self.config.ray_step)).ceil() as u32 + 1
    }

    pub fn trace_cone(&self, position: Vec3, normal: Vec3, direction: Vec3, aperture: f32) -> Vec4 {
        self.march(position, normal, direction, aperture).radiance
    }

    /// [`Self::trace_cone`] 并返回步数
    pub fn march(&self, position: Vec3, normal: Vec3, direction: Vec3, aperture: f32) -> ConeTrace {
        let config = self.config;
        let voxel = config.grid_to_world;
        let mip_count = config.mip_count as f32;

        let mut color = Vec3::ZERO;
        let mut alpha = 0.0;
        let mut distance = voxel;
        let mut steps = 0;
        let start = position + normal * voxel * START_OFFSET;

        while distance < config.max_distance && alpha < 1.0 {
            let diameter = voxel.max(2.0 * aperture * distance);
            let mip = (diameter * config.world_to_grid).log2();
            let uvw = config.world_to_tex(start + direction * distance);
            if !is_saturated(uvw) || mip >= mip_count {
                break;
            }

            let sample = self.voxels.sample_lod(uvw, mip);
            let a = 1.0 - alpha;
            color += a * sample.truncate();
            alpha += a * sample.w;
            distance += diameter * config.ray_step;
            steps += 1;
        }

        ConeTrace {
            radiance: color.extend(alpha),
            steps,
        }
    }

    /// 漫反射间接光：前 `num_cones` 个固定方向的平均
    pub fn trace_cone_radiance(&self, position: Vec3, normal: Vec3) -> Vec4 {
        let aperture = FRAC_PI_6.tan();
        let count = self.config.num_cones.min(DIFFUSE_CONES.len() as u32) as usize;

        let mut radiance = Vec4::ZERO;
        for cone in &DIFFUSE_CONES[..count] {
            let mut direction = (*cone + normal).normalize_or(*cone);
            if direction.dot(normal) < 0.0 {
                direction = -direction;
            }
            radiance += self.trace_cone(position, normal, direction, aperture);
        }

        radiance *= self.config.num_cones_inv;
        radiance.w = radiance.w.clamp(0.0, 1.0);
        radiance.max(Vec4::ZERO)
    }

    /// 镜面间接光：沿反射方向的单锥，张角随粗糙度增大
    pub fn trace_cone_reflection(
        &self,
        position: Vec3,
        normal: Vec3,
        view: Vec3,
        roughness: f32,
    ) -> Vec4 {
        let aperture = (roughness * PI / 20.0).tan();
        let direction = reflect(-view, normal);
        let result = self.trace_cone(position, normal, direction, aperture);
        result
            .truncate()
            .max(Vec3::ZERO)
            .extend((result.w * (1.0 - roughness)).clamp(0.0, 1.0))
    }

    /// 朝光源方向的遮挡，近处的遮挡者权重更低
    pub fn trace_cone_occlusion(&self, position: Vec3, normal: Vec3, to_light: Vec3) -> f32 {
        let config = self.config;
        let voxel = config.grid_to_world;
        let mip_count = config.mip_count as f32;

        let mut occlusion = 0.0;
        let mut distance = voxel;
        let start = position + normal * voxel * START_OFFSET;

        while distance < config.max_distance && occlusion < 1.0 {
            let diameter = voxel.max(2.0 * OCCLUSION_APERTURE * distance);
            let mip = (diameter * config.world_to_grid).log2();
            let uvw = config.world_to_tex(start + to_light * distance);
            if !is_saturated(uvw) || mip >= mip_count {
                break;
            }

            let sample = self.voxels.sample_lod(uvw, mip);
            let weight = smoothstep(0.0, config.max_distance, distance.sqrt());
            occlusion += (1.0 - occlusion) * sample.w * weight;
            distance += diameter * config.ray_step;
        }

        occlusion.clamp(0.0, 1.0)
    }

    /// 着色用的可见度因子，直接乘到间接光上
    ///
    /// 未启用遮挡时恒为 1；否则为 `1 - trace_cone_occlusion`。
    pub fn indirect_occlusion(&self, position: Vec3, normal: Vec3, to_light: Vec3) -> f32 {
        if !self.config.occlusion() {
            return 1.0;
        }
        1.0 - self.trace_cone_occlusion(position, normal, to_light)
    }

    /// 网格边缘向外淡出的权重，中心为 1，边界为 0
    pub fn indirect_blend(&self, position: Vec3) -> f32 {
        let clip = self
            .config
            .world_to_clip(position)
            .abs()
            .clamp(Vec3::ZERO, Vec3::ONE);
        1.0 - clip.max_element().powi(4)
    }

    /// 着色用的漫反射间接光，w 为边缘淡出权重
    pub fn indirect_diffuse(&self, position: Vec3, normal: Vec3, occlusion: f32) -> Vec4 {
        let blend = self.indirect_blend(position);
        let radiance = self.trace_cone_radiance(position, normal);
        let weight = radiance.w * blend * occlusion;
        (radiance.truncate() * occlusion * weight).extend(blend)
    }

    /// 着色用的镜面间接光，`blend` 取自 [`Self::indirect_diffuse`]
    pub fn indirect_specular(
        &self,
        position: Vec3,
        normal: Vec3,
        view: Vec3,
        roughness: f32,
        occlusion: f32,
        blend: f32,
    ) -> Vec3 {
        let reflection = self.trace_cone_reflection(position, normal, view, roughness);
        reflection.truncate() * (reflection.w * blend * occlusion)
    }
}

#[inline]
fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

//! 体素化 pass
//!
//! 每个三角形投影到主轴平面，以网格分辨率光栅化，逐片元计算直接光照，
//! 编码后以原子 max 合并进体素数组。重叠的写入者互相竞争而不是混合：
//! 打包整数最大者胜出，近似"最亮的贡献者"。

mod lighting;
mod raster;

use std::fmt;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::error::ComputeError;
use crate::grid::arena::VoxelArena;
use crate::grid::codec::{encode_color, encode_normal};
use crate::grid::{VoxelGridConfig, flatten, is_saturated};

pub use lighting::{Light, LightingModel, NoLighting, SceneLights, Surface};

// ===============================================================================
// 几何与材质输入
// ===============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VoxelVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl VoxelVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// 几何流中的一个图元 (世界空间)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [VoxelVertex; 3],
    /// 材质表中的下标
    pub material: u32,
}

impl Triangle {
    pub fn new(vertices: [VoxelVertex; 3], material: u32) -> Self {
        Self { vertices, material }
    }

    /// 三个顶点共享同一法线，uv 为零
    pub fn flat(positions: [Vec3; 3], normal: Vec3, material: u32) -> Self {
        Self {
            vertices: positions.map(|p| VoxelVertex::new(p, normal, Vec2::ZERO)),
            material,
        }
    }

    pub fn positions(&self) -> [Vec3; 3] {
        self.vertices.map(|v| v.position)
    }

    pub fn normals(&self) -> [Vec3; 3] {
        self.vertices.map(|v| v.normal)
    }

    fn interpolate<T>(&self, bary: Vec3, attr: impl Fn(&VoxelVertex) -> T) -> T
    where
        T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
    {
        let [a, b, c] = &self.vertices;
        attr(a) * bary.x + attr(b) * bary.y + attr(c) * bary.z
    }
}

/// 反照率贴图，按 uv 采样
pub trait AlbedoMap: Send + Sync {
    fn sample(&self, uv: Vec2) -> Vec3;
}

#[derive(Clone)]
pub struct VoxelMaterial {
    pub albedo: Vec3,
    pub emissive: Vec3,
    pub opacity: f32,
    /// 环境光遮蔽，缩放直接光照项
    pub occlusion: f32,
    /// 为 false 时只写入自发光
    pub lighting: bool,
    pub albedo_map: Option<Arc<dyn AlbedoMap>>,
}

impl Default for VoxelMaterial {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            emissive: Vec3::ZERO,
            opacity: 1.0,
            occlusion: 1.0,
            lighting: true,
            albedo_map: None,
        }
    }
}

impl fmt::Debug for VoxelMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoxelMaterial")
            .field("albedo", &self.albedo)
            .field("emissive", &self.emissive)
            .field("opacity", &self.opacity)
            .field("occlusion", &self.occlusion)
            .field("lighting", &self.lighting)
            .field("albedo_map", &self.albedo_map.is_some())
            .finish()
    }
}

impl VoxelMaterial {
    /// 纯自发光材质
    pub fn emissive(color: Vec3) -> Self {
        Self {
            albedo: Vec3::ZERO,
            emissive: color,
            lighting: false,
            ..Default::default()
        }
    }

    pub fn lit(albedo: Vec3) -> Self {
        Self {
            albedo,
            ..Default::default()
        }
    }

    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_occlusion(mut self, occlusion: f32) -> Self {
        self.occlusion = occlusion;
        self
    }

    pub fn with_albedo_map(mut self, map: Arc<dyn AlbedoMap>) -> Self {
        self.albedo_map = Some(map);
        self
    }

    fn albedo_at(&self, uv: Vec2) -> Vec3 {
        match &self.albedo_map {
            Some(map) => self.albedo * map.sample(uv),
            None => self.albedo,
        }
    }
}

// ===============================================================================
// Pass
// ===============================================================================

/// 光栅化变体，每帧选择一次
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterMode {
    Standard,
    Conservative,
}

impl RasterMode {
    pub fn from_config(config: &VoxelGridConfig) -> Self {
        if config.conservative_rasterization() {
            RasterMode::Conservative
        } else {
            RasterMode::Standard
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoxelizeStats {
    pub primitives: u32,
    /// 材质下标无效而跳过的图元
    pub skipped: u32,
    /// 落在网格内并写入体素数组的片元
    pub fragments: u64,
}

impl VoxelizeStats {
    fn combine(self, other: Self) -> Self {
        Self {
            primitives: self.primitives + other.primitives,
            skipped: self.skipped + other.skipped,
            fragments: self.fragments + other.fragments,
        }
    }
}

#[tracing::instrument(skip_all, fields(triangles = geometry.len(), grid = config.grid_size))]
pub fn voxelize<L: LightingModel + ?Sized>(
    config: &VoxelGridConfig,
    geometry: &[Triangle],
    materials: &[VoxelMaterial],
    lighting: &L,
    arena: &VoxelArena,
) -> Result<VoxelizeStats, ComputeError> {
    if arena.grid_size() != config.grid_size {
        return Err(ComputeError::ShapeMismatch {
            expected: vec![config.grid_size as usize; 3],
            actual: vec![arena.grid_size() as usize; 3],
        });
    }

    let stats = match RasterMode::from_config(config) {
        RasterMode::Standard => dispatch::<false, L>(config, geometry, materials, lighting, arena),
        RasterMode::Conservative => {
            dispatch::<true, L>(config, geometry, materials, lighting, arena)
        }
    };
    tracing::debug!(
        primitives = stats.primitives,
        skipped = stats.skipped,
        fragments = stats.fragments,
        "voxelized"
    );
    Ok(stats)
}

fn dispatch<const CONSERVATIVE: bool, L: LightingModel + ?Sized>(
    config: &VoxelGridConfig,
    geometry: &[Triangle],
    materials: &[VoxelMaterial],
    lighting: &L,
    arena: &VoxelArena,
) -> VoxelizeStats {
    geometry
        .par_iter()
        .map(|triangle| {
            let Some(material) = materials.get(triangle.material as usize) else {
                tracing::trace!(material = triangle.material, "unknown material, primitive skipped");
                return VoxelizeStats {
                    skipped: 1,
                    ..Default::default()
                };
            };
            let mut fragments = 0;
            raster::rasterize::<CONSERVATIVE>(
                config,
                triangle.positions(),
                triangle.normals(),
                |bary| {
                    if shade_fragment(config, triangle, material, lighting, bary, arena) {
                        fragments += 1;
                    }
                },
            );
            VoxelizeStats {
                primitives: 1,
                skipped: 0,
                fragments,
            }
        })
        .reduce(VoxelizeStats::default, VoxelizeStats::combine)
}

fn shade_fragment<L: LightingModel + ?Sized>(
    config: &VoxelGridConfig,
    triangle: &Triangle,
    material: &VoxelMaterial,
    lighting: &L,
    bary: Vec3,
    arena: &VoxelArena,
) -> bool {
    let position = triangle.interpolate(bary, |v| v.position);
    let uvw = config.world_to_tex(position);
    if !is_saturated(uvw) {
        return false;
    }
    let normal = triangle.interpolate(bary, |v| v.normal).normalize_or_zero();

    let mut color = material.emissive;
    if material.lighting {
        let uv = triangle.interpolate(bary, |v| v.uv);
        let diffuse = lighting.diffuse(&Surface { position, normal });
        color += material.occlusion * material.albedo_at(uv) * diffuse;
    }

    let coord = config.tex_to_voxel(uvw);
    arena.merge(
        flatten(coord, config.grid_size),
        encode_color(color.extend(material.opacity)),
        encode_normal(normal),
    );
    true
}

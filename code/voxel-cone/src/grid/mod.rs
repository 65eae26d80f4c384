//! 体素网格数据模型
//!
//! 线性索引 <-> 三维坐标映射、场景包围盒、每帧网格配置，以及体素记录的编码与原子存储。

pub mod arena;
pub mod codec;
mod config;

use glam::{UVec3, Vec3};

use crate::error::ConfigError;

pub use config::{VoxelGridConfig, VoxelGridFlags, VoxelGridUniform, VoxelSceneSettings};

/// 网格边长上限，保证 N³ 个线性索引落在 u32 内
pub const MAX_GRID_SIZE: u32 = 1024;

// ===============================================================================
// 线性索引
// ===============================================================================

/// `z * N² + y * N + x`
#[inline]
pub fn flatten(coord: UVec3, dim: u32) -> u32 {
    coord.z * dim * dim + coord.y * dim + coord.x
}

/// [`flatten`] 的逆映射
#[inline]
pub fn unflatten(index: u32, dim: u32) -> UVec3 {
    let slice = dim * dim;
    let z = index / slice;
    let rest = index - z * slice;
    UVec3::new(rest % dim, rest / dim, z)
}

/// 检查网格边长：非零、2 的幂、不超过 [`MAX_GRID_SIZE`]
pub fn validate_grid_size(size: u32) -> Result<(), ConfigError> {
    if size == 0 {
        return Err(ConfigError::ZeroGridSize);
    }
    if !size.is_power_of_two() {
        return Err(ConfigError::NonPowerOfTwo(size));
    }
    if size > MAX_GRID_SIZE {
        return Err(ConfigError::GridTooLarge {
            size,
            max: MAX_GRID_SIZE,
        });
    }
    Ok(())
}

/// 纹理坐标是否落在 [0,1]³ 内 (含边界)
#[inline]
pub fn is_saturated(uvw: Vec3) -> bool {
    uvw.cmpge(Vec3::ZERO).all() && uvw.cmple(Vec3::ONE).all()
}

/// 完整 mip 链除最高分辨率外的层数，即 log2(N)
#[inline]
pub fn mip_count(size: u32) -> u32 {
    size.trailing_zeros()
}

// ===============================================================================
// 场景包围盒
// ===============================================================================

/// 轴对齐包围盒，决定每帧体素网格的位置和体素尺寸
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl SceneBounds {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bounds = Self::EMPTY;
        for p in points {
            bounds.grow_point(p);
        }
        bounds
    }

    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn grow(&mut self, other: &SceneBounds) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// 空、反向、非有限或最大边长为零的包围盒都无法放置网格
    pub fn is_degenerate(&self) -> bool {
        if !self.min.is_finite() || !self.max.is_finite() {
            return true;
        }
        let extent = self.extent();
        extent.min_element() < 0.0 || extent.max_element() <= 0.0
    }
}

//! 带完整 mip 链的三维 RGBA 体素纹理
//!
//! 纹素按 [`crate::grid::flatten`] 顺序存储。采样使用 clamp-to-edge 寻址，
//! 层内三线性插值，层间线性插值。

use glam::{UVec3, Vec3, Vec4};
use rayon::prelude::*;

use crate::error::ConfigError;
use crate::grid::{flatten, unflatten, validate_grid_size};

#[derive(Clone, Debug)]
struct MipLevel {
    size: u32,
    texels: Vec<Vec4>,
}

impl MipLevel {
    fn new(size: u32) -> Self {
        Self {
            size,
            texels: vec![Vec4::ZERO; (size as usize).pow(3)],
        }
    }

    #[inline]
    fn fetch(&self, coord: UVec3) -> Vec4 {
        self.texels[flatten(coord, self.size) as usize]
    }

    fn sample(&self, uvw: Vec3) -> Vec4 {
        let max = UVec3::splat(self.size - 1);
        let p = uvw * self.size as f32 - 0.5;
        let base = p.floor();
        let f = p - base;
        let base = base.as_ivec3();

        let clamp = |dx: i32, dy: i32, dz: i32| {
            (base + glam::IVec3::new(dx, dy, dz))
                .max(glam::IVec3::ZERO)
                .as_uvec3()
                .min(max)
        };

        let c000 = self.fetch(clamp(0, 0, 0));
        let c100 = self.fetch(clamp(1, 0, 0));
        let c010 = self.fetch(clamp(0, 1, 0));
        let c110 = self.fetch(clamp(1, 1, 0));
        let c001 = self.fetch(clamp(0, 0, 1));
        let c101 = self.fetch(clamp(1, 0, 1));
        let c011 = self.fetch(clamp(0, 1, 1));
        let c111 = self.fetch(clamp(1, 1, 1));

        let x00 = c000.lerp(c100, f.x);
        let x10 = c010.lerp(c110, f.x);
        let x01 = c001.lerp(c101, f.x);
        let x11 = c011.lerp(c111, f.x);
        let y0 = x00.lerp(x10, f.y);
        let y1 = x01.lerp(x11, f.y);
        y0.lerp(y1, f.z)
    }
}

/// 首次/二次反弹纹理。每帧由单个 pass 写入一次 (`&mut`)，之后只读共享 (`&`)
#[derive(Clone, Debug)]
pub struct VoxelTexture {
    size: u32,
    levels: Vec<MipLevel>,
}

impl VoxelTexture {
    pub fn new(size: u32) -> Result<Self, ConfigError> {
        validate_grid_size(size)?;
        let levels = (0..=size.trailing_zeros())
            .map(|mip| MipLevel::new(size >> mip))
            .collect();
        Ok(Self { size, levels })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// 含 mip 0 在内的层数，log2(N) + 1
    pub fn mip_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn level_size(&self, mip: u32) -> Option<u32> {
        self.levels.get(mip as usize).map(|level| level.size)
    }

    pub fn level(&self, mip: u32) -> Option<&[Vec4]> {
        self.levels.get(mip as usize).map(|level| level.texels.as_slice())
    }

    pub(crate) fn base_mut(&mut self) -> &mut [Vec4] {
        &mut self.levels[0].texels
    }

    /// 越界坐标读出透明黑
    pub fn load(&self, coord: UVec3, mip: u32) -> Vec4 {
        match self.levels.get(mip as usize) {
            Some(level) if coord.cmplt(UVec3::splat(level.size)).all() => level.fetch(coord),
            _ => Vec4::ZERO,
        }
    }

    /// 写 mip 0 的单个纹素，越界写入被忽略；之后需要 [`Self::generate_mips`]
    pub fn store(&mut self, coord: UVec3, value: Vec4) {
        if coord.cmplt(UVec3::splat(self.size)).all() {
            let index = flatten(coord, self.size) as usize;
            self.levels[0].texels[index] = value;
        }
    }

    pub fn clear(&mut self) {
        self.levels
            .par_iter_mut()
            .for_each(|level| level.texels.fill(Vec4::ZERO));
    }

    /// 自上而下 2x2x2 盒式滤波重建所有低分辨率层
    pub fn generate_mips(&mut self) {
        for mip in 1..self.levels.len() {
            let (upper, lower) = self.levels.split_at_mut(mip);
            let src = &upper[mip - 1];
            let dst = &mut lower[0];
            let dst_size = dst.size;
            dst.texels
                .par_iter_mut()
                .enumerate()
                .for_each(|(index, texel)| {
                    let base = unflatten(index as u32, dst_size) * 2;
                    let mut sum = Vec4::ZERO;
                    for dz in 0..2 {
                        for dy in 0..2 {
                            for dx in 0..2 {
                                sum += src.fetch(base + UVec3::new(dx, dy, dz));
                            }
                        }
                    }
                    *texel = sum * 0.125;
                });
        }
    }

    /// `lod` 限制在 [0, mip_levels - 1]
    pub fn sample_lod(&self, uvw: Vec3, lod: f32) -> Vec4 {
        let max_lod = (self.levels.len() - 1) as f32;
        let lod = lod.clamp(0.0, max_lod);
        let lower = lod.floor();
        let t = lod - lower;
        let lower = lower as usize;
        let a = self.levels[lower].sample(uvw);
        if t > 0.0 && lower + 1 < self.levels.len() {
            a.lerp(self.levels[lower + 1].sample(uvw), t)
        } else {
            a
        }
    }
}

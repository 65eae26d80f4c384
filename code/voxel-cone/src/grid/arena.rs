//! 体素记录的原子存储
//!
//! 整个帧内对共享体素数组的写入只有两种：原子 max 合并和原子清零。
//! 不提供普通 store，跨 pass 的可见性由编排层的屏障保证。

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use super::validate_grid_size;
use crate::VoxelRecord;
use crate::error::{ComputeError, ConfigError};

/// 单个体素的原子单元，布局与 [`VoxelRecord`] 一致
#[derive(Debug, Default)]
pub struct AtomicVoxel {
    color_mask: AtomicU32,
    normal_mask: AtomicU32,
}

impl AtomicVoxel {
    /// 两个字段各自做原子 max，合并与顺序无关
    #[inline]
    pub fn merge(&self, color_mask: u32, normal_mask: u32) {
        self.color_mask.fetch_max(color_mask, Ordering::Relaxed);
        self.normal_mask.fetch_max(normal_mask, Ordering::Relaxed);
    }

    #[inline]
    pub fn color_mask(&self) -> u32 {
        self.color_mask.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn normal_mask(&self) -> u32 {
        self.normal_mask.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn clear_color(&self) {
        self.color_mask.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_normal(&self) {
        self.normal_mask.store(0, Ordering::Relaxed);
    }

    pub fn load(&self) -> VoxelRecord {
        VoxelRecord {
            color_mask: self.color_mask(),
            normal_mask: self.normal_mask(),
        }
    }
}

/// N³ 个体素记录，按 [`super::flatten`] 顺序排列
#[derive(Debug)]
pub struct VoxelArena {
    grid_size: u32,
    cells: Box<[AtomicVoxel]>,
}

impl VoxelArena {
    pub fn new(grid_size: u32) -> Result<Self, ConfigError> {
        validate_grid_size(grid_size)?;
        let len = (grid_size as usize).pow(3);
        let cells = (0..len).map(|_| AtomicVoxel::default()).collect();
        Ok(Self { grid_size, cells })
    }

    /// 由快照重建，快照长度必须为 N³
    pub fn from_records(grid_size: u32, records: &[VoxelRecord]) -> Result<Self, ComputeError> {
        validate_grid_size(grid_size)?;
        let len = (grid_size as usize).pow(3);
        if records.len() != len {
            return Err(ComputeError::ShapeMismatch {
                expected: vec![len],
                actual: vec![records.len()],
            });
        }
        let cells = records
            .iter()
            .map(|r| AtomicVoxel {
                color_mask: AtomicU32::new(r.color_mask),
                normal_mask: AtomicU32::new(r.normal_mask),
            })
            .collect();
        Ok(Self { grid_size, cells })
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[AtomicVoxel] {
        &self.cells
    }

    pub fn cell(&self, index: u32) -> Option<&AtomicVoxel> {
        self.cells.get(index as usize)
    }

    pub fn merge(&self, index: u32, color_mask: u32, normal_mask: u32) {
        if let Some(cell) = self.cell(index) {
            cell.merge(color_mask, normal_mask);
        }
    }

    pub fn load(&self, index: u32) -> VoxelRecord {
        self.cell(index).map(AtomicVoxel::load).unwrap_or_default()
    }

    pub fn clear_colors(&self) {
        self.cells.par_iter().for_each(AtomicVoxel::clear_color);
    }

    pub fn clear_normals(&self) {
        self.cells.par_iter().for_each(AtomicVoxel::clear_normal);
    }

    pub fn snapshot(&self) -> Vec<VoxelRecord> {
        self.cells.par_iter().map(AtomicVoxel::load).collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .par_iter()
            .filter(|cell| !cell.load().is_empty())
            .count()
    }

    pub fn is_cleared(&self) -> bool {
        self.cells.par_iter().all(|cell| cell.load().is_empty())
    }
}

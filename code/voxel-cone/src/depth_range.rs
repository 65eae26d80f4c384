//! 线性深度图的 {min, max} 归约
//!
//! 有效深度为正的有限 f32，其位模式按 i32 比较与数值顺序一致，因此可以直接做整数原子 min/max。

use std::sync::atomic::{AtomicI32, Ordering};

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

use crate::error::ComputeError;

/// 工作组边长，与 GPU 着色器的 `@workgroup_size(8, 8)` 一致
pub const DEPTH_RANGE_WORKGROUP: u32 = 8;

/// 行主序的线性深度图
#[derive(Clone, Debug, PartialEq)]
pub struct DepthImage {
    width: u32,
    height: u32,
    texels: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: u32, height: u32, texels: Vec<f32>) -> Result<Self, ComputeError> {
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(ComputeError::ShapeMismatch {
                expected: vec![height as usize, width as usize],
                actual: vec![texels.len()],
            });
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texels(&self) -> &[f32] {
        &self.texels
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// 归约输出，GPU 端布局 `{ min_depth: i32, max_depth: i32 }`
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct DepthRangeResult {
    pub min_depth: i32,
    pub max_depth: i32,
}

impl DepthRangeResult {
    /// 初值：任何有效样本都会同时更新两端
    pub const INIT: Self = Self {
        min_depth: i32::MAX,
        max_depth: i32::MIN,
    };

    pub fn is_empty(&self) -> bool {
        self.min_depth > self.max_depth
    }

    /// 没有有效样本时为 None
    pub fn range(&self) -> Option<(f32, f32)> {
        (!self.is_empty()).then(|| {
            (
                f32::from_bits(self.min_depth as u32),
                f32::from_bits(self.max_depth as u32),
            )
        })
    }
}

impl Default for DepthRangeResult {
    fn default() -> Self {
        Self::INIT
    }
}

/// 原子 {min, max} 累加器
#[derive(Debug)]
pub struct DepthRange {
    min: AtomicI32,
    max: AtomicI32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthRange {
    pub fn new() -> Self {
        Self {
            min: AtomicI32::new(DepthRangeResult::INIT.min_depth),
            max: AtomicI32::new(DepthRangeResult::INIT.max_depth),
        }
    }

    pub fn reset(&self) {
        self.min.store(DepthRangeResult::INIT.min_depth, Ordering::Relaxed);
        self.max.store(DepthRangeResult::INIT.max_depth, Ordering::Relaxed);
    }

    /// 零、负数和非有限值没有副作用
    pub fn accumulate(&self, depth: f32) -> bool {
        if !(depth > 0.0) || !depth.is_finite() {
            return false;
        }
        let bits = depth.to_bits() as i32;
        self.min.fetch_min(bits, Ordering::Relaxed);
        self.max.fetch_max(bits, Ordering::Relaxed);
        true
    }

    pub fn result(&self) -> DepthRangeResult {
        DepthRangeResult {
            min_depth: self.min.load(Ordering::Relaxed),
            max_depth: self.max.load(Ordering::Relaxed),
        }
    }

    pub fn range(&self) -> Option<(f32, f32)> {
        self.result().range()
    }
}

/// 按 8×8 工作组铺满图像；越界的工作项直接返回。结果累加进 `range`
#[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn compute_depth_range(image: &DepthImage, range: &DepthRange) -> u64 {
    let groups_x = image.width().div_ceil(DEPTH_RANGE_WORKGROUP);
    let groups_y = image.height().div_ceil(DEPTH_RANGE_WORKGROUP);
    let invocations_x = groups_x * DEPTH_RANGE_WORKGROUP;

    let valid: u64 = (0..groups_y * DEPTH_RANGE_WORKGROUP)
        .into_par_iter()
        .map(|y| {
            (0..invocations_x)
                .filter_map(|x| image.get(x, y))
                .filter(|&depth| range.accumulate(depth))
                .count() as u64
        })
        .sum();

    tracing::debug!(valid, "depth range reduced");
    valid
}

//! 二次反弹
//!
//! 对首次反弹纹理中被占据的体素，用体素中心和解码后的法线再做一次漫反射锥追踪，
//! 结果叠加到体素自身的辐射上写入第二张纹理。每个下标处理完后清零 `normal_mask`，
//! 至此整条体素记录在下一帧体素化之前归零。

use glam::Vec4;
use rayon::prelude::*;

use crate::cone::ConeTracer;
use crate::error::ComputeError;
use crate::grid::arena::VoxelArena;
use crate::grid::codec::decode_normal;
use crate::grid::{VoxelGridConfig, unflatten};
use crate::texture::VoxelTexture;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BounceStats {
    /// 被重新照明的占据体素数
    pub lit: u64,
}

#[tracing::instrument(skip_all, fields(grid = config.grid_size))]
pub fn secondary_bounce(
    config: &VoxelGridConfig,
    arena: &VoxelArena,
    first_bounce: &VoxelTexture,
    second_bounce: &mut VoxelTexture,
) -> Result<BounceStats, ComputeError> {
    let n = config.grid_size;
    for size in [arena.grid_size(), first_bounce.size(), second_bounce.size()] {
        if size != n {
            return Err(ComputeError::ShapeMismatch {
                expected: vec![n as usize; 3],
                actual: vec![size as usize; 3],
            });
        }
    }

    let tracer = ConeTracer::new(first_bounce, config);
    let lit = second_bounce
        .base_mut()
        .par_iter_mut()
        .zip(arena.cells().par_iter())
        .enumerate()
        .map(|(index, (texel, cell))| {
            let coord = unflatten(index as u32, n);
            let emission = first_bounce.load(coord, 0);
            let lit = if emission.w > 0.0 {
                let position = config.voxel_to_world(coord);
                let normal = decode_normal(cell.normal_mask()).normalize_or_zero();
                let radiance = tracer.trace_cone_radiance(position, normal);
                *texel = emission + radiance.truncate().extend(0.0);
                1
            } else {
                *texel = Vec4::ZERO;
                0
            };
            cell.clear_normal();
            lit
        })
        .sum();
    second_bounce.generate_mips();

    tracing::debug!(lit, "secondary bounce gathered");
    Ok(BounceStats { lit })
}

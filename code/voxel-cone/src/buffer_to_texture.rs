//! 体素记录 -> 首次反弹纹理
//!
//! 逐线性下标解码 `color_mask`，alpha 有效时写入对应纹素 (时域模式下与上一帧混合)，
//! 写入之后才清零该下标的 `color_mask`。`normal_mask` 保留给二次反弹。
//! 结束后重建 mip 链。

use glam::Vec4;
use rayon::prelude::*;

use crate::error::ComputeError;
use crate::grid::VoxelGridConfig;
use crate::grid::arena::{AtomicVoxel, VoxelArena};
use crate::grid::codec::decode_color;
use crate::texture::VoxelTexture;

/// 时域平滑的指数滑动平均权重
pub const TEMPORAL_BLEND: f32 = 0.2;

/// 纹理写入变体，每帧选择一次
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureWriteMode {
    /// 先清空整张纹理，再直接写入
    Direct,
    /// 与上一帧的值混合；本帧无效的体素保持原值
    TemporalSmoothing,
}

impl TextureWriteMode {
    pub fn from_config(config: &VoxelGridConfig) -> Self {
        if config.temporal_smoothing() {
            TextureWriteMode::TemporalSmoothing
        } else {
            TextureWriteMode::Direct
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferToTextureStats {
    /// alpha 有效并写入纹理的体素数
    pub written: u64,
}

#[tracing::instrument(skip_all, fields(grid = arena.grid_size(), ?mode))]
pub fn buffer_to_texture(
    arena: &VoxelArena,
    texture: &mut VoxelTexture,
    mode: TextureWriteMode,
) -> Result<BufferToTextureStats, ComputeError> {
    if arena.grid_size() != texture.size() {
        return Err(ComputeError::ShapeMismatch {
            expected: vec![arena.grid_size() as usize; 3],
            actual: vec![texture.size() as usize; 3],
        });
    }

    let written = match mode {
        TextureWriteMode::Direct => {
            texture.clear();
            scatter::<false>(arena.cells(), texture.base_mut())
        }
        TextureWriteMode::TemporalSmoothing => scatter::<true>(arena.cells(), texture.base_mut()),
    };
    texture.generate_mips();

    tracing::debug!(written, "voxel buffer resolved to texture");
    Ok(BufferToTextureStats { written })
}

/// 纹素与体素记录共用 flatten 布局，下标 i 即 unflatten(i) 处的纹素
fn scatter<const TEMPORAL: bool>(cells: &[AtomicVoxel], texels: &mut [Vec4]) -> u64 {
    texels
        .par_iter_mut()
        .zip(cells.par_iter())
        .map(|(texel, cell)| {
            let color = decode_color(cell.color_mask());
            let written = if color.w > 0.0 {
                *texel = if TEMPORAL {
                    texel.lerp(color, TEMPORAL_BLEND)
                } else {
                    color
                };
                1
            } else {
                0
            };
            cell.clear_color();
            written
        })
        .sum()
}

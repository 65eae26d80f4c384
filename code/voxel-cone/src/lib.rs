use bytemuck::{Pod, Zeroable};
mod error;
pub mod bounce;
pub mod buffer_to_texture;
pub mod cone;
pub mod depth_range;
pub mod frame;
pub mod gpu;
pub mod grid;
pub mod texture;
pub mod voxelize;

pub use bounce::{BounceStats, secondary_bounce};
pub use buffer_to_texture::{BufferToTextureStats, TEMPORAL_BLEND, TextureWriteMode, buffer_to_texture};
pub use cone::{ConeTrace, ConeTracer};
pub use depth_range::{DepthImage, DepthRange, DepthRangeResult, compute_depth_range};
pub use error::{ComputeError, ConfigError};
pub use frame::{FrameStats, FrameVariant, VoxelConeTracing};
pub use grid::{
    SceneBounds, VoxelGridConfig, VoxelGridFlags, VoxelGridUniform, VoxelSceneSettings,
    arena::VoxelArena, flatten, unflatten,
};
pub use texture::VoxelTexture;
pub use voxelize::{
    LightingModel, NoLighting, Triangle, VoxelMaterial, VoxelVertex, VoxelizeStats, voxelize,
};

// ===============================================================================
// 基础类型定义
// ===============================================================================

/// 单个体素的打包记录 (GPU 端布局)
///
/// `color_mask` 为 HDR 颜色 + alpha 标志位，`normal_mask` 为带符号的单位法线，
/// 编码见 [`grid::codec`]。两者每帧只通过原子 max 写入，消费后清零。
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VoxelRecord {
    pub color_mask: u32,
    pub normal_mask: u32,
}

impl VoxelRecord {
    pub const EMPTY: Self = Self {
        color_mask: 0,
        normal_mask: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.color_mask == 0 && self.normal_mask == 0
    }
}

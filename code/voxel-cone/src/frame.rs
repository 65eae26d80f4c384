//! 每帧编排：Voxelize -> BufferToTexture -> SecondaryBounce
//!
//! pass 之间的依赖通过显式屏障表达。每个 pass (含 mip 重建) 在下一个 pass 开始前完全结束，
//! 帧结束时体素数组全部归零。

use std::sync::atomic::{Ordering, fence};

use crate::bounce::{BounceStats, secondary_bounce};
use crate::buffer_to_texture::{BufferToTextureStats, TextureWriteMode, buffer_to_texture};
use crate::cone::ConeTracer;
use crate::error::{ComputeError, ConfigError};
use crate::grid::arena::VoxelArena;
use crate::grid::{SceneBounds, VoxelGridConfig, VoxelSceneSettings};
use crate::texture::VoxelTexture;
use crate::voxelize::{LightingModel, RasterMode, Triangle, VoxelMaterial, VoxelizeStats, voxelize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassStage {
    Voxelize,
    BufferToTexture,
    SecondaryBounce,
    ClearNormals,
}

/// 两个 pass 之间的屏障：前一个 pass 的写入对后一个 pass 可见
fn barrier(stage: PassStage) {
    fence(Ordering::SeqCst);
    tracing::trace!(?stage, "barrier");
}

/// 一帧使用的 pass 变体组合，渲染开始时确定
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameVariant {
    pub raster: RasterMode,
    pub write: TextureWriteMode,
    pub secondary_bounce: bool,
}

impl FrameVariant {
    pub fn from_config(config: &VoxelGridConfig) -> Self {
        Self {
            raster: RasterMode::from_config(config),
            write: TextureWriteMode::from_config(config),
            secondary_bounce: config.secondary_bounce(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// 禁用时整帧跳过
    pub skipped: bool,
    pub voxelize: VoxelizeStats,
    pub buffer_to_texture: BufferToTextureStats,
    pub bounce: Option<BounceStats>,
}

/// 一个场景的体素锥追踪状态：体素数组和两张反弹纹理
#[derive(Debug)]
pub struct VoxelConeTracing {
    settings: VoxelSceneSettings,
    config: Option<VoxelGridConfig>,
    arena: VoxelArena,
    first_bounce: VoxelTexture,
    second_bounce: VoxelTexture,
    frame: u64,
}

impl VoxelConeTracing {
    pub fn new(settings: VoxelSceneSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let n = settings.grid_size;
        Ok(Self {
            arena: VoxelArena::new(n)?,
            first_bounce: VoxelTexture::new(n)?,
            second_bounce: VoxelTexture::new(n)?,
            settings,
            config: None,
            frame: 0,
        })
    }

    pub fn settings(&self) -> &VoxelSceneSettings {
        &self.settings
    }

    /// 替换设置；网格尺寸变化时重新分配所有资源
    pub fn reconfigure(&mut self, settings: VoxelSceneSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        if settings.grid_size != self.settings.grid_size {
            *self = Self::new(settings)?;
        } else {
            self.settings = settings;
            self.config = None;
        }
        Ok(())
    }

    /// 每帧由场景包围盒重新计算网格配置
    pub fn update(&mut self, bounds: &SceneBounds) -> Result<&VoxelGridConfig, ConfigError> {
        let config = VoxelGridConfig::from_scene(&self.settings, bounds)?;
        Ok(self.config.insert(config))
    }

    pub fn config(&self) -> Option<&VoxelGridConfig> {
        self.config.as_ref()
    }

    pub fn arena(&self) -> &VoxelArena {
        &self.arena
    }

    pub fn first_bounce(&self) -> &VoxelTexture {
        &self.first_bounce
    }

    pub fn second_bounce(&self) -> &VoxelTexture {
        &self.second_bounce
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// 着色阶段读取的纹理：启用二次反弹时为第二张
    pub fn radiance_texture(&self) -> &VoxelTexture {
        if self.settings.secondary_bounce {
            &self.second_bounce
        } else {
            &self.first_bounce
        }
    }

    pub fn cone_tracer(&self) -> Option<ConeTracer<'_>> {
        self.config
            .as_ref()
            .map(|config| ConeTracer::new(self.radiance_texture(), config))
    }

    #[tracing::instrument(skip_all, fields(frame = self.frame, triangles = geometry.len()))]
    pub fn render<L: LightingModel + ?Sized>(
        &mut self,
        geometry: &[Triangle],
        materials: &[VoxelMaterial],
        lighting: &L,
    ) -> Result<FrameStats, ComputeError> {
        let Some(config) = self.config else {
            return Err(ComputeError::Execution(
                "voxel grid config not updated for this frame".to_string(),
            ));
        };
        if !config.is_enabled() {
            tracing::debug!("voxel cone tracing disabled, frame skipped");
            return Ok(FrameStats {
                skipped: true,
                ..Default::default()
            });
        }

        let variant = FrameVariant::from_config(&config);
        tracing::trace!(?variant, "frame variant");

        let voxelize = voxelize(&config, geometry, materials, lighting, &self.arena)?;
        barrier(PassStage::Voxelize);

        let buffer_to_texture = buffer_to_texture(&self.arena, &mut self.first_bounce, variant.write)?;
        barrier(PassStage::BufferToTexture);

        let bounce = if variant.secondary_bounce {
            let stats = secondary_bounce(
                &config,
                &self.arena,
                &self.first_bounce,
                &mut self.second_bounce,
            )?;
            barrier(PassStage::SecondaryBounce);
            Some(stats)
        } else {
            // 法线没有消费者，仍需在下一帧之前归零
            self.arena.clear_normals();
            barrier(PassStage::ClearNormals);
            None
        };

        self.frame += 1;
        Ok(FrameStats {
            skipped: false,
            voxelize,
            buffer_to_texture,
            bounce,
        })
    }
}

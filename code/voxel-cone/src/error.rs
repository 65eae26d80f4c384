// ===============================================================================
// 错误类型定义
// ===============================================================================

/// 体素网格配置错误
/// 在任何 pass 派发之前由调用方检查，内核本身没有失败路径
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid size must be non-zero")]
    ZeroGridSize,

    #[error("Grid size must be a power of two, got {0}")]
    NonPowerOfTwo(u32),

    #[error("Grid size {size} exceeds the maximum of {max}")]
    GridTooLarge { size: u32, max: u32 },

    #[error("Degenerate scene bounds: min={min:?}, max={max:?}")]
    DegenerateBounds { min: glam::Vec3, max: glam::Vec3 },

    #[error("Invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
}

/// 计算 / GPU 错误类型
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("Buffer creation failed: {0}")]
    BufferCreation(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("GPU execution failed: {0}")]
    Execution(String),

    #[error("No suitable GPU adapter: {0}")]
    AdapterUnavailable(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

//! 体素记录的 32 位打包编码
//!
//! 颜色 (`color_mask`)：
//! ```text
//! bit 31     : alpha 标志 (alpha > 0)
//! bit 24..30 : |rgb| / HDR_RANGE，7 位
//! bit 16..23 : r / |rgb|，8 位
//! bit  8..15 : g / |rgb|
//! bit  0.. 7 : b / |rgb|
//! ```
//! 高位在前，原子 max 因此优先保留 alpha 有效且亮度更高的写入者。
//!
//! 法线 (`normal_mask`)：x/y/z 的 8 位幅值分别位于 bit 18/9/0，符号位位于 bit 26/17/8。

use glam::{IVec3, Vec3, Vec4};

/// 颜色长度可表示的上限
pub const HDR_RANGE: f32 = 10.0;

const ALPHA_BIT: u32 = 1 << 31;

// ===============================================================================
// 颜色
// ===============================================================================

pub fn encode_color(color: Vec4) -> u32 {
    let rgb = color.truncate();
    let hdr = rgb.length();
    let rgb = if hdr > 0.0 { rgb / hdr } else { Vec3::ZERO };

    // `as u32` 对负数和 NaN 饱和到 0
    let c = (rgb * 255.0).as_uvec3().min(glam::UVec3::splat(255));
    let ihdr = ((hdr / HDR_RANGE).clamp(0.0, 1.0) * 127.0) as u32;

    let mut mask = (ihdr << 24) | (c.x << 16) | (c.y << 8) | c.z;
    if color.w > 0.0 {
        mask |= ALPHA_BIT;
    }
    mask
}

pub fn decode_color(mask: u32) -> Vec4 {
    let hdr = ((mask >> 24) & 0x7f) as f32 / 127.0;
    let rgb = Vec3::new(
        ((mask >> 16) & 0xff) as f32,
        ((mask >> 8) & 0xff) as f32,
        (mask & 0xff) as f32,
    ) / 255.0;
    let alpha = ((mask >> 31) & 1) as f32;
    (rgb * hdr * HDR_RANGE).extend(alpha)
}

// ===============================================================================
// 法线
// ===============================================================================

pub fn encode_normal(normal: Vec3) -> u32 {
    let n: IVec3 = (normal.clamp(Vec3::NEG_ONE, Vec3::ONE) * 255.0).as_ivec3();

    // 算术右移把负数的符号扩展位搬到目标符号位
    let signs = ((n.x >> 5) & 0x0400_0000) | ((n.y >> 14) & 0x0002_0000) | ((n.z >> 23) & 0x0000_0100);
    let m = n.abs().as_uvec3();
    signs as u32 | (m.x << 18) | (m.y << 9) | m.z
}

pub fn decode_normal(mask: u32) -> Vec3 {
    let magnitude = Vec3::new(
        ((mask >> 18) & 0xff) as f32,
        ((mask >> 9) & 0xff) as f32,
        (mask & 0xff) as f32,
    );
    let sign = Vec3::new(
        1.0 - ((mask >> 25) & 2) as f32,
        1.0 - ((mask >> 16) & 2) as f32,
        1.0 - ((mask >> 7) & 2) as f32,
    );
    magnitude / 255.0 * sign
}

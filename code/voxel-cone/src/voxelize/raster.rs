//! 主轴投影 + N×N 分辨率的三角形光栅化

use glam::{Vec2, Vec3, Vec3Swizzles};

use crate::grid::VoxelGridConfig;

const MIN_AREA: f32 = 1e-12;

/// `|n0 + n1 + n2|` 最大分量所在轴，相等时保留较小的轴
pub(crate) fn dominant_axis(normals: [Vec3; 3]) -> usize {
    let face = (normals[0] + normals[1] + normals[2]).abs();
    let mut axis = 0;
    if face.y > face.x {
        axis = 1;
    }
    if face.z > face[axis] {
        axis = 2;
    }
    axis
}

/// 把网格空间坐标转到以主轴为深度的平面
#[inline]
fn project(axis: usize, p: Vec3) -> Vec2 {
    match axis {
        0 => p.zy(),
        1 => p.xz(),
        _ => p.xy(),
    }
}

/// 每个顶点沿 (入边方向 - 出边方向) 外移一个像素
fn dilate(clip: &mut [Vec2; 3], pixel: f32) {
    let [p0, p1, p2] = *clip;
    let side0 = (p1 - p0).normalize_or_zero();
    let side1 = (p2 - p1).normalize_or_zero();
    let side2 = (p0 - p2).normalize_or_zero();
    clip[0] = p0 + (side2 - side0).normalize_or_zero() * pixel;
    clip[1] = p1 + (side0 - side1).normalize_or_zero() * pixel;
    clip[2] = p2 + (side1 - side2).normalize_or_zero() * pixel;
}

#[inline]
fn edge(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

#[inline]
fn covers(w: Vec3, area: f32) -> bool {
    if area > 0.0 {
        w.cmpge(Vec3::ZERO).all()
    } else {
        w.cmple(Vec3::ZERO).all()
    }
}

/// 光栅化一个世界空间三角形，对每个覆盖的像素中心回调其重心坐标
///
/// 两种绕序都接受；退化三角形不产生片元。`CONSERVATIVE` 在派发前按帧确定：
/// 覆盖判定额外使用外扩后的三角形，但重心坐标始终相对原三角形计算，
/// 外扩出的像素被夹回原图元上，因此覆盖集合包含标准模式的全部片元。
pub(crate) fn rasterize<const CONSERVATIVE: bool>(
    config: &VoxelGridConfig,
    positions: [Vec3; 3],
    normals: [Vec3; 3],
    mut emit: impl FnMut(Vec3),
) {
    let axis = dominant_axis(normals);
    let scale = config.world_to_grid * config.grid_to_clip;
    let clip = positions.map(|p| project(axis, (p - config.grid_center) * scale));

    let n = config.grid_size as f32;
    let to_pixel = |c: Vec2| (c * 0.5 + 0.5) * n;
    let [p0, p1, p2] = clip.map(to_pixel);
    let area = edge(p0, p1, p2);
    if !(area.abs() > MIN_AREA) {
        return;
    }

    let mut dilated = clip;
    if CONSERVATIVE {
        dilate(&mut dilated, config.grid_to_clip);
    }
    let [d0, d1, d2] = dilated.map(to_pixel);
    let dilated_area = edge(d0, d1, d2);

    let lo = p0.min(p1).min(p2).min(d0).min(d1).min(d2).floor().max(Vec2::ZERO);
    let hi = p0.max(p1).max(p2).max(d0).max(d1).max(d2).ceil().min(Vec2::splat(n));
    let (x0, y0) = (lo.x as u32, lo.y as u32);
    let (x1, y1) = (hi.x as u32, hi.y as u32);

    for y in y0..y1 {
        for x in x0..x1 {
            let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w = Vec3::new(edge(p1, p2, c), edge(p2, p0, c), edge(p0, p1, c));
            if covers(w, area) {
                emit(w / area);
                continue;
            }
            if !CONSERVATIVE {
                continue;
            }
            let wd = Vec3::new(edge(d1, d2, c), edge(d2, d0, c), edge(d0, d1, c));
            if covers(wd, dilated_area) {
                // 和恒为 1，至少一个分量为正，夹取后和仍大于零
                let bary = (w / area).clamp(Vec3::ZERO, Vec3::ONE);
                emit(bary / bary.element_sum());
            }
        }
    }
}

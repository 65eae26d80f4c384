#![allow(dead_code)]

use glam::{UVec3, Vec3, Vec4};
use voxel_cone::grid::codec::{encode_color, encode_normal};
use voxel_cone::{SceneBounds, VoxelArena, VoxelGridConfig, VoxelSceneSettings, flatten};

/// [-1,1]³ 场景，体素尺寸 2/N，clip 坐标与世界坐标重合
pub fn unit_bounds() -> SceneBounds {
    SceneBounds::new(Vec3::NEG_ONE, Vec3::ONE)
}

pub fn unit_config(settings: VoxelSceneSettings) -> VoxelGridConfig {
    VoxelGridConfig::from_scene(&settings, &unit_bounds()).expect("valid test config")
}

pub fn merge_voxel(arena: &VoxelArena, coord: UVec3, color: Vec4, normal: Vec3) {
    arena.merge(
        flatten(coord, arena.grid_size()),
        encode_color(color),
        encode_normal(normal),
    );
}

pub fn assert_vec4_near(actual: Vec4, expected: Vec4, tolerance: f32) {
    assert!(
        (actual - expected).abs().max_element() <= tolerance,
        "expected {expected:?}, got {actual:?} (tolerance {tolerance})"
    );
}

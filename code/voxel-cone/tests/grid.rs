mod common;

use glam::{UVec3, Vec3};
use voxel_cone::grid::{MAX_GRID_SIZE, mip_count};
use voxel_cone::{
    ConfigError, SceneBounds, VoxelGridConfig, VoxelGridFlags, VoxelGridUniform,
    VoxelSceneSettings, flatten, unflatten,
};

#[test]
fn flatten_and_unflatten_are_inverse() {
    let n = 8;
    for index in 0..n * n * n {
        assert_eq!(flatten(unflatten(index, n), n), index);
    }
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let coord = UVec3::new(x, y, z);
                assert_eq!(unflatten(flatten(coord, n), n), coord);
            }
        }
    }

    let n = 64;
    for index in (0..n * n * n).step_by(997) {
        assert_eq!(flatten(unflatten(index, n), n), index);
    }
    assert_eq!(flatten(UVec3::new(1, 2, 3), n), 3 * 64 * 64 + 2 * 64 + 1);
    assert_eq!(unflatten(n * n * n - 1, n), UVec3::splat(n - 1));
}

#[test]
fn config_from_scene_bounds() {
    let settings = VoxelSceneSettings::default().with_grid_size(32);
    let bounds = SceneBounds::new(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
    let config = VoxelGridConfig::from_scene(&settings, &bounds).unwrap();

    assert_eq!(config.voxel_size(), 0.125);
    assert_eq!(config.world_to_grid, 8.0);
    assert_eq!(config.clip_to_grid, 32.0);
    assert_eq!(config.grid_to_clip, 0.0625);
    assert_eq!(config.mip_count, 5);
    assert_eq!(config.mip_count, mip_count(32));
    assert_eq!(config.grid_center, Vec3::ZERO);
    assert_eq!(config.voxel_count(), 32 * 32 * 32);
    assert!(config.flags.contains(VoxelGridFlags::ENABLED | VoxelGridFlags::SECONDARY_BOUNCE));
    assert!(!config.temporal_smoothing());
}

#[test]
fn uniform_layout() {
    assert_eq!(std::mem::size_of::<VoxelGridUniform>(), 64);
    assert_eq!(VoxelGridUniform::SIZE, 64);

    let settings = VoxelSceneSettings::default()
        .with_grid_size(32)
        .with_occlusion(true)
        .with_conservative_rasterization(false);
    let bounds = SceneBounds::new(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
    let uniform = VoxelGridConfig::from_scene(&settings, &bounds)
        .unwrap()
        .uniform();

    assert_eq!(uniform.grid_conv, [8.0, 0.125, 32.0, 0.0625]);
    assert_eq!(uniform.radiance, [20.0, 5.0, 16.0, 1.0 / 16.0]);
    assert_eq!(uniform.other, [0.0, 0.0, 0.0, 0.75]);
    assert_eq!(uniform.status, [1, 0, 1, 1]);
}

#[test]
fn texture_space_flips_y() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));

    let center = config.world_to_tex(Vec3::ZERO);
    assert!((center - Vec3::splat(0.5)).length() < 1e-6);

    let up = config.world_to_tex(Vec3::new(0.0, 0.5, 0.0));
    assert!((up.y - 0.25).abs() < 1e-6);
    let right = config.world_to_tex(Vec3::new(0.5, 0.0, 0.0));
    assert!((right.x - 0.75).abs() < 1e-6);

    let corner = config.world_to_tex(Vec3::new(-1.0, 1.0, -1.0));
    assert!(corner.length() < 1e-6);
}

#[test]
fn voxel_centres_map_back_to_their_voxel() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    for coord in [
        UVec3::ZERO,
        UVec3::new(15, 0, 7),
        UVec3::new(3, 9, 12),
        UVec3::splat(15),
    ] {
        let world = config.voxel_to_world(coord);
        assert_eq!(config.world_to_voxel(world), Some(coord));
    }
    // uvw == 1 归入最后一层
    assert_eq!(config.tex_to_voxel(Vec3::ONE), UVec3::splat(15));
    assert_eq!(config.world_to_voxel(Vec3::new(1.5, 0.0, 0.0)), None);
}

#[test]
fn rejects_invalid_grid_sizes() {
    let bounds = common::unit_bounds();
    let check = |size| VoxelGridConfig::from_scene(&VoxelSceneSettings::default().with_grid_size(size), &bounds);

    assert_eq!(check(0).unwrap_err(), ConfigError::ZeroGridSize);
    assert_eq!(check(48).unwrap_err(), ConfigError::NonPowerOfTwo(48));
    assert_eq!(
        check(MAX_GRID_SIZE * 2).unwrap_err(),
        ConfigError::GridTooLarge {
            size: MAX_GRID_SIZE * 2,
            max: MAX_GRID_SIZE
        }
    );
    assert!(check(1).is_ok());
}

#[test]
fn rejects_invalid_parameters() {
    let bounds = common::unit_bounds();
    for settings in [
        VoxelSceneSettings::default().with_num_cones(0),
        VoxelSceneSettings::default().with_num_cones(17),
        VoxelSceneSettings::default().with_ray_step(0.0),
        VoxelSceneSettings::default().with_ray_step(f32::NAN),
        VoxelSceneSettings::default().with_max_distance(-1.0),
        VoxelSceneSettings::default().with_voxel_size_factor(0.0),
    ] {
        assert!(
            matches!(
                VoxelGridConfig::from_scene(&settings, &bounds),
                Err(ConfigError::InvalidParameter { .. })
            ),
            "{settings:?} should be rejected"
        );
    }
}

#[test]
fn rejects_degenerate_bounds() {
    let settings = VoxelSceneSettings::default();
    for bounds in [
        SceneBounds::EMPTY,
        SceneBounds::new(Vec3::ONE, Vec3::ONE),
        SceneBounds::new(Vec3::ONE, Vec3::ZERO),
        SceneBounds::new(Vec3::ZERO, Vec3::new(f32::INFINITY, 1.0, 1.0)),
    ] {
        assert!(matches!(
            VoxelGridConfig::from_scene(&settings, &bounds),
            Err(ConfigError::DegenerateBounds { .. })
        ));
    }

    // 平面场景：只有一个轴有厚度也能放置网格
    let floor = SceneBounds::from_points([Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 1.0)]);
    assert!(VoxelGridConfig::from_scene(&settings, &floor).is_ok());
}

mod common;

use glam::{UVec3, Vec3, Vec4};
use voxel_cone::{
    ComputeError, TextureWriteMode, VoxelArena, VoxelSceneSettings, VoxelTexture,
    buffer_to_texture, secondary_bounce,
};

const N: u32 = 16;

/// 体素 (8,8,8) 为暗的接收面，法线朝 +X；x >= 12 为明亮的发光墙
fn lit_scene(arena: &VoxelArena) -> UVec3 {
    let receiver = UVec3::splat(8);
    common::merge_voxel(arena, receiver, Vec4::new(0.1, 0.1, 0.1, 1.0), Vec3::X);
    for z in 0..N {
        for y in 0..N {
            for x in 12..N {
                common::merge_voxel(arena, UVec3::new(x, y, z), Vec4::ONE, Vec3::NEG_X);
            }
        }
    }
    receiver
}

#[test]
fn occupied_voxels_gather_light_from_neighbours() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(N));
    let arena = VoxelArena::new(N).unwrap();
    let receiver = lit_scene(&arena);

    let mut first = VoxelTexture::new(N).unwrap();
    let mut second = VoxelTexture::new(N).unwrap();
    buffer_to_texture(&arena, &mut first, TextureWriteMode::Direct).unwrap();
    let stats = secondary_bounce(&config, &arena, &first, &mut second).unwrap();
    assert_eq!(stats.lit, (1 + 4 * N * N) as u64);

    let emission = first.load(receiver, 0);
    let bounced = second.load(receiver, 0);
    assert!(bounced.x > emission.x, "{emission:?} -> {bounced:?}");
    assert!(bounced.truncate().cmpge(emission.truncate()).all());
    assert_eq!(bounced.w, emission.w);

    assert_eq!(second.load(UVec3::ZERO, 0), Vec4::ZERO);
    assert!(arena.is_cleared());
}

#[test]
fn bounce_never_darkens_a_voxel() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(N));
    let arena = VoxelArena::new(N).unwrap();
    let coord = UVec3::new(3, 4, 5);
    common::merge_voxel(&arena, coord, Vec4::new(0.5, 0.25, 0.0, 1.0), Vec3::Y);

    let mut first = VoxelTexture::new(N).unwrap();
    let mut second = VoxelTexture::new(N).unwrap();
    buffer_to_texture(&arena, &mut first, TextureWriteMode::Direct).unwrap();
    let stats = secondary_bounce(&config, &arena, &first, &mut second).unwrap();

    assert_eq!(stats.lit, 1);
    let emission = first.load(coord, 0);
    let bounced = second.load(coord, 0);
    assert!(bounced.truncate().cmpge(emission.truncate()).all(), "{emission:?} -> {bounced:?}");
    assert_eq!(bounced.w, emission.w);
    assert!(arena.is_cleared());
}

#[test]
fn stale_second_bounce_is_overwritten() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(N));
    let arena = VoxelArena::new(N).unwrap();
    let first = VoxelTexture::new(N).unwrap();
    let mut second = VoxelTexture::new(N).unwrap();
    second.store(UVec3::splat(2), Vec4::ONE);
    second.generate_mips();

    let stats = secondary_bounce(&config, &arena, &first, &mut second).unwrap();
    assert_eq!(stats.lit, 0);
    for mip in 0..second.mip_levels() {
        assert!(second.level(mip).unwrap().iter().all(|t| *t == Vec4::ZERO));
    }
}

#[test]
fn mismatched_sizes_are_rejected() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(N));
    let arena = VoxelArena::new(N).unwrap();
    let first = VoxelTexture::new(N).unwrap();
    let mut second = VoxelTexture::new(N / 2).unwrap();
    assert!(matches!(
        secondary_bounce(&config, &arena, &first, &mut second),
        Err(ComputeError::ShapeMismatch { .. })
    ));
}

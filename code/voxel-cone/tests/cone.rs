mod common;

use glam::{UVec3, Vec3, Vec4};
use voxel_cone::cone::DIFFUSE_CONES;
use voxel_cone::{ConeTracer, VoxelSceneSettings, VoxelTexture};

fn directions() -> Vec<Vec3> {
    let mut directions: Vec<Vec3> = DIFFUSE_CONES.to_vec();
    directions.extend([Vec3::X, Vec3::NEG_Y, Vec3::new(1.0, 2.0, -3.0).normalize()]);
    directions
}

/// x >= 0.5 的半空间填满不透明白色体素
fn wall_texture(n: u32) -> VoxelTexture {
    let mut texture = VoxelTexture::new(n).unwrap();
    for z in 0..n {
        for y in 0..n {
            for x in (3 * n / 4)..n {
                texture.store(UVec3::new(x, y, z), Vec4::ONE);
            }
        }
    }
    texture.generate_mips();
    texture
}

#[test]
fn empty_grid_returns_nothing() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    let texture = VoxelTexture::new(16).unwrap();
    let tracer = ConeTracer::new(&texture, &config);

    for direction in directions() {
        for aperture in [0.01, 0.2, 0.577, 2.0] {
            let result = tracer.trace_cone(Vec3::ZERO, Vec3::Y, direction, aperture);
            assert_eq!(result, Vec4::ZERO);
        }
    }
    assert_eq!(tracer.trace_cone_radiance(Vec3::ZERO, Vec3::Y), Vec4::ZERO);
    assert_eq!(
        tracer.trace_cone_reflection(Vec3::ZERO, Vec3::Y, Vec3::new(0.0, 1.0, 1.0).normalize(), 0.3),
        Vec4::ZERO
    );
    assert_eq!(tracer.trace_cone_occlusion(Vec3::ZERO, Vec3::Y, Vec3::Y), 0.0);
}

#[test]
fn march_terminates_within_step_bound() {
    let settings = VoxelSceneSettings::default()
        .with_grid_size(32)
        .with_max_distance(f32::INFINITY)
        .with_ray_step(0.1);
    let config = common::unit_config(settings);
    let texture = VoxelTexture::new(32).unwrap();
    let tracer = ConeTracer::new(&texture, &config);
    let bound = tracer.max_steps();

    for position in [Vec3::ZERO, Vec3::new(0.9, -0.9, 0.3), Vec3::splat(-0.95)] {
        for direction in directions() {
            for aperture in [1e-4, 0.05, 0.5, 3.0] {
                let trace = tracer.march(position, Vec3::ZERO, direction, aperture);
                assert!(
                    trace.steps <= bound,
                    "{position:?} {direction:?} {aperture}: {} > {bound}",
                    trace.steps
                );
            }
        }
    }
}

#[test]
fn march_starting_outside_the_grid_does_nothing() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    let texture = wall_texture(16);
    let tracer = ConeTracer::new(&texture, &config);
    let trace = tracer.march(Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO, Vec3::NEG_X, 0.1);
    assert_eq!(trace.steps, 0);
    assert_eq!(trace.radiance, Vec4::ZERO);
}

#[test]
fn opaque_wall_saturates_alpha() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    let texture = wall_texture(16);
    let tracer = ConeTracer::new(&texture, &config);

    let hit = tracer.trace_cone(Vec3::ZERO, Vec3::X, Vec3::X, 0.05);
    assert!(hit.w > 0.99, "{hit:?}");
    // 白色体素：颜色与不透明度同步累积
    assert!((hit.x - hit.w).abs() < 1e-5);

    let miss = tracer.trace_cone(Vec3::ZERO, Vec3::NEG_X, Vec3::NEG_X, 0.05);
    assert_eq!(miss, Vec4::ZERO);
}

#[test]
fn max_distance_limits_reach() {
    let near = VoxelSceneSettings::default()
        .with_grid_size(16)
        .with_max_distance(0.2);
    let config = common::unit_config(near);
    let texture = wall_texture(16);
    let tracer = ConeTracer::new(&texture, &config);
    assert_eq!(tracer.trace_cone(Vec3::ZERO, Vec3::ZERO, Vec3::X, 0.05), Vec4::ZERO);
}

#[test]
fn radiance_sees_only_the_facing_hemisphere() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    let texture = wall_texture(16);
    let tracer = ConeTracer::new(&texture, &config);

    let facing = tracer.trace_cone_radiance(Vec3::ZERO, Vec3::X);
    assert!(facing.x > 0.0 && facing.w > 0.0 && facing.w <= 1.0, "{facing:?}");

    let away = tracer.trace_cone_radiance(Vec3::new(-0.5, 0.0, 0.0), Vec3::NEG_X);
    assert!(away.x < facing.x);
    assert!(away.cmpge(Vec4::ZERO).all());
}

#[test]
fn fewer_cones_still_average() {
    let settings = VoxelSceneSettings::default()
        .with_grid_size(16)
        .with_num_cones(4);
    let config = common::unit_config(settings);
    let texture = wall_texture(16);
    let tracer = ConeTracer::new(&texture, &config);
    let radiance = tracer.trace_cone_radiance(Vec3::ZERO, Vec3::X);
    assert!(radiance.w <= 1.0 && radiance.x >= 0.0);
}

#[test]
fn reflection_follows_mirror_direction() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    let texture = wall_texture(16);
    let tracer = ConeTracer::new(&texture, &config);

    // 视线来自 -X 一侧，关于 +Y 法线反射后指向 +X 的墙
    let view = Vec3::new(-1.0, 1.0, 0.0).normalize();
    let glossy = tracer.trace_cone_reflection(Vec3::new(0.0, -0.5, 0.0), Vec3::Y, view, 0.1);
    assert!(glossy.w > 0.5 && glossy.w <= 0.9 + 1e-5, "{glossy:?}");

    let mirrored = Vec3::new(1.0, 1.0, 0.0).normalize();
    let away = tracer.trace_cone_reflection(Vec3::new(0.0, -0.5, 0.0), Vec3::Y, mirrored, 0.1);
    assert!(away.w < glossy.w);

    // 完全粗糙时镜面权重为零
    let rough = tracer.trace_cone_reflection(Vec3::new(0.0, -0.5, 0.0), Vec3::Y, view, 1.0);
    assert_eq!(rough.w, 0.0);
}

#[test]
fn occlusion_towards_a_wall() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    let texture = wall_texture(16);
    let tracer = ConeTracer::new(&texture, &config);

    let blocked = tracer.trace_cone_occlusion(Vec3::ZERO, Vec3::ZERO, Vec3::X);
    let open = tracer.trace_cone_occlusion(Vec3::ZERO, Vec3::ZERO, Vec3::NEG_X);
    assert!(blocked > open, "{blocked} vs {open}");
    assert!((0.0..=1.0).contains(&blocked));
}

#[test]
fn occlusion_toggle_gates_visibility() {
    let texture = wall_texture(16);

    let disabled = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    let tracer = ConeTracer::new(&texture, &disabled);
    assert_eq!(tracer.indirect_occlusion(Vec3::ZERO, Vec3::ZERO, Vec3::X), 1.0);

    let enabled = common::unit_config(
        VoxelSceneSettings::default()
            .with_grid_size(16)
            .with_occlusion(true),
    );
    let tracer = ConeTracer::new(&texture, &enabled);
    let blocked = tracer.indirect_occlusion(Vec3::ZERO, Vec3::ZERO, Vec3::X);
    let occlusion = tracer.trace_cone_occlusion(Vec3::ZERO, Vec3::ZERO, Vec3::X);
    assert!(occlusion > 0.0);
    assert_eq!(blocked, 1.0 - occlusion);
    assert!(blocked < 1.0);

    let empty = VoxelTexture::new(16).unwrap();
    let tracer = ConeTracer::new(&empty, &enabled);
    assert_eq!(tracer.indirect_occlusion(Vec3::ZERO, Vec3::Y, Vec3::Y), 1.0);
}

#[test]
fn indirect_light_fades_at_grid_border() {
    let config = common::unit_config(VoxelSceneSettings::default().with_grid_size(16));
    let texture = wall_texture(16);
    let tracer = ConeTracer::new(&texture, &config);

    assert_eq!(tracer.indirect_blend(Vec3::ZERO), 1.0);
    assert_eq!(tracer.indirect_blend(Vec3::new(0.0, 1.0, 0.0)), 0.0);
    assert_eq!(tracer.indirect_blend(Vec3::new(0.0, 0.0, -4.0)), 0.0);

    let diffuse = tracer.indirect_diffuse(Vec3::ZERO, Vec3::X, 1.0);
    assert_eq!(diffuse.w, 1.0);
    assert!(diffuse.x > 0.0);
    assert_eq!(tracer.indirect_diffuse(Vec3::ZERO, Vec3::X, 0.0).truncate(), Vec3::ZERO);

    let view = Vec3::new(-1.0, 1.0, 0.0).normalize();
    let specular = tracer.indirect_specular(Vec3::new(0.0, -0.5, 0.0), Vec3::Y, view, 0.1, 1.0, 1.0);
    assert!(specular.x > 0.0);
    assert_eq!(
        tracer.indirect_specular(Vec3::new(0.0, -0.5, 0.0), Vec3::Y, view, 0.1, 1.0, 0.0),
        Vec3::ZERO
    );
}

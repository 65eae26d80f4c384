//! 体素化时的直接光照
//!
//! 光照数据 (光源、阴影贴图) 属于外部子系统，这里只定义它需要回答的问题：
//! 某个表面点收到多少漫反射光。

use glam::Vec3;

/// 被着色的表面点 (世界空间)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub position: Vec3,
    pub normal: Vec3,
}

/// 光照协作者。在体素化的并行派发中被多个线程同时调用
pub trait LightingModel: Sync {
    /// 到达表面的漫反射辐照度 (尚未乘反照率)
    fn diffuse(&self, surface: &Surface) -> Vec3;
}

/// 只有自发光参与体素化
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLighting;

impl LightingModel for NoLighting {
    fn diffuse(&self, _surface: &Surface) -> Vec3 {
        Vec3::ZERO
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Directional {
        /// 光线传播方向
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    },
    Point {
        position: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
    },
}

impl Light {
    fn irradiance(&self, surface: &Surface) -> Vec3 {
        match *self {
            Light::Directional {
                direction,
                color,
                intensity,
            } => {
                let to_light = -direction.normalize_or_zero();
                color * intensity * surface.normal.dot(to_light).max(0.0)
            }
            Light::Point {
                position,
                color,
                intensity,
                range,
            } => {
                let offset = position - surface.position;
                let distance = offset.length();
                if distance <= 0.0 || distance >= range {
                    return Vec3::ZERO;
                }
                let to_light = offset / distance;
                let window = (1.0 - (distance / range).powi(4)).clamp(0.0, 1.0).powi(2);
                let attenuation = window / (1.0 + distance * distance);
                color * intensity * attenuation * surface.normal.dot(to_light).max(0.0)
            }
        }
    }
}

/// Lambert 光源集合，无阴影
#[derive(Clone, Debug, Default)]
pub struct SceneLights {
    pub ambient: Vec3,
    lights: Vec<Light>,
}

impl SceneLights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ambient(mut self, ambient: Vec3) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }
}

impl LightingModel for SceneLights {
    fn diffuse(&self, surface: &Surface) -> Vec3 {
        self.lights
            .iter()
            .fold(self.ambient, |acc, light| acc + light.irradiance(surface))
    }
}

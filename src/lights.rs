use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// RGB color with components in `0.0..=1.0`, kept in the sRGB encoding of the hex value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color(pub Vec3);

impl Color {
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xff) as f32 / 255.0;
        let g = ((hex >> 8) & 0xff) as f32 / 255.0;
        let b = (hex & 0xff) as f32 / 255.0;
        Color(Vec3::new(r, g, b))
    }
}

#[derive(Debug, Clone)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

impl AmbientLight {
    pub fn new(color: Color, intensity: f32) -> Self {
        Self { color, intensity }
    }
}

#[derive(Debug, Clone)]
pub struct PointLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    /// Cutoff distance, 0 means unlimited.
    pub distance: f32,
    pub decay: f32,
}

impl PointLight {
    pub fn new(color: Color, intensity: f32, position: Vec3) -> Self {
        Self {
            color,
            intensity,
            position,
            distance: 0.0,
            decay: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lights {
    pub ambient: AmbientLight,
    pub point: PointLight,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct LightsUniform {
    /// rgb premultiplied by intensity, w unused
    ambient: [f32; 4],
    /// xyz position, w cutoff distance
    point_position: [f32; 4],
    /// rgb premultiplied by intensity, w decay
    point_color: [f32; 4],
}

impl LightsUniform {
    pub fn new(lights: &Lights) -> Self {
        let ambient = lights.ambient.color.0 * lights.ambient.intensity;
        let point = &lights.point;
        let point_color = point.color.0 * point.intensity;

        Self {
            ambient: ambient.extend(0.0).to_array(),
            point_position: point.position.extend(point.distance).to_array(),
            point_color: point_color.extend(point.decay).to_array(),
        }
    }
}

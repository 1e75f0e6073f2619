use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            eye: config.position,
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: config.fov_y_degrees,
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    /// Ignores degenerate ratios, e.g. from a minimised window.
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn distance_to_target(&self) -> f32 {
        self.eye.distance(self.target)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
    view: Mat4,
    eye: [f32; 4],
}

impl CameraUniform {
    pub fn update(&mut self, camera: &Camera) {
        self.view_proj = camera.view_projection();
        self.view = camera.view_matrix();
        self.eye = camera.eye.extend(1.0).to_array();
    }
}

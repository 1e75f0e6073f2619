//! Orbit camera controls.
//!
//! Pointer input is accumulated between frames and applied in [`OrbitControls::update`],
//! which orbits the camera around `target` in spherical coordinates with `+Y` as up.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::{camera::Camera, config::ControlsConfig};

const POLE_EPSILON: f32 = 1e-6;
const MOVE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Spherical {
    radius: f32,
    /// Polar angle measured from +Y.
    phi: f32,
    /// Azimuth around +Y, 0 along +Z.
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self::default();
        }

        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub enable_rotate: bool,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,

    spherical_delta: Spherical,
    pan_offset: Vec3,
    scale: f32,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig) -> Self {
        Self {
            target: config.target,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            enable_rotate: true,
            enable_pan: true,
            enable_zoom: true,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            enable_damping: false,
            damping_factor: 0.05,
            spherical_delta: Spherical::default(),
            pan_offset: Vec3::ZERO,
            scale: 1.0,
        }
    }

    /// Orbits left/right and up/down. A drag across the full viewport height is one turn.
    pub fn rotate_by_pixels(&mut self, delta_x: f32, delta_y: f32, viewport_height: f32) {
        if !self.enable_rotate || viewport_height <= 0.0 {
            return;
        }

        self.spherical_delta.theta -= TAU * delta_x / viewport_height * self.rotate_speed;
        self.spherical_delta.phi -= TAU * delta_y / viewport_height * self.rotate_speed;
    }

    /// Moves the target in the camera plane so that the point under the cursor follows it.
    pub fn pan_by_pixels(
        &mut self,
        delta_x: f32,
        delta_y: f32,
        viewport_height: f32,
        camera: &Camera,
    ) {
        if !self.enable_pan || viewport_height <= 0.0 {
            return;
        }

        let offset = camera.eye - self.target;
        let target_distance = offset.length() * (camera.fov_y_degrees.to_radians() / 2.0).tan();

        let forward = (self.target - camera.eye).normalize_or_zero();
        let right = forward.cross(camera.up).normalize_or_zero();
        let up = right.cross(forward);

        let pan_x = 2.0 * delta_x * target_distance / viewport_height * self.pan_speed;
        let pan_y = 2.0 * delta_y * target_distance / viewport_height * self.pan_speed;

        self.pan_offset += right * -pan_x + up * pan_y;
    }

    /// Negative `delta_y` (wheel up) moves towards the target.
    pub fn dolly_by_wheel(&mut self, delta_y: f32) {
        if !self.enable_zoom {
            return;
        }

        let zoom_scale = 0.95f32.powf(self.zoom_speed);

        if delta_y < 0.0 {
            self.scale *= zoom_scale;
        } else if delta_y > 0.0 {
            self.scale /= zoom_scale;
        }
    }

    #[cfg(test)]
    pub(crate) fn has_pending_input(&self) -> bool {
        self.spherical_delta != Spherical::default()
            || self.pan_offset != Vec3::ZERO
            || self.scale != 1.0
    }

    /// Applies accumulated input and the distance/angle constraints to `camera`.
    /// Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let previous_eye = camera.eye;
        let previous_target = camera.target;

        let mut spherical = Spherical::from_offset(camera.eye - self.target);

        if self.enable_damping {
            spherical.theta += self.spherical_delta.theta * self.damping_factor;
            spherical.phi += self.spherical_delta.phi * self.damping_factor;
        } else {
            spherical.theta += self.spherical_delta.theta;
            spherical.phi += self.spherical_delta.phi;
        }

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(POLE_EPSILON, PI - POLE_EPSILON);

        spherical.radius =
            (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        if self.enable_damping {
            self.target += self.pan_offset * self.damping_factor;
        } else {
            self.target += self.pan_offset;
        }

        camera.eye = self.target + spherical.to_offset();
        camera.target = self.target;

        if self.enable_damping {
            self.spherical_delta.theta *= 1.0 - self.damping_factor;
            self.spherical_delta.phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }

        self.scale = 1.0;

        camera.eye.distance_squared(previous_eye) > MOVE_EPSILON
            || camera.target.distance_squared(previous_target) > MOVE_EPSILON
    }
}

use wgpu::util::DeviceExt;

use crate::camera::{Camera, CameraUniform};

/// GPU copy of the camera.
pub struct RenderCamera {
    uniform: CameraUniform,
    pub uniform_buffer: wgpu::Buffer,
}

impl RenderCamera {
    pub fn new(device: &wgpu::Device, camera: &Camera) -> Self {
        let mut uniform = CameraUniform::default();
        uniform.update(camera);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            uniform,
            uniform_buffer,
        }
    }

    pub fn update(&mut self, queue: &wgpu::Queue, camera: &Camera) {
        self.uniform.update(camera);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

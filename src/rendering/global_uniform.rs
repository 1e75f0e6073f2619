use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::lights::LightsUniform;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GlobalUniformState {
    pub resolution: [f32; 2],
    pub now: f32,
    pub pixel_ratio: f32,
}

impl GlobalUniformState {
    pub fn new(resolution: PhysicalSize<u32>, now: f32, pixel_ratio: f32) -> Self {
        Self {
            resolution: [resolution.width as f32, resolution.height as f32],
            now,
            pixel_ratio,
        }
    }
}

/// Per-frame values shared by every material: bind group 1, globals at binding 0 and
/// lights at binding 1.
pub struct GlobalUniform {
    globals_buffer: wgpu::Buffer,
    lights_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

fn uniform_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GlobalUniform {
    pub fn new(
        device: &wgpu::Device,
        initial_state: GlobalUniformState,
        initial_lights: LightsUniform,
    ) -> Self {
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Global uniform buffer"),
            contents: bytemuck::cast_slice(&[initial_state]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights uniform buffer"),
            contents: bytemuck::cast_slice(&[initial_lights]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Global uniform bind group layout"),
            entries: &[uniform_layout_entry(0), uniform_layout_entry(1)],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Global uniform bind group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
        });

        Self {
            globals_buffer,
            lights_buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, state: GlobalUniformState, lights: LightsUniform) {
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[state]));
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::cast_slice(&[lights]));
    }
}

use id_arena::Id;
use wgpu::util::DeviceExt;

use crate::{
    material::MaterialId,
    model::{Model, ModelPrimitive},
    rendering::instance::{batch_instances, Instance, InstanceBatch, InstanceBuffer},
};

pub type RenderModelId = Id<RenderModel>;

pub struct RenderPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl RenderPrimitive {
    fn from_primitive(device: &wgpu::Device, model: &Model, primitive: &ModelPrimitive) -> Self {
        let vertex_buffer_name = format!(
            "Vertex buffer ({}, primitive {})",
            model.name, primitive.index
        );
        let index_buffer_name = format!(
            "Index buffer ({}, primitive {})",
            model.name, primitive.index
        );

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&vertex_buffer_name),
            contents: bytemuck::cast_slice(&primitive.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&index_buffer_name),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: primitive.indices.len() as u32,
        }
    }
}

pub struct RenderModel {
    pub name: String,
    pub primitives: Vec<RenderPrimitive>,
    instance_buffer: InstanceBuffer,
    batches: Vec<InstanceBatch>,
}

impl RenderModel {
    pub fn from_model(device: &wgpu::Device, model: &Model) -> Self {
        let primitives = model
            .primitives
            .iter()
            .filter(|primitive| !primitive.indices.is_empty())
            .map(|primitive| RenderPrimitive::from_primitive(device, model, primitive))
            .collect();

        RenderModel {
            name: model.name.clone(),
            primitives,
            instance_buffer: InstanceBuffer::new(device, &model.name),
            batches: Vec::new(),
        }
    }

    pub fn set_instances(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        instances: Vec<(MaterialId, Instance)>,
    ) {
        let (instances, batches) = batch_instances(instances);
        self.instance_buffer.write(device, queue, &instances);
        self.batches = batches;
    }

    pub fn uses_material(&self, material: MaterialId) -> bool {
        self.batches.iter().any(|batch| batch.material == material)
    }

    /// Draws the instances that use `material`. The material's pipeline must already be set.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, material: MaterialId) {
        let Some(batch) = self.batches.iter().find(|batch| batch.material == material) else {
            return;
        };

        self.instance_buffer.bind(render_pass);

        for primitive in &self.primitives {
            render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
            render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..primitive.num_indices, 0, batch.range.clone());
        }
    }
}
